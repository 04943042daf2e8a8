//! Console-backed library implementations
//!
//! The standard-stream `TextWindow` used by the CLI host. Reads never
//! happen here: `Read`/`ReadNumber`/`Pause` block the engine's state
//! machine, and the host's driving loop supplies the input between
//! `execute` calls.

use std::io::{self, Write as _};

use super::{LibraryCall, ProgramPlugin, TextWindowPlugin};
use crate::values::BaseValue;

#[derive(Default)]
pub struct ConsoleTextWindow {
    title: BaseValue,
    foreground_color: BaseValue,
}

impl TextWindowPlugin for ConsoleTextWindow {
    fn write(&mut self, value: &BaseValue) -> LibraryCall {
        print!("{}", value.display());
        let _ = io::stdout().flush();
        LibraryCall::done()
    }

    fn write_line(&mut self, value: &BaseValue) -> LibraryCall {
        println!("{}", value.display());
        LibraryCall::done()
    }

    fn read(&mut self) -> LibraryCall {
        LibraryCall::BlockForStringInput
    }

    fn read_number(&mut self) -> LibraryCall {
        LibraryCall::BlockForNumberInput
    }

    fn clear(&mut self) -> LibraryCall {
        // ANSI clear-and-home; a no-op on terminals that ignore it.
        print!("\x1b[2J\x1b[H");
        let _ = io::stdout().flush();
        LibraryCall::done()
    }

    fn pause(&mut self) -> LibraryCall {
        println!("Press ENTER to continue...");
        LibraryCall::BlockForStringInput
    }

    fn get_title(&mut self) -> LibraryCall {
        LibraryCall::Value(self.title.clone())
    }

    fn set_title(&mut self, value: &BaseValue) -> LibraryCall {
        self.title = value.clone();
        LibraryCall::done()
    }

    fn get_foreground_color(&mut self) -> LibraryCall {
        LibraryCall::Value(self.foreground_color.clone())
    }

    fn set_foreground_color(&mut self, value: &BaseValue) -> LibraryCall {
        self.foreground_color = value.clone();
        LibraryCall::done()
    }
}

pub struct ConsoleProgram;

impl ProgramPlugin for ConsoleProgram {
    fn end(&mut self) -> LibraryCall {
        LibraryCall::EndProgram
    }

    fn pause(&mut self) -> LibraryCall {
        println!("Press ENTER to continue...");
        LibraryCall::BlockForStringInput
    }
}
