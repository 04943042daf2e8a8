//! Command-line host
//!
//! `basil check` compiles and reports diagnostics; `basil run` drives the
//! engine's state machine against the console, feeding stdin lines into
//! the blocked-input states.

use std::io::{self, BufRead, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::compiler::Compilation;
use crate::diagnostics::Diagnostic;
use crate::libraries::LibraryPlugins;
use crate::runtime::{ExecutionEngine, ExecutionState};
use crate::values::BaseValue;

#[derive(Parser)]
#[command(name = "basil")]
#[command(about = "Basil - a small line-oriented scripting language", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a script and report its diagnostics
    Check {
        /// Script to compile
        file: PathBuf,

        /// Emit diagnostics as JSON instead of caret spans
        #[arg(long)]
        json: bool,
    },

    /// Compile and run a script on the console
    Run {
        /// Script to run
        file: PathBuf,
    },
}

/// Run the CLI by parsing process arguments.
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Check { file, json } => {
            let source = read_source(&file)?;
            let compilation = Compilation::compile(&source);
            if json {
                let diagnostics: Vec<&Diagnostic> = compilation.diagnostics.iter().collect();
                println!("{}", serde_json::to_string_pretty(&diagnostics)?);
            } else {
                for diagnostic in compilation.diagnostics.iter() {
                    print_diagnostic(&source, diagnostic);
                }
            }
            if compilation.has_fatal_diagnostics() {
                std::process::exit(1);
            }
            if !json {
                println!("{}: ok", file.display());
            }
        }

        Commands::Run { file } => {
            let source = read_source(&file)?;
            let compilation = Compilation::compile(&source);
            for diagnostic in compilation.diagnostics.iter() {
                print_diagnostic(&source, diagnostic);
            }
            if compilation.has_fatal_diagnostics() {
                std::process::exit(1);
            }
            run_program(&compilation).await?;
        }
    }

    Ok(())
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("cannot read {}", file.display()))
}

/// Drive the engine until termination, supplying console input whenever
/// it blocks.
async fn run_program(compilation: &Compilation) -> Result<()> {
    let mut engine = ExecutionEngine::new(compilation.emit(), LibraryPlugins::console());

    loop {
        engine.execute(false).await;
        match engine.state() {
            ExecutionState::Terminated => return Ok(()),
            ExecutionState::BlockedOnStringInput => {
                let line = read_input_line()?;
                engine.supply_input(BaseValue::from_text(&line))?;
            }
            ExecutionState::BlockedOnNumberInput => loop {
                let line = read_input_line()?;
                match BaseValue::from_text(line.trim()) {
                    value @ BaseValue::Number(_) => {
                        engine.supply_input(value)?;
                        break;
                    }
                    _ => {
                        print!("Please enter a number: ");
                        let _ = io::stdout().flush();
                    }
                }
            },
            ExecutionState::Running | ExecutionState::Paused => {}
        }
    }
}

fn read_input_line() -> Result<String> {
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("cannot read stdin")?;
    anyhow::ensure!(read > 0, "input ended while the program was waiting for it");
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(line)
}

/// `line:col: message` plus a single-line caret span.
fn print_diagnostic(source: &str, diagnostic: &Diagnostic) {
    let line = diagnostic.range.start.line;
    let start = diagnostic.range.start.column;
    let end = diagnostic.range.end.column;
    eprintln!("{}:{}: {}", line + 1, start + 1, diagnostic.message());
    if let Some(text) = source.lines().nth(line as usize) {
        let width = (end - start + 1) as usize;
        eprintln!("  {} | {}", line + 1, text);
        let gutter = (line + 1).to_string().len();
        eprintln!(
            "  {} | {}{}",
            " ".repeat(gutter),
            " ".repeat(start as usize),
            "^".repeat(width)
        );
    }
}
