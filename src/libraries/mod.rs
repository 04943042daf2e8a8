//! Library catalog and plugin boundary
//!
//! The catalog is static metadata: which libraries exist and which
//! methods/properties/events they expose. It is built once, never mutated,
//! and consumed by the binder (validation), the emitter (call shapes), and
//! the IDE services (hover/completion).
//!
//! The plugin traits are the host-implemented side: one capability trait
//! per catalog entry. Every trait method has a default body returning
//! [`LibraryCall::Unsupported`] so a host can implement a safe subset.

pub mod builtin;
pub mod console;

use std::sync::OnceLock;

use indexmap::IndexMap;

use crate::values::BaseValue;

/* ===================== Catalog metadata ===================== */

#[derive(Debug, Clone)]
pub struct MethodMetadata {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [&'static str],
    pub returns_value: bool,
    /// Set for members carried over from an older generation of the
    /// language; using them is advisory-diagnostic only.
    pub deprecation: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct PropertyMetadata {
    pub name: &'static str,
    pub description: &'static str,
    pub writable: bool,
    pub deprecation: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct EventMetadata {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct LibraryMetadata {
    pub name: &'static str,
    pub description: &'static str,
    /// Keys are case-folded member names; values keep display casing.
    pub methods: IndexMap<String, MethodMetadata>,
    pub properties: IndexMap<String, PropertyMetadata>,
    pub events: IndexMap<String, EventMetadata>,
}

impl LibraryMetadata {
    pub fn method(&self, name: &str) -> Option<&MethodMetadata> {
        self.methods.get(&name.to_ascii_lowercase())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.get(&name.to_ascii_lowercase())
    }

    pub fn event(&self, name: &str) -> Option<&EventMetadata> {
        self.events.get(&name.to_ascii_lowercase())
    }
}

/// The full, load-once library catalog.
#[derive(Debug, Clone)]
pub struct LibraryCatalog {
    libraries: IndexMap<String, LibraryMetadata>,
}

impl LibraryCatalog {
    pub fn library(&self, name: &str) -> Option<&LibraryMetadata> {
        self.libraries.get(&name.to_ascii_lowercase())
    }

    pub fn libraries(&self) -> impl Iterator<Item = &LibraryMetadata> {
        self.libraries.values()
    }
}

/// The process-wide catalog instance.
pub fn catalog() -> &'static LibraryCatalog {
    static CATALOG: OnceLock<LibraryCatalog> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

fn build_catalog() -> LibraryCatalog {
    let mut libraries = IndexMap::new();

    let mut add = |metadata: LibraryMetadata| {
        libraries.insert(metadata.name.to_ascii_lowercase(), metadata);
    };

    add(LibraryMetadata {
        name: "TextWindow",
        description: "Reads from and writes to the text console.",
        methods: methods(&[
            ("Write", "Writes a value to the console without a line break.", &["value"], false, None),
            ("WriteLine", "Writes a value to the console followed by a line break.", &["value"], false, None),
            ("Read", "Reads a line of text typed by the user.", &[], true, None),
            ("ReadNumber", "Reads a number typed by the user.", &[], true, None),
            ("Clear", "Clears the console.", &[], false, None),
            ("Pause", "Waits for the user to press enter.", &[], false, None),
        ]),
        properties: properties(&[
            ("Title", "The title of the console window.", true, None),
            ("ForegroundColor", "The color used for new console output.", true, None),
        ]),
        events: IndexMap::new(),
    });

    add(LibraryMetadata {
        name: "Math",
        description: "Numeric helper methods and constants.",
        methods: methods(&[
            ("Abs", "Returns the absolute value of a number.", &["number"], true, None),
            ("Ceiling", "Rounds a number up to the nearest integer.", &["number"], true, None),
            ("Floor", "Rounds a number down to the nearest integer.", &["number"], true, None),
            ("Round", "Rounds a number to the nearest integer.", &["number"], true, None),
            ("Min", "Returns the smaller of two numbers.", &["number1", "number2"], true, None),
            ("Max", "Returns the larger of two numbers.", &["number1", "number2"], true, None),
            ("Remainder", "Returns the remainder of dividing one number by another.", &["dividend", "divisor"], true, None),
        ]),
        properties: properties(&[("Pi", "The ratio of a circle's circumference to its diameter.", false, None)]),
        events: IndexMap::new(),
    });

    add(LibraryMetadata {
        name: "Array",
        description: "Inspects array values.",
        methods: methods(&[
            ("GetItemCount", "Returns the number of items stored in an array.", &["array"], true, None),
            ("IsArray", "Returns whether a value is an array.", &["value"], true, None),
            ("ContainsValue", "Returns whether an array contains a value.", &["array", "value"], true, None),
            ("ContainsIndex", "Returns whether an array contains an index.", &["array", "index"], true, None),
        ]),
        properties: IndexMap::new(),
        events: IndexMap::new(),
    });

    add(LibraryMetadata {
        name: "Program",
        description: "Controls the running program.",
        methods: methods(&[
            ("End", "Ends the program.", &[], false, None),
            (
                "Pause",
                "Waits for the user to press enter.",
                &[],
                false,
                Some("Use TextWindow.Pause instead."),
            ),
        ]),
        properties: IndexMap::new(),
        events: IndexMap::new(),
    });

    LibraryCatalog { libraries }
}

type MethodRow = (
    &'static str,
    &'static str,
    &'static [&'static str],
    bool,
    Option<&'static str>,
);

fn methods(rows: &[MethodRow]) -> IndexMap<String, MethodMetadata> {
    rows
        .iter()
        .map(|(name, description, parameters, returns_value, deprecation)| {
            (
                name.to_ascii_lowercase(),
                MethodMetadata {
                    name,
                    description,
                    parameters,
                    returns_value: *returns_value,
                    deprecation: *deprecation,
                },
            )
        })
        .collect()
}

type PropertyRow = (&'static str, &'static str, bool, Option<&'static str>);

fn properties(rows: &[PropertyRow]) -> IndexMap<String, PropertyMetadata> {
    rows
        .iter()
        .map(|(name, description, writable, deprecation)| {
            (
                name.to_ascii_lowercase(),
                PropertyMetadata {
                    name,
                    description,
                    writable: *writable,
                    deprecation: *deprecation,
                },
            )
        })
        .collect()
}

/* ===================== Plugin boundary ===================== */

/// The outcome of one plugin call.
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryCall {
    /// The call produced a value (void methods return the empty string).
    Value(BaseValue),
    /// The engine must block until the host supplies a line of text.
    BlockForStringInput,
    /// The engine must block until the host supplies a number.
    BlockForNumberInput,
    /// The engine must terminate the program.
    EndProgram,
    /// The host does not implement this capability.
    Unsupported,
}

impl LibraryCall {
    /// Convenience for void methods.
    pub fn done() -> LibraryCall {
        LibraryCall::Value(BaseValue::default())
    }
}

/// Console capability.
pub trait TextWindowPlugin {
    fn write(&mut self, _value: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn write_line(&mut self, _value: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn read(&mut self) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn read_number(&mut self) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn clear(&mut self) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn pause(&mut self) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn get_title(&mut self) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn set_title(&mut self, _value: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn get_foreground_color(&mut self) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn set_foreground_color(&mut self, _value: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
}

/// Numeric helper capability.
pub trait MathPlugin {
    fn abs(&mut self, _number: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn ceiling(&mut self, _number: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn floor(&mut self, _number: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn round(&mut self, _number: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn min(&mut self, _a: &BaseValue, _b: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn max(&mut self, _a: &BaseValue, _b: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn remainder(&mut self, _dividend: &BaseValue, _divisor: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn get_pi(&mut self) -> LibraryCall {
        LibraryCall::Unsupported
    }
}

/// Array inspection capability.
pub trait ArrayPlugin {
    fn get_item_count(&mut self, _array: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn is_array(&mut self, _value: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn contains_value(&mut self, _array: &BaseValue, _value: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn contains_index(&mut self, _array: &BaseValue, _index: &BaseValue) -> LibraryCall {
        LibraryCall::Unsupported
    }
}

/// Program control capability.
pub trait ProgramPlugin {
    fn end(&mut self) -> LibraryCall {
        LibraryCall::Unsupported
    }
    fn pause(&mut self) -> LibraryCall {
        LibraryCall::Unsupported
    }
}

/// The full plugin set handed to the engine.
pub struct LibraryPlugins {
    pub text_window: Box<dyn TextWindowPlugin + Send>,
    pub math: Box<dyn MathPlugin + Send>,
    pub array: Box<dyn ArrayPlugin + Send>,
    pub program: Box<dyn ProgramPlugin + Send>,
}

impl LibraryPlugins {
    /// Plugins for a console host: real stdio text window, pure math and
    /// array implementations.
    pub fn console() -> Self {
        LibraryPlugins {
            text_window: Box::new(console::ConsoleTextWindow::default()),
            math: Box::new(builtin::BuiltinMath),
            array: Box::new(builtin::BuiltinArray),
            program: Box::new(console::ConsoleProgram),
        }
    }

    /// Plugins implementing nothing; every call reports Unsupported.
    /// Useful for hosts that only compile, and as a test baseline.
    pub fn unsupported() -> Self {
        struct Nothing;
        impl TextWindowPlugin for Nothing {}
        impl MathPlugin for Nothing {}
        impl ArrayPlugin for Nothing {}
        impl ProgramPlugin for Nothing {}
        LibraryPlugins {
            text_window: Box::new(Nothing),
            math: Box::new(Nothing),
            array: Box::new(Nothing),
            program: Box::new(Nothing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lookup_is_case_insensitive() {
        let catalog = catalog();
        let tw = catalog.library("textwindow").expect("TextWindow");
        assert_eq!(tw.name, "TextWindow");
        assert!(tw.method("WRITELINE").is_some());
        assert!(tw.property("foregroundcolor").is_some());
        assert!(catalog.library("Turtle").is_none());
    }

    #[test]
    fn program_pause_is_the_deprecated_member() {
        let program = catalog().library("Program").unwrap();
        assert!(program.method("Pause").unwrap().deprecation.is_some());
        assert!(program.method("End").unwrap().deprecation.is_none());
    }

    #[test]
    fn default_plugin_methods_report_unsupported() {
        let mut plugins = LibraryPlugins::unsupported();
        assert_eq!(
            plugins.text_window.read(),
            LibraryCall::Unsupported
        );
        assert_eq!(plugins.math.get_pi(), LibraryCall::Unsupported);
    }
}
