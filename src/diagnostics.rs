//! Compilation diagnostics
//!
//! Every problem found while scanning, parsing, or binding becomes a
//! [`Diagnostic`] in one ordered [`DiagnosticBag`] per compilation. Nothing
//! in the compiler returns a Rust error for malformed input; pipelines
//! always finish and hand back whatever they could build plus diagnostics.
//!
//! Diagnostic ranges are always confined to a single source line so hosts
//! can render them as a message plus a one-line caret span.

use serde::{Deserialize, Serialize};

use crate::text::TextRange;

/// The closed set of diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Lexical
    UnterminatedStringLiteral,
    UnrecognizedCharacter,
    // Syntax
    UnexpectedTokenFound,
    UnexpectedEndOfStream,
    // Semantic
    UnknownLibrary,
    UnknownLibraryMember,
    UnexpectedArgumentCount,
    UnknownSubroutine,
    SubroutineCallInExpression,
    InvalidExpressionStatement,
    InvalidAssignmentTarget,
    /// Advisory only; the single non-fatal code.
    DeprecatedLibraryMember,
}

impl DiagnosticCode {
    /// Message template with `{0}`, `{1}`, ... positional argument slots.
    fn template(&self) -> &'static str {
        match self {
            DiagnosticCode::UnterminatedStringLiteral => {
                "This string is missing its closing quote."
            }
            DiagnosticCode::UnrecognizedCharacter => {
                "The character '{0}' is not recognized."
            }
            DiagnosticCode::UnexpectedTokenFound => {
                "Expected {0} here, but found {1}."
            }
            DiagnosticCode::UnexpectedEndOfStream => {
                "Expected {0} here, but the line ended."
            }
            DiagnosticCode::UnknownLibrary => {
                "'{0}' is not a known library."
            }
            DiagnosticCode::UnknownLibraryMember => {
                "The library '{0}' has no member named '{1}'."
            }
            DiagnosticCode::UnexpectedArgumentCount => {
                "This call expects {0} argument(s), but got {1}."
            }
            DiagnosticCode::UnknownSubroutine => {
                "The subroutine '{0}' is not defined."
            }
            DiagnosticCode::SubroutineCallInExpression => {
                "The subroutine '{0}' does not return a value and cannot be used here."
            }
            DiagnosticCode::InvalidExpressionStatement => {
                "Only calls can stand alone as statements."
            }
            DiagnosticCode::InvalidAssignmentTarget => {
                "Only variables, array elements, and library properties can be assigned to."
            }
            DiagnosticCode::DeprecatedLibraryMember => {
                "'{0}.{1}' is deprecated. {2}"
            }
        }
    }
}

/// One diagnostic: code, single-line range, and positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub range: TextRange,
    pub args: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, range: TextRange, args: Vec<String>) -> Self {
        debug_assert_eq!(
            range.start.line, range.end.line,
            "diagnostic ranges must stay on one line"
        );
        Self { code, range, args }
    }

    /// Whether this diagnostic blocks execution.
    pub fn is_fatal(&self) -> bool {
        self.code != DiagnosticCode::DeprecatedLibraryMember
    }

    /// Render the message with positional arguments substituted.
    pub fn message(&self) -> String {
        let mut text = self.code.template().to_string();
        for (i, arg) in self.args.iter().enumerate() {
            text = text.replace(&format!("{{{i}}}"), arg);
        }
        text
    }
}

/// Ordered accumulator for all diagnostics of one compilation.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, code: DiagnosticCode, range: TextRange, args: Vec<String>) {
        self.diagnostics.push(Diagnostic::new(code, range, args));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Whether any diagnostic blocks execution.
    pub fn has_fatal(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{TextPosition, TextRange};

    fn at(line: u32, start: u32, end: u32) -> TextRange {
        TextRange::new(TextPosition::new(line, start), TextPosition::new(line, end))
    }

    #[test]
    fn message_substitutes_positional_args() {
        let d = Diagnostic::new(
            DiagnosticCode::UnknownLibraryMember,
            at(0, 0, 5),
            vec!["TextWindow".into(), "Shout".into()],
        );
        assert_eq!(
            d.message(),
            "The library 'TextWindow' has no member named 'Shout'."
        );
    }

    #[test]
    fn only_the_deprecation_code_is_advisory() {
        let fatal = Diagnostic::new(DiagnosticCode::UnknownLibrary, at(0, 0, 1), vec!["X".into()]);
        let advisory = Diagnostic::new(
            DiagnosticCode::DeprecatedLibraryMember,
            at(0, 0, 1),
            vec!["Program".into(), "Pause".into(), "Use TextWindow.Pause instead.".into()],
        );
        assert!(fatal.is_fatal());
        assert!(!advisory.is_fatal());

        let mut bag = DiagnosticBag::new();
        bag.report(
            DiagnosticCode::DeprecatedLibraryMember,
            at(0, 0, 1),
            vec!["Program".into(), "Pause".into(), String::new()],
        );
        assert!(!bag.has_fatal());
        bag.report(DiagnosticCode::UnknownLibrary, at(0, 0, 1), vec!["X".into()]);
        assert!(bag.has_fatal());
    }
}
