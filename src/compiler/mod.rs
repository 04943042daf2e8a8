//! Compiler pipeline
//!
//! `scan -> parse -> bind` runs on every edit and always completes,
//! accumulating diagnostics instead of failing. Lowering to instruction
//! modules ([`emitter`]) is a separate step a host runs only when it
//! intends to execute.

pub mod binder;
pub mod emitter;
pub mod parser;
pub mod scanner;
pub mod syntax;

use tracing::debug;

use crate::diagnostics::DiagnosticBag;

/// The result of compiling one source text, with every intermediate
/// representation the debug/IDE services read.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub source: String,
    pub tokens: Vec<scanner::Token>,
    pub tree: syntax::SyntaxTree,
    pub program: binder::BoundProgram,
    pub diagnostics: DiagnosticBag,
}

impl Compilation {
    /// Run the front-end pipeline. Never fails; malformed input comes
    /// back as diagnostics on the compilation.
    pub fn compile(source: &str) -> Compilation {
        let mut diagnostics = DiagnosticBag::new();
        let tokens = scanner::scan(source, &mut diagnostics);
        let tree = parser::parse(&tokens, &mut diagnostics);
        let program = binder::bind(&tree, &mut diagnostics);
        debug!(
            tokens = tokens.len(),
            statements = tree.statements.len(),
            diagnostics = diagnostics.len(),
            "compiled source"
        );
        Compilation {
            source: source.to_string(),
            tokens,
            tree,
            program,
            diagnostics,
        }
    }

    /// Whether any diagnostic blocks execution.
    pub fn has_fatal_diagnostics(&self) -> bool {
        self.diagnostics.has_fatal()
    }

    /// Lower to instruction modules. Hosts must refuse to run a
    /// compilation with fatal diagnostics; lowering itself is total.
    pub fn emit(&self) -> emitter::CompiledProgram {
        emitter::emit(&self.program)
    }
}
