pub mod cli;
pub mod compiler;
pub mod diagnostics;
pub mod libraries;
pub mod runtime;
pub mod services;
pub mod text;
pub mod values;

// Re-export the surface a host touches most.
pub use compiler::Compilation;
pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCode};
pub use runtime::{DebuggerSnapshot, ExecutionEngine, ExecutionState};
pub use services::{provide_completion_items, provide_hover};
pub use values::BaseValue;
