//! Debug/IDE services: a thin read-only layer over compilation output.
//!
//! Nothing here mutates or re-binds; each service compiles the source it
//! is given and reads the resulting tokens, tree, and diagnostics.

pub mod completions;
pub mod hover;

pub use completions::{provide_completion_items, CompletionItem, CompletionItemKind};
pub use hover::provide_hover;
