//! Hover
//!
//! Diagnostics win over symbol information: a squiggle under the cursor
//! explains itself before anything else does.

use crate::compiler::syntax::{find_node_at, Expression, SyntaxNodeRef};
use crate::compiler::Compilation;
use crate::libraries::catalog;
use crate::text::TextPosition;

/// Hover text for a position, deepest relevant node first. Empty when
/// there is nothing to say.
pub fn provide_hover(source: &str, line: u32, column: u32) -> Vec<String> {
    let compilation = Compilation::compile(source);
    let position = TextPosition::new(line, column);

    let diagnostic_messages: Vec<String> = compilation
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.range.contains(position))
        .map(|diagnostic| diagnostic.message())
        .collect();
    if !diagnostic_messages.is_empty() {
        return diagnostic_messages;
    }

    let Some(path) = find_node_at(&compilation.tree, position) else {
        return Vec::new();
    };
    // Walk leaf-to-root so the innermost member access wins.
    for node in path.iter().rev() {
        let SyntaxNodeRef::Expression(Expression::MemberAccess {
            base,
            member,
            member_range,
            ..
        }) = node
        else {
            continue;
        };
        let Expression::Identifier {
            name,
            range: base_range,
        } = base.as_ref()
        else {
            continue;
        };
        let Some(library) = catalog().library(name) else {
            continue;
        };
        if base_range.contains(position) {
            return vec![format!("{}: {}", library.name, library.description)];
        }
        if member_range.contains(position) {
            if let Some(method) = library.method(member) {
                return vec![format!(
                    "{}.{}: {}",
                    library.name, method.name, method.description
                )];
            }
            if let Some(property) = library.property(member) {
                return vec![format!(
                    "{}.{}: {}",
                    library.name, property.name, property.description
                )];
            }
            if let Some(event) = library.event(member) {
                return vec![format!(
                    "{}.{}: {}",
                    library.name, event.name, event.description
                )];
            }
        }
    }
    Vec::new()
}
