//! Completions
//!
//! Token-driven: after `Library.` (with or without a partial member
//! typed) the library's members are offered; anywhere else, library
//! names and statement keywords.

use serde::{Deserialize, Serialize};

use crate::compiler::scanner::{Token, TokenKind};
use crate::compiler::Compilation;
use crate::libraries::{catalog, LibraryMetadata};

/// Statement keywords offered outside member position.
const KEYWORDS: &[&str] = &[
    "If", "Then", "Else", "ElseIf", "EndIf", "While", "EndWhile", "For", "To", "Step", "EndFor",
    "Sub", "EndSub", "And", "Or",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionItemKind {
    Library,
    Method,
    Property,
    Event,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub label: String,
    pub description: String,
    pub kind: CompletionItemKind,
}

/// Completion items applicable at the cursor.
pub fn provide_completion_items(source: &str, line: u32, column: u32) -> Vec<CompletionItem> {
    let compilation = Compilation::compile(source);

    // Tokens on the cursor's line that begin before the cursor.
    let line_tokens: Vec<&Token> = compilation
        .tokens
        .iter()
        .filter(|token| !token.kind.is_trivia())
        .filter(|token| {
            token.range.start.line == line && token.range.start.column < column
        })
        .collect();

    if let Some(library_name) = member_base(&line_tokens) {
        if let Some(library) = catalog().library(library_name) {
            return member_items(library);
        }
        return Vec::new();
    }

    let mut items: Vec<CompletionItem> = catalog()
        .libraries()
        .map(|library| CompletionItem {
            label: library.name.to_string(),
            description: library.description.to_string(),
            kind: CompletionItemKind::Library,
        })
        .collect();
    items.extend(KEYWORDS.iter().map(|keyword| CompletionItem {
        label: keyword.to_string(),
        description: String::new(),
        kind: CompletionItemKind::Keyword,
    }));
    items
}

/// The library identifier when the cursor sits after `Library.` or
/// inside a partial member name following it.
fn member_base<'a>(line_tokens: &[&'a Token]) -> Option<&'a str> {
    match line_tokens {
        [.., base, dot]
            if base.kind == TokenKind::Identifier && dot.kind == TokenKind::Dot =>
        {
            Some(base.text.as_str())
        }
        [.., base, dot, partial]
            if base.kind == TokenKind::Identifier
                && dot.kind == TokenKind::Dot
                && partial.kind == TokenKind::Identifier =>
        {
            Some(base.text.as_str())
        }
        _ => None,
    }
}

fn member_items(library: &LibraryMetadata) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = library
        .methods
        .values()
        .map(|method| CompletionItem {
            label: method.name.to_string(),
            description: method.description.to_string(),
            kind: CompletionItemKind::Method,
        })
        .collect();
    items.extend(library.properties.values().map(|property| CompletionItem {
        label: property.name.to_string(),
        description: property.description.to_string(),
        kind: CompletionItemKind::Property,
    }));
    items.extend(library.events.values().map(|event| CompletionItem {
        label: event.name.to_string(),
        description: event.description.to_string(),
        kind: CompletionItemKind::Event,
    }));
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|item| item.label.as_str()).collect()
    }

    #[test]
    fn after_a_library_dot_lists_its_members() {
        let items = provide_completion_items("TextWindow.", 0, 11);
        let labels = labels(&items);
        assert!(labels.contains(&"WriteLine"));
        assert!(labels.contains(&"Title"));
        assert!(!labels.contains(&"Math"));
    }

    #[test]
    fn a_partial_member_still_lists_the_library_members() {
        let items = provide_completion_items("x = Math.Fl", 0, 11);
        let labels = labels(&items);
        assert!(labels.contains(&"Floor"));
        assert!(labels.contains(&"Pi"));
    }

    #[test]
    fn elsewhere_lists_libraries_and_keywords() {
        let items = provide_completion_items("x = 1", 0, 0);
        let labels = labels(&items);
        assert!(labels.contains(&"TextWindow"));
        assert!(labels.contains(&"While"));
    }

    #[test]
    fn an_unknown_library_offers_nothing() {
        let items = provide_completion_items("Turtle.", 0, 7);
        assert!(items.is_empty());
    }
}
