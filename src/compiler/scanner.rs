//! Scanner
//!
//! Single left-to-right pass over source text producing an ordered token
//! sequence. Trivia (whitespace, comments, unrecognized characters) are
//! tokens too: concatenating every token's text reconstructs the source
//! exactly. The scanner never aborts; lexical problems become diagnostics
//! and scanning continues.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticBag, DiagnosticCode};
use crate::text::{TextPosition, TextRange};

/// The closed set of token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    // Keywords (case-insensitive in source)
    If,
    Then,
    Else,
    ElseIf,
    EndIf,
    For,
    To,
    Step,
    EndFor,
    While,
    EndWhile,
    Sub,
    EndSub,
    And,
    Or,
    // Literals and names
    Identifier,
    NumberLiteral,
    StringLiteral,
    // Operators and punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    Comma,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
    // Trivia
    Whitespace,
    Comment,
    Unrecognized,
}

impl TokenKind {
    /// Trivia is preserved for losslessness but invisible to the parser.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::Unrecognized
        )
    }

    /// Display name used in syntax diagnostics.
    pub fn display_name(&self) -> &'static str {
        match self {
            TokenKind::If => "'If'",
            TokenKind::Then => "'Then'",
            TokenKind::Else => "'Else'",
            TokenKind::ElseIf => "'ElseIf'",
            TokenKind::EndIf => "'EndIf'",
            TokenKind::For => "'For'",
            TokenKind::To => "'To'",
            TokenKind::Step => "'Step'",
            TokenKind::EndFor => "'EndFor'",
            TokenKind::While => "'While'",
            TokenKind::EndWhile => "'EndWhile'",
            TokenKind::Sub => "'Sub'",
            TokenKind::EndSub => "'EndSub'",
            TokenKind::And => "'And'",
            TokenKind::Or => "'Or'",
            TokenKind::Identifier => "an identifier",
            TokenKind::NumberLiteral => "a number",
            TokenKind::StringLiteral => "a string",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftBracket => "'['",
            TokenKind::RightBracket => "']'",
            TokenKind::Dot => "'.'",
            TokenKind::Comma => "','",
            TokenKind::Equal => "'='",
            TokenKind::NotEqual => "'<>'",
            TokenKind::LessThan => "'<'",
            TokenKind::LessThanOrEqual => "'<='",
            TokenKind::GreaterThan => "'>'",
            TokenKind::GreaterThanOrEqual => "'>='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Multiply => "'*'",
            TokenKind::Divide => "'/'",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Comment => "a comment",
            TokenKind::Unrecognized => "an unrecognized character",
        }
    }
}

/// One lexical token: kind, exact source text, and covering range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub range: TextRange,
}

/// Scan source text into tokens, reporting lexical diagnostics.
pub fn scan(source: &str, diagnostics: &mut DiagnosticBag) -> Vec<Token> {
    Scanner::new(source).run(diagnostics)
}

struct Scanner {
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
    /// Position of the most recently consumed character.
    last: TextPosition,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 0,
            column: 0,
            last: TextPosition::default(),
        }
    }

    fn run(mut self, diagnostics: &mut DiagnosticBag) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.peek() {
            let start = TextPosition::new(self.line, self.column);
            let token = match ch {
                c if c.is_whitespace() => self.scan_whitespace(start),
                '\'' => self.scan_comment(start),
                '"' => self.scan_string(start, diagnostics),
                c if c.is_ascii_digit() => self.scan_number(start),
                c if c.is_alphabetic() || c == '_' => self.scan_word(start),
                _ => self.scan_operator(start, diagnostics),
            };
            tokens.push(token);
        }
        tokens
    }

    /* ===================== Token scanners ===================== */

    fn scan_whitespace(&mut self, start: TextPosition) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            text.push(self.advance());
        }
        self.token(TokenKind::Whitespace, text, start)
    }

    fn scan_comment(&mut self, start: TextPosition) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            text.push(self.advance());
        }
        self.token(TokenKind::Comment, text, start)
    }

    fn scan_string(&mut self, start: TextPosition, diagnostics: &mut DiagnosticBag) -> Token {
        let mut text = String::new();
        text.push(self.advance()); // opening quote
        let mut terminated = false;
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            text.push(self.advance());
            if ch == '"' {
                terminated = true;
                break;
            }
        }
        let token = self.token(TokenKind::StringLiteral, text, start);
        if !terminated {
            diagnostics.report(
                DiagnosticCode::UnterminatedStringLiteral,
                token.range,
                vec![],
            );
        }
        token
    }

    fn scan_number(&mut self, start: TextPosition) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            text.push(self.advance());
        }
        // A dot only belongs to the number if a digit follows; otherwise
        // it is member access.
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance());
            while let Some(ch) = self.peek() {
                if !ch.is_ascii_digit() {
                    break;
                }
                text.push(self.advance());
            }
        }
        self.token(TokenKind::NumberLiteral, text, start)
    }

    fn scan_word(&mut self, start: TextPosition) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !ch.is_alphanumeric() && ch != '_' {
                break;
            }
            text.push(self.advance());
        }
        let kind = match text.to_ascii_lowercase().as_str() {
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "elseif" => TokenKind::ElseIf,
            "endif" => TokenKind::EndIf,
            "for" => TokenKind::For,
            "to" => TokenKind::To,
            "step" => TokenKind::Step,
            "endfor" => TokenKind::EndFor,
            "while" => TokenKind::While,
            "endwhile" => TokenKind::EndWhile,
            "sub" => TokenKind::Sub,
            "endsub" => TokenKind::EndSub,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            _ => TokenKind::Identifier,
        };
        self.token(kind, text, start)
    }

    fn scan_operator(&mut self, start: TextPosition, diagnostics: &mut DiagnosticBag) -> Token {
        let first = self.advance();
        let mut text = String::from(first);
        let kind = match first {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '=' => TokenKind::Equal,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Multiply,
            '/' => TokenKind::Divide,
            '<' => match self.peek() {
                Some('=') => {
                    text.push(self.advance());
                    TokenKind::LessThanOrEqual
                }
                Some('>') => {
                    text.push(self.advance());
                    TokenKind::NotEqual
                }
                _ => TokenKind::LessThan,
            },
            '>' => match self.peek() {
                Some('=') => {
                    text.push(self.advance());
                    TokenKind::GreaterThanOrEqual
                }
                _ => TokenKind::GreaterThan,
            },
            other => {
                let token = self.token(TokenKind::Unrecognized, text, start);
                diagnostics.report(
                    DiagnosticCode::UnrecognizedCharacter,
                    token.range,
                    vec![other.to_string()],
                );
                return token;
            }
        };
        self.token(kind, text, start)
    }

    /* ===================== Cursor helpers ===================== */

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.index];
        self.index += 1;
        self.last = TextPosition::new(self.line, self.column);
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        ch
    }

    fn token(&self, kind: TokenKind, text: String, start: TextPosition) -> Token {
        Token {
            kind,
            text,
            range: TextRange::new(start, self.last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::TextPosition;

    fn scan_ok(source: &str) -> Vec<Token> {
        let mut bag = DiagnosticBag::new();
        let tokens = scan(source, &mut bag);
        assert!(bag.is_empty(), "unexpected diagnostics: {bag:?}");
        tokens
    }

    #[test]
    fn tokens_reconstruct_the_source_exactly() {
        let source = "x = 1 + 2 ' add\nTextWindow.WriteLine(\"hi\")\n  $ y";
        let mut bag = DiagnosticBag::new();
        let tokens = scan(source, &mut bag);
        let rebuilt: String = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(rebuilt, source);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let tokens = scan_ok("IF eNdWhIlE sub");
        let kinds: Vec<TokenKind> = tokens
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| t.kind)
            .collect();
        assert_eq!(kinds, vec![TokenKind::If, TokenKind::EndWhile, TokenKind::Sub]);
    }

    #[test]
    fn two_character_operators() {
        let tokens = scan_ok("a <= b <> c >= d");
        let kinds: Vec<TokenKind> = tokens
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::LessThanOrEqual,
                TokenKind::Identifier,
                TokenKind::NotEqual,
                TokenKind::Identifier,
                TokenKind::GreaterThanOrEqual,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn number_dot_member_is_not_a_decimal_point() {
        let tokens = scan_ok("3.14 a.b");
        let kinds: Vec<TokenKind> = tokens
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::NumberLiteral,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
            ]
        );
        assert_eq!(tokens[0].text, "3.14");
    }

    #[test]
    fn unterminated_string_reports_and_still_tokenizes() {
        let mut bag = DiagnosticBag::new();
        let tokens = scan("x = \"name\ny = 2", &mut bag);
        assert_eq!(bag.len(), 1);
        let diagnostic = bag.iter().next().unwrap();
        assert_eq!(diagnostic.code, DiagnosticCode::UnterminatedStringLiteral);
        // Spans the quote through the end of the first line.
        assert_eq!(diagnostic.range.start, TextPosition::new(0, 4));
        assert_eq!(diagnostic.range.end, TextPosition::new(0, 8));

        let string = tokens
            .iter()
            .find(|t| t.kind == TokenKind::StringLiteral)
            .unwrap();
        assert_eq!(string.text, "\"name");
        // Scanning continued on the next line.
        assert!(tokens.iter().any(|t| t.text == "y"));
    }

    #[test]
    fn unrecognized_character_reports_and_is_skipped() {
        let mut bag = DiagnosticBag::new();
        let tokens = scan("$", &mut bag);
        assert_eq!(bag.len(), 1);
        let diagnostic = bag.iter().next().unwrap();
        assert_eq!(diagnostic.code, DiagnosticCode::UnrecognizedCharacter);
        assert_eq!(diagnostic.args, vec!["$".to_string()]);
        assert_eq!(diagnostic.range.start, TextPosition::new(0, 0));
        assert_eq!(diagnostic.range.end, TextPosition::new(0, 0));
        // Preserved as trivia for losslessness, invisible to the parser.
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].kind.is_trivia());
    }

    #[test]
    fn string_token_range_is_inclusive() {
        let tokens = scan_ok("\"ab\"");
        assert_eq!(tokens[0].range.start, TextPosition::new(0, 0));
        assert_eq!(tokens[0].range.end, TextPosition::new(0, 3));
    }
}
