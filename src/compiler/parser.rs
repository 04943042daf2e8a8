//! Parser
//!
//! Recursive-descent over the scanner's token stream. The language is
//! line-oriented: tokens are grouped by source line first, single-line
//! statements parse within their line, and block statements (`If`,
//! `While`, `For`, `Sub`) consume following lines until their matching
//! terminator.
//!
//! Error recovery never stops the parse: a missing token is reported
//! (`UnexpectedEndOfStream` when the line or input ran out,
//! `UnexpectedTokenFound` otherwise) and a placeholder is synthesized so
//! the enclosing statement completes; parsing resumes on the next line.

use crate::compiler::scanner::{Token, TokenKind};
use crate::compiler::syntax::{ElseIfClause, Expression, Statement, SyntaxTree};
use crate::diagnostics::{DiagnosticBag, DiagnosticCode};
use crate::text::TextRange;
use crate::values::BinaryOperator;

/// Parse tokens into a syntax tree, reporting syntax diagnostics.
pub fn parse(tokens: &[Token], diagnostics: &mut DiagnosticBag) -> SyntaxTree {
    let lines = group_lines(tokens);
    Parser {
        lines,
        line_index: 0,
        last_range: TextRange::default(),
        diagnostics,
    }
    .run()
}

/// Group non-trivia tokens by their starting source line.
fn group_lines(tokens: &[Token]) -> Vec<Vec<Token>> {
    let mut lines: Vec<Vec<Token>> = Vec::new();
    let mut current_line = None;
    for token in tokens.iter().filter(|t| !t.kind.is_trivia()) {
        let line = token.range.start.line;
        if current_line != Some(line) {
            lines.push(Vec::new());
            current_line = Some(line);
        }
        if let Some(current) = lines.last_mut() {
            current.push(token.clone());
        }
    }
    lines
}

fn line_range(line: &[Token]) -> TextRange {
    match (line.first(), line.last()) {
        (Some(first), Some(last)) => first.range.union(&last.range),
        _ => TextRange::default(),
    }
}

struct Parser<'d> {
    lines: Vec<Vec<Token>>,
    line_index: usize,
    /// Range of the last consumed line, anchor for end-of-input reports.
    last_range: TextRange,
    diagnostics: &'d mut DiagnosticBag,
}

impl Parser<'_> {
    fn run(mut self) -> SyntaxTree {
        let mut statements = Vec::new();
        while self.line_index < self.lines.len() {
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
        }
        SyntaxTree { statements }
    }

    fn current_first_kind(&self) -> Option<TokenKind> {
        self.lines.get(self.line_index).map(|l| l[0].kind)
    }

    fn take_line(&mut self) -> Vec<Token> {
        let line = self.lines[self.line_index].clone();
        self.line_index += 1;
        self.last_range = line_range(&line);
        line
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.current_first_kind()? {
            TokenKind::If => Some(self.parse_if()),
            TokenKind::While => Some(self.parse_while()),
            TokenKind::For => Some(self.parse_for()),
            TokenKind::Sub => Some(self.parse_subroutine()),
            TokenKind::ElseIf
            | TokenKind::Else
            | TokenKind::EndIf
            | TokenKind::EndWhile
            | TokenKind::EndFor
            | TokenKind::EndSub => {
                // Stray block tail; report it and move on.
                let token = self.lines[self.line_index][0].clone();
                self.diagnostics.report(
                    DiagnosticCode::UnexpectedTokenFound,
                    token.range,
                    vec![
                        "a statement".to_string(),
                        token.kind.display_name().to_string(),
                    ],
                );
                self.take_line();
                None
            }
            _ => Some(self.parse_line_statement()),
        }
    }

    /* ===================== Block statements ===================== */

    fn parse_if(&mut self) -> Statement {
        let head = self.take_line();
        let head_range = line_range(&head);
        let condition = {
            let mut cursor = Cursor::new(&head, self.diagnostics);
            cursor.bump(); // If
            let condition = cursor.parse_expression();
            cursor.expect(TokenKind::Then);
            cursor.finish();
            condition
        };

        let then_body = self.parse_block(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf]);

        let mut else_ifs = Vec::new();
        let mut else_body = None;
        loop {
            match self.current_first_kind() {
                Some(TokenKind::ElseIf) => {
                    let arm_head = self.take_line();
                    let arm_range = line_range(&arm_head);
                    let arm_condition = {
                        let mut cursor = Cursor::new(&arm_head, self.diagnostics);
                        cursor.bump(); // ElseIf
                        let condition = cursor.parse_expression();
                        cursor.expect(TokenKind::Then);
                        cursor.finish();
                        condition
                    };
                    let body =
                        self.parse_block(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf]);
                    let range = match body.last() {
                        Some(last) => arm_range.union(&last.range()),
                        None => arm_range,
                    };
                    else_ifs.push(ElseIfClause {
                        condition: arm_condition,
                        body,
                        range,
                    });
                }
                Some(TokenKind::Else) => {
                    let else_head = self.take_line();
                    let mut cursor = Cursor::new(&else_head, self.diagnostics);
                    cursor.bump(); // Else
                    cursor.finish();
                    else_body = Some(self.parse_block(&[TokenKind::EndIf]));
                    break;
                }
                _ => break,
            }
        }

        let end_range = self.expect_terminator(TokenKind::EndIf);
        Statement::If {
            condition,
            then_body,
            else_ifs,
            else_body,
            range: head_range.union(&end_range),
        }
    }

    fn parse_while(&mut self) -> Statement {
        let head = self.take_line();
        let head_range = line_range(&head);
        let condition = {
            let mut cursor = Cursor::new(&head, self.diagnostics);
            cursor.bump(); // While
            let condition = cursor.parse_expression();
            cursor.finish();
            condition
        };
        let body = self.parse_block(&[TokenKind::EndWhile]);
        let end_range = self.expect_terminator(TokenKind::EndWhile);
        Statement::While {
            condition,
            body,
            range: head_range.union(&end_range),
        }
    }

    fn parse_for(&mut self) -> Statement {
        let head = self.take_line();
        let head_range = line_range(&head);
        let (variable, variable_range, from, to, step) = {
            let mut cursor = Cursor::new(&head, self.diagnostics);
            cursor.bump(); // For
            let (variable, variable_range) = match cursor.expect(TokenKind::Identifier) {
                Some(token) => (token.text, token.range),
                None => (String::new(), cursor.anchor_range()),
            };
            cursor.expect(TokenKind::Equal);
            let from = cursor.parse_expression();
            cursor.expect(TokenKind::To);
            let to = cursor.parse_expression();
            let step = if cursor.peek_kind() == Some(TokenKind::Step) {
                cursor.bump();
                Some(cursor.parse_expression())
            } else {
                None
            };
            cursor.finish();
            (variable, variable_range, from, to, step)
        };
        let body = self.parse_block(&[TokenKind::EndFor]);
        let end_range = self.expect_terminator(TokenKind::EndFor);
        Statement::For {
            variable,
            variable_range,
            from,
            to,
            step,
            body,
            range: head_range.union(&end_range),
        }
    }

    fn parse_subroutine(&mut self) -> Statement {
        let head = self.take_line();
        let head_range = line_range(&head);
        let (name, name_range) = {
            let mut cursor = Cursor::new(&head, self.diagnostics);
            cursor.bump(); // Sub
            let name = match cursor.expect(TokenKind::Identifier) {
                Some(token) => (token.text, token.range),
                None => (String::new(), cursor.anchor_range()),
            };
            cursor.finish();
            name
        };
        let body = self.parse_block(&[TokenKind::EndSub]);
        let end_range = self.expect_terminator(TokenKind::EndSub);
        Statement::Subroutine {
            name,
            name_range,
            body,
            range: head_range.union(&end_range),
        }
    }

    /// Parse statements until a line starting with one of `terminators`
    /// (left unconsumed) or the end of input.
    fn parse_block(&mut self, terminators: &[TokenKind]) -> Vec<Statement> {
        let mut statements = Vec::new();
        while let Some(kind) = self.current_first_kind() {
            if terminators.contains(&kind) {
                break;
            }
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
        }
        statements
    }

    /// Consume the block terminator line, or report that input ended
    /// before it appeared. Returns the range to fold into the statement.
    fn expect_terminator(&mut self, kind: TokenKind) -> TextRange {
        match self.current_first_kind() {
            Some(found) if found == kind => {
                let line = self.take_line();
                if line.len() > 1 {
                    self.diagnostics.report(
                        DiagnosticCode::UnexpectedTokenFound,
                        line[1].range,
                        vec![
                            "a new line".to_string(),
                            line[1].kind.display_name().to_string(),
                        ],
                    );
                }
                line_range(&line)
            }
            _ => {
                // parse_block only stops at the terminator or end of
                // input, so this is the end-of-input case.
                self.diagnostics.report(
                    DiagnosticCode::UnexpectedEndOfStream,
                    single_line_end(self.last_range),
                    vec![kind.display_name().to_string()],
                );
                self.last_range
            }
        }
    }

    /* ===================== Line statements ===================== */

    fn parse_line_statement(&mut self) -> Statement {
        let line = self.take_line();
        let range = line_range(&line);
        let mut cursor = Cursor::new(&line, self.diagnostics);
        let target = cursor.parse_postfix_expression();
        if cursor.peek_kind() == Some(TokenKind::Equal) {
            cursor.bump();
            let value = cursor.parse_expression();
            cursor.finish();
            Statement::Assignment {
                target,
                value,
                range,
            }
        } else {
            cursor.finish();
            Statement::ExpressionStatement {
                expression: target,
                range,
            }
        }
    }
}

/// Collapse a possibly multi-line range to its final line, for
/// single-line diagnostic reporting.
fn single_line_end(range: TextRange) -> TextRange {
    if range.start.line == range.end.line {
        range
    } else {
        TextRange::new(
            crate::text::TextPosition::new(range.end.line, 0),
            range.end,
        )
    }
}

/* ===================== Within-line expression parsing ===================== */

struct Cursor<'a, 'd> {
    tokens: &'a [Token],
    index: usize,
    diagnostics: &'d mut DiagnosticBag,
}

impl<'a, 'd> Cursor<'a, 'd> {
    fn new(tokens: &'a [Token], diagnostics: &'d mut DiagnosticBag) -> Self {
        Self {
            tokens,
            index: 0,
            diagnostics,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.index].clone();
        self.index += 1;
        token
    }

    /// Range to anchor a report on when the expected token is absent:
    /// the offending token, or the line's last token at end of line.
    fn anchor_range(&self) -> TextRange {
        match self.peek() {
            Some(token) => token.range,
            None => self
                .tokens
                .last()
                .map(|token| token.range)
                .unwrap_or_default(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        match self.peek() {
            Some(token) if token.kind == kind => Some(self.bump()),
            Some(token) => {
                self.diagnostics.report(
                    DiagnosticCode::UnexpectedTokenFound,
                    token.range,
                    vec![
                        kind.display_name().to_string(),
                        token.kind.display_name().to_string(),
                    ],
                );
                None
            }
            None => {
                self.diagnostics.report(
                    DiagnosticCode::UnexpectedEndOfStream,
                    self.anchor_range(),
                    vec![kind.display_name().to_string()],
                );
                None
            }
        }
    }

    /// Report any tokens left on the line (once) and discard them.
    fn finish(&mut self) {
        if let Some(token) = self.peek() {
            self.diagnostics.report(
                DiagnosticCode::UnexpectedTokenFound,
                token.range,
                vec![
                    "a new line".to_string(),
                    token.kind.display_name().to_string(),
                ],
            );
        }
        self.index = self.tokens.len();
    }

    /* ----- precedence climbing ----- */

    fn parse_expression(&mut self) -> Expression {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Expression {
        let mut left = self.parse_and();
        while self.peek_kind() == Some(TokenKind::Or) {
            self.bump();
            let right = self.parse_and();
            left = binary(BinaryOperator::Or, left, right);
        }
        left
    }

    fn parse_and(&mut self) -> Expression {
        let mut left = self.parse_comparison();
        while self.peek_kind() == Some(TokenKind::And) {
            self.bump();
            let right = self.parse_comparison();
            left = binary(BinaryOperator::And, left, right);
        }
        left
    }

    fn parse_comparison(&mut self) -> Expression {
        let mut left = self.parse_additive();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Equal) => BinaryOperator::Equal,
                Some(TokenKind::NotEqual) => BinaryOperator::NotEqual,
                Some(TokenKind::LessThan) => BinaryOperator::LessThan,
                Some(TokenKind::LessThanOrEqual) => BinaryOperator::LessThanOrEqual,
                Some(TokenKind::GreaterThan) => BinaryOperator::GreaterThan,
                Some(TokenKind::GreaterThanOrEqual) => BinaryOperator::GreaterThanOrEqual,
                _ => break,
            };
            self.bump();
            let right = self.parse_additive();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_additive(&mut self) -> Expression {
        let mut left = self.parse_multiplicative();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOperator::Add,
                Some(TokenKind::Minus) => BinaryOperator::Subtract,
                _ => break,
            };
            self.bump();
            let right = self.parse_multiplicative();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_multiplicative(&mut self) -> Expression {
        let mut left = self.parse_unary();
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Multiply) => BinaryOperator::Multiply,
                Some(TokenKind::Divide) => BinaryOperator::Divide,
                _ => break,
            };
            self.bump();
            let right = self.parse_unary();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_unary(&mut self) -> Expression {
        if self.peek_kind() == Some(TokenKind::Minus) {
            let minus = self.bump();
            let operand = self.parse_unary();
            let range = minus.range.union(&operand.range());
            return Expression::Negation {
                operand: Box::new(operand),
                range,
            };
        }
        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Expression {
        let mut expr = self.parse_primary();
        loop {
            match self.peek_kind() {
                Some(TokenKind::Dot) => {
                    let dot = self.bump();
                    match self.expect(TokenKind::Identifier) {
                        Some(member) => {
                            let range = expr.range().union(&member.range);
                            expr = Expression::MemberAccess {
                                base: Box::new(expr),
                                member: member.text,
                                member_range: member.range,
                                range,
                            };
                        }
                        None => {
                            return Expression::Missing {
                                range: expr.range().union(&dot.range),
                            };
                        }
                    }
                }
                Some(TokenKind::LeftBracket) => {
                    self.bump();
                    let index = self.parse_expression();
                    let end = match self.expect(TokenKind::RightBracket) {
                        Some(close) => close.range,
                        None => index.range(),
                    };
                    let range = expr.range().union(&end);
                    expr = Expression::IndexAccess {
                        base: Box::new(expr),
                        index: Box::new(index),
                        range,
                    };
                }
                Some(TokenKind::LeftParen) => {
                    self.bump();
                    let mut arguments = Vec::new();
                    if self.peek_kind() != Some(TokenKind::RightParen) && self.peek().is_some() {
                        loop {
                            arguments.push(self.parse_expression());
                            if self.peek_kind() == Some(TokenKind::Comma) {
                                self.bump();
                            } else {
                                break;
                            }
                        }
                    }
                    let end = match self.expect(TokenKind::RightParen) {
                        Some(close) => close.range,
                        None => arguments
                            .last()
                            .map(Expression::range)
                            .unwrap_or_else(|| expr.range()),
                    };
                    let range = expr.range().union(&end);
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        arguments,
                        range,
                    };
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expression {
        let Some(token) = self.peek().cloned() else {
            let range = self.anchor_range();
            self.diagnostics.report(
                DiagnosticCode::UnexpectedEndOfStream,
                range,
                vec!["an expression".to_string()],
            );
            return Expression::Missing { range };
        };
        match token.kind {
            TokenKind::NumberLiteral => {
                self.bump();
                Expression::NumberLiteral {
                    value: token.text.parse().unwrap_or_default(),
                    range: token.range,
                }
            }
            TokenKind::StringLiteral => {
                self.bump();
                Expression::StringLiteral {
                    value: strip_quotes(&token.text),
                    range: token.range,
                }
            }
            TokenKind::Identifier => {
                self.bump();
                Expression::Identifier {
                    name: token.text,
                    range: token.range,
                }
            }
            TokenKind::LeftParen => {
                self.bump();
                let inner = self.parse_expression();
                let end = match self.expect(TokenKind::RightParen) {
                    Some(close) => close.range,
                    None => inner.range(),
                };
                let range = token.range.union(&end);
                Expression::Grouping {
                    inner: Box::new(inner),
                    range,
                }
            }
            _ => {
                self.bump();
                self.diagnostics.report(
                    DiagnosticCode::UnexpectedTokenFound,
                    token.range,
                    vec![
                        "an expression".to_string(),
                        token.kind.display_name().to_string(),
                    ],
                );
                Expression::Missing { range: token.range }
            }
        }
    }
}

fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Expression {
    let range = left.range().union(&right.range());
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        range,
    }
}

fn strip_quotes(text: &str) -> String {
    let body = text.strip_prefix('"').unwrap_or(text);
    body.strip_suffix('"').unwrap_or(body).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::scanner::scan;
    use crate::compiler::syntax::find_node_at;
    use crate::text::TextPosition;

    fn parse_source(source: &str) -> (SyntaxTree, DiagnosticBag) {
        let mut bag = DiagnosticBag::new();
        let tokens = scan(source, &mut bag);
        let tree = parse(&tokens, &mut bag);
        (tree, bag)
    }

    fn parse_clean(source: &str) -> SyntaxTree {
        let (tree, bag) = parse_source(source);
        assert!(bag.is_empty(), "unexpected diagnostics: {bag:?}");
        tree
    }

    #[test]
    fn assignment_and_call_statements() {
        let tree = parse_clean("x = 1 + 2\nTextWindow.WriteLine(x)");
        assert_eq!(tree.statements.len(), 2);
        assert!(matches!(tree.statements[0], Statement::Assignment { .. }));
        assert!(matches!(
            tree.statements[1],
            Statement::ExpressionStatement { .. }
        ));
    }

    #[test]
    fn operator_precedence() {
        let tree = parse_clean("x = 1 + 2 * 3");
        let Statement::Assignment { value, .. } = &tree.statements[0] else {
            panic!("expected assignment");
        };
        let Expression::Binary { op, right, .. } = value else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOperator::Add);
        assert!(matches!(
            **right,
            Expression::Binary {
                op: BinaryOperator::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn if_with_elseif_and_else() {
        let tree = parse_clean(
            "If x = 1 Then\n  y = 1\nElseIf x = 2 Then\n  y = 2\nElse\n  y = 3\nEndIf",
        );
        let Statement::If {
            then_body,
            else_ifs,
            else_body,
            range,
            ..
        } = &tree.statements[0]
        else {
            panic!("expected if");
        };
        assert_eq!(then_body.len(), 1);
        assert_eq!(else_ifs.len(), 1);
        assert_eq!(else_body.as_ref().unwrap().len(), 1);
        // The statement's range spans head through EndIf.
        assert_eq!(range.start.line, 0);
        assert_eq!(range.end.line, 6);
    }

    #[test]
    fn for_with_step() {
        let tree = parse_clean("For i = 10 To 0 Step -2\n  x = i\nEndFor");
        let Statement::For { variable, step, .. } = &tree.statements[0] else {
            panic!("expected for");
        };
        assert_eq!(variable, "i");
        assert!(matches!(step, Some(Expression::Negation { .. })));
    }

    #[test]
    fn missing_endif_reports_end_of_stream_but_returns_a_tree() {
        let (tree, bag) = parse_source("If x Then\n  y = 1\n");
        assert_eq!(tree.statements.len(), 1);
        assert!(matches!(tree.statements[0], Statement::If { .. }));
        assert_eq!(bag.len(), 1);
        let diagnostic = bag.iter().next().unwrap();
        assert_eq!(diagnostic.code, DiagnosticCode::UnexpectedEndOfStream);
        assert_eq!(diagnostic.range.start.line, diagnostic.range.end.line);
    }

    #[test]
    fn missing_operand_synthesizes_a_placeholder() {
        let (tree, bag) = parse_source("x = 1 +");
        assert_eq!(tree.statements.len(), 1);
        let Statement::Assignment { value, .. } = &tree.statements[0] else {
            panic!("expected assignment");
        };
        let Expression::Binary { right, .. } = value else {
            panic!("expected binary expression");
        };
        assert!(matches!(**right, Expression::Missing { .. }));
        assert_eq!(bag.len(), 1);
        assert_eq!(
            bag.iter().next().unwrap().code,
            DiagnosticCode::UnexpectedEndOfStream
        );
    }

    #[test]
    fn parsing_resumes_after_a_malformed_line() {
        let (tree, bag) = parse_source("x = = 1\ny = 2");
        assert!(!bag.is_empty());
        assert_eq!(tree.statements.len(), 2);
        assert!(matches!(tree.statements[1], Statement::Assignment { .. }));
    }

    #[test]
    fn every_parser_diagnostic_stays_on_one_line() {
        let (_, bag) = parse_source("If x Then\nWhile y\nFor i = 1 To\n$");
        assert!(!bag.is_empty());
        for diagnostic in bag.iter() {
            assert_eq!(diagnostic.range.start.line, diagnostic.range.end.line);
        }
    }

    #[test]
    fn find_node_at_returns_the_deepest_match() {
        let tree = parse_clean("x = TextWindow.WriteLine(name)");
        // Position of `name` inside the call's argument list.
        let path = find_node_at(&tree, TextPosition::new(0, 26)).expect("inside tree");
        let deepest = path.last().unwrap();
        match deepest {
            crate::compiler::syntax::SyntaxNodeRef::Expression(Expression::Identifier {
                name,
                ..
            }) => assert_eq!(name, "name"),
            other => panic!("unexpected node {other:?}"),
        }
        // Outside the tree entirely.
        assert!(find_node_at(&tree, TextPosition::new(5, 0)).is_none());
    }

    #[test]
    fn subroutine_bodies_nest_statements() {
        let tree = parse_clean("Sub Greet\n  TextWindow.WriteLine(\"hi\")\nEndSub\nGreet()");
        let Statement::Subroutine { name, body, .. } = &tree.statements[0] else {
            panic!("expected subroutine");
        };
        assert_eq!(name, "Greet");
        assert_eq!(body.len(), 1);
    }
}
