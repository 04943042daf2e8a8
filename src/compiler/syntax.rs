//! Syntax tree
//!
//! Closed statement/expression variants, each carrying the `TextRange`
//! covering its tokens. Nodes are immutable once built. There is no parent
//! pointer: position lookup ([`find_node_at`]) returns the whole
//! root-to-leaf path, which gives callers parent context without mutable
//! back-references.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::text::{TextPosition, TextRange};
use crate::values::BinaryOperator;

/// Expression syntax node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expression {
    NumberLiteral {
        value: Decimal,
        range: TextRange,
    },
    StringLiteral {
        /// Literal text with the surrounding quotes stripped.
        value: String,
        range: TextRange,
    },
    Identifier {
        name: String,
        range: TextRange,
    },
    Grouping {
        inner: Box<Expression>,
        range: TextRange,
    },
    /// Unary minus.
    Negation {
        operand: Box<Expression>,
        range: TextRange,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        range: TextRange,
    },
    MemberAccess {
        base: Box<Expression>,
        member: String,
        member_range: TextRange,
        range: TextRange,
    },
    IndexAccess {
        base: Box<Expression>,
        index: Box<Expression>,
        range: TextRange,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        range: TextRange,
    },
    /// Placeholder synthesized during error recovery.
    Missing {
        range: TextRange,
    },
}

impl Expression {
    pub fn range(&self) -> TextRange {
        match self {
            Expression::NumberLiteral { range, .. }
            | Expression::StringLiteral { range, .. }
            | Expression::Identifier { range, .. }
            | Expression::Grouping { range, .. }
            | Expression::Negation { range, .. }
            | Expression::Binary { range, .. }
            | Expression::MemberAccess { range, .. }
            | Expression::IndexAccess { range, .. }
            | Expression::Call { range, .. }
            | Expression::Missing { range } => *range,
        }
    }
}

/// One `ElseIf` arm of an `If` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElseIfClause {
    pub condition: Expression,
    pub body: Vec<Statement>,
    pub range: TextRange,
}

/// Statement syntax node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Statement {
    Assignment {
        target: Expression,
        value: Expression,
        range: TextRange,
    },
    ExpressionStatement {
        expression: Expression,
        range: TextRange,
    },
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        else_ifs: Vec<ElseIfClause>,
        else_body: Option<Vec<Statement>>,
        range: TextRange,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
        range: TextRange,
    },
    For {
        variable: String,
        variable_range: TextRange,
        from: Expression,
        to: Expression,
        step: Option<Expression>,
        body: Vec<Statement>,
        range: TextRange,
    },
    Subroutine {
        name: String,
        name_range: TextRange,
        body: Vec<Statement>,
        range: TextRange,
    },
}

impl Statement {
    pub fn range(&self) -> TextRange {
        match self {
            Statement::Assignment { range, .. }
            | Statement::ExpressionStatement { range, .. }
            | Statement::If { range, .. }
            | Statement::While { range, .. }
            | Statement::For { range, .. }
            | Statement::Subroutine { range, .. } => *range,
        }
    }
}

/// A parsed program: the ordered top-level statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SyntaxTree {
    pub statements: Vec<Statement>,
}

impl SyntaxTree {
    /// The range covering the whole tree, if it has any statements.
    pub fn range(&self) -> Option<TextRange> {
        let first = self.statements.first()?.range();
        let last = self.statements.last()?.range();
        Some(first.union(&last))
    }
}

/* ===================== Position-addressed lookup ===================== */

/// A borrowed view of any syntax node, statement or expression.
#[derive(Debug, Clone, Copy)]
pub enum SyntaxNodeRef<'a> {
    Statement(&'a Statement),
    Expression(&'a Expression),
}

impl<'a> SyntaxNodeRef<'a> {
    pub fn range(&self) -> TextRange {
        match self {
            SyntaxNodeRef::Statement(s) => s.range(),
            SyntaxNodeRef::Expression(e) => e.range(),
        }
    }

    /// Ordered child nodes, used for drill-down lookup.
    pub fn children(&self) -> Vec<SyntaxNodeRef<'a>> {
        match self {
            SyntaxNodeRef::Statement(statement) => match statement {
                Statement::Assignment { target, value, .. } => {
                    vec![SyntaxNodeRef::Expression(target), SyntaxNodeRef::Expression(value)]
                }
                Statement::ExpressionStatement { expression, .. } => {
                    vec![SyntaxNodeRef::Expression(expression)]
                }
                Statement::If {
                    condition,
                    then_body,
                    else_ifs,
                    else_body,
                    ..
                } => {
                    let mut children = vec![SyntaxNodeRef::Expression(condition)];
                    children.extend(then_body.iter().map(SyntaxNodeRef::Statement));
                    for arm in else_ifs {
                        children.push(SyntaxNodeRef::Expression(&arm.condition));
                        children.extend(arm.body.iter().map(SyntaxNodeRef::Statement));
                    }
                    if let Some(body) = else_body {
                        children.extend(body.iter().map(SyntaxNodeRef::Statement));
                    }
                    children
                }
                Statement::While { condition, body, .. } => {
                    let mut children = vec![SyntaxNodeRef::Expression(condition)];
                    children.extend(body.iter().map(SyntaxNodeRef::Statement));
                    children
                }
                Statement::For {
                    from, to, step, body, ..
                } => {
                    let mut children =
                        vec![SyntaxNodeRef::Expression(from), SyntaxNodeRef::Expression(to)];
                    if let Some(step) = step {
                        children.push(SyntaxNodeRef::Expression(step));
                    }
                    children.extend(body.iter().map(SyntaxNodeRef::Statement));
                    children
                }
                Statement::Subroutine { body, .. } => {
                    body.iter().map(SyntaxNodeRef::Statement).collect()
                }
            },
            SyntaxNodeRef::Expression(expression) => match expression {
                Expression::Grouping { inner, .. } => vec![SyntaxNodeRef::Expression(inner)],
                Expression::Negation { operand, .. } => vec![SyntaxNodeRef::Expression(operand)],
                Expression::Binary { left, right, .. } => {
                    vec![SyntaxNodeRef::Expression(left), SyntaxNodeRef::Expression(right)]
                }
                Expression::MemberAccess { base, .. } => vec![SyntaxNodeRef::Expression(base)],
                Expression::IndexAccess { base, index, .. } => {
                    vec![SyntaxNodeRef::Expression(base), SyntaxNodeRef::Expression(index)]
                }
                Expression::Call {
                    callee, arguments, ..
                } => {
                    let mut children = vec![SyntaxNodeRef::Expression(callee)];
                    children.extend(arguments.iter().map(SyntaxNodeRef::Expression));
                    children
                }
                Expression::NumberLiteral { .. }
                | Expression::StringLiteral { .. }
                | Expression::Identifier { .. }
                | Expression::Missing { .. } => vec![],
            },
        }
    }
}

/// Find the deepest node containing `position`, returning the whole
/// root-to-leaf path (outermost first). Returns `None` when the position
/// lies outside the tree.
pub fn find_node_at(tree: &SyntaxTree, position: TextPosition) -> Option<Vec<SyntaxNodeRef<'_>>> {
    let root = tree
        .statements
        .iter()
        .find(|s| s.range().contains(position))?;

    let mut path = vec![SyntaxNodeRef::Statement(root)];
    loop {
        let current = *path.last().expect("path is never empty");
        match current
            .children()
            .into_iter()
            .find(|child| child.range().contains(position))
        {
            Some(child) => path.push(child),
            None => return Some(path),
        }
    }
}
