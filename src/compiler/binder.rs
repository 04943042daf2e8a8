//! Binder
//!
//! Resolves the syntax tree against the static library catalog and the
//! program's own subroutines, producing a bound tree the emitter can
//! lower without re-resolving names. Variables need no declaration: any
//! identifier is an implicitly-declared global, stored under its
//! case-folded name.
//!
//! Subroutine names are collected in a whole-tree pre-pass, so calls may
//! appear before the `Sub` that defines them.

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::compiler::syntax::{Expression, Statement, SyntaxTree};
use crate::diagnostics::{DiagnosticBag, DiagnosticCode};
use crate::libraries::{catalog, LibraryCatalog};
use crate::text::TextRange;

/* ===================== Bound tree ===================== */

#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpression {
    Number {
        value: Decimal,
        range: TextRange,
    },
    /// A string literal, already normalized through the value model.
    Literal {
        value: crate::values::BaseValue,
        range: TextRange,
    },
    Variable {
        /// Case-folded global store key.
        name: String,
        range: TextRange,
    },
    Negation {
        operand: Box<BoundExpression>,
        range: TextRange,
    },
    Binary {
        op: crate::values::BinaryOperator,
        left: Box<BoundExpression>,
        right: Box<BoundExpression>,
        range: TextRange,
    },
    /// An index chain such as `a[i][j]`, collapsed to its root and the
    /// ordered index expressions; the indices form one composite key.
    Index {
        base: Box<BoundExpression>,
        indices: Vec<BoundExpression>,
        range: TextRange,
    },
    /// Read of a library property, canonical names.
    Property {
        library: &'static str,
        property: &'static str,
        range: TextRange,
    },
    /// Call of a library method, canonical names, arity already checked.
    MethodCall {
        library: &'static str,
        method: &'static str,
        arguments: Vec<BoundExpression>,
        range: TextRange,
    },
}

impl BoundExpression {
    pub fn range(&self) -> TextRange {
        match self {
            BoundExpression::Number { range, .. }
            | BoundExpression::Literal { range, .. }
            | BoundExpression::Variable { range, .. }
            | BoundExpression::Negation { range, .. }
            | BoundExpression::Binary { range, .. }
            | BoundExpression::Index { range, .. }
            | BoundExpression::Property { range, .. }
            | BoundExpression::MethodCall { range, .. } => *range,
        }
    }
}

/// Where an assignment writes.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundTarget {
    Variable {
        /// Case-folded global store key.
        name: String,
        range: TextRange,
    },
    /// `a[i][j] = ...`: writes one composite-keyed element of a global.
    Element {
        variable: String,
        indices: Vec<BoundExpression>,
        range: TextRange,
    },
    Property {
        library: &'static str,
        property: &'static str,
        range: TextRange,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundStatement {
    Assignment {
        target: BoundTarget,
        value: BoundExpression,
        range: TextRange,
    },
    /// Statement-level library method call; any result is discarded.
    MethodCall {
        call: BoundExpression,
        range: TextRange,
    },
    SubroutineCall {
        /// Case-folded module key.
        name: String,
        range: TextRange,
    },
    If {
        /// `If` plus each `ElseIf`, in order.
        arms: Vec<(BoundExpression, Vec<BoundStatement>)>,
        else_body: Option<Vec<BoundStatement>>,
        range: TextRange,
    },
    While {
        condition: BoundExpression,
        body: Vec<BoundStatement>,
        range: TextRange,
    },
    For {
        /// Case-folded loop variable.
        variable: String,
        from: BoundExpression,
        to: BoundExpression,
        step: Option<BoundExpression>,
        body: Vec<BoundStatement>,
        range: TextRange,
    },
}

impl BoundStatement {
    pub fn range(&self) -> TextRange {
        match self {
            BoundStatement::Assignment { range, .. }
            | BoundStatement::MethodCall { range, .. }
            | BoundStatement::SubroutineCall { range, .. }
            | BoundStatement::If { range, .. }
            | BoundStatement::While { range, .. }
            | BoundStatement::For { range, .. } => *range,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundSubroutine {
    /// Display name as written at the definition.
    pub name: String,
    pub name_range: TextRange,
    pub body: Vec<BoundStatement>,
    /// The whole definition, `Sub` through `EndSub`.
    pub range: TextRange,
}

/// A fully bound program: the top-level body and its subroutines,
/// keyed by case-folded name in definition order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundProgram {
    pub main: Vec<BoundStatement>,
    pub subroutines: IndexMap<String, BoundSubroutine>,
}

/* ===================== Binding ===================== */

/// Bind a syntax tree, reporting semantic diagnostics.
pub fn bind(tree: &SyntaxTree, diagnostics: &mut DiagnosticBag) -> BoundProgram {
    let mut binder = Binder {
        catalog: catalog(),
        subroutine_names: IndexMap::new(),
        diagnostics,
    };
    binder.collect_subroutine_names(&tree.statements);

    let mut program = BoundProgram::default();
    binder.bind_body(&tree.statements, &mut program.main, &mut program.subroutines);
    program
}

struct Binder<'d> {
    catalog: &'static LibraryCatalog,
    /// Case-folded name -> display name, filled by the pre-pass.
    subroutine_names: IndexMap<String, String>,
    diagnostics: &'d mut DiagnosticBag,
}

impl Binder<'_> {
    fn collect_subroutine_names(&mut self, statements: &[Statement]) {
        for statement in statements {
            match statement {
                Statement::Subroutine { name, body, .. } => {
                    self.subroutine_names
                        .entry(name.to_ascii_lowercase())
                        .or_insert_with(|| name.clone());
                    self.collect_subroutine_names(body);
                }
                Statement::If {
                    then_body,
                    else_ifs,
                    else_body,
                    ..
                } => {
                    self.collect_subroutine_names(then_body);
                    for arm in else_ifs {
                        self.collect_subroutine_names(&arm.body);
                    }
                    if let Some(body) = else_body {
                        self.collect_subroutine_names(body);
                    }
                }
                Statement::While { body, .. } | Statement::For { body, .. } => {
                    self.collect_subroutine_names(body);
                }
                Statement::Assignment { .. } | Statement::ExpressionStatement { .. } => {}
            }
        }
    }

    /// Bind a statement list. Subroutine definitions are hoisted into
    /// `subroutines` and contribute no statement to `into`.
    fn bind_body(
        &mut self,
        statements: &[Statement],
        into: &mut Vec<BoundStatement>,
        subroutines: &mut IndexMap<String, BoundSubroutine>,
    ) {
        for statement in statements {
            match statement {
                Statement::Subroutine {
                    name,
                    name_range,
                    body,
                    range,
                } => {
                    let mut bound_body = Vec::new();
                    self.bind_body(body, &mut bound_body, subroutines);
                    subroutines.insert(
                        name.to_ascii_lowercase(),
                        BoundSubroutine {
                            name: name.clone(),
                            name_range: *name_range,
                            body: bound_body,
                            range: *range,
                        },
                    );
                }
                other => {
                    if let Some(bound) = self.bind_statement(other, subroutines) {
                        into.push(bound);
                    }
                }
            }
        }
    }

    fn bind_statement(
        &mut self,
        statement: &Statement,
        subroutines: &mut IndexMap<String, BoundSubroutine>,
    ) -> Option<BoundStatement> {
        match statement {
            Statement::Assignment {
                target,
                value,
                range,
            } => {
                let value = self.bind_expression(value);
                let target = self.bind_target(target)?;
                Some(BoundStatement::Assignment {
                    target,
                    value,
                    range: *range,
                })
            }
            Statement::ExpressionStatement { expression, range } => {
                self.bind_call_statement(expression, *range)
            }
            Statement::If {
                condition,
                then_body,
                else_ifs,
                else_body,
                range,
            } => {
                let mut arms = Vec::new();
                let head = self.bind_expression(condition);
                let mut head_body = Vec::new();
                self.bind_body(then_body, &mut head_body, subroutines);
                arms.push((head, head_body));
                for arm in else_ifs {
                    let condition = self.bind_expression(&arm.condition);
                    let mut body = Vec::new();
                    self.bind_body(&arm.body, &mut body, subroutines);
                    arms.push((condition, body));
                }
                let else_body = else_body.as_ref().map(|body| {
                    let mut bound = Vec::new();
                    self.bind_body(body, &mut bound, subroutines);
                    bound
                });
                Some(BoundStatement::If {
                    arms,
                    else_body,
                    range: *range,
                })
            }
            Statement::While {
                condition,
                body,
                range,
            } => {
                let condition = self.bind_expression(condition);
                let mut bound_body = Vec::new();
                self.bind_body(body, &mut bound_body, subroutines);
                Some(BoundStatement::While {
                    condition,
                    body: bound_body,
                    range: *range,
                })
            }
            Statement::For {
                variable,
                from,
                to,
                step,
                body,
                range,
                ..
            } => {
                let from = self.bind_expression(from);
                let to = self.bind_expression(to);
                let step = step.as_ref().map(|s| self.bind_expression(s));
                let mut bound_body = Vec::new();
                self.bind_body(body, &mut bound_body, subroutines);
                Some(BoundStatement::For {
                    variable: variable.to_ascii_lowercase(),
                    from,
                    to,
                    step,
                    body: bound_body,
                    range: *range,
                })
            }
            Statement::Subroutine { .. } => None, // handled by bind_body
        }
    }

    /// Only calls may stand alone as statements: a library method call
    /// or a subroutine call.
    fn bind_call_statement(
        &mut self,
        expression: &Expression,
        range: TextRange,
    ) -> Option<BoundStatement> {
        let Expression::Call {
            callee, arguments, ..
        } = expression
        else {
            self.diagnostics.report(
                DiagnosticCode::InvalidExpressionStatement,
                expression.range(),
                vec![],
            );
            return None;
        };
        match callee.as_ref() {
            Expression::MemberAccess {
                base,
                member,
                member_range,
                ..
            } => {
                let call =
                    self.bind_library_call(base, member, *member_range, arguments, range)?;
                Some(BoundStatement::MethodCall { call, range })
            }
            Expression::Identifier { name, range: name_range } => {
                if !arguments.is_empty() {
                    self.diagnostics.report(
                        DiagnosticCode::UnexpectedArgumentCount,
                        range,
                        vec!["0".to_string(), arguments.len().to_string()],
                    );
                }
                let key = name.to_ascii_lowercase();
                if !self.subroutine_names.contains_key(&key) {
                    self.diagnostics.report(
                        DiagnosticCode::UnknownSubroutine,
                        *name_range,
                        vec![name.clone()],
                    );
                    return None;
                }
                Some(BoundStatement::SubroutineCall { name: key, range })
            }
            other => {
                self.diagnostics.report(
                    DiagnosticCode::InvalidExpressionStatement,
                    other.range(),
                    vec![],
                );
                None
            }
        }
    }

    fn bind_target(&mut self, target: &Expression) -> Option<BoundTarget> {
        match target {
            Expression::Identifier { name, range } => Some(BoundTarget::Variable {
                name: name.to_ascii_lowercase(),
                range: *range,
            }),
            Expression::IndexAccess { range, .. } => {
                let (root, indices) = collapse_index_chain(target);
                let Expression::Identifier { name, .. } = root else {
                    self.diagnostics.report(
                        DiagnosticCode::InvalidAssignmentTarget,
                        root.range(),
                        vec![],
                    );
                    return None;
                };
                let indices = indices
                    .into_iter()
                    .map(|index| self.bind_expression(index))
                    .collect();
                Some(BoundTarget::Element {
                    variable: name.to_ascii_lowercase(),
                    indices,
                    range: *range,
                })
            }
            Expression::MemberAccess {
                base,
                member,
                member_range,
                range,
            } => {
                let library = self.resolve_library(base)?;
                let Some(property) = library.property(member) else {
                    self.diagnostics.report(
                        DiagnosticCode::UnknownLibraryMember,
                        *member_range,
                        vec![library.name.to_string(), member.clone()],
                    );
                    return None;
                };
                if !property.writable {
                    self.diagnostics.report(
                        DiagnosticCode::InvalidAssignmentTarget,
                        *member_range,
                        vec![],
                    );
                    return None;
                }
                self.check_deprecation(library.name, property.name, property.deprecation, *member_range);
                Some(BoundTarget::Property {
                    library: library.name,
                    property: property.name,
                    range: *range,
                })
            }
            // Synthesized by parser recovery; already reported there.
            Expression::Missing { .. } => None,
            other => {
                self.diagnostics.report(
                    DiagnosticCode::InvalidAssignmentTarget,
                    other.range(),
                    vec![],
                );
                None
            }
        }
    }

    fn bind_expression(&mut self, expression: &Expression) -> BoundExpression {
        match expression {
            Expression::NumberLiteral { value, range } => BoundExpression::Number {
                value: *value,
                range: *range,
            },
            Expression::StringLiteral { value, range } => BoundExpression::Literal {
                value: crate::values::BaseValue::from_text(value),
                range: *range,
            },
            Expression::Identifier { name, range } => BoundExpression::Variable {
                name: name.to_ascii_lowercase(),
                range: *range,
            },
            Expression::Grouping { inner, .. } => self.bind_expression(inner),
            Expression::Negation { operand, range } => BoundExpression::Negation {
                operand: Box::new(self.bind_expression(operand)),
                range: *range,
            },
            Expression::Binary {
                op,
                left,
                right,
                range,
            } => BoundExpression::Binary {
                op: *op,
                left: Box::new(self.bind_expression(left)),
                right: Box::new(self.bind_expression(right)),
                range: *range,
            },
            Expression::IndexAccess { range, .. } => {
                let (root, indices) = collapse_index_chain(expression);
                let base = Box::new(self.bind_expression(root));
                let indices = indices
                    .into_iter()
                    .map(|index| self.bind_expression(index))
                    .collect();
                BoundExpression::Index {
                    base,
                    indices,
                    range: *range,
                }
            }
            Expression::MemberAccess {
                base,
                member,
                member_range,
                range,
            } => {
                let placeholder = BoundExpression::Literal {
                    value: crate::values::BaseValue::default(),
                    range: *range,
                };
                let Some(library) = self.resolve_library(base) else {
                    return placeholder;
                };
                let Some(property) = library.property(member) else {
                    self.diagnostics.report(
                        DiagnosticCode::UnknownLibraryMember,
                        *member_range,
                        vec![library.name.to_string(), member.clone()],
                    );
                    return placeholder;
                };
                self.check_deprecation(library.name, property.name, property.deprecation, *member_range);
                BoundExpression::Property {
                    library: library.name,
                    property: property.name,
                    range: *range,
                }
            }
            Expression::Call {
                callee,
                arguments,
                range,
            } => {
                let placeholder = BoundExpression::Literal {
                    value: crate::values::BaseValue::default(),
                    range: *range,
                };
                match callee.as_ref() {
                    Expression::MemberAccess {
                        base,
                        member,
                        member_range,
                        ..
                    } => self
                        .bind_library_call(base, member, *member_range, arguments, *range)
                        .unwrap_or(placeholder),
                    Expression::Identifier { name, range: name_range } => {
                        // Subroutines produce no value.
                        self.diagnostics.report(
                            DiagnosticCode::SubroutineCallInExpression,
                            *name_range,
                            vec![name.clone()],
                        );
                        placeholder
                    }
                    other => {
                        self.diagnostics.report(
                            DiagnosticCode::InvalidExpressionStatement,
                            other.range(),
                            vec![],
                        );
                        placeholder
                    }
                }
            }
            Expression::Missing { range } => BoundExpression::Literal {
                value: crate::values::BaseValue::default(),
                range: *range,
            },
        }
    }

    fn bind_library_call(
        &mut self,
        base: &Expression,
        member: &str,
        member_range: TextRange,
        arguments: &[Expression],
        range: TextRange,
    ) -> Option<BoundExpression> {
        let library = self.resolve_library(base)?;
        let Some(method) = library.method(member) else {
            self.diagnostics.report(
                DiagnosticCode::UnknownLibraryMember,
                member_range,
                vec![library.name.to_string(), member.to_string()],
            );
            return None;
        };
        let library_name = library.name;
        let method_name = method.name;
        if arguments.len() != method.parameters.len() {
            self.diagnostics.report(
                DiagnosticCode::UnexpectedArgumentCount,
                range,
                vec![
                    method.parameters.len().to_string(),
                    arguments.len().to_string(),
                ],
            );
        }
        self.check_deprecation(library_name, method_name, method.deprecation, member_range);
        let arguments = arguments
            .iter()
            .map(|argument| self.bind_expression(argument))
            .collect();
        Some(BoundExpression::MethodCall {
            library: library_name,
            method: method_name,
            arguments,
            range,
        })
    }

    /// A member access base must be a bare identifier naming a library.
    fn resolve_library(&mut self, base: &Expression) -> Option<&'static crate::libraries::LibraryMetadata> {
        let Expression::Identifier { name, range } = base else {
            self.diagnostics.report(
                DiagnosticCode::UnknownLibrary,
                base.range(),
                vec!["(expression)".to_string()],
            );
            return None;
        };
        match self.catalog.library(name) {
            Some(library) => Some(library),
            None => {
                self.diagnostics.report(
                    DiagnosticCode::UnknownLibrary,
                    *range,
                    vec![name.clone()],
                );
                None
            }
        }
    }

    fn check_deprecation(
        &mut self,
        library: &str,
        member: &str,
        deprecation: Option<&'static str>,
        range: TextRange,
    ) {
        if let Some(note) = deprecation {
            self.diagnostics.report(
                DiagnosticCode::DeprecatedLibraryMember,
                range,
                vec![library.to_string(), member.to_string(), note.to_string()],
            );
        }
    }
}

/// Flatten `a[i][j]` into its root expression and ordered indices.
fn collapse_index_chain(expression: &Expression) -> (&Expression, Vec<&Expression>) {
    let mut indices = Vec::new();
    let mut current = expression;
    while let Expression::IndexAccess { base, index, .. } = current {
        indices.push(index.as_ref());
        current = base.as_ref();
    }
    indices.reverse();
    (current, indices)
}
