//! Emitter (lowering)
//!
//! Lowers a bound program into linear instruction modules: one for the
//! top-level script and one per subroutine. Structured control flow
//! becomes absolute-index jumps within the owning module; `And`/`Or`
//! short-circuit via conditional jumps instead of always evaluating both
//! sides.
//!
//! Every instruction keeps the `TextRange` of the syntax it came from.
//! That mapping drives single-line stepping and runtime attribution, so
//! it is not optional metadata.
//!
//! Emission is total: any program that bound with zero fatal diagnostics
//! lowers without error.

use std::sync::Arc;

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::compiler::binder::{
    BoundExpression, BoundProgram, BoundStatement, BoundTarget,
};
use crate::text::TextRange;
use crate::values::{BaseValue, BinaryOperator};

/* ===================== Instruction set ===================== */

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    /// Push a constant onto the value stack.
    PushLiteral(BaseValue),
    /// Push a global's current value (default if never written).
    LoadVariable(String),
    /// Pop a value into a global.
    StoreVariable(String),
    /// Pop `index_count` indices, then the base value; push the element
    /// stored under their composite key (default if absent).
    LoadIndex { index_count: usize },
    /// Pop `index_count` indices, then the value; write it into the
    /// named global under the composite key.
    StoreElement {
        variable: String,
        index_count: usize,
    },
    /// Pop one value, push its arithmetic negation.
    Negate,
    /// Pop right then left, push the operator result.
    Binary(BinaryOperator),
    /// Discard the top of the value stack.
    Pop,
    Jump(usize),
    /// Pop a value; jump when it coerces to false.
    JumpIfFalse(usize),
    /// Pop a value; jump when it coerces to true.
    JumpIfTrue(usize),
    /// Pop loop value, step, terminal; push whether the loop continues
    /// (value has not passed the terminal in the step's direction).
    ForCondition,
    /// Push a frame for the named subroutine module.
    Call(String),
    /// Invoke a library method through the plugin boundary with
    /// `argument_count` popped arguments; pushes the result value unless
    /// the call blocks or terminates.
    LibraryMethod {
        library: &'static str,
        method: &'static str,
        argument_count: usize,
    },
    /// Read a library property through the plugin boundary.
    LoadProperty {
        library: &'static str,
        property: &'static str,
    },
    /// Pop a value and write a library property.
    StoreProperty {
        library: &'static str,
        property: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub range: TextRange,
}

/// One linear instruction stream, for the script body or a subroutine.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeModule {
    pub name: String,
    pub instructions: Vec<Instruction>,
    /// Source line reported when a frame has run past the last
    /// instruction.
    pub end_line: u32,
}

/// The emitted program: the main module plus subroutine modules keyed
/// by case-folded name.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub main: Arc<RuntimeModule>,
    pub subroutines: IndexMap<String, Arc<RuntimeModule>>,
}

/* ===================== Lowering ===================== */

/// Lower a bound program into its module set.
pub fn emit(program: &BoundProgram) -> CompiledProgram {
    // The script module ends where the source does, subroutine
    // definitions included.
    let script_end = program
        .main
        .iter()
        .map(|statement| statement.range().end.line)
        .chain(
            program
                .subroutines
                .values()
                .map(|subroutine| subroutine.range.end.line),
        )
        .max()
        .unwrap_or(0);
    let main = Arc::new(emit_module("<main>".to_string(), &program.main, script_end));
    let subroutines = program
        .subroutines
        .iter()
        .map(|(key, subroutine)| {
            (
                key.clone(),
                Arc::new(emit_module(
                    subroutine.name.clone(),
                    &subroutine.body,
                    // A frame past its last instruction reports the
                    // `EndSub` line.
                    subroutine.range.end.line,
                )),
            )
        })
        .collect();
    CompiledProgram { main, subroutines }
}

fn emit_module(name: String, body: &[BoundStatement], end_line: u32) -> RuntimeModule {
    let mut emitter = Emitter {
        instructions: Vec::new(),
    };
    for statement in body {
        emitter.emit_statement(statement);
    }
    RuntimeModule {
        name,
        instructions: emitter.instructions,
        end_line,
    }
}

struct Emitter {
    instructions: Vec<Instruction>,
}

impl Emitter {
    fn push(&mut self, kind: InstructionKind, range: TextRange) {
        self.instructions.push(Instruction { kind, range });
    }

    fn next_index(&self) -> usize {
        self.instructions.len()
    }

    /// Emit a jump whose target is patched later.
    fn push_placeholder(&mut self, kind: InstructionKind, range: TextRange) -> usize {
        let index = self.next_index();
        self.push(kind, range);
        index
    }

    fn patch(&mut self, at: usize, target: usize) {
        match &mut self.instructions[at].kind {
            InstructionKind::Jump(t)
            | InstructionKind::JumpIfFalse(t)
            | InstructionKind::JumpIfTrue(t) => *t = target,
            other => unreachable!("patched a non-jump instruction: {other:?}"),
        }
    }

    fn emit_statement(&mut self, statement: &BoundStatement) {
        match statement {
            BoundStatement::Assignment { target, value, .. } => {
                self.emit_expression(value);
                match target {
                    BoundTarget::Variable { name, range } => {
                        self.push(InstructionKind::StoreVariable(name.clone()), *range);
                    }
                    BoundTarget::Element {
                        variable,
                        indices,
                        range,
                    } => {
                        for index in indices {
                            self.emit_expression(index);
                        }
                        self.push(
                            InstructionKind::StoreElement {
                                variable: variable.clone(),
                                index_count: indices.len(),
                            },
                            *range,
                        );
                    }
                    BoundTarget::Property {
                        library,
                        property,
                        range,
                    } => {
                        self.push(
                            InstructionKind::StoreProperty {
                                library: *library,
                                property: *property,
                            },
                            *range,
                        );
                    }
                }
            }
            BoundStatement::MethodCall { call, range } => {
                self.emit_expression(call);
                // Statement position discards the result.
                self.push(InstructionKind::Pop, *range);
            }
            BoundStatement::SubroutineCall { name, range } => {
                self.push(InstructionKind::Call(name.clone()), *range);
            }
            BoundStatement::If {
                arms, else_body, ..
            } => self.emit_if(arms, else_body.as_deref()),
            BoundStatement::While {
                condition, body, ..
            } => {
                let head = self.next_index();
                self.emit_expression(condition);
                let exit =
                    self.push_placeholder(InstructionKind::JumpIfFalse(0), condition.range());
                for statement in body {
                    self.emit_statement(statement);
                }
                self.push(InstructionKind::Jump(head), condition.range());
                let end = self.next_index();
                self.patch(exit, end);
            }
            BoundStatement::For {
                variable,
                from,
                to,
                step,
                body,
                ..
            } => self.emit_for(variable, from, to, step.as_ref(), body),
        }
    }

    fn emit_if(
        &mut self,
        arms: &[(BoundExpression, Vec<BoundStatement>)],
        else_body: Option<&[BoundStatement]>,
    ) {
        let mut exits = Vec::new();
        for (condition, body) in arms {
            self.emit_expression(condition);
            let skip = self.push_placeholder(InstructionKind::JumpIfFalse(0), condition.range());
            for statement in body {
                self.emit_statement(statement);
            }
            exits.push(self.push_placeholder(InstructionKind::Jump(0), condition.range()));
            let next_arm = self.next_index();
            self.patch(skip, next_arm);
        }
        if let Some(body) = else_body {
            for statement in body {
                self.emit_statement(statement);
            }
        }
        let end = self.next_index();
        for exit in exits {
            self.patch(exit, end);
        }
    }

    /// `For v = from To to [Step s]`
    ///
    /// The terminal and step are re-evaluated every iteration, and the
    /// continue test direction follows the step's sign.
    fn emit_for(
        &mut self,
        variable: &str,
        from: &BoundExpression,
        to: &BoundExpression,
        step: Option<&BoundExpression>,
        body: &[BoundStatement],
    ) {
        let head_range = from.range().union(&to.range());
        self.emit_expression(from);
        self.push(InstructionKind::StoreVariable(variable.to_string()), from.range());

        let head = self.next_index();
        self.emit_expression(to);
        self.emit_step(step, head_range);
        self.push(
            InstructionKind::LoadVariable(variable.to_string()),
            head_range,
        );
        self.push(InstructionKind::ForCondition, head_range);
        let exit = self.push_placeholder(InstructionKind::JumpIfFalse(0), head_range);

        for statement in body {
            self.emit_statement(statement);
        }

        self.push(
            InstructionKind::LoadVariable(variable.to_string()),
            head_range,
        );
        self.emit_step(step, head_range);
        self.push(InstructionKind::Binary(BinaryOperator::Add), head_range);
        self.push(
            InstructionKind::StoreVariable(variable.to_string()),
            head_range,
        );
        self.push(InstructionKind::Jump(head), head_range);

        let end = self.next_index();
        self.patch(exit, end);
    }

    fn emit_step(&mut self, step: Option<&BoundExpression>, range: TextRange) {
        match step {
            Some(step) => self.emit_expression(step),
            None => self.push(
                InstructionKind::PushLiteral(BaseValue::Number(Decimal::ONE)),
                range,
            ),
        }
    }

    fn emit_expression(&mut self, expression: &BoundExpression) {
        match expression {
            BoundExpression::Number { value, range } => {
                self.push(
                    InstructionKind::PushLiteral(BaseValue::Number(*value)),
                    *range,
                );
            }
            BoundExpression::Literal { value, range } => {
                self.push(InstructionKind::PushLiteral(value.clone()), *range);
            }
            BoundExpression::Variable { name, range } => {
                self.push(InstructionKind::LoadVariable(name.clone()), *range);
            }
            BoundExpression::Negation { operand, range } => {
                self.emit_expression(operand);
                self.push(InstructionKind::Negate, *range);
            }
            BoundExpression::Binary {
                op: op @ (BinaryOperator::And | BinaryOperator::Or),
                left,
                right,
                range,
            } => self.emit_short_circuit(*op, left, right, *range),
            BoundExpression::Binary {
                op,
                left,
                right,
                range,
            } => {
                self.emit_expression(left);
                self.emit_expression(right);
                self.push(InstructionKind::Binary(*op), *range);
            }
            BoundExpression::Index {
                base,
                indices,
                range,
            } => {
                self.emit_expression(base);
                for index in indices {
                    self.emit_expression(index);
                }
                self.push(
                    InstructionKind::LoadIndex {
                        index_count: indices.len(),
                    },
                    *range,
                );
            }
            BoundExpression::Property {
                library,
                property,
                range,
            } => {
                self.push(
                    InstructionKind::LoadProperty {
                        library: *library,
                        property: *property,
                    },
                    *range,
                );
            }
            BoundExpression::MethodCall {
                library,
                method,
                arguments,
                range,
            } => {
                for argument in arguments {
                    self.emit_expression(argument);
                }
                self.push(
                    InstructionKind::LibraryMethod {
                        library: *library,
                        method: *method,
                        argument_count: arguments.len(),
                    },
                    *range,
                );
            }
        }
    }

    /// `And`/`Or` evaluate their right side only when the left side has
    /// not already decided the result; both lower to a Boolean push.
    fn emit_short_circuit(
        &mut self,
        op: BinaryOperator,
        left: &BoundExpression,
        right: &BoundExpression,
        range: TextRange,
    ) {
        let (decide, decided): (fn(usize) -> InstructionKind, bool) = match op {
            BinaryOperator::And => (InstructionKind::JumpIfFalse, false),
            _ => (InstructionKind::JumpIfTrue, true),
        };
        self.emit_expression(left);
        let first = self.push_placeholder(decide(0), range);
        self.emit_expression(right);
        let second = self.push_placeholder(decide(0), range);
        self.push(
            InstructionKind::PushLiteral(BaseValue::Boolean(!decided)),
            range,
        );
        let done = self.push_placeholder(InstructionKind::Jump(0), range);
        let short = self.next_index();
        self.patch(first, short);
        self.patch(second, short);
        self.push(
            InstructionKind::PushLiteral(BaseValue::Boolean(decided)),
            range,
        );
        let end = self.next_index();
        self.patch(done, end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::binder::bind;
    use crate::compiler::parser::parse;
    use crate::compiler::scanner::scan;
    use crate::diagnostics::DiagnosticBag;

    fn emit_source(source: &str) -> CompiledProgram {
        let mut bag = DiagnosticBag::new();
        let tokens = scan(source, &mut bag);
        let tree = parse(&tokens, &mut bag);
        let program = bind(&tree, &mut bag);
        assert!(!bag.has_fatal(), "unexpected diagnostics: {bag:?}");
        emit(&program)
    }

    fn kinds(module: &RuntimeModule) -> Vec<&InstructionKind> {
        module.instructions.iter().map(|i| &i.kind).collect()
    }

    #[test]
    fn assignment_lowers_to_push_store() {
        let program = emit_source("x = 1");
        assert_eq!(
            kinds(&program.main),
            vec![
                &InstructionKind::PushLiteral(BaseValue::Number(Decimal::ONE)),
                &InstructionKind::StoreVariable("x".to_string()),
            ]
        );
    }

    #[test]
    fn module_end_lines_come_from_the_defining_text() {
        let program = emit_source("Greet()\nSub Greet\n  x = 1\nEndSub");
        // A drained subroutine frame reports the `EndSub` line, not the
        // last body statement's line.
        let greet = &program.subroutines["greet"];
        assert_eq!(greet.end_line, 3);
        // The script module ends where the source does.
        assert_eq!(program.main.end_line, 3);
    }

    #[test]
    fn statement_calls_discard_their_result() {
        let program = emit_source("TextWindow.WriteLine(\"hi\")");
        let last = program.main.instructions.last().unwrap();
        assert_eq!(last.kind, InstructionKind::Pop);
    }

    #[test]
    fn while_jumps_form_a_loop() {
        let program = emit_source("While x\n  x = 2\nEndWhile");
        let instructions = kinds(&program.main);
        // load x, exit jump, push 2, store x, back jump
        assert_eq!(instructions.len(), 5);
        assert_eq!(instructions[1], &InstructionKind::JumpIfFalse(5));
        assert_eq!(instructions[4], &InstructionKind::Jump(0));
    }

    #[test]
    fn if_arms_jump_to_a_common_end() {
        let program = emit_source("If x Then\n  y = 1\nElse\n  y = 2\nEndIf");
        let instructions = &program.main.instructions;
        let end = instructions.len();
        let mut saw_exit = false;
        for instruction in instructions {
            if let InstructionKind::Jump(target) = instruction.kind {
                assert_eq!(target, end);
                saw_exit = true;
            }
        }
        assert!(saw_exit);
    }

    #[test]
    fn and_short_circuits_past_the_right_side() {
        let program = emit_source("x = a And b");
        let instructions = kinds(&program.main);
        // load a, jump-if-false, load b, jump-if-false, push true,
        // jump end, push false, store
        assert_eq!(instructions[1], &InstructionKind::JumpIfFalse(6));
        assert_eq!(
            instructions[4],
            &InstructionKind::PushLiteral(BaseValue::Boolean(true))
        );
        assert_eq!(
            instructions[6],
            &InstructionKind::PushLiteral(BaseValue::Boolean(false))
        );
    }

    #[test]
    fn for_reevaluates_terminal_and_step_each_iteration() {
        let program = emit_source("For i = 1 To n\n  x = i\nEndFor");
        let instructions = kinds(&program.main);
        let condition_count = instructions
            .iter()
            .filter(|k| **k == &InstructionKind::ForCondition)
            .count();
        assert_eq!(condition_count, 1);
        // The terminal load sits inside the loop, after the initial store.
        assert_eq!(
            instructions[2],
            &InstructionKind::LoadVariable("n".to_string())
        );
        // The loop closes by jumping back to the terminal evaluation.
        let last = instructions.last().unwrap();
        assert_eq!(**last, InstructionKind::Jump(2));
    }

    #[test]
    fn subroutines_become_their_own_modules() {
        let program = emit_source("Greet()\nSub Greet\n  x = 1\nEndSub");
        assert_eq!(
            kinds(&program.main),
            vec![&InstructionKind::Call("greet".to_string())]
        );
        let greet = &program.subroutines["greet"];
        assert_eq!(greet.name, "Greet");
        assert_eq!(greet.instructions.len(), 2);
    }

    #[test]
    fn every_instruction_keeps_a_source_range() {
        let program = emit_source("If x Then\n  TextWindow.WriteLine(1)\nEndIf");
        for instruction in &program.main.instructions {
            // Ranges stay inside the two source lines they lower from.
            assert!(instruction.range.end.line <= 1);
        }
    }
}
