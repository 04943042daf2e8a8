//! Execution engine
//!
//! A frame-stack interpreter over emitted instruction modules. One engine
//! owns one run: its frame stack, expression value stack, and global
//! store are never shared across runs, and the instruction loop is
//! single-threaded and non-reentrant. The engine suspends only between
//! instructions, at the defined paused/blocked states, so no instruction
//! ever needs partial-effect rollback.
//!
//! The same instruction stream serves free runs and single-line stepping:
//! `execute(true)` pauses before the first instruction whose source line
//! differs from the last executed one.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{trace, warn};

use crate::compiler::emitter::{CompiledProgram, InstructionKind, RuntimeModule};
use crate::libraries::{LibraryCall, LibraryPlugins};
use crate::values::{composite_key, BaseValue};

/// Instructions executed between cooperative yields in a free run.
const YIELD_BATCH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    Running,
    Paused,
    BlockedOnNumberInput,
    BlockedOnStringInput,
    Terminated,
}

/// One call-stack entry. `index == instructions.len()` means the frame
/// has fallen through its last instruction and is ready to pop.
#[derive(Debug, Clone)]
pub struct Frame {
    pub module: Arc<RuntimeModule>,
    pub index: usize,
}

impl Frame {
    fn new(module: Arc<RuntimeModule>) -> Frame {
        Frame { module, index: 0 }
    }

    /// Source line of the current instruction, or the module's end line
    /// once the frame has run past its last instruction.
    pub fn current_line(&self) -> u32 {
        match self.module.instructions.get(self.index) {
            Some(instruction) => instruction.range.start.line,
            None => self.module.end_line,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("the engine is not waiting for input")]
    NotAwaitingInput,
    #[error("a number is required here, but '{0}' is not one")]
    NumberRequired(String),
}

/* ===================== Snapshot ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub module: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    pub name: String,
    pub value: String,
}

/// An owned projection of the engine for debugger display. Building one
/// never mutates the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebuggerSnapshot {
    /// Current source line of the top frame, if any frame remains.
    pub current_line: Option<u32>,
    /// Call stack, outermost first.
    pub stack: Vec<FrameSnapshot>,
    /// Global store as display strings, in insertion order.
    pub variables: Vec<VariableSnapshot>,
}

/* ===================== Engine ===================== */

pub struct ExecutionEngine {
    program: CompiledProgram,
    plugins: LibraryPlugins,
    frames: Vec<Frame>,
    values: Vec<BaseValue>,
    globals: IndexMap<String, BaseValue>,
    state: ExecutionState,
}

impl ExecutionEngine {
    pub fn new(program: CompiledProgram, plugins: LibraryPlugins) -> Self {
        let frames = vec![Frame::new(program.main.clone())];
        ExecutionEngine {
            program,
            plugins,
            frames,
            values: Vec::new(),
            globals: IndexMap::new(),
            state: ExecutionState::Running,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn globals(&self) -> &IndexMap<String, BaseValue> {
        &self.globals
    }

    /// Run instructions until the program blocks, terminates, or (when
    /// stepping) the next source line begins. A call on a blocked or
    /// terminated engine is a no-op; the host must `supply_input` first.
    pub async fn execute(&mut self, pause_at_next_statement: bool) {
        match self.state {
            ExecutionState::Terminated
            | ExecutionState::BlockedOnNumberInput
            | ExecutionState::BlockedOnStringInput => return,
            ExecutionState::Running | ExecutionState::Paused => {}
        }
        self.state = ExecutionState::Running;

        // Line comparison is per call: one `execute(true)` applies one
        // source line's instructions, however the previous call ended.
        let mut last_line = None;
        let mut executed = 0usize;
        loop {
            // Pop frames that fell through their last instruction.
            while let Some(frame) = self.frames.last() {
                if frame.index >= frame.module.instructions.len() {
                    self.frames.pop();
                } else {
                    break;
                }
            }
            let Some(frame) = self.frames.last() else {
                self.state = ExecutionState::Terminated;
                debug_assert!(
                    self.values.is_empty(),
                    "value stack must drain by termination"
                );
                return;
            };

            let line = frame.current_line();
            if pause_at_next_statement && last_line.is_some_and(|last| last != line) {
                self.state = ExecutionState::Paused;
                return;
            }

            self.step();
            last_line = Some(line);
            if self.state != ExecutionState::Running {
                return;
            }

            executed += 1;
            if executed % YIELD_BATCH == 0 {
                // Cooperative yield between instructions only.
                tokio::task::yield_now().await;
            }
        }
    }

    /// Execute the top frame's current instruction.
    fn step(&mut self) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        let instruction = frame.module.instructions[frame.index].clone();
        trace!(module = %frame.module.name, index = frame.index, ?instruction.kind, "step");

        match instruction.kind {
            InstructionKind::PushLiteral(value) => {
                self.values.push(value);
                self.advance();
            }
            InstructionKind::LoadVariable(name) => {
                let value = self.globals.get(&name).cloned().unwrap_or_default();
                self.values.push(value);
                self.advance();
            }
            InstructionKind::StoreVariable(name) => {
                let value = self.pop();
                self.globals.insert(name, value);
                self.advance();
            }
            InstructionKind::LoadIndex { index_count } => {
                let indices = self.pop_many(index_count);
                let base = self.pop();
                let key = composite_key(&indices);
                let value = base
                    .into_array()
                    .get(&key)
                    .cloned()
                    .unwrap_or_default();
                self.values.push(value);
                self.advance();
            }
            InstructionKind::StoreElement {
                variable,
                index_count,
            } => {
                let indices = self.pop_many(index_count);
                let value = self.pop();
                let key = composite_key(&indices);
                let mut array = self
                    .globals
                    .get(&variable)
                    .cloned()
                    .unwrap_or_default()
                    .into_array();
                array.insert(key, value);
                self.globals.insert(variable, BaseValue::Array(array));
                self.advance();
            }
            InstructionKind::Negate => {
                let value = self.pop();
                self.values.push(value.negate());
                self.advance();
            }
            InstructionKind::Binary(op) => {
                let right = self.pop();
                let left = self.pop();
                self.values.push(BaseValue::binary(op, &left, &right));
                self.advance();
            }
            InstructionKind::Pop => {
                self.pop();
                self.advance();
            }
            InstructionKind::Jump(target) => self.jump(target),
            InstructionKind::JumpIfFalse(target) => {
                if self.pop().to_boolean() {
                    self.advance();
                } else {
                    self.jump(target);
                }
            }
            InstructionKind::JumpIfTrue(target) => {
                if self.pop().to_boolean() {
                    self.jump(target);
                } else {
                    self.advance();
                }
            }
            InstructionKind::ForCondition => {
                let value = self.pop().to_number();
                let step = self.pop().to_number();
                let terminal = self.pop().to_number();
                let proceed = if step.is_sign_negative() {
                    value >= terminal
                } else {
                    value <= terminal
                };
                self.values.push(BaseValue::Boolean(proceed));
                self.advance();
            }
            InstructionKind::Call(name) => {
                // The return continuation is the advanced caller index.
                self.advance();
                if let Some(module) = self.program.subroutines.get(&name) {
                    self.frames.push(Frame::new(module.clone()));
                }
            }
            InstructionKind::LibraryMethod {
                library,
                method,
                argument_count,
            } => {
                let arguments = self.pop_many(argument_count);
                let outcome = self.call_method(library, method, &arguments);
                self.apply_library_outcome(outcome, library, method);
            }
            InstructionKind::LoadProperty { library, property } => {
                let outcome = self.read_property(library, property);
                self.apply_library_outcome(outcome, library, property);
            }
            InstructionKind::StoreProperty { library, property } => {
                let value = self.pop();
                if self.write_property(library, property, &value) == LibraryCall::Unsupported {
                    warn!(library, property, "host does not implement this property");
                }
                self.advance();
            }
        }
    }

    /// Handle the result of a plugin call: push values and advance, or
    /// move the state machine. Blocking outcomes leave the instruction
    /// un-advanced; `supply_input` pushes the value and advances.
    fn apply_library_outcome(&mut self, outcome: LibraryCall, library: &str, member: &str) {
        match outcome {
            LibraryCall::Value(value) => {
                self.values.push(value);
                self.advance();
            }
            LibraryCall::BlockForStringInput => {
                self.state = ExecutionState::BlockedOnStringInput;
            }
            LibraryCall::BlockForNumberInput => {
                self.state = ExecutionState::BlockedOnNumberInput;
            }
            LibraryCall::EndProgram => {
                self.frames.clear();
                self.values.clear();
                self.state = ExecutionState::Terminated;
            }
            LibraryCall::Unsupported => {
                warn!(library, member, "host does not implement this member");
                self.values.push(BaseValue::default());
                self.advance();
            }
        }
    }

    /// Leave a blocked state by delivering the value the blocking call
    /// asked for. The kind must match; a mismatch is an error, never a
    /// coercion.
    pub fn supply_input(&mut self, value: BaseValue) -> Result<(), EngineError> {
        match self.state {
            ExecutionState::BlockedOnStringInput => {}
            ExecutionState::BlockedOnNumberInput => {
                if !matches!(value, BaseValue::Number(_)) {
                    return Err(EngineError::NumberRequired(value.display()));
                }
            }
            _ => return Err(EngineError::NotAwaitingInput),
        }
        self.values.push(value);
        self.advance();
        self.state = ExecutionState::Running;
        Ok(())
    }

    /// Build an owned snapshot. Callable in any state; never mutates.
    pub fn snapshot(&self) -> DebuggerSnapshot {
        DebuggerSnapshot {
            current_line: self.frames.last().map(Frame::current_line),
            stack: self
                .frames
                .iter()
                .map(|frame| FrameSnapshot {
                    module: frame.module.name.clone(),
                    line: frame.current_line(),
                })
                .collect(),
            variables: self
                .globals
                .iter()
                .map(|(name, value)| VariableSnapshot {
                    name: name.clone(),
                    value: value.display(),
                })
                .collect(),
        }
    }

    /* ----- plumbing ----- */

    fn advance(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.index += 1;
        }
    }

    fn jump(&mut self, target: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.index = target;
        }
    }

    fn pop(&mut self) -> BaseValue {
        // The emitter balances pushes and pops; an empty stack would be
        // an emitter defect, not a user error.
        self.values.pop().unwrap_or_default()
    }

    fn pop_many(&mut self, count: usize) -> Vec<BaseValue> {
        let keep = self.values.len().saturating_sub(count);
        self.values.split_off(keep)
    }

    fn call_method(&mut self, library: &str, method: &str, args: &[BaseValue]) -> LibraryCall {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        match (library, method) {
            ("TextWindow", "Write") => self.plugins.text_window.write(&arg(0)),
            ("TextWindow", "WriteLine") => self.plugins.text_window.write_line(&arg(0)),
            ("TextWindow", "Read") => self.plugins.text_window.read(),
            ("TextWindow", "ReadNumber") => self.plugins.text_window.read_number(),
            ("TextWindow", "Clear") => self.plugins.text_window.clear(),
            ("TextWindow", "Pause") => self.plugins.text_window.pause(),
            ("Math", "Abs") => self.plugins.math.abs(&arg(0)),
            ("Math", "Ceiling") => self.plugins.math.ceiling(&arg(0)),
            ("Math", "Floor") => self.plugins.math.floor(&arg(0)),
            ("Math", "Round") => self.plugins.math.round(&arg(0)),
            ("Math", "Min") => self.plugins.math.min(&arg(0), &arg(1)),
            ("Math", "Max") => self.plugins.math.max(&arg(0), &arg(1)),
            ("Math", "Remainder") => self.plugins.math.remainder(&arg(0), &arg(1)),
            ("Array", "GetItemCount") => self.plugins.array.get_item_count(&arg(0)),
            ("Array", "IsArray") => self.plugins.array.is_array(&arg(0)),
            ("Array", "ContainsValue") => self.plugins.array.contains_value(&arg(0), &arg(1)),
            ("Array", "ContainsIndex") => self.plugins.array.contains_index(&arg(0), &arg(1)),
            ("Program", "End") => self.plugins.program.end(),
            ("Program", "Pause") => self.plugins.program.pause(),
            _ => LibraryCall::Unsupported,
        }
    }

    fn read_property(&mut self, library: &str, property: &str) -> LibraryCall {
        match (library, property) {
            ("TextWindow", "Title") => self.plugins.text_window.get_title(),
            ("TextWindow", "ForegroundColor") => self.plugins.text_window.get_foreground_color(),
            ("Math", "Pi") => self.plugins.math.get_pi(),
            _ => LibraryCall::Unsupported,
        }
    }

    fn write_property(&mut self, library: &str, property: &str, value: &BaseValue) -> LibraryCall {
        match (library, property) {
            ("TextWindow", "Title") => self.plugins.text_window.set_title(value),
            ("TextWindow", "ForegroundColor") => {
                self.plugins.text_window.set_foreground_color(value)
            }
            _ => LibraryCall::Unsupported,
        }
    }
}
