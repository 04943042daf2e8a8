//! Runtime: the execution engine over emitted instruction modules.

pub mod engine;

pub use engine::{
    DebuggerSnapshot, EngineError, ExecutionEngine, ExecutionState, Frame, FrameSnapshot,
    VariableSnapshot,
};

#[cfg(test)]
mod tests;
