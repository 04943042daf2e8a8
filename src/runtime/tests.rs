//! End-to-end runtime tests: compile real programs and drive the engine
//! through its state machine the way a host would.

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;

use crate::compiler::emitter::CompiledProgram;
use crate::compiler::Compilation;
use crate::libraries::builtin::{BuiltinArray, BuiltinMath};
use crate::libraries::{LibraryCall, LibraryPlugins, ProgramPlugin, TextWindowPlugin};
use crate::runtime::{EngineError, ExecutionEngine, ExecutionState};
use crate::values::BaseValue;

fn compile(source: &str) -> CompiledProgram {
    let compilation = Compilation::compile(source);
    assert!(
        !compilation.has_fatal_diagnostics(),
        "unexpected diagnostics: {:?}",
        compilation.diagnostics
    );
    compilation.emit()
}

/// Console output captured by the test text window.
#[derive(Clone, Default)]
struct Output(Arc<Mutex<Vec<String>>>);

impl Output {
    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct RecordingTextWindow {
    output: Output,
}

impl TextWindowPlugin for RecordingTextWindow {
    fn write(&mut self, value: &BaseValue) -> LibraryCall {
        self.output.0.lock().unwrap().push(value.display());
        LibraryCall::done()
    }

    fn write_line(&mut self, value: &BaseValue) -> LibraryCall {
        self.output.0.lock().unwrap().push(value.display());
        LibraryCall::done()
    }

    fn read(&mut self) -> LibraryCall {
        LibraryCall::BlockForStringInput
    }

    fn read_number(&mut self) -> LibraryCall {
        LibraryCall::BlockForNumberInput
    }

    fn pause(&mut self) -> LibraryCall {
        LibraryCall::BlockForStringInput
    }
}

struct TestProgram;

impl ProgramPlugin for TestProgram {
    fn end(&mut self) -> LibraryCall {
        LibraryCall::EndProgram
    }

    fn pause(&mut self) -> LibraryCall {
        LibraryCall::BlockForStringInput
    }
}

fn test_plugins(output: &Output) -> LibraryPlugins {
    LibraryPlugins {
        text_window: Box::new(RecordingTextWindow {
            output: output.clone(),
        }),
        math: Box::new(BuiltinMath),
        array: Box::new(BuiltinArray),
        program: Box::new(TestProgram),
    }
}

fn engine(source: &str) -> (ExecutionEngine, Output) {
    let output = Output::default();
    let engine = ExecutionEngine::new(compile(source), test_plugins(&output));
    (engine, output)
}

fn number(n: i64) -> BaseValue {
    BaseValue::Number(Decimal::from(n))
}

#[tokio::test]
async fn greeting_program_walks_the_state_machine() {
    let (mut engine, output) = engine(
        "TextWindow.WriteLine(\"What is your name?\")\n\
         name = TextWindow.Read()\n\
         TextWindow.WriteLine(\"Hello \" + name + \"!\")\n",
    );

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::BlockedOnStringInput);
    assert_eq!(output.lines(), vec!["What is your name?".to_string()]);

    engine.supply_input(BaseValue::from_text("Ada")).unwrap();
    assert_eq!(engine.state(), ExecutionState::Running);

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(
        output.lines(),
        vec!["What is your name?".to_string(), "Hello Ada!".to_string()]
    );
    assert_eq!(
        engine.globals().get("name"),
        Some(&BaseValue::String("Ada".to_string()))
    );
}

#[tokio::test]
async fn supply_input_validates_the_required_kind() {
    let (mut engine, _output) = engine("n = TextWindow.ReadNumber()");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::BlockedOnNumberInput);

    let err = engine
        .supply_input(BaseValue::String("twelve".to_string()))
        .unwrap_err();
    assert_eq!(err, EngineError::NumberRequired("twelve".to_string()));
    assert_eq!(engine.state(), ExecutionState::BlockedOnNumberInput);

    engine.supply_input(number(12)).unwrap();
    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(engine.globals().get("n"), Some(&number(12)));
}

#[tokio::test]
async fn supply_input_requires_a_blocked_engine() {
    let (mut engine, _output) = engine("x = 1");
    assert_eq!(
        engine.supply_input(number(1)),
        Err(EngineError::NotAwaitingInput)
    );
}

#[tokio::test]
async fn stepping_pauses_once_per_source_line() {
    let (mut engine, _output) = engine("x = 1\ny = 2\nz = 3");

    engine.execute(true).await;
    assert_eq!(engine.state(), ExecutionState::Paused);
    assert!(engine.globals().contains_key("x"));
    assert!(!engine.globals().contains_key("y"));

    engine.execute(true).await;
    assert_eq!(engine.state(), ExecutionState::Paused);
    assert!(engine.globals().contains_key("y"));
    assert!(!engine.globals().contains_key("z"));

    engine.execute(true).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert!(engine.globals().contains_key("z"));
}

#[tokio::test]
async fn any_engine_honors_the_pause_request() {
    // Pausing is part of the execute contract, not a construction mode.
    let output = Output::default();
    let mut engine = ExecutionEngine::new(compile("x = 1\ny = 2"), test_plugins(&output));

    engine.execute(true).await;
    assert_eq!(engine.state(), ExecutionState::Paused);
    assert!(engine.globals().contains_key("x"));
    assert!(!engine.globals().contains_key("y"));

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
}

#[tokio::test]
async fn snapshot_is_stable_and_does_not_mutate() {
    let (mut engine, _output) = engine("x = 1\ny = x + 2");

    engine.execute(true).await;
    let before = engine.state();
    let first = engine.snapshot();
    let second = engine.snapshot();
    assert_eq!(first, second);
    assert_eq!(engine.state(), before);
    assert_eq!(first.current_line, Some(1));
    assert_eq!(
        first.variables,
        vec![crate::runtime::VariableSnapshot {
            name: "x".to_string(),
            value: "1".to_string(),
        }]
    );
}

#[tokio::test]
async fn subroutine_calls_push_and_pop_frames() {
    let (mut engine, _output) =
        engine("Greet()\nSub Greet\n  x = 1\nEndSub");

    // First step executes the call; the next line is inside the sub.
    engine.execute(true).await;
    assert_eq!(engine.state(), ExecutionState::Paused);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.stack.len(), 2);
    assert_eq!(snapshot.stack[0].module, "<main>");
    assert_eq!(snapshot.stack[1].module, "Greet");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(engine.globals().get("x"), Some(&number(1)));
}

#[tokio::test]
async fn for_loop_accumulates_and_leaves_the_counter_past_the_terminal() {
    let (mut engine, _output) =
        engine("total = 0\nFor i = 1 To 5\n  total = total + i\nEndFor");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    let globals: std::collections::HashMap<String, BaseValue> =
        engine.globals().clone().into_iter().collect();
    assert_eq!(
        globals,
        maplit::hashmap! {
            "total".to_string() => number(15),
            "i".to_string() => number(6),
        }
    );
}

#[tokio::test]
async fn for_loop_with_negative_step_counts_down() {
    let (mut engine, output) =
        engine("For i = 3 To 1 Step -1\n  TextWindow.WriteLine(i)\nEndFor");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(output.lines(), vec!["3", "2", "1"]);
}

#[tokio::test]
async fn while_loop_runs_to_its_condition() {
    let (mut engine, _output) =
        engine("n = 5\nWhile n > 0\n  n = n - 1\nEndWhile");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(engine.globals().get("n"), Some(&number(0)));
}

#[tokio::test]
async fn short_circuit_and_skips_the_right_side() {
    // The right side would block on input if it ever ran.
    let (mut engine, _output) = engine("x = 1 = 2 And TextWindow.Read()");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(engine.globals().get("x"), Some(&BaseValue::Boolean(false)));
}

#[tokio::test]
async fn short_circuit_or_skips_the_right_side() {
    let (mut engine, _output) = engine("x = 1 = 1 Or TextWindow.Read()");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(engine.globals().get("x"), Some(&BaseValue::Boolean(true)));
}

#[tokio::test]
async fn composite_keys_address_multi_dimensional_elements() {
    let (mut engine, _output) = engine("a[1][2] = 7\nx = a[1][2]\ny = a[9]");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(engine.globals().get("x"), Some(&number(7)));
    // Absent elements read as the default value, never a fault.
    assert_eq!(engine.globals().get("y"), Some(&BaseValue::default()));

    let Some(BaseValue::Array(array)) = engine.globals().get("a") else {
        panic!("expected an array");
    };
    assert_eq!(array.get("1\u{1}2"), Some(&number(7)));
}

#[tokio::test]
async fn division_by_zero_yields_zero() {
    let (mut engine, _output) = engine("x = 1 / 0");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(engine.globals().get("x"), Some(&number(0)));
}

#[tokio::test]
async fn program_end_terminates_immediately() {
    let (mut engine, _output) = engine("Program.End()\nx = 1");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert!(engine.globals().is_empty());
}

#[tokio::test]
async fn deprecated_member_still_compiles_and_runs() {
    let compilation = Compilation::compile("Program.Pause()");
    assert!(!compilation.has_fatal_diagnostics());
    assert_eq!(compilation.diagnostics.len(), 1);

    let output = Output::default();
    let mut engine = ExecutionEngine::new(compilation.emit(), test_plugins(&output));
    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::BlockedOnStringInput);

    engine.supply_input(BaseValue::from_text("")).unwrap();
    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
}

#[tokio::test]
async fn unsupported_plugins_yield_the_default_value() {
    let mut engine =
        ExecutionEngine::new(compile("x = Math.Abs(-3)"), LibraryPlugins::unsupported());

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(engine.globals().get("x"), Some(&BaseValue::default()));
}

#[tokio::test]
async fn math_builtins_compute_through_the_plugin_boundary() {
    let (mut engine, _output) = engine(
        "x = Math.Min(3, 9)\n\
         y = Math.Remainder(7, 3)\n\
         p = Math.Pi",
    );

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(engine.globals().get("x"), Some(&number(3)));
    assert_eq!(engine.globals().get("y"), Some(&number(1)));
    let Some(BaseValue::Number(pi)) = engine.globals().get("p") else {
        panic!("expected a number");
    };
    assert!(pi.to_string().starts_with("3.14159"));
}

#[tokio::test]
async fn execute_after_termination_is_a_no_op() {
    let (mut engine, output) = engine("TextWindow.WriteLine(1)");

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(output.lines().len(), 1);
}

#[tokio::test]
async fn if_elseif_else_selects_one_arm() {
    let (mut engine, output) = engine(
        "x = 2\n\
         If x = 1 Then\n\
           TextWindow.WriteLine(\"one\")\n\
         ElseIf x = 2 Then\n\
           TextWindow.WriteLine(\"two\")\n\
         Else\n\
           TextWindow.WriteLine(\"many\")\n\
         EndIf",
    );

    engine.execute(false).await;
    assert_eq!(engine.state(), ExecutionState::Terminated);
    assert_eq!(output.lines(), vec!["two"]);
}
