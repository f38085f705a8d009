//! Error propagation tests: static error aggregation, runtime throws,
//! catch semantics, defer/error interaction, and limits.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use toy::{BuiltinRegistry, CollectStringPrint, EvalError, Limits, ModuleRegistry, RuntimeError, Vm};

fn eval(src: &str) -> Result<toy::Value, EvalError> {
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    let mut out = CollectStringPrint::new();
    toy::eval(src, "test.toy", &modules, &builtins, &mut out)
}

fn run_output(src: &str) -> String {
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    let mut out = CollectStringPrint::new();
    toy::eval(src, "test.toy", &modules, &builtins, &mut out)
        .unwrap_or_else(|err| panic!("eval failed: {err}\nscript:\n{src}"));
    out.into_string()
}

fn compile_errors(src: &str) -> toy::ErrorList {
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    toy::compile(src, "test.toy", &modules, &builtins).expect_err("expected compile errors")
}

fn runtime_error(src: &str) -> RuntimeError {
    match eval(src) {
        Err(EvalError::Runtime(err)) => err,
        Err(EvalError::Compile(err)) => panic!("unexpected compile error: {err}"),
        Ok(v) => panic!("expected runtime error, got {v}"),
    }
}

#[test]
fn static_errors_aggregate_across_lines() {
    let errors = compile_errors("one\ntwo\nbreak\n");
    assert_eq!(errors.len(), 3);
    let positions: Vec<u32> = errors.errors().iter().map(|e| e.pos.line).collect();
    assert_eq!(positions, vec![1, 2, 3]);
    assert!(errors.errors()[0].to_string().starts_with("test.toy:1:1:"));
}

#[test]
fn uncaught_throw_reaches_the_embedder() {
    let err = runtime_error("throw \"kaboom\"");
    assert!(err.to_string().contains("kaboom"));
    assert!(err.is_catchable());
}

#[test]
fn division_by_zero_is_catchable() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         try { 1 / 0 } catch (e) { fmt.println(\"caught\", e) }",
    );
    assert_eq!(out, "caught division by zero\n");
}

#[test]
fn thrown_non_errors_are_wrapped() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         try { throw 42 } catch (e) { fmt.println(type_name(e), e) }",
    );
    assert_eq!(out, "error 42\n");
}

#[test]
fn catch_without_binding_discards_the_error() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         try { throw \"x\" } catch { fmt.println(\"recovered\") }",
    );
    assert_eq!(out, "recovered\n");
}

#[test]
fn rethrow_from_catch_propagates() {
    let err = runtime_error(
        "try { throw \"first\" } catch (e) { throw \"second\" }",
    );
    assert!(err.to_string().contains("second"));
}

#[test]
fn nested_try_inner_catches_first() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         try {\n\
             try { throw \"inner\" } catch (e) { fmt.println(\"in:\", e) }\n\
             throw \"outer\"\n\
         } catch (e) { fmt.println(\"out:\", e) }",
    );
    assert_eq!(out, "in: inner\nout: outer\n");
}

#[test]
fn throw_unwinds_across_frames() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         deep := fn() { throw \"from deep\" }\n\
         mid := fn() { deep(); return 1 }\n\
         try { mid() } catch (e) { fmt.println(e) }",
    );
    assert_eq!(out, "from deep\n");
}

#[test]
fn defers_run_during_unwinding() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         f := fn() { defer fmt.println(\"cleanup\"); throw \"bad\" }\n\
         try { f() } catch (e) { fmt.println(\"caught\", e) }",
    );
    assert_eq!(out, "cleanup\ncaught bad\n");
}

#[test]
fn defer_error_replaces_normal_return() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         f := fn() { defer (fn() { throw \"deferred\" })(); return 1 }\n\
         try { f() } catch (e) { fmt.println(e) }",
    );
    assert_eq!(out, "deferred\n");
}

#[test]
fn defer_error_chains_onto_inflight_throw() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         f := fn() { defer (fn() { throw \"outer\" })(); throw \"inner\" }\n\
         try { f() } catch (e) { fmt.println(e.message, \"/\", e.cause.message) }",
    );
    assert_eq!(out, "outer / inner\n");
}

#[test]
fn tuple_unpack_arity_mismatch_throws() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         try { a, b := [1, 2, 3] } catch (e) { fmt.println(e) }",
    );
    assert_eq!(out, "cannot unpack 3 values into 2\n");
}

#[test]
fn wrong_arity_call_throws() {
    let err = runtime_error("f := fn(a, b) => a + b\nf(1)");
    assert!(err.to_string().contains("wrong number of arguments"));
}

#[test]
fn calling_a_non_function_throws() {
    let err = runtime_error("x := 3\nx()");
    assert!(err.to_string().contains("not callable"));
}

#[test]
fn unknown_operator_for_types_throws() {
    let err = runtime_error("\"a\" - \"b\"");
    assert!(err.to_string().contains("unsupported operand types"));
    let err = runtime_error("nil < 1");
    assert!(err.to_string().contains("unsupported operand types"));
}

#[test]
fn stack_overflow_is_catchable() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         f := fn() { return f() }\n\
         try { f() } catch (e) { fmt.println(e) }",
    );
    assert_eq!(out, "stack overflow\n");
}

#[test]
fn uncaught_stack_overflow_is_typed() {
    let err = runtime_error("f := fn() { return f() }\nf()");
    assert!(matches!(err, RuntimeError::StackOverflow));
}

#[test]
fn cancellation_is_not_catchable() {
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    let src = "try { for {} } catch (e) { }";
    let bytecode = toy::compile(src, "test.toy", &modules, &builtins).unwrap();

    let cancel = Arc::new(AtomicBool::new(true));
    let mut out = CollectStringPrint::new();
    let limits = Limits {
        cancel: Some(cancel),
        ..Limits::default()
    };
    let mut vm = Vm::with_limits(&modules, &builtins, &mut out, limits);
    let err = vm.run(&bytecode).unwrap_err();
    assert!(matches!(err, RuntimeError::Canceled));
    assert!(!err.is_catchable());
}

#[test]
fn budget_exhaustion_unwinds_past_try_but_runs_defers() {
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    // The try must not intercept the limit error; the top-level defer still
    // runs while unwinding.
    let src = "fmt := import(\"fmt\")\n\
               defer fmt.println(\"cleanup\")\n\
               try { for {} } catch (e) { fmt.println(\"swallowed\") }";
    let bytecode = toy::compile(src, "test.toy", &modules, &builtins).unwrap();

    let mut out = CollectStringPrint::new();
    let limits = Limits {
        budget: Some(10_000),
        ..Limits::default()
    };
    let mut vm = Vm::with_limits(&modules, &builtins, &mut out, limits);
    let err = vm.run(&bytecode).unwrap_err();
    assert!(matches!(err, RuntimeError::BudgetExhausted));
    assert_eq!(out.output(), "cleanup\n");
}

#[test]
fn builtin_errors_become_throwables() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         try { int(\"not a number\") } catch (e) { fmt.println(\"caught\") }",
    );
    assert_eq!(out, "caught\n");
}

#[test]
fn error_builtin_constructs_error_values() {
    let out = run_output(
        "fmt := import(\"fmt\")\n\
         e := error(\"custom\")\n\
         fmt.println(type_name(e), e.message)",
    );
    assert_eq!(out, "error custom\n");
}
