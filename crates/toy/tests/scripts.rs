//! End-to-end script execution tests: compile and run source, assert on
//! printed output or the exported value.

use toy::{BuiltinRegistry, CollectStringPrint, ModuleRegistry, Value};

/// Runs a script and returns everything it printed.
fn run(src: &str) -> String {
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    let mut out = CollectStringPrint::new();
    toy::eval(src, "test.toy", &modules, &builtins, &mut out)
        .unwrap_or_else(|err| panic!("eval failed: {err}\nscript:\n{src}"));
    out.into_string()
}

/// Runs a script and returns its exported value.
fn run_value(src: &str) -> Value {
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    let mut out = CollectStringPrint::new();
    toy::eval(src, "test.toy", &modules, &builtins, &mut out)
        .unwrap_or_else(|err| panic!("eval failed: {err}\nscript:\n{src}"))
}

#[test]
fn arithmetic_precedence() {
    let out = run("fmt := import(\"fmt\")\nfmt.println(1+2*3)");
    assert_eq!(out, "7\n");
}

#[test]
fn swap_via_multi_assignment() {
    let out = run("fmt := import(\"fmt\")\na, b := 1, 2\na, b = b, a\nfmt.println(a, b)");
    assert_eq!(out, "2 1\n");
}

#[test]
fn string_iteration_rebuilds_unicode() {
    let out = run(
        "fmt := import(\"fmt\")\ns := \"\"\nfor c in \"héllo\" { s = s + c }\nfmt.println(s)",
    );
    assert_eq!(out, "héllo\n");
}

#[test]
fn recursive_fibonacci_through_global() {
    let out = run(
        "fmt := import(\"fmt\")\nf := fn(n){ if n<2 { return n }; return f(n-1)+f(n-2) }\nfmt.println(f(10))",
    );
    assert_eq!(out, "55\n");
}

#[test]
fn closure_counter_shares_upvalue_cell() {
    let out = run(
        "fmt := import(\"fmt\")\nc := (fn(){ x:=0; return fn(){ x = x+1; return x } })()\nfmt.println(c(),c(),c())",
    );
    assert_eq!(out, "1 2 3\n");
}

#[test]
fn try_catch_receives_thrown_value() {
    let out = run(
        "fmt := import(\"fmt\")\ntry { throw \"boom\" } catch (e) { fmt.println(\"caught\",e) }",
    );
    assert_eq!(out, "caught boom\n");
}

#[test]
fn tuple_unpack_with_assert() {
    let out = run("fmt := import(\"fmt\")\na := [1,2,3]\na,b,c := [10,20,30]\nfmt.println(a,b,c)");
    assert_eq!(out, "10 20 30\n");
}

#[test]
fn defers_run_in_lifo_order() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         g := fn() { defer fmt.println(\"b\"); defer fmt.println(\"a\"); fmt.println(\"x\") }\n\
         g()",
    );
    assert_eq!(out, "x\na\nb\n");
}

#[test]
fn two_closures_share_one_cell() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         make := fn() {\n\
             x := 0\n\
             inc := fn() { x = x + 1 }\n\
             get := fn() => x\n\
             return [inc, get]\n\
         }\n\
         pair := make()\n\
         inc := pair[0]\n\
         get := pair[1]\n\
         inc(); inc()\n\
         fmt.println(get())",
    );
    assert_eq!(out, "2\n");
}

#[test]
fn local_recursion_through_promoted_cell() {
    let v = run_value(
        "outer := fn() {\n\
             f := fn(n) { if n == 0 { return 0 }; return f(n-1) + 1 }\n\
             return f(5)\n\
         }\n\
         export outer()",
    );
    assert!(v.equals(&Value::Int(5)));
}

#[test]
fn defer_captures_arguments_at_defer_time() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         g := fn() { x := 1; defer fmt.println(x); x = 2; fmt.println(x) }\n\
         g()",
    );
    assert_eq!(out, "2\n1\n");
}

#[test]
fn variadic_functions_pack_rest_into_tuple() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         f := fn(first, ...rest) { return len(rest) }\n\
         fmt.println(f(1), f(1, 2, 3), f(1, 2))",
    );
    assert_eq!(out, "0 2 1\n");
}

#[test]
fn splat_expands_into_call_arguments() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         f := fn(a, b, c) => a + b + c\n\
         args := [1, 2, 3]\n\
         fmt.println(f(...args))\n\
         fmt.println(f(1, ...[2, 3]))",
    );
    assert_eq!(out, "6\n6\n");
}

#[test]
fn splat_expands_into_array_literals() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         inner := [2, 3]\n\
         a := [1, ...inner, 4]\n\
         fmt.println(len(a), a[1], a[3])",
    );
    assert_eq!(out, "4 2 4\n");
}

#[test]
fn c_style_loop_with_continue() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         sum := 0\n\
         for i := 0; i < 10; i++ {\n\
             if i % 2 == 0 { continue }\n\
             sum += i\n\
         }\n\
         fmt.println(sum)",
    );
    assert_eq!(out, "25\n");
}

#[test]
fn labeled_break_leaves_outer_loop() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         count := 0\n\
         outer: for i in range(10) {\n\
             for j in range(10) {\n\
                 count++\n\
                 if i + j == 3 { break outer }\n\
             }\n\
         }\n\
         fmt.println(count)",
    );
    assert_eq!(out, "4\n");
}

#[test]
fn table_iteration_preserves_insertion_order() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         t := {b: 1, a: 2, c: 3}\n\
         for k, v in t { fmt.println(k, v) }",
    );
    assert_eq!(out, "b 1\na 2\nc 3\n");
}

#[test]
fn compound_index_assignment_evaluates_target_once() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         calls := 0\n\
         idx := fn() { calls += 1; return 0 }\n\
         a := [10]\n\
         a[idx()] += 1\n\
         fmt.println(calls, a[0])",
    );
    assert_eq!(out, "1 11\n");
}

#[test]
fn selector_access_and_assignment() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         t := {count: 1}\n\
         t.count += 2\n\
         t.name = \"toy\"\n\
         fmt.println(t.count, t.name)",
    );
    assert_eq!(out, "3 toy\n");
}

#[test]
fn string_interpolation_forms() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         name := \"world\"\n\
         fmt.println(\"hi {name}!\")\n\
         fmt.println(\"sum={1 + 2}\")\n\
         fmt.println(`raw {name}`)",
    );
    assert_eq!(out, "hi world!\nsum=3\nraw world\n");
}

#[test]
fn nullish_operators() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         x := nil\n\
         y := x ?? 5\n\
         z := false ?? 7\n\
         w := nil\n\
         w ??= 9\n\
         fmt.println(y, z, w)",
    );
    assert_eq!(out, "5 false 9\n");
}

#[test]
fn ternary_and_arrow_functions() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         sign := fn(n) => n < 0 ? -1 : n > 0 ? 1 : 0\n\
         fmt.println(sign(-9), sign(0), sign(3))",
    );
    assert_eq!(out, "-1 0 1\n");
}

#[test]
fn short_circuit_skips_side_effects() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         hits := 0\n\
         bump := fn() { hits += 1; return true }\n\
         _ := false && bump()\n\
         _ = true || bump()\n\
         fmt.println(hits)",
    );
    assert_eq!(out, "0\n");
}

#[test]
fn slices_on_arrays_and_strings() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         a := [1, 2, 3, 4]\n\
         fmt.println(len(a[1:3]), a[1:3][0])\n\
         fmt.println(\"héllo\"[1:3])",
    );
    assert_eq!(out, "2 2\nél\n");
}

#[test]
fn freeze_rejects_mutation_with_typed_error() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         a := freeze([1, 2])\n\
         try { a[0] = 9 } catch (e) { fmt.println(\"frozen:\", is_frozen(a)) }\n\
         fmt.println(a[0])",
    );
    assert_eq!(out, "frozen: true\n1\n");
}

#[test]
fn range_builtin_iterates() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         total := 0\n\
         for v in range(1, 6) { total += v }\n\
         fmt.println(total, len(\"abc\"))",
    );
    assert_eq!(out, "15 3\n");
}

#[test]
fn conversions_and_type_names() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         fmt.println(int(\"42\") + 1, float(2) / 4.0, string(7) + \"!\", char(104))\n\
         fmt.println(type_name(nil), type_name([1]), type_name({a: 1}))",
    );
    assert_eq!(out, "43 0.5 7! h\nnil array table\n");
}

#[test]
fn export_yields_unit_result() {
    assert!(run_value("export 1 + 2 * 3").equals(&Value::Int(7)));
    assert!(run_value("x := 10\nexport x * x").equals(&Value::Int(100)));
    // No export: the unit yields nil.
    assert!(run_value("x := 1").is_nil());
}

#[test]
fn multi_value_return_unpacks() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         divmod := fn(a, b) { return a / b, a % b }\n\
         q, r := divmod(17, 5)\n\
         fmt.println(q, r)",
    );
    assert_eq!(out, "3 2\n");
}

#[test]
fn module_import_is_cached_per_vm() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         again := import(\"fmt\")\n\
         fmt.println(fmt == again)",
    );
    assert_eq!(out, "true\n");
}

#[test]
fn fmt_format_substitutes_placeholders() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         fmt.println(fmt.format(\"{} + {} = {}\", 1, 2, 3))",
    );
    assert_eq!(out, "1 + 2 = 3\n");
}

#[test]
fn indented_string_strips_common_indent() {
    let out = run("fmt := import(\"fmt\")\nfmt.print(''\n  one\n  two\n'')");
    assert_eq!(out, "one\ntwo\n");
}

#[test]
fn copy_is_structural() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         a := [[1]]\n\
         b := copy(a)\n\
         a[0][0] = 9\n\
         fmt.println(b[0][0])",
    );
    assert_eq!(out, "1\n");
}

#[test]
fn wrapping_integer_arithmetic() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         max := 9223372036854775807\n\
         fmt.println(max + 1 < 0)",
    );
    assert_eq!(out, "true\n");
}

#[test]
fn table_reads_missing_keys_as_nil() {
    let out = run(
        "fmt := import(\"fmt\")\n\
         t := {a: 1}\n\
         fmt.println(t[\"missing\"] ?? \"default\")",
    );
    assert_eq!(out, "default\n");
}
