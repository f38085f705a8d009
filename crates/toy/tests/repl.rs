//! Incremental (REPL-style) compilation: successive snippets share the
//! global symbol table and the VM's globals.

use toy::{BuiltinRegistry, CollectStringPrint, ModuleRegistry, SymbolTable, Value, Vm};

#[test]
fn globals_persist_across_snippets() {
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    let mut out = CollectStringPrint::new();
    let mut vm = Vm::new(&modules, &builtins, &mut out);
    let mut symbols: Option<SymbolTable> = None;

    let mut run = |src: &str, symbols: &mut Option<SymbolTable>, vm: &mut Vm<'_>| -> Value {
        let (bytecode, new_symbols) =
            toy::compile_repl(src, "<repl>", &modules, &builtins, symbols.clone())
                .unwrap_or_else(|e| panic!("compile failed for {src:?}: {e}"));
        *symbols = Some(new_symbols);
        vm.run(&bytecode).unwrap_or_else(|e| panic!("run failed for {src:?}: {e}"))
    };

    run("x := 40", &mut symbols, &mut vm);
    run("bump := fn(n) => n + 2", &mut symbols, &mut vm);
    let result = run("export bump(x)", &mut symbols, &mut vm);
    assert!(result.equals(&Value::Int(42)));
}

#[test]
fn failed_snippet_leaves_state_usable() {
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    let mut out = CollectStringPrint::new();
    let mut vm = Vm::new(&modules, &builtins, &mut out);

    let (bytecode, symbols) =
        toy::compile_repl("v := 7", "<repl>", &modules, &builtins, None).unwrap();
    vm.run(&bytecode).unwrap();

    // A bad snippet consumes only its own clone of the symbol table.
    assert!(toy::compile_repl("w := missing", "<repl>", &modules, &builtins, Some(symbols.clone())).is_err());

    let (bytecode, _) =
        toy::compile_repl("export v", "<repl>", &modules, &builtins, Some(symbols)).unwrap();
    let result = vm.run(&bytecode).unwrap();
    assert!(result.equals(&Value::Int(7)));
}

#[test]
fn snippet_output_accumulates() {
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    let mut out = CollectStringPrint::new();
    {
        let mut vm = Vm::new(&modules, &builtins, &mut out);
        let (first, symbols) =
            toy::compile_repl("fmt := import(\"fmt\")\nfmt.println(\"one\")", "<repl>", &modules, &builtins, None)
                .unwrap();
        vm.run(&first).unwrap();
        let (second, _) =
            toy::compile_repl("fmt.println(\"two\")", "<repl>", &modules, &builtins, Some(symbols)).unwrap();
        vm.run(&second).unwrap();
    }
    assert_eq!(out.output(), "one\ntwo\n");
}
