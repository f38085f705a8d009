use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use toy::{BuiltinRegistry, ModuleRegistry, StdPrint, SymbolTable, Value, Vm};

fn main() -> ExitCode {
    let mut trace = false;
    let mut file: Option<String> = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--trace" => trace = true,
            "--help" | "-h" => {
                println!("usage: toy [--trace] [script.toy]");
                return ExitCode::SUCCESS;
            }
            _ => file = Some(arg),
        }
    }

    match file {
        Some(path) => run_file(&path, trace),
        None => repl(),
    }
}

fn run_file(path: &str, trace: bool) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    let bytecode = match toy::compile(&source, path, &modules, &builtins) {
        Ok(bytecode) => bytecode,
        Err(errors) => {
            for err in errors.errors() {
                eprintln!("{err}");
            }
            return ExitCode::FAILURE;
        }
    };

    if trace {
        print!("constants:\n{}", bytecode.format_constants());
        print!("instructions:\n{}", bytecode.format_main());
    }

    let mut out = StdPrint;
    let mut vm = Vm::new(&modules, &builtins, &mut out);
    match vm.run(&bytecode) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn repl() -> ExitCode {
    println!("toy repl; ctrl-d to exit");
    let modules = ModuleRegistry::standard();
    let builtins = BuiltinRegistry::standard();
    let mut out = StdPrint;
    let mut vm = Vm::new(&modules, &builtins, &mut out);
    let mut symbols: Option<SymbolTable> = None;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        // Prefer evaluating the line as an expression so its value prints;
        // fall back to statement compilation.
        let wrapped = format!("export {line}");
        let compiled = toy::compile_repl(&wrapped, "<repl>", &modules, &builtins, symbols.clone())
            .or_else(|_| toy::compile_repl(&line, "<repl>", &modules, &builtins, symbols.clone()));
        let (bytecode, new_symbols) = match compiled {
            Ok(result) => result,
            Err(errors) => {
                for err in errors.errors() {
                    eprintln!("{err}");
                }
                continue;
            }
        };
        symbols = Some(new_symbols);

        match vm.run(&bytecode) {
            Ok(Value::Nil) => {}
            Ok(value) => println!("{value}"),
            Err(err) => eprintln!("{err}"),
        }
    }
    ExitCode::SUCCESS
}
