#![doc = include_str!("../../../README.md")]
mod ast;
mod builtins;
mod bytecode;
mod compiler;
mod error;
mod io;
mod iterator;
mod modules;
mod ops;
mod parser;
mod position;
mod scanner;
mod symbol;
mod token;
mod value;
mod vm;

pub use crate::{
    builtins::BuiltinRegistry,
    bytecode::code::Bytecode,
    bytecode::op::{format_instructions, Opcode},
    compiler::Compiler,
    error::{CompileError, ErrorList, RuntimeError},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    modules::{fmt_module, ModuleRegistry},
    position::{FileId, FilePos, FileSet, Pos, SourceFile},
    symbol::SymbolTable,
    value::{BuiltinFn, BuiltinFunction, CompiledFunction, ErrorValue, UserObject, Value},
    vm::{Limits, Vm},
};

/// Compiles source text into a bytecode unit.
///
/// Scanning, parsing and compilation errors come back aggregated in one
/// [`ErrorList`], ordered by position.
pub fn compile(
    source: &str,
    file_name: &str,
    modules: &ModuleRegistry,
    builtins: &BuiltinRegistry,
) -> Result<Bytecode, ErrorList> {
    let mut files = FileSet::new();
    let id = files.add_file(file_name, source.len());
    let unit = parser::parse_file(files.file_mut(id), source)?;
    let compiler = Compiler::new(files.file(id), modules, builtins);
    compiler.compile(&unit).map(|(bytecode, _)| bytecode)
}

/// Compiles and runs source text, returning the exported value.
///
/// Convenience wrapper over [`compile`] and [`Vm::run`] with default
/// limits; embedders that need cancellation, budgets, or persistent globals
/// drive [`Vm`] directly.
pub fn eval(
    source: &str,
    file_name: &str,
    modules: &ModuleRegistry,
    builtins: &BuiltinRegistry,
    out: &mut dyn PrintWriter,
) -> Result<Value, EvalError> {
    let bytecode = compile(source, file_name, modules, builtins)?;
    let mut vm = Vm::new(modules, builtins, out);
    vm.run(&bytecode).map_err(EvalError::Runtime)
}

/// Compiles one REPL snippet against an existing global symbol table, so
/// slot assignments (and therefore the VM's globals) stay stable across
/// snippets. Pass `None` for the first snippet.
pub fn compile_repl(
    source: &str,
    file_name: &str,
    modules: &ModuleRegistry,
    builtins: &BuiltinRegistry,
    symbols: Option<SymbolTable>,
) -> Result<(Bytecode, SymbolTable), ErrorList> {
    let mut files = FileSet::new();
    let id = files.add_file(file_name, source.len());
    let unit = parser::parse_file(files.file_mut(id), source)?;
    let compiler = match symbols {
        Some(symbols) => Compiler::with_symbols(files.file(id), modules, symbols),
        None => Compiler::new(files.file(id), modules, builtins),
    };
    compiler.compile(&unit)
}

/// Either phase's failure, for callers that drive [`eval`].
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("{0}")]
    Compile(#[from] ErrorList),
    #[error("{0}")]
    Runtime(RuntimeError),
}
