//! Single-pass bytecode compiler.
//!
//! Walks the AST, resolves names through the [`SymbolTable`], and emits
//! instructions via [`CodeBuilder`]. Control flow uses forward-jump
//! patching; loops keep per-loop patch lists for `break`/`continue`.
//! Statements after a terminating statement in the same block are dropped
//! at compile time. Errors collect with file/line/column into an
//! [`ErrorList`]; the unit is abandoned once the list is full.

use std::mem;
use std::rc::Rc;

use crate::ast::{BlockStmt, Expr, File, FuncBody, FuncLit, Ident, Stmt, StringPart};
use crate::builtins::{BuiltinRegistry, IMPORT_INDEX};
use crate::bytecode::builder::{CodeBuilder, JumpLabel};
use crate::bytecode::code::Bytecode;
use crate::bytecode::op::{BinOp, CmpOp, Opcode, UnOp, ITER_WANTS_KEY, ITER_WANTS_VALUE, SLICE_HAS_HIGH, SLICE_HAS_LOW};
use crate::error::ErrorList;
use crate::modules::ModuleRegistry;
use crate::position::{Pos, SourceFile};
use crate::symbol::{Symbol, SymbolScope, SymbolTable};
use crate::token::Token;
use crate::value::{CompiledFunction, Value};

/// Most slots addressable by the 1-byte local operands.
const MAX_LOCALS: usize = 255;
/// Most arguments addressable by the 1-byte `Call` operand.
const MAX_ARGS: usize = 255;
/// Most constants addressable by the 2-byte `Constant` operand.
const MAX_CONSTANTS: usize = 65535;

/// Per-function emission state.
#[derive(Default)]
struct CompilationScope {
    builder: CodeBuilder,
    loops: Vec<LoopInfo>,
}

/// Patch lists for one lexical loop.
struct LoopInfo {
    label: Option<String>,
    /// True for `for … in` loops, which keep an iterator on the stack that
    /// branches out of the loop must close.
    is_for_in: bool,
    break_patches: Vec<JumpLabel>,
    continue_patches: Vec<JumpLabel>,
}

/// The bytecode compiler for one unit.
pub struct Compiler<'a> {
    file: &'a SourceFile,
    modules: &'a ModuleRegistry,
    symbols: SymbolTable,
    constants: Vec<Value>,
    scopes: Vec<CompilationScope>,
    errors: ErrorList,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler with a fresh global scope holding the registry's
    /// builtin names.
    #[must_use]
    pub fn new(file: &'a SourceFile, modules: &'a ModuleRegistry, builtins: &BuiltinRegistry) -> Self {
        let mut symbols = SymbolTable::new();
        for (index, name) in builtins.names() {
            symbols.define_builtin(index, name);
        }
        Self::with_symbols(file, modules, symbols)
    }

    /// Creates a compiler resuming an existing global symbol table; the REPL
    /// uses this to keep slot assignments stable across snippets.
    #[must_use]
    pub fn with_symbols(file: &'a SourceFile, modules: &'a ModuleRegistry, symbols: SymbolTable) -> Self {
        Self {
            file,
            modules,
            symbols,
            constants: vec![],
            scopes: vec![CompilationScope::default()],
            errors: ErrorList::new(),
        }
    }

    /// Compiles a parsed unit into bytecode, returning the global symbol
    /// table alongside for callers that keep compiling against it.
    pub fn compile(mut self, unit: &File) -> Result<(Bytecode, SymbolTable), ErrorList> {
        self.compile_stmts(&unit.stmts);
        self.emit(Opcode::Suspend, &[]);

        self.errors.clone().into_result()?;

        let scope = self.scopes.pop().expect("main scope");
        let main = CompiledFunction {
            instructions: scope.builder.into_instructions(),
            num_locals: 0,
            num_params: 0,
            variadic: false,
            source_file: self.file.name().to_owned(),
        };
        let mut bytecode = Bytecode {
            main: Rc::new(main),
            constants: self.constants,
            num_globals: self.symbols.num_definitions(),
            file_name: self.file.name().to_owned(),
        };
        bytecode.remove_duplicate_constants();
        bytecode.remove_unused_constants();
        Ok((bytecode, self.symbols))
    }

    // ------------------------------------------------------------------
    // Infrastructure
    // ------------------------------------------------------------------

    fn error(&mut self, pos: Pos, message: impl Into<String>) {
        let fp = self.file.position(pos);
        self.errors.add(fp, message);
    }

    fn builder(&mut self) -> &mut CodeBuilder {
        &mut self.scopes.last_mut().expect("compilation scope").builder
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        self.builder().emit(op, operands)
    }

    fn add_const(&mut self, value: Value, pos: Pos) -> usize {
        if self.constants.len() >= MAX_CONSTANTS {
            self.error(pos, "too many constants in one unit");
            return 0;
        }
        self.constants.push(value);
        self.constants.len() - 1
    }

    fn emit_const(&mut self, value: Value, pos: Pos) {
        let idx = self.add_const(value, pos);
        self.emit(Opcode::Constant, &[idx]);
    }

    fn enter_block(&mut self) {
        let outer = mem::take(&mut self.symbols);
        self.symbols = SymbolTable::enclosed(outer, true);
    }

    fn leave_block(&mut self) {
        let current = mem::take(&mut self.symbols);
        let (parent, _block) = current.split_parent();
        self.symbols = parent;
    }

    fn enter_function(&mut self) {
        let outer = mem::take(&mut self.symbols);
        self.symbols = SymbolTable::enclosed(outer, false);
        self.scopes.push(CompilationScope::default());
    }

    fn leave_function(&mut self) -> (Vec<u8>, u16, Vec<Symbol>) {
        let scope = self.scopes.pop().expect("function scope");
        let current = mem::take(&mut self.symbols);
        let (parent, func_scope) = current.split_parent();
        self.symbols = parent;
        (
            scope.builder.into_instructions(),
            func_scope.num_definitions(),
            func_scope.free_symbols().to_vec(),
        )
    }

    fn in_function(&self) -> bool {
        self.scopes.len() > 1
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn compile_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            if self.errors.is_full() {
                return;
            }
            self.compile_stmt(stmt);
            // Everything after a terminating statement in this block is
            // unreachable; drop it (and never define its symbols).
            if stmt.terminates_block() {
                break;
            }
        }
    }

    fn compile_block(&mut self, block: &BlockStmt) {
        self.enter_block();
        self.compile_stmts(&block.stmts);
        self.leave_block();
    }

    fn compile_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty { .. } => {}
            Stmt::Expr { expr } => {
                self.compile_expr(expr);
                self.emit(Opcode::Pop, &[]);
            }
            Stmt::Assign { lhs, rhs, op, pos } => self.compile_assign(lhs, rhs, *op, *pos),
            Stmt::IncDec { expr, op, pos } => {
                let bin = if *op == Token::Inc { BinOp::Add } else { BinOp::Sub };
                self.compile_compound(expr, bin, None, *pos);
            }
            Stmt::Block(block) => self.compile_block(block),
            Stmt::If { cond, body, alt, .. } => {
                self.compile_expr(cond);
                let else_jump = self.builder().emit_jump(Opcode::JumpFalsy);
                self.compile_block(body);
                match alt {
                    Some(alt) => {
                        let end_jump = self.builder().emit_jump(Opcode::Jump);
                        self.builder().patch_jump(else_jump);
                        self.compile_stmt(alt);
                        self.builder().patch_jump(end_jump);
                    }
                    None => self.builder().patch_jump(else_jump),
                }
            }
            Stmt::ForC { init, cond, post, body, .. } => {
                self.compile_for_c(init.as_deref(), cond.as_ref(), post.as_deref(), body, None);
            }
            Stmt::ForIn { key, value, iterable, body, .. } => {
                self.compile_for_in(key.as_ref(), value, iterable, body, None);
            }
            Stmt::Labeled { label, stmt, pos } => match &**stmt {
                Stmt::ForC { init, cond, post, body, .. } => {
                    self.compile_for_c(init.as_deref(), cond.as_ref(), post.as_deref(), body, Some(label.clone()));
                }
                Stmt::ForIn { key, value, iterable, body, .. } => {
                    self.compile_for_in(key.as_ref(), value, iterable, body, Some(label.clone()));
                }
                _ => self.error(*pos, "label must be attached to a loop"),
            },
            Stmt::Break { label, pos } => self.compile_branch(label.as_deref(), *pos, true),
            Stmt::Continue { label, pos } => self.compile_branch(label.as_deref(), *pos, false),
            Stmt::Return { results, pos } => {
                if !self.in_function() {
                    self.error(*pos, "return outside function");
                    return;
                }
                if results.len() > MAX_ARGS {
                    self.error(*pos, "too many return values");
                    return;
                }
                for result in results {
                    self.compile_expr(result);
                }
                self.emit(Opcode::RunDefer, &[]);
                self.emit(Opcode::Return, &[results.len()]);
            }
            Stmt::Defer { call, pos } => self.compile_defer(call, *pos),
            Stmt::Throw { value, .. } => {
                self.compile_expr(value);
                self.emit(Opcode::Throw, &[1]);
            }
            Stmt::Try { body, catch_name, handler, pos } => {
                self.compile_try(body, catch_name.as_ref(), handler, *pos);
            }
            Stmt::Export { value, pos } => {
                if self.in_function() {
                    self.error(*pos, "export inside function");
                    return;
                }
                self.compile_expr(value);
                self.emit(Opcode::Suspend, &[]);
            }
        }
    }

    fn compile_branch(&mut self, label: Option<&str>, pos: Pos, is_break: bool) {
        let loops = &self.scopes.last().expect("scope").loops;
        let target = match label {
            Some(label) => loops.iter().rposition(|l| l.label.as_deref() == Some(label)),
            None => loops.len().checked_sub(1),
        };
        let Some(target) = target else {
            let what = if is_break { "break" } else { "continue" };
            self.error(pos, format!("{what} outside loop"));
            return;
        };

        // Loops inner to the target keep live iterators on the stack; close
        // them before leaving. A break also closes its own loop's iterator
        // by jumping to the close instruction at the loop exit.
        let closes = self.scopes.last().expect("scope").loops[target + 1..]
            .iter()
            .filter(|l| l.is_for_in)
            .count();
        for _ in 0..closes {
            self.emit(Opcode::IteratorClose, &[]);
        }

        let jump = self.builder().emit_jump(Opcode::Jump);
        let info = &mut self.scopes.last_mut().expect("scope").loops[target];
        if is_break {
            info.break_patches.push(jump);
        } else {
            info.continue_patches.push(jump);
        }
    }

    fn compile_for_c(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &BlockStmt,
        label: Option<String>,
    ) {
        self.enter_block();
        if let Some(init) = init {
            self.compile_stmt(init);
        }
        let loop_start = self.builder().current_offset();
        let exit_jump = cond.map(|cond| {
            self.compile_expr(cond);
            self.builder().emit_jump(Opcode::JumpFalsy)
        });

        self.scopes.last_mut().expect("scope").loops.push(LoopInfo {
            label,
            is_for_in: false,
            break_patches: vec![],
            continue_patches: vec![],
        });
        self.compile_block(body);
        let info = self.scopes.last_mut().expect("scope").loops.pop().expect("loop info");

        // `continue` lands on the post statement.
        let post_target = self.builder().current_offset();
        for patch in info.continue_patches {
            self.builder().patch_jump_to(patch, post_target);
        }
        if let Some(post) = post {
            self.compile_stmt(post);
        }
        self.emit(Opcode::Jump, &[loop_start]);

        if let Some(exit_jump) = exit_jump {
            self.builder().patch_jump(exit_jump);
        }
        for patch in info.break_patches {
            self.builder().patch_jump(patch);
        }
        self.leave_block();
    }

    fn compile_for_in(
        &mut self,
        key: Option<&Ident>,
        value: &Ident,
        iterable: &Expr,
        body: &BlockStmt,
        label: Option<String>,
    ) {
        self.enter_block();
        self.compile_expr(iterable);
        self.emit(Opcode::IteratorInit, &[]);

        let loop_start = self.builder().current_offset();
        let mut flags = ITER_WANTS_VALUE as usize;
        if key.is_some() {
            flags |= ITER_WANTS_KEY as usize;
        }
        self.emit(Opcode::IteratorNext, &[flags]);
        let exit_jump = self.builder().emit_jump(Opcode::JumpFalsy);

        // The value sits on top of the key; bind it first.
        self.define_and_store(value);
        if let Some(key) = key {
            self.define_and_store(key);
        }

        self.scopes.last_mut().expect("scope").loops.push(LoopInfo {
            label,
            is_for_in: true,
            break_patches: vec![],
            continue_patches: vec![],
        });
        self.compile_block(body);
        let info = self.scopes.last_mut().expect("scope").loops.pop().expect("loop info");

        self.emit(Opcode::Jump, &[loop_start]);

        let exit = self.builder().current_offset();
        self.builder().patch_jump_to(exit_jump, exit);
        for patch in info.break_patches {
            self.builder().patch_jump_to(patch, exit);
        }
        for patch in info.continue_patches {
            self.builder().patch_jump_to(patch, loop_start);
        }
        self.emit(Opcode::IteratorClose, &[]);
        self.leave_block();
    }

    fn compile_defer(&mut self, call: &Expr, pos: Pos) {
        let Expr::Call { func, args, .. } = call else {
            self.error(pos, "defer requires a function call");
            return;
        };
        self.compile_expr(func);
        let (argc, splat) = self.compile_call_args(args, pos);
        self.emit(Opcode::Defer, &[argc, usize::from(splat), 0]);
    }

    fn compile_try(&mut self, body: &BlockStmt, catch_name: Option<&Ident>, handler: &BlockStmt, pos: Pos) {
        let label = self.builder().emit_try();
        self.compile_block(body);
        let end_jump = self.builder().emit_jump(Opcode::Jump);

        // Handler entry: the VM pushes the error value.
        let catch_pc = self.builder().current_offset();
        self.enter_block();
        match catch_name {
            Some(name) => self.define_and_store(name),
            None => {
                self.emit(Opcode::Pop, &[]);
            }
        }
        self.compile_stmts(&handler.stmts);
        self.leave_block();

        let end_pc = self.builder().current_offset();
        self.builder().patch_jump_to(end_jump, end_pc);
        if self.builder().patch_try(label, catch_pc, end_pc).is_err() {
            self.error(pos, "try block too large to encode");
        }
    }

    // ------------------------------------------------------------------
    // Assignment
    // ------------------------------------------------------------------

    fn compile_assign(&mut self, lhs: &[Expr], rhs: &[Expr], op: Token, pos: Pos) {
        if let Some(bin) = op.assign_op() {
            let Some(bin) = bin_op_for(bin) else {
                self.error(pos, "unsupported compound assignment");
                return;
            };
            self.compile_compound(&lhs[0], bin, Some(&rhs[0]), pos);
            return;
        }
        match op {
            Token::Define => self.compile_define(lhs, rhs, pos),
            Token::Assign => self.compile_plain_assign(lhs, rhs, pos),
            _ => self.error(pos, "unsupported assignment operator"),
        }
    }

    /// `:=` — defines new names, or assigns existing ones when the
    /// multi-name form introduces at least one new name (the single-name
    /// form redeclaring in the same block is an error).
    fn compile_define(&mut self, lhs: &[Expr], rhs: &[Expr], pos: Pos) {
        let mut names = Vec::with_capacity(lhs.len());
        for target in lhs {
            match target {
                Expr::Ident(ident) => names.push(ident),
                other => {
                    self.error(other.pos(), "':=' requires identifiers on the left");
                    return;
                }
            }
        }

        let new_count = names.iter().filter(|n| !self.symbols.is_defined_here(&n.name)).count();
        if new_count == 0 {
            if names.len() == 1 {
                self.error(pos, format!("{} redeclared in this block", names[0].name));
            } else {
                self.error(pos, "no new variables on left side of ':='");
            }
            return;
        }

        if names.len() > 1 && rhs.len() == 1 {
            // Tuple-unpack: evaluate once, assert the length, then bind each
            // element.
            self.compile_expr(&rhs[0]);
            self.emit(Opcode::IdxAssert, &[names.len()]);
            for (i, name) in names.iter().enumerate() {
                self.emit(Opcode::IdxElem, &[i]);
                self.define_and_store(name);
            }
            self.emit(Opcode::Pop, &[]);
            return;
        }

        if names.len() == 1 {
            // Pre-declare for function literals so the body can refer to
            // itself (directly, or through a captured cell).
            let recursive = matches!(rhs[0], Expr::Func(_));
            if recursive {
                let symbol = self.symbols.define(&names[0].name);
                self.compile_expr(&rhs[0]);
                self.store_symbol(&symbol, true);
            } else {
                self.compile_expr(&rhs[0]);
                self.define_and_store(names[0]);
            }
            return;
        }

        // Paired multi-define: all right-hand sides evaluate before any
        // binding, then assign in reverse order.
        for value in rhs {
            self.compile_expr(value);
        }
        let symbols: Vec<Symbol> = names
            .iter()
            .map(|name| match self.resolve_defined_here(name) {
                Some(symbol) => symbol,
                None => self.symbols.define(&name.name),
            })
            .collect();
        for symbol in symbols.iter().rev() {
            self.store_symbol(symbol, true);
        }
    }

    fn compile_plain_assign(&mut self, lhs: &[Expr], rhs: &[Expr], pos: Pos) {
        if lhs.len() == 1 {
            match &lhs[0] {
                Expr::Ident(ident) => {
                    self.compile_expr(&rhs[0]);
                    match self.resolve_or_error(ident) {
                        Some(symbol) => self.store_symbol(&symbol, false),
                        None => {
                            self.emit(Opcode::Pop, &[]);
                        }
                    }
                }
                Expr::Index { expr, index, .. } => {
                    self.compile_expr(expr);
                    self.compile_expr(index);
                    self.compile_expr(&rhs[0]);
                    self.emit(Opcode::SetIndex, &[]);
                }
                Expr::Selector { expr, field, pos } => {
                    self.compile_expr(expr);
                    self.emit_const(Value::string(&field.name), *pos);
                    self.compile_expr(&rhs[0]);
                    self.emit(Opcode::SetIndex, &[]);
                }
                other => self.error(other.pos(), "cannot assign to this expression"),
            }
            return;
        }

        // Multi-assignment binds identifiers only; indexed targets would
        // need their containers evaluated before the right-hand sides.
        let mut symbols = Vec::with_capacity(lhs.len());
        for target in lhs {
            match target {
                Expr::Ident(ident) => {
                    let Some(symbol) = self.resolve_or_error(ident) else {
                        return;
                    };
                    symbols.push(symbol);
                }
                other => {
                    self.error(other.pos(), "only identifiers can be assigned in a multi-assignment");
                    return;
                }
            }
        }

        if rhs.len() == 1 {
            self.compile_expr(&rhs[0]);
            self.emit(Opcode::IdxAssert, &[symbols.len()]);
            for (i, symbol) in symbols.iter().enumerate() {
                self.emit(Opcode::IdxElem, &[i]);
                self.store_symbol(symbol, false);
            }
            self.emit(Opcode::Pop, &[]);
            return;
        }

        debug_assert_eq!(lhs.len(), rhs.len(), "parser checks assignment arity");
        let _ = pos;
        for value in rhs {
            self.compile_expr(value);
        }
        for symbol in symbols.iter().rev() {
            self.store_symbol(symbol, false);
        }
    }

    /// Compound assignment (`+=`, `??=`, `++`): the target is evaluated
    /// once, read, combined, and stored back. `rhs` of `None` means the
    /// literal 1 (increment/decrement).
    fn compile_compound(&mut self, target: &Expr, op: BinOp, rhs: Option<&Expr>, pos: Pos) {
        match target {
            Expr::Ident(ident) => {
                let Some(symbol) = self.resolve_or_error(ident) else {
                    return;
                };
                self.load_symbol(&symbol);
                self.compile_compound_rhs(op, rhs, pos);
                self.store_symbol(&symbol, false);
            }
            Expr::Index { expr, index, .. } => {
                self.compile_expr(expr);
                self.compile_expr(index);
                // Keep container and key for the store; they are evaluated
                // exactly once, left to right.
                self.emit(Opcode::Index, &[1]);
                self.compile_compound_rhs(op, rhs, pos);
                self.emit(Opcode::SetIndex, &[]);
            }
            Expr::Selector { expr, field, pos: sel_pos } => {
                self.compile_expr(expr);
                self.emit_const(Value::string(&field.name), *sel_pos);
                self.emit(Opcode::Index, &[1]);
                self.compile_compound_rhs(op, rhs, pos);
                self.emit(Opcode::SetIndex, &[]);
            }
            other => self.error(other.pos(), "cannot assign to this expression"),
        }
    }

    fn compile_compound_rhs(&mut self, op: BinOp, rhs: Option<&Expr>, pos: Pos) {
        match rhs {
            Some(rhs) => self.compile_expr(rhs),
            None => self.emit_const(Value::Int(1), pos),
        }
        self.emit(Opcode::BinaryOp, &[op as usize]);
    }

    /// Defines `name` in the current scope (or reuses an existing definition
    /// from this exact block) and stores the top of stack into it.
    fn define_and_store(&mut self, name: &Ident) {
        let symbol = match self.resolve_defined_here(name) {
            Some(symbol) => symbol,
            None => self.symbols.define(&name.name),
        };
        if symbol.scope == SymbolScope::Local && symbol.index as usize >= MAX_LOCALS {
            self.error(name.pos, "too many local variables");
        }
        self.store_symbol(&symbol, true);
    }

    fn resolve_defined_here(&mut self, name: &Ident) -> Option<Symbol> {
        if self.symbols.is_defined_here(&name.name) {
            self.symbols.resolve(&name.name)
        } else {
            None
        }
    }

    fn resolve_or_error(&mut self, ident: &Ident) -> Option<Symbol> {
        match self.symbols.resolve(&ident.name) {
            Some(symbol) => Some(symbol),
            None => {
                self.error(ident.pos, format!("unresolved reference '{}'", ident.name));
                None
            }
        }
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        let index = symbol.index as usize;
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[index]),
        };
    }

    /// Stores the top of stack into a symbol. `defining` selects the
    /// fresh-slot store for locals (`DefineLocal` rather than `SetLocal`).
    fn store_symbol(&mut self, symbol: &Symbol, defining: bool) {
        let index = symbol.index as usize;
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::SetGlobal, &[index]),
            SymbolScope::Local if defining => self.emit(Opcode::DefineLocal, &[index]),
            SymbolScope::Local => self.emit(Opcode::SetLocal, &[index]),
            SymbolScope::Free => self.emit(Opcode::SetFree, &[index]),
            SymbolScope::Builtin => {
                self.error(Pos::NONE, format!("cannot assign to builtin '{}'", symbol.name));
                0
            }
        };
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn compile_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => {
                if let Some(symbol) = self.resolve_or_error(ident) {
                    self.load_symbol(&symbol);
                } else {
                    self.emit(Opcode::Nil, &[]);
                }
            }
            Expr::IntLit { value, pos } => self.emit_const(Value::Int(*value), *pos),
            Expr::FloatLit { value, pos } => self.emit_const(Value::Float(*value), *pos),
            Expr::CharLit { value, pos } => self.emit_const(Value::Char(*value), *pos),
            Expr::BoolLit { value, .. } => {
                self.emit(if *value { Opcode::True } else { Opcode::False }, &[]);
            }
            Expr::NilLit { .. } => {
                self.emit(Opcode::Nil, &[]);
            }
            Expr::StringLit { value, pos } => self.emit_const(Value::string(value), *pos),
            Expr::StringInterp { parts, pos } => self.compile_string_interp(parts, *pos),
            Expr::ArrayLit { elements, pos } => {
                if elements.len() > MAX_CONSTANTS {
                    self.error(*pos, "array literal too large");
                    return;
                }
                let mut splat = false;
                for element in elements {
                    splat |= self.compile_element(element);
                }
                self.emit(Opcode::Array, &[elements.len(), usize::from(splat)]);
            }
            Expr::MapLit { entries, pos } => {
                for (key, value) in entries {
                    self.emit_const(Value::string(key), *pos);
                    self.compile_expr(value);
                }
                self.emit(Opcode::Map, &[entries.len()]);
            }
            Expr::Func(func) => self.compile_func(func),
            Expr::Call { func, args, pos } => {
                self.compile_expr(func);
                let (argc, splat) = self.compile_call_args(args, *pos);
                self.emit(Opcode::Call, &[argc, usize::from(splat)]);
            }
            Expr::Index { expr, index, .. } => {
                self.compile_expr(expr);
                self.compile_expr(index);
                self.emit(Opcode::Index, &[0]);
            }
            Expr::Selector { expr, field, pos } => {
                self.compile_expr(expr);
                self.emit_const(Value::string(&field.name), *pos);
                self.emit(Opcode::Index, &[0]);
            }
            Expr::Slice { expr, low, high, .. } => {
                self.compile_expr(expr);
                let mut flags = 0usize;
                if let Some(low) = low {
                    self.compile_expr(low);
                    flags |= SLICE_HAS_LOW as usize;
                }
                if let Some(high) = high {
                    self.compile_expr(high);
                    flags |= SLICE_HAS_HIGH as usize;
                }
                self.emit(Opcode::Slice, &[flags]);
            }
            Expr::Unary { op, expr, pos } => {
                self.compile_expr(expr);
                let un = match op {
                    Token::Add => UnOp::Pos,
                    Token::Sub => UnOp::Neg,
                    Token::Not => UnOp::Not,
                    Token::Xor => UnOp::BitNot,
                    _ => {
                        self.error(*pos, format!("unsupported unary operator '{op}'"));
                        return;
                    }
                };
                self.emit(Opcode::UnaryOp, &[un as usize]);
            }
            Expr::Binary { op, lhs, rhs, pos } => self.compile_binary(*op, lhs, rhs, *pos),
            Expr::Ternary { cond, then, alt, .. } => {
                self.compile_expr(cond);
                let else_jump = self.builder().emit_jump(Opcode::JumpFalsy);
                self.compile_expr(then);
                let end_jump = self.builder().emit_jump(Opcode::Jump);
                self.builder().patch_jump(else_jump);
                self.compile_expr(alt);
                self.builder().patch_jump(end_jump);
            }
            Expr::Splat { pos, .. } => {
                // The parser only produces splats in call arguments and
                // array literals, which are compiled contextually.
                self.error(*pos, "'...' is only allowed in calls and array literals");
            }
            Expr::Import { name, pos } => {
                if !self.modules.contains(name) {
                    self.error(*pos, format!("module '{name}' not found"));
                    return;
                }
                self.emit(Opcode::GetBuiltin, &[IMPORT_INDEX as usize]);
                self.emit_const(Value::string(name), *pos);
                self.emit(Opcode::Call, &[1, 0]);
            }
        }
    }

    fn compile_binary(&mut self, op: Token, lhs: &Expr, rhs: &Expr, pos: Pos) {
        match op {
            Token::LAnd => {
                self.compile_expr(lhs);
                let end = self.builder().emit_jump(Opcode::AndJump);
                self.compile_expr(rhs);
                self.builder().patch_jump(end);
            }
            Token::LOr => {
                self.compile_expr(lhs);
                let end = self.builder().emit_jump(Opcode::OrJump);
                self.compile_expr(rhs);
                self.builder().patch_jump(end);
            }
            _ => {
                self.compile_expr(lhs);
                self.compile_expr(rhs);
                if let Some(cmp) = cmp_op_for(op) {
                    self.emit(Opcode::Compare, &[cmp as usize]);
                } else if let Some(bin) = bin_op_for(op) {
                    self.emit(Opcode::BinaryOp, &[bin as usize]);
                } else {
                    self.error(pos, format!("unsupported binary operator '{op}'"));
                }
            }
        }
    }

    fn compile_string_interp(&mut self, parts: &[StringPart], pos: Pos) {
        let mut count = 0usize;
        for part in parts {
            match part {
                StringPart::Lit(text) if text.is_empty() => {}
                StringPart::Lit(text) => {
                    self.emit_const(Value::string(text), pos);
                    count += 1;
                }
                StringPart::Expr(expr) => {
                    self.compile_expr(expr);
                    count += 1;
                }
            }
        }
        if count == 0 {
            self.emit_const(Value::string(""), pos);
        } else {
            self.emit(Opcode::String, &[count]);
        }
    }

    /// Compiles one call argument or array element; returns true if it was a
    /// splat.
    fn compile_element(&mut self, element: &Expr) -> bool {
        if let Expr::Splat { expr, .. } = element {
            self.compile_expr(expr);
            self.emit(Opcode::Splat, &[]);
            true
        } else {
            self.compile_expr(element);
            false
        }
    }

    fn compile_call_args(&mut self, args: &[Expr], pos: Pos) -> (usize, bool) {
        if args.len() > MAX_ARGS {
            self.error(pos, "too many call arguments");
            return (0, false);
        }
        let mut splat = false;
        for arg in args {
            splat |= self.compile_element(arg);
        }
        (args.len(), splat)
    }

    fn compile_func(&mut self, func: &FuncLit) {
        if func.params.len() > MAX_ARGS {
            self.error(func.pos, "too many parameters");
            return;
        }
        self.enter_function();
        for param in &func.params {
            if self.symbols.is_defined_here(&param.name) {
                self.error(param.pos, format!("duplicate parameter '{}'", param.name));
            } else {
                self.symbols.define(&param.name);
            }
        }
        match &func.body {
            FuncBody::Block(block) => {
                self.compile_stmts(&block.stmts);
                if self.builder().last_op() != Some(Opcode::Return) {
                    self.emit(Opcode::RunDefer, &[]);
                    self.emit(Opcode::Return, &[0]);
                }
            }
            FuncBody::Arrow(expr) => {
                self.compile_expr(expr);
                self.emit(Opcode::RunDefer, &[]);
                self.emit(Opcode::Return, &[1]);
            }
        }
        let (instructions, num_locals, free) = self.leave_function();
        if num_locals as usize > MAX_LOCALS {
            self.error(func.pos, "too many local variables");
            return;
        }

        let compiled = Value::Function(Rc::new(CompiledFunction {
            instructions,
            num_locals,
            num_params: func.params.len() as u8,
            variadic: func.variadic,
            source_file: self.file.name().to_owned(),
        }));
        let index = self.add_const(compiled, func.pos);
        if free.is_empty() {
            self.emit(Opcode::Constant, &[index]);
        } else {
            // Materialize each captured variable as a shared cell; Closure
            // consumes them.
            for symbol in &free {
                match symbol.scope {
                    SymbolScope::Local => self.emit(Opcode::GetLocalPtr, &[symbol.index as usize]),
                    SymbolScope::Free => self.emit(Opcode::GetFreePtr, &[symbol.index as usize]),
                    _ => unreachable!("only locals and free variables are captured"),
                };
            }
            self.emit(Opcode::Closure, &[index, free.len()]);
        }
    }
}

fn bin_op_for(token: Token) -> Option<BinOp> {
    Some(match token {
        Token::Add => BinOp::Add,
        Token::Sub => BinOp::Sub,
        Token::Mul => BinOp::Mul,
        Token::Quo => BinOp::Div,
        Token::Rem => BinOp::Rem,
        Token::And => BinOp::And,
        Token::Or => BinOp::Or,
        Token::Xor => BinOp::Xor,
        Token::AndNot => BinOp::AndNot,
        Token::Shl => BinOp::Shl,
        Token::Shr => BinOp::Shr,
        Token::Nullish => BinOp::Nullish,
        _ => return None,
    })
}

fn cmp_op_for(token: Token) -> Option<CmpOp> {
    Some(match token {
        Token::Equal => CmpOp::Equal,
        Token::NotEqual => CmpOp::NotEqual,
        Token::Less => CmpOp::Less,
        Token::LessEq => CmpOp::LessEq,
        Token::Greater => CmpOp::Greater,
        Token::GreaterEq => CmpOp::GreaterEq,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::code::iterate;
    use crate::parser::parse_file;
    use crate::position::FileSet;
    use pretty_assertions::assert_eq;

    fn compile(src: &str) -> Bytecode {
        try_compile(src).unwrap_or_else(|e| panic!("compile failed: {e}"))
    }

    fn try_compile(src: &str) -> Result<Bytecode, ErrorList> {
        let mut set = FileSet::new();
        let id = set.add_file("test.toy", src.len());
        let unit = parse_file(set.file_mut(id), src)?;
        let modules = ModuleRegistry::standard();
        let builtins = BuiltinRegistry::standard();
        let compiler = Compiler::new(set.file(id), &modules, &builtins);
        compiler.compile(&unit).map(|(bytecode, _)| bytecode)
    }

    fn ops_of(bytecode: &Bytecode) -> Vec<Opcode> {
        iterate(&bytecode.main.instructions).map(|(_, op, _)| op).collect()
    }

    #[test]
    fn arithmetic_expression_statement() {
        let unit = compile("1 + 2 * 3");
        assert_eq!(
            ops_of(&unit),
            vec![
                Opcode::Constant,
                Opcode::Constant,
                Opcode::Constant,
                Opcode::BinaryOp,
                Opcode::BinaryOp,
                Opcode::Pop,
                Opcode::Suspend,
            ]
        );
        // 1, 2, 3 all distinct constants.
        assert_eq!(unit.constants.len(), 3);
    }

    #[test]
    fn globals_are_counted() {
        let unit = compile("a := 1; b := 2; a = b");
        assert_eq!(unit.num_globals, 2);
        assert_eq!(
            ops_of(&unit),
            vec![
                Opcode::Constant,
                Opcode::SetGlobal,
                Opcode::Constant,
                Opcode::SetGlobal,
                Opcode::GetGlobal,
                Opcode::SetGlobal,
                Opcode::Suspend,
            ]
        );
    }

    #[test]
    fn duplicate_constants_are_merged() {
        let unit = compile("a := 7; b := 7; c := \"x\"; d := \"x\"");
        assert_eq!(unit.constants.len(), 2);
    }

    #[test]
    fn short_circuit_uses_peek_jumps() {
        let unit = compile("a := true && false; b := a || true");
        let ops = ops_of(&unit);
        assert!(ops.contains(&Opcode::AndJump));
        assert!(ops.contains(&Opcode::OrJump));
    }

    #[test]
    fn closure_capture_emits_cell_loads() {
        let unit = compile("make := fn() { x := 0; return fn() { x = x + 1; return x } }");
        // The outer function constant contains GetLocalPtr + Closure.
        let outer = unit
            .constants
            .iter()
            .find_map(|c| match c {
                Value::Function(f) if f.num_locals > 0 => Some(f),
                _ => None,
            })
            .expect("outer function constant");
        let ops: Vec<Opcode> = iterate(&outer.instructions).map(|(_, op, _)| op).collect();
        assert!(ops.contains(&Opcode::GetLocalPtr));
        assert!(ops.contains(&Opcode::Closure));
        // The inner function reads and writes through free-variable slots.
        let inner = unit
            .constants
            .iter()
            .find_map(|c| match c {
                Value::Function(f) => {
                    let ops: Vec<Opcode> = iterate(&f.instructions).map(|(_, op, _)| op).collect();
                    ops.contains(&Opcode::GetFree).then_some(ops)
                }
                _ => None,
            })
            .expect("inner function constant");
        assert!(inner.contains(&Opcode::SetFree));
    }

    #[test]
    fn dead_code_after_return_is_dropped() {
        let unit = compile("f := fn() { return 1; g := 2; g }");
        let func = unit
            .constants
            .iter()
            .find_map(|c| match c {
                Value::Function(f) => Some(f),
                _ => None,
            })
            .expect("function constant");
        let ops: Vec<Opcode> = iterate(&func.instructions).map(|(_, op, _)| op).collect();
        // Exactly one constant load (the 1), then run defers and return.
        assert_eq!(
            ops,
            vec![Opcode::Constant, Opcode::RunDefer, Opcode::Return]
        );
    }

    #[test]
    fn tuple_unpack_asserts_length() {
        let unit = compile("a, b, c := [10, 20, 30]");
        let ops = ops_of(&unit);
        assert!(ops.contains(&Opcode::IdxAssert));
        assert_eq!(ops.iter().filter(|&&op| op == Opcode::IdxElem).count(), 3);
    }

    #[test]
    fn compound_index_assign_reads_with_keep_flag() {
        let unit = compile("a := [1]; a[0] += 2");
        let keep_reads: Vec<Vec<usize>> = iterate(&unit.main.instructions)
            .filter(|(_, op, _)| *op == Opcode::Index)
            .map(|(_, _, operands)| operands)
            .collect();
        assert_eq!(keep_reads, vec![vec![1]]);
    }

    #[test]
    fn for_in_lowering_closes_iterator() {
        let unit = compile("s := 0; for v in [1, 2] { s += v }");
        let ops = ops_of(&unit);
        assert!(ops.contains(&Opcode::IteratorInit));
        assert!(ops.contains(&Opcode::IteratorNext));
        assert!(ops.contains(&Opcode::IteratorClose));
    }

    #[test]
    fn import_is_checked_at_compile_time() {
        assert!(try_compile("x := import(\"fmt\")").is_ok());
        let errs = try_compile("x := import(\"no_such\")").unwrap_err();
        assert!(errs.to_string().contains("module 'no_such' not found"));
    }

    #[test]
    fn static_error_cases() {
        for (src, needle) in [
            ("y", "unresolved reference"),
            ("x := 1; x := 2", "redeclared"),
            ("break", "break outside loop"),
            ("continue", "continue outside loop"),
            ("return 1", "return outside function"),
            ("f := fn() { export 1 }", "export inside function"),
            ("f := fn(a, a) {}", "duplicate parameter"),
        ] {
            let errs = try_compile(src).unwrap_err();
            assert!(
                errs.to_string().contains(needle),
                "{src:?}: expected {needle:?} in {errs}"
            );
        }
    }

    #[test]
    fn errors_carry_positions() {
        let errs = try_compile("\n\n  zz").unwrap_err();
        let err = &errs.errors()[0];
        assert_eq!((err.pos.line, err.pos.column), (3, 3));
        assert_eq!(err.pos.name, "test.toy");
    }

    #[test]
    fn export_emits_suspend_and_drops_trailing_code() {
        let unit = compile("export 42; 1 + 1");
        let ops = ops_of(&unit);
        assert_eq!(ops, vec![Opcode::Constant, Opcode::Suspend, Opcode::Suspend]);
    }

    #[test]
    fn block_scopes_shadow_and_share_slot_space() {
        let unit = compile("f := fn() { x := 1; { x := 2; x }; return x }");
        let func = unit
            .constants
            .iter()
            .find_map(|c| match c {
                Value::Function(f) => Some(f),
                _ => None,
            })
            .expect("function constant");
        assert_eq!(func.num_locals, 2);
    }
}
