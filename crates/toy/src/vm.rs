//! The stack-based virtual machine.
//!
//! A single fetch/decode/dispatch loop executes one instruction per step and
//! reports `Continue`, `Done`, or an error; unwinding is handled uniformly
//! in one place. Each frame owns its locals, deferred-call list, and try
//! handlers. Cancellation and the instruction budget are polled at the
//! suspension points: before calls, on backward jumps, and at `Suspend`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashMap;

use crate::builtins::BuiltinRegistry;
use crate::bytecode::code::Bytecode;
use crate::bytecode::op::{
    read_operands, BinOp, CmpOp, Opcode, UnOp, ITER_WANTS_KEY, ITER_WANTS_VALUE, SLICE_HAS_HIGH, SLICE_HAS_LOW,
};
use crate::error::{RunResult, RuntimeError};
use crate::io::PrintWriter;
use crate::iterator::ValueIterator;
use crate::modules::ModuleRegistry;
use crate::ops;
use crate::value::{index_get, index_set, slice, Cell, CompiledFunction, ErrorValue, Value};

/// Execution limits and the embedder's cancellation flag.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum call depth.
    pub max_frames: usize,
    /// Maximum value-stack depth.
    pub max_stack: usize,
    /// Optional instruction budget; execution stops when it runs out.
    pub budget: Option<u64>,
    /// Optional cancellation flag, polled at suspension points.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frames: 1024,
            max_stack: 2048,
            budget: None,
            cancel: None,
        }
    }
}

/// A deferred call recorded by `Defer`, with its arguments already
/// evaluated.
#[derive(Debug)]
struct DeferredCall {
    callee: Value,
    args: Vec<Value>,
}

/// An installed `try` handler.
#[derive(Debug, Clone, Copy)]
struct TryHandler {
    /// Offset just past the `Try` instruction; start of the protected range.
    body_start: usize,
    catch_pc: usize,
    end_pc: usize,
    /// Stack depth to unwind to before entering the handler.
    stack_len: usize,
}

/// One active call.
#[derive(Debug)]
struct Frame {
    callee: Rc<CompiledFunction>,
    free: Vec<Cell>,
    ip: usize,
    /// Value-stack length at entry; the frame's operands live above it.
    base: usize,
    locals: Vec<Value>,
    defers: Vec<DeferredCall>,
    handlers: Vec<TryHandler>,
}

/// Result of one dispatch step.
enum Step {
    Continue,
    /// The loop's bottom frame produced a result.
    Done(Value),
}

/// The virtual machine.
///
/// One `Vm` owns its globals and module cache across runs, so a REPL can
/// execute successive units against persistent state. A `Vm` is not
/// concurrent-safe; run one per thread.
pub struct Vm<'a> {
    modules: &'a ModuleRegistry,
    builtins: &'a BuiltinRegistry,
    out: &'a mut dyn PrintWriter,
    limits: Limits,

    globals: Vec<Value>,
    module_cache: AHashMap<String, Value>,

    constants: Vec<Value>,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    budget_left: Option<u64>,
}

impl<'a> Vm<'a> {
    pub fn new(modules: &'a ModuleRegistry, builtins: &'a BuiltinRegistry, out: &'a mut dyn PrintWriter) -> Self {
        Self::with_limits(modules, builtins, out, Limits::default())
    }

    pub fn with_limits(
        modules: &'a ModuleRegistry,
        builtins: &'a BuiltinRegistry,
        out: &'a mut dyn PrintWriter,
        limits: Limits,
    ) -> Self {
        Self {
            modules,
            builtins,
            out,
            limits,
            globals: vec![],
            module_cache: AHashMap::new(),
            constants: vec![],
            stack: vec![],
            frames: vec![],
            budget_left: None,
        }
    }

    /// Executes a compiled unit to completion, returning its exported value
    /// (nil when nothing was exported).
    pub fn run(&mut self, bytecode: &Bytecode) -> RunResult<Value> {
        self.constants = bytecode.constants.clone();
        if self.globals.len() < bytecode.num_globals as usize {
            self.globals.resize(bytecode.num_globals as usize, Value::Nil);
        }
        self.stack.clear();
        self.stack.reserve(self.limits.max_stack.min(4096));
        self.frames.clear();
        self.frames.reserve(self.limits.max_frames.min(1024));
        self.budget_left = self.limits.budget;

        self.frames.push(Frame {
            callee: bytecode.main.clone(),
            free: vec![],
            ip: 0,
            base: 0,
            locals: vec![Value::Nil; bytecode.main.num_locals as usize],
            defers: vec![],
            handlers: vec![],
        });
        let result = self.run_loop(0);
        self.frames.clear();
        self.stack.clear();
        result
    }

    /// The embedder's view of global state, for snapshot/restore.
    #[must_use]
    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    /// Replaces global state, e.g. restoring a snapshot taken from
    /// [`Vm::globals`].
    pub fn set_globals(&mut self, globals: Vec<Value>) {
        self.globals = globals;
    }

    /// Writes through the VM's print writer; builtins use this.
    pub fn print(&mut self, text: &str) {
        self.out.print(text);
    }

    /// Resolves an import against the module registry, caching per VM.
    pub fn import_module(&mut self, name: &str) -> RunResult<Value> {
        if let Some(module) = self.module_cache.get(name) {
            return Ok(module.clone());
        }
        match self.modules.get(name) {
            Some(module) => {
                self.module_cache.insert(name.to_owned(), module.clone());
                Ok(module.clone())
            }
            None => Err(RuntimeError::new(format!("module '{name}' not found"))),
        }
    }

    /// Calls a script or builtin value synchronously and returns its result.
    ///
    /// This is how deferred calls run, and it is available to builtins that
    /// take callbacks.
    pub fn run_call(&mut self, callee: Value, args: Vec<Value>) -> RunResult<Value> {
        match callee {
            Value::Builtin(builtin) => {
                let mut full = args;
                if let Some(receiver) = &builtin.receiver {
                    full.insert(0, receiver.clone());
                }
                (builtin.func)(self, &full)
            }
            Value::Function(func) => {
                let depth = self.frames.len();
                self.push_frame(func, vec![], args)?;
                self.run_loop(depth)
            }
            Value::Closure(closure) => {
                let depth = self.frames.len();
                self.push_frame(closure.func.clone(), closure.free.clone(), args)?;
                self.run_loop(depth)
            }
            Value::Cell(cell) => {
                let inner = cell.borrow().clone();
                self.run_call(inner, args)
            }
            other => Err(RuntimeError::new(format!(
                "type {} is not callable",
                other.type_name()
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Execution loop
    // ------------------------------------------------------------------

    fn run_loop(&mut self, base_depth: usize) -> RunResult<Value> {
        loop {
            match self.step(base_depth) {
                Ok(Step::Continue) => {}
                Ok(Step::Done(value)) => return Ok(value),
                Err(err) => self.handle_error(err, base_depth)?,
            }
        }
    }

    fn frame(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active frame")
    }

    fn step(&mut self, base_depth: usize) -> RunResult<Step> {
        let frame = self.frame();
        // Handlers expire when execution reaches their end offset.
        while frame.handlers.last().is_some_and(|h| h.end_pc == frame.ip) {
            frame.handlers.pop();
        }

        let func = frame.callee.clone();
        let at = frame.ip;
        let code = &func.instructions;
        if at >= code.len() {
            return Err(invalid_bytecode("instruction pointer past end of code"));
        }
        let Some(op) = Opcode::from_byte(code[at]) else {
            return Err(invalid_bytecode(format!("undocumented opcode {:#04x}", code[at])));
        };
        let (operands, width) = read_operands(op, &code[at + 1..]);
        self.frame().ip = at + 1 + width;
        if let Some(budget) = self.budget_left.as_mut() {
            *budget = budget.saturating_sub(1);
        }

        match op {
            Opcode::Constant => {
                let value = self
                    .constants
                    .get(operands[0])
                    .cloned()
                    .ok_or_else(|| invalid_bytecode("constant index out of range"))?;
                self.push(value)?;
            }
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::True => self.push(Value::Bool(true))?,
            Opcode::False => self.push(Value::Bool(false))?,
            Opcode::Nil => self.push(Value::Nil)?,

            Opcode::Jump => {
                self.jump_to(at, operands[0])?;
            }
            Opcode::JumpFalsy => {
                let cond = self.pop()?;
                if !cond.is_truthy() {
                    self.jump_to(at, operands[0])?;
                }
            }
            Opcode::AndJump => {
                // Peek-and-jump: a falsy operand decides the result and
                // stays on the stack.
                let decided = !self.peek()?.is_truthy();
                if decided {
                    self.jump_to(at, operands[0])?;
                } else {
                    self.pop()?;
                }
            }
            Opcode::OrJump => {
                let decided = self.peek()?.is_truthy();
                if decided {
                    self.jump_to(at, operands[0])?;
                } else {
                    self.pop()?;
                }
            }

            Opcode::String => {
                let parts = self.pop_many(operands[0])?;
                let mut text = String::new();
                for part in &parts {
                    text.push_str(&part.to_print());
                }
                self.push(Value::string(text))?;
            }
            Opcode::Array => {
                let items = self.pop_args(operands[0], operands[1] != 0)?;
                self.push(Value::array(items))?;
            }
            Opcode::Tuple => {
                let items = self.pop_args(operands[0], operands[1] != 0)?;
                self.push(Value::Tuple(Rc::from(items)))?;
            }
            Opcode::Map => {
                let flat = self.pop_many(operands[0] * 2)?;
                let mut table = crate::value::Table::new();
                let mut iter = flat.into_iter();
                while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                    table.entries.insert(crate::value::Key::new(key)?, value);
                }
                self.push(Value::Table(Rc::new(RefCell::new(table))))?;
            }

            Opcode::Index => {
                let keep = operands[0] != 0;
                let key = self.peek()?.clone();
                let container = self.peek_at(1)?.clone();
                if !keep {
                    self.pop()?;
                    self.pop()?;
                }
                let value = index_get(&container, &key)?;
                self.push(value)?;
            }
            Opcode::SetIndex => {
                let value = self.pop()?;
                let key = self.pop()?;
                let container = self.pop()?;
                index_set(&container, key, value)?;
            }
            Opcode::Slice => {
                let flags = operands[0] as u8;
                let high = if flags & SLICE_HAS_HIGH != 0 { Some(self.pop()?) } else { None };
                let low = if flags & SLICE_HAS_LOW != 0 { Some(self.pop()?) } else { None };
                let container = self.pop()?;
                let value = slice(&container, low.as_ref(), high.as_ref())?;
                self.push(value)?;
            }
            Opcode::Splat => {
                let value = self.pop()?;
                let items = match &value {
                    Value::Array(a) => a.borrow().items.clone(),
                    Value::Tuple(t) => t.to_vec(),
                    other => {
                        return Err(RuntimeError::new(format!(
                            "cannot splat {}",
                            other.type_name()
                        )))
                    }
                };
                self.push(Value::Spread(Rc::new(items)))?;
            }

            Opcode::Call => {
                self.check_suspension()?;
                let args = self.pop_args(operands[0], operands[1] != 0)?;
                let callee = self.pop()?;
                self.call_value(callee, args)?;
            }
            Opcode::Return => {
                let result = self.pop_return_values(operands[0])?;
                let defer_err = self.run_frame_defers();
                let frame = self.frames.pop().expect("frame for return");
                self.stack.truncate(frame.base);
                match defer_err {
                    // A deferred error replaces the pending return.
                    Some(err) => return Err(err),
                    None => {
                        if self.frames.len() == base_depth {
                            return Ok(Step::Done(result));
                        }
                        self.push(result)?;
                    }
                }
            }

            Opcode::Defer => {
                let has_receiver = operands[2] != 0;
                let mut args = self.pop_args(operands[0], operands[1] != 0)?;
                let mut callee = self.pop()?;
                if has_receiver {
                    let receiver = self.pop()?;
                    match callee {
                        Value::Builtin(builtin) => {
                            callee = Value::Builtin(Rc::new(builtin.bind(receiver)));
                        }
                        _ => args.insert(0, receiver),
                    }
                }
                self.frame().defers.push(DeferredCall { callee, args });
            }
            Opcode::RunDefer => {
                if let Some(err) = self.run_frame_defers() {
                    return Err(err);
                }
            }

            Opcode::Try => {
                let body_start = at + 3;
                let handler = TryHandler {
                    body_start,
                    catch_pc: body_start + operands[0],
                    end_pc: body_start + operands[1],
                    stack_len: self.stack.len(),
                };
                let frame = self.frame();
                // Re-entering the same `try` in a loop replaces the stale
                // handler left by a branch out of the block.
                frame.handlers.retain(|h| h.body_start != body_start);
                frame.handlers.push(handler);
            }
            Opcode::Throw => {
                let values = self.pop_many(operands[0])?;
                let error = match values.into_iter().next() {
                    Some(Value::Error(e)) => e,
                    Some(other) => Rc::new(ErrorValue::new(other.to_print())),
                    None => Rc::new(ErrorValue::new("throw")),
                };
                return Err(RuntimeError::Raised(error));
            }

            Opcode::GetGlobal => {
                let value = self
                    .globals
                    .get(operands[0])
                    .cloned()
                    .ok_or_else(|| invalid_bytecode("global index out of range"))?;
                self.push(value)?;
            }
            Opcode::SetGlobal => {
                let value = self.pop()?;
                let slot = self
                    .globals
                    .get_mut(operands[0])
                    .ok_or_else(|| invalid_bytecode("global index out of range"))?;
                *slot = value;
            }

            Opcode::GetLocal => {
                let value = match &self.frame().locals[operands[0]] {
                    Value::Cell(cell) => cell.borrow().clone(),
                    other => other.clone(),
                };
                self.push(value)?;
            }
            Opcode::SetLocal | Opcode::DefineLocal => {
                let value = self.pop()?;
                let slot = &mut self.frame().locals[operands[0]];
                match slot {
                    // Writes to a captured local go through its cell so every
                    // closure holding the cell observes them.
                    Value::Cell(cell) => *cell.borrow_mut() = value,
                    other => *other = value,
                }
            }
            Opcode::GetLocalPtr => {
                let slot = &mut self.frame().locals[operands[0]];
                let cell = match slot {
                    Value::Cell(cell) => cell.clone(),
                    other => {
                        // Promote: move the value into a fresh shared cell.
                        let cell = Rc::new(RefCell::new(std::mem::replace(other, Value::Nil)));
                        *other = Value::Cell(cell.clone());
                        cell
                    }
                };
                self.push(Value::Cell(cell))?;
            }

            Opcode::GetFree => {
                let value = self.frame().free[operands[0]].borrow().clone();
                self.push(value)?;
            }
            Opcode::SetFree => {
                let value = self.pop()?;
                *self.frame().free[operands[0]].borrow_mut() = value;
            }
            Opcode::GetFreePtr => {
                let cell = self.frame().free[operands[0]].clone();
                self.push(Value::Cell(cell))?;
            }

            Opcode::GetBuiltin => {
                let builtin = self
                    .builtins
                    .get(operands[0] as u16)
                    .cloned()
                    .ok_or_else(|| invalid_bytecode("builtin index out of range"))?;
                self.push(Value::Builtin(builtin))?;
            }

            Opcode::IdxAssert => {
                let want = operands[0];
                let len = match self.peek()? {
                    Value::Array(a) => a.borrow().items.len(),
                    Value::Tuple(t) => t.len(),
                    other => {
                        return Err(RuntimeError::new(format!(
                            "cannot unpack {} into {want} values",
                            other.type_name()
                        )))
                    }
                };
                if len != want {
                    return Err(RuntimeError::new(format!(
                        "cannot unpack {len} values into {want}"
                    )));
                }
            }
            Opcode::IdxElem => {
                let index = operands[0];
                let value = match self.peek()? {
                    Value::Array(a) => a.borrow().items.get(index).cloned(),
                    Value::Tuple(t) => t.get(index).cloned(),
                    _ => None,
                };
                let value = value.ok_or_else(|| invalid_bytecode("unpack element out of range"))?;
                self.push(value)?;
            }

            Opcode::Closure => {
                let constant = self
                    .constants
                    .get(operands[0])
                    .cloned()
                    .ok_or_else(|| invalid_bytecode("constant index out of range"))?;
                let Value::Function(func) = constant else {
                    return Err(invalid_bytecode("closure over a non-function constant"));
                };
                let mut cells = Vec::with_capacity(operands[1]);
                for _ in 0..operands[1] {
                    match self.pop()? {
                        Value::Cell(cell) => cells.push(cell),
                        _ => return Err(invalid_bytecode("closure expects cell operands")),
                    }
                }
                cells.reverse();
                self.push(Value::Closure(Rc::new(crate::value::Closure { func, free: cells })))?;
            }

            Opcode::IteratorInit => {
                let value = self.pop()?;
                let iterator = ValueIterator::new(&value)?;
                self.push(Value::Iterator(Rc::new(RefCell::new(iterator))))?;
            }
            Opcode::IteratorNext => {
                let flags = operands[0] as u8;
                let iterator = match self.peek()? {
                    Value::Iterator(it) => it.clone(),
                    _ => return Err(invalid_bytecode("iterator expected on stack")),
                };
                let next = iterator.borrow_mut().next();
                match next {
                    None => self.push(Value::Bool(false))?,
                    Some((key, value)) => {
                        if flags & ITER_WANTS_KEY != 0 {
                            self.push(key)?;
                        }
                        if flags & ITER_WANTS_VALUE != 0 {
                            self.push(value)?;
                        }
                        self.push(Value::Bool(true))?;
                    }
                }
            }
            Opcode::IteratorClose => {
                match self.pop()? {
                    Value::Iterator(_) => {}
                    _ => return Err(invalid_bytecode("iterator expected on stack")),
                }
            }

            Opcode::BinaryOp => {
                let op = BinOp::from_byte(operands[0] as u8)
                    .ok_or_else(|| invalid_bytecode("unknown binary operator id"))?;
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                let value = ops::binary_op(op, &lhs, &rhs)?;
                self.push(value)?;
            }
            Opcode::UnaryOp => {
                let op = UnOp::from_byte(operands[0] as u8)
                    .ok_or_else(|| invalid_bytecode("unknown unary operator id"))?;
                let operand = self.pop()?;
                let value = ops::unary_op(op, &operand)?;
                self.push(value)?;
            }
            Opcode::Compare => {
                let op = CmpOp::from_byte(operands[0] as u8)
                    .ok_or_else(|| invalid_bytecode("unknown comparison operator id"))?;
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                let value = ops::compare_op(op, &lhs, &rhs)?;
                self.push(value)?;
            }

            Opcode::Suspend => {
                self.check_suspension()?;
                if self.frames.len() != base_depth + 1 {
                    return Err(invalid_bytecode("suspend outside the main unit"));
                }
                let base = self.frame().base;
                let result = if self.stack.len() > base {
                    self.pop()?
                } else {
                    Value::Nil
                };
                if let Some(err) = self.run_frame_defers() {
                    return Err(err);
                }
                return Ok(Step::Done(result));
            }
        }
        Ok(Step::Continue)
    }

    // ------------------------------------------------------------------
    // Calls and frames
    // ------------------------------------------------------------------

    fn call_value(&mut self, callee: Value, args: Vec<Value>) -> RunResult<()> {
        match callee {
            Value::Builtin(builtin) => {
                let mut full = args;
                if let Some(receiver) = &builtin.receiver {
                    full.insert(0, receiver.clone());
                }
                let result = (builtin.func)(self, &full)?;
                self.push(result)
            }
            Value::Function(func) => self.push_frame(func, vec![], args),
            Value::Closure(closure) => self.push_frame(closure.func.clone(), closure.free.clone(), args),
            Value::Cell(cell) => {
                let inner = cell.borrow().clone();
                self.call_value(inner, args)
            }
            other => Err(RuntimeError::new(format!(
                "type {} is not callable",
                other.type_name()
            ))),
        }
    }

    fn push_frame(&mut self, func: Rc<CompiledFunction>, free: Vec<Cell>, mut args: Vec<Value>) -> RunResult<()> {
        if self.frames.len() >= self.limits.max_frames {
            return Err(RuntimeError::StackOverflow);
        }
        let want = func.num_params as usize;
        if func.variadic {
            if args.len() < want - 1 {
                return Err(RuntimeError::new(format!(
                    "wrong number of arguments: want at least {}, got {}",
                    want - 1,
                    args.len()
                )));
            }
            let rest = args.split_off(want - 1);
            args.push(Value::Tuple(Rc::from(rest)));
        } else if args.len() != want {
            return Err(RuntimeError::new(format!(
                "wrong number of arguments: want {want}, got {}",
                args.len()
            )));
        }

        let mut locals = args;
        locals.resize(func.num_locals as usize, Value::Nil);
        self.frames.push(Frame {
            callee: func,
            free,
            ip: 0,
            base: self.stack.len(),
            locals,
            defers: vec![],
            handlers: vec![],
        });
        Ok(())
    }

    /// Runs the current frame's deferred calls in LIFO order. Errors chain:
    /// a later error wraps the earlier one as its cause, and non-catchable
    /// limit errors always win.
    fn run_frame_defers(&mut self) -> Option<RuntimeError> {
        let mut pending: Option<RuntimeError> = None;
        while let Some(record) = self.frame().defers.pop() {
            if let Err(err) = self.run_call(record.callee, record.args) {
                pending = Some(match pending {
                    None => err,
                    Some(prev) => chain_errors(err, prev),
                });
            }
        }
        pending
    }

    /// Unwinds after an error: searches the current frame's handlers, then
    /// pops frames (running their defers) down to `base_depth`. Returns
    /// `Ok(())` when a handler took over, `Err` when the error escapes the
    /// loop.
    fn handle_error(&mut self, mut err: RuntimeError, base_depth: usize) -> Result<(), RuntimeError> {
        loop {
            if self.frames.len() == base_depth {
                return Err(err);
            }
            if err.is_catchable() {
                let mut found = None;
                let frame = self.frame();
                let ip = frame.ip;
                while let Some(handler) = frame.handlers.pop() {
                    // Stale handlers (left by a branch out of the block)
                    // fail the range check and are simply dropped.
                    if ip > handler.body_start && ip <= handler.end_pc {
                        found = Some(handler);
                        break;
                    }
                }
                if let Some(handler) = found {
                    let error = err
                        .to_error_value()
                        .expect("catchable errors carry a value");
                    let error = Value::Error(error);
                    self.frame().ip = handler.catch_pc;
                    self.stack.truncate(handler.stack_len);
                    self.push(error)?;
                    return Ok(());
                }
            }
            // No handler here: run deferred calls, then propagate outward.
            if let Some(defer_err) = self.run_frame_defers() {
                err = chain_errors(defer_err, err);
            }
            let frame = self.frames.pop().expect("frame during unwind");
            self.stack.truncate(frame.base);
        }
    }

    // ------------------------------------------------------------------
    // Stack primitives
    // ------------------------------------------------------------------

    fn push(&mut self, value: Value) -> RunResult<()> {
        if self.stack.len() >= self.limits.max_stack {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> RunResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| invalid_bytecode("stack underflow"))
    }

    fn peek(&self) -> RunResult<&Value> {
        self.stack
            .last()
            .ok_or_else(|| invalid_bytecode("stack underflow"))
    }

    fn peek_at(&self, depth: usize) -> RunResult<&Value> {
        let len = self.stack.len();
        self.stack
            .get(len.checked_sub(depth + 1).ok_or_else(|| invalid_bytecode("stack underflow"))?)
            .ok_or_else(|| invalid_bytecode("stack underflow"))
    }

    fn pop_many(&mut self, count: usize) -> RunResult<Vec<Value>> {
        let len = self.stack.len();
        let at = len
            .checked_sub(count)
            .ok_or_else(|| invalid_bytecode("stack underflow"))?;
        Ok(self.stack.split_off(at))
    }

    /// Pops `count` argument slots, expanding spread markers when the splat
    /// flag was set.
    fn pop_args(&mut self, count: usize, splat: bool) -> RunResult<Vec<Value>> {
        let raw = self.pop_many(count)?;
        if !splat {
            return Ok(raw);
        }
        let mut out = Vec::with_capacity(raw.len());
        for value in raw {
            match value {
                Value::Spread(items) => out.extend(items.iter().cloned()),
                other => out.push(other),
            }
        }
        Ok(out)
    }

    fn pop_return_values(&mut self, count: usize) -> RunResult<Value> {
        match count {
            0 => Ok(Value::Nil),
            1 => self.pop(),
            n => {
                let values = self.pop_many(n)?;
                Ok(Value::Tuple(Rc::from(values)))
            }
        }
    }

    fn jump_to(&mut self, at: usize, target: usize) -> RunResult<()> {
        if target <= at {
            // Backward jumps are suspension points: loops stay cancelable.
            self.check_suspension()?;
        }
        self.frame().ip = target;
        Ok(())
    }

    fn check_suspension(&mut self) -> RunResult<()> {
        if let Some(cancel) = &self.limits.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(RuntimeError::Canceled);
            }
        }
        if self.budget_left == Some(0) {
            return Err(RuntimeError::BudgetExhausted);
        }
        Ok(())
    }
}

/// The later error wraps the earlier one as its cause; limit errors always
/// take precedence because they must reach the embedder.
fn chain_errors(new: RuntimeError, old: RuntimeError) -> RuntimeError {
    match (new, old) {
        (new, old @ (RuntimeError::Canceled | RuntimeError::BudgetExhausted | RuntimeError::StackOverflow)) => {
            let _ = new;
            old
        }
        (RuntimeError::Raised(new), RuntimeError::Raised(old)) => RuntimeError::Raised(Rc::new(ErrorValue {
            message: new.message.clone(),
            cause: Some(old),
        })),
        (new, _) => new,
    }
}

fn invalid_bytecode(detail: impl Into<String>) -> RuntimeError {
    RuntimeError::new(format!("invalid bytecode: {}", detail.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op::make;
    use crate::io::CollectStringPrint;
    use pretty_assertions::assert_eq;

    /// Builds a raw unit around hand-assembled instructions; this is how the
    /// ABI-only paths (e.g. `Tuple`, `Defer` receivers) get exercised.
    fn raw_unit(chunks: &[Vec<u8>], constants: Vec<Value>) -> Bytecode {
        let mut instructions = vec![];
        for chunk in chunks {
            instructions.extend_from_slice(chunk);
        }
        Bytecode {
            main: Rc::new(CompiledFunction {
                instructions,
                num_locals: 0,
                num_params: 0,
                variadic: false,
                source_file: "test.toy".into(),
            }),
            constants,
            num_globals: 0,
            file_name: "test.toy".into(),
        }
    }

    fn run_raw(unit: &Bytecode) -> RunResult<Value> {
        let modules = ModuleRegistry::standard();
        let builtins = BuiltinRegistry::standard();
        let mut out = CollectStringPrint::new();
        let mut vm = Vm::new(&modules, &builtins, &mut out);
        vm.run(unit)
    }

    #[test]
    fn tuple_opcode_builds_tuples() {
        let unit = raw_unit(
            &[
                make(Opcode::Constant, &[0]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Tuple, &[2, 0]),
                make(Opcode::Suspend, &[]),
            ],
            vec![Value::Int(1), Value::Int(2)],
        );
        let result = run_raw(&unit).unwrap();
        assert_eq!(result.to_string(), "(1, 2)");
    }

    #[test]
    fn tuple_opcode_expands_splats() {
        let unit = raw_unit(
            &[
                make(Opcode::Constant, &[0]),
                make(Opcode::Splat, &[]),
                make(Opcode::Constant, &[1]),
                make(Opcode::Tuple, &[2, 1]),
                make(Opcode::Suspend, &[]),
            ],
            vec![
                Value::array(vec![Value::Int(1), Value::Int(2)]),
                Value::Int(3),
            ],
        );
        let result = run_raw(&unit).unwrap();
        assert_eq!(result.to_string(), "(1, 2, 3)");
    }

    #[test]
    fn undocumented_opcode_is_rejected() {
        let mut unit = raw_unit(&[make(Opcode::Suspend, &[])], vec![]);
        let mut main = (*unit.main).clone();
        main.instructions = vec![0xfe];
        unit.main = Rc::new(main);
        let err = run_raw(&unit).unwrap_err();
        assert!(err.to_string().contains("undocumented opcode"));
    }

    #[test]
    fn throw_wraps_non_error_values() {
        let unit = raw_unit(
            &[make(Opcode::Constant, &[0]), make(Opcode::Throw, &[1])],
            vec![Value::string("boom")],
        );
        let err = run_raw(&unit).unwrap_err();
        let RuntimeError::Raised(e) = err else {
            panic!("expected raised error");
        };
        assert_eq!(e.message, "boom");
    }

    #[test]
    fn budget_exhaustion_stops_loops() {
        // 0: JMP 0 — an infinite loop of backward jumps.
        let unit = raw_unit(&[make(Opcode::Jump, &[0])], vec![]);
        let modules = ModuleRegistry::standard();
        let builtins = BuiltinRegistry::standard();
        let mut out = CollectStringPrint::new();
        let limits = Limits {
            budget: Some(1000),
            ..Limits::default()
        };
        let mut vm = Vm::with_limits(&modules, &builtins, &mut out, limits);
        let err = vm.run(&unit).unwrap_err();
        assert!(matches!(err, RuntimeError::BudgetExhausted));
    }

    #[test]
    fn cancellation_is_observed() {
        let unit = raw_unit(&[make(Opcode::Jump, &[0])], vec![]);
        let modules = ModuleRegistry::standard();
        let builtins = BuiltinRegistry::standard();
        let mut out = CollectStringPrint::new();
        let cancel = Arc::new(AtomicBool::new(true));
        let limits = Limits {
            cancel: Some(cancel),
            ..Limits::default()
        };
        let mut vm = Vm::with_limits(&modules, &builtins, &mut out, limits);
        let err = vm.run(&unit).unwrap_err();
        assert!(matches!(err, RuntimeError::Canceled));
    }

    #[test]
    fn deferred_builtin_receiver_binding() {
        // receiver "x", callee fmt.print-like builtin bound via DEFER's
        // has-receiver flag; at SUSPEND the defer runs and prints it.
        fn echo(vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
            vm.print(&args[0].to_print());
            Ok(Value::Nil)
        }
        let builtin = Value::Builtin(Rc::new(crate::value::BuiltinFunction::new("echo", echo)));
        let unit = raw_unit(
            &[
                make(Opcode::Constant, &[0]), // receiver
                make(Opcode::Constant, &[1]), // callee
                make(Opcode::Defer, &[0, 0, 1]),
                make(Opcode::Suspend, &[]),
            ],
            vec![Value::string("bound"), builtin],
        );
        let modules = ModuleRegistry::standard();
        let builtins = BuiltinRegistry::standard();
        let mut out = CollectStringPrint::new();
        let mut vm = Vm::new(&modules, &builtins, &mut out);
        vm.run(&unit).unwrap();
        assert_eq!(out.output(), "bound");
    }
}
