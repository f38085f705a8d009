//! Runtime values.
//!
//! A [`Value`] is a tagged sum. Small payloads (ints, floats, chars, bools)
//! are stored inline; strings, bytes, containers, functions and closures are
//! held behind shared-ownership `Rc` handles, so cloning a value is cheap
//! and closures can share mutable upvalue cells.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::BuildHasher;
use std::rc::Rc;

use ahash::RandomState;
use indexmap::IndexMap;

use crate::error::{RunResult, RuntimeError};

/// Fixed-seed hasher state so value hashes are stable within a process.
///
/// Tables and the hash builtin must agree on hashes for the lifetime of a
/// VM; per-instance random seeds would break rehashing of persisted globals.
fn hasher() -> RandomState {
    RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
}

/// A shared, mutable upvalue cell.
///
/// Every closure that captures the same outer local holds a clone of the
/// same cell, so writes through one closure are visible through all.
pub type Cell = Rc<RefCell<Value>>;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(Rc<str>),
    Bytes(Rc<[u8]>),
    Array(Rc<RefCell<Array>>),
    Tuple(Rc<[Value]>),
    Table(Rc<RefCell<Table>>),
    Function(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(Rc<BuiltinFunction>),
    Error(Rc<ErrorValue>),
    User(Rc<dyn UserObject>),

    /// Internal: a promoted local slot or captured free variable. Never
    /// observable from scripts; reads and writes see through it.
    Cell(Cell),
    /// Internal: marker pushed by `Splat` so a splat-bearing call or
    /// composite literal can expand it in place.
    Spread(Rc<Vec<Value>>),
    /// Internal: a live iterator created by `IteratorInit`, kept on the
    /// stack for the duration of a `for … in` loop.
    Iterator(Rc<RefCell<crate::iterator::ValueIterator>>),
}

impl Value {
    /// Convenience constructor for string values.
    #[must_use]
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Rc::from(s.as_ref()))
    }

    /// Convenience constructor for array values.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(Array::new(items))))
    }

    /// Convenience constructor for error values.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Value {
        Value::Error(Rc::new(ErrorValue::new(message)))
    }

    /// The value's type name, as reported by `type_name()` and used in
    /// error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
            Value::Closure(_) => "closure",
            Value::Builtin(_) => "builtin-function",
            Value::Error(_) => "error",
            Value::User(u) => u.type_name(),
            Value::Cell(c) => c.borrow().type_name(),
            Value::Spread(_) => "spread",
            Value::Iterator(_) => "iterator",
        }
    }

    /// Truthiness: nil, false, numeric zero and empty strings/containers are
    /// falsy; everything else is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Char(c) => *c != '\0',
            Value::String(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Array(a) => !a.borrow().items.is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Table(t) => !t.borrow().entries.is_empty(),
            Value::Function(_) | Value::Closure(_) | Value::Builtin(_) | Value::Error(_) => true,
            Value::User(u) => u.is_truthy(),
            Value::Cell(c) => c.borrow().is_truthy(),
            Value::Spread(_) | Value::Iterator(_) => true,
        }
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Structural clone: containers are copied element by element, so the
    /// result shares no mutable state with the original. Copies are
    /// unfrozen.
    #[must_use]
    pub fn copy(&self) -> Value {
        match self {
            Value::Array(a) => {
                let items = a.borrow().items.iter().map(Value::copy).collect();
                Value::Array(Rc::new(RefCell::new(Array::new(items))))
            }
            Value::Tuple(t) => Value::Tuple(t.iter().map(Value::copy).collect()),
            Value::Table(t) => {
                let mut copy = Table::new();
                for (key, value) in &t.borrow().entries {
                    copy.entries.insert(key.clone(), value.copy());
                }
                Value::Table(Rc::new(RefCell::new(copy)))
            }
            Value::Cell(c) => c.borrow().copy(),
            other => other.clone(),
        }
    }

    /// Structural equality. Numeric values compare across int/float; arrays,
    /// tuples and tables compare element-wise; functions, closures and
    /// builtins compare by identity.
    #[must_use]
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Char(a), Value::Int(b)) | (Value::Int(b), Value::Char(a)) => i64::from(u32::from(*a)) == *b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.items.len() == b.items.len()
                    && a.items.iter().zip(b.items.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Table(a), Value::Table(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.entries.len() == b.entries.len()
                    && a.entries
                        .iter()
                        .all(|(k, v)| b.entries.get(k).is_some_and(|w| v.equals(w)))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b) || a.message == b.message,
            (Value::User(a), _) => a.eq_value(other),
            (_, Value::User(b)) => b.eq_value(self),
            (Value::Cell(a), _) => a.borrow().equals(other),
            (_, Value::Cell(b)) => self.equals(&b.borrow()),
            _ => false,
        }
    }

    /// Ordering for `< <= > >=`. `None` means the operand types have no
    /// defined order and the comparison throws.
    #[must_use]
    pub fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Char(a), Value::Char(b)) => a.partial_cmp(b),
            (Value::Char(a), Value::Int(b)) => i64::from(u32::from(*a)).partial_cmp(b),
            (Value::Int(a), Value::Char(b)) => a.partial_cmp(&i64::from(u32::from(*b))),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// The opaque 64-bit hash for hashable values; `None` for unhashable
    /// ones (arrays, tables, functions, closures, unless a user type opts
    /// in).
    #[must_use]
    pub fn hash_u64(&self) -> Option<u64> {
        let state = hasher();
        match self {
            Value::Nil => Some(state.hash_one(0u8)),
            Value::Bool(b) => Some(state.hash_one((1u8, b))),
            // Ints and equal-valued floats must hash alike, since they
            // compare equal.
            Value::Int(v) => Some(state.hash_one((2u8, *v))),
            Value::Float(v) => {
                if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v <= i64::MAX as f64 {
                    Some(state.hash_one((2u8, *v as i64)))
                } else {
                    Some(state.hash_one((3u8, v.to_bits())))
                }
            }
            Value::Char(c) => Some(state.hash_one((4u8, *c))),
            Value::String(s) => Some(state.hash_one((5u8, s.as_ref()))),
            Value::Bytes(b) => Some(state.hash_one((6u8, b.as_ref()))),
            Value::Tuple(items) => {
                let mut acc = state.hash_one(7u8);
                for item in items.iter() {
                    acc = acc.rotate_left(13) ^ item.hash_u64()?;
                }
                Some(acc)
            }
            Value::Error(e) => Some(state.hash_one((8u8, &e.message))),
            Value::User(u) => u.hash_u64(),
            Value::Cell(c) => c.borrow().hash_u64(),
            _ => None,
        }
    }

    /// The printable form used by `fmt.print`: strings and chars appear
    /// unquoted, everything else as its repr.
    #[must_use]
    pub fn to_print(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Error(e) => e.message.clone(),
            Value::Cell(c) => c.borrow().to_print(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    /// The repr form: strings quoted, containers with bracketed elements.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => {
                f.write_str("bytes(")?;
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{byte:02x}")?;
                }
                f.write_str(")")
            }
            Value::Array(a) => {
                f.write_str("[")?;
                for (i, item) in a.borrow().items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Value::Table(t) => {
                f.write_str("{")?;
                for (i, (key, value)) in t.borrow().entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {value}", key.value)?;
                }
                f.write_str("}")
            }
            Value::Function(func) => write!(f, "<function:{}>", func.num_params),
            Value::Closure(c) => write!(f, "<closure:{}>", c.func.num_params),
            Value::Builtin(b) => write!(f, "<builtin:{}>", b.name),
            Value::Error(e) => write!(f, "error({:?})", e.message),
            Value::User(u) => f.write_str(&u.display()),
            Value::Cell(c) => write!(f, "{}", c.borrow()),
            Value::Spread(_) => f.write_str("<spread>"),
            Value::Iterator(_) => f.write_str("<iterator>"),
        }
    }
}

/// A mutable, ordered array.
#[derive(Debug, Default)]
pub struct Array {
    pub items: Vec<Value>,
    pub frozen: bool,
}

impl Array {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self { items, frozen: false }
    }
}

/// A table key: a hashable value with its precomputed hash.
#[derive(Debug, Clone)]
pub struct Key {
    pub value: Value,
    hash: u64,
}

impl Key {
    /// Wraps a value as a table key, failing for unhashable values.
    pub fn new(value: Value) -> RunResult<Key> {
        match value.hash_u64() {
            Some(hash) => Ok(Key { value, hash }),
            None => Err(RuntimeError::new(format!(
                "type {} is not hashable",
                value.type_name()
            ))),
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.value.equals(&other.value)
    }
}

impl Eq for Key {}

impl std::hash::Hash for Key {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// An insertion-ordered table.
#[derive(Debug)]
pub struct Table {
    pub entries: IndexMap<Key, Value, RandomState>,
    pub frozen: bool,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::with_hasher(hasher()),
            frozen: false,
        }
    }

    /// Builds a table value from string keys, the shape used for module
    /// tables.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Value {
        let mut table = Table::new();
        for (name, value) in pairs {
            let key = Key::new(Value::string(name)).expect("string keys are hashable");
            table.entries.insert(key, value);
        }
        Value::Table(Rc::new(RefCell::new(table)))
    }
}

/// A compiled function body.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    pub num_locals: u16,
    pub num_params: u8,
    /// True when the final parameter packs surplus arguments into a tuple.
    pub variadic: bool,
    /// Name of the source file this function was compiled from.
    pub source_file: String,
}

/// A closure: a function plus its captured upvalue cells.
#[derive(Debug)]
pub struct Closure {
    pub func: Rc<CompiledFunction>,
    pub free: Vec<Cell>,
}

/// Host-provided function signature: runtime handle plus argument slice.
pub type BuiltinFn = fn(&mut crate::vm::Vm<'_>, &[Value]) -> RunResult<Value>;

/// A host-provided callable, optionally bound to a receiver.
pub struct BuiltinFunction {
    pub name: String,
    pub func: BuiltinFn,
    pub receiver: Option<Value>,
}

impl BuiltinFunction {
    #[must_use]
    pub fn new(name: impl Into<String>, func: BuiltinFn) -> Self {
        Self {
            name: name.into(),
            func,
            receiver: None,
        }
    }

    /// Returns a copy of this builtin bound to the given receiver.
    #[must_use]
    pub fn bind(&self, receiver: Value) -> Self {
        Self {
            name: self.name.clone(),
            func: self.func,
            receiver: Some(receiver),
        }
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("bound", &self.receiver.is_some())
            .finish()
    }
}

/// A script error value: message plus optional cause chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub message: String,
    pub cause: Option<Rc<ErrorValue>>,
}

impl ErrorValue {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        let mut cause = self.cause.as_ref();
        while let Some(c) = cause {
            write!(f, ": caused by: {}", c.message)?;
            cause = c.cause.as_ref();
        }
        Ok(())
    }
}

/// Capability interface for host-defined value types.
///
/// Every method has a conservative default; a user type opts into
/// comparison, hashing, indexing and iteration by overriding the
/// corresponding method.
pub trait UserObject: fmt::Debug {
    /// The type name reported to scripts.
    fn type_name(&self) -> &'static str;

    /// Printable form.
    fn display(&self) -> String;

    fn is_truthy(&self) -> bool {
        true
    }

    /// Equality against another value. Defaults to never equal.
    fn eq_value(&self, _other: &Value) -> bool {
        false
    }

    /// Opt-in hashing; `None` keeps the type unhashable.
    fn hash_u64(&self) -> Option<u64> {
        None
    }

    /// Opt-in indexing: `value[key]`.
    fn index(&self, _key: &Value) -> Option<Value> {
        None
    }

    /// Opt-in iteration: yields `(key, value)` pairs.
    fn iterate(&self) -> Option<Box<dyn Iterator<Item = (Value, Value)>>> {
        None
    }
}

/// Transitively freezes a value.
///
/// Arrays and tables reject mutation once frozen; tuples are never frozen
/// themselves (they are structurally immutable) but their contents are
/// recursed into so a frozen structure cannot smuggle a mutable container.
pub fn freeze(value: &Value) {
    match value {
        Value::Array(a) => {
            // Marking frozen before recursing also terminates on cycles.
            // Items are cloned out so a self-referencing array does not
            // re-borrow while the borrow is live.
            let items = {
                let mut array = a.borrow_mut();
                if array.frozen {
                    return;
                }
                array.frozen = true;
                array.items.clone()
            };
            for item in &items {
                freeze(item);
            }
        }
        Value::Table(t) => {
            let values: Vec<Value> = {
                let mut table = t.borrow_mut();
                if table.frozen {
                    return;
                }
                table.frozen = true;
                table.entries.values().cloned().collect()
            };
            for item in &values {
                freeze(item);
            }
        }
        Value::Tuple(items) => {
            for item in items.iter() {
                freeze(item);
            }
        }
        Value::Cell(c) => freeze(&c.borrow()),
        _ => {}
    }
}

/// Whether a container value is frozen. Non-containers report `true`: they
/// are immutable to begin with.
#[must_use]
pub fn is_frozen(value: &Value) -> bool {
    match value {
        Value::Array(a) => a.borrow().frozen,
        Value::Table(t) => t.borrow().frozen,
        Value::Tuple(items) => items.iter().all(is_frozen),
        Value::Cell(c) => is_frozen(&c.borrow()),
        _ => true,
    }
}

/// Reads `container[key]`.
///
/// Missing table keys read as nil; out-of-range sequence indices throw.
pub fn index_get(container: &Value, key: &Value) -> RunResult<Value> {
    match container {
        Value::Array(a) => {
            let items = &a.borrow().items;
            let idx = seq_index(key, items.len())?;
            Ok(items[idx].clone())
        }
        Value::Tuple(items) => {
            let idx = seq_index(key, items.len())?;
            Ok(items[idx].clone())
        }
        Value::String(s) => {
            let count = s.chars().count();
            let idx = seq_index(key, count)?;
            Ok(Value::Char(s.chars().nth(idx).unwrap_or('\0')))
        }
        Value::Bytes(b) => {
            let idx = seq_index(key, b.len())?;
            Ok(Value::Int(i64::from(b[idx])))
        }
        Value::Table(t) => {
            let key = Key::new(key.clone())?;
            Ok(t.borrow().entries.get(&key).cloned().unwrap_or(Value::Nil))
        }
        Value::Error(e) => match key {
            // Error values expose their message and cause as fields.
            Value::String(s) if s.as_ref() == "message" => Ok(Value::string(&e.message)),
            Value::String(s) if s.as_ref() == "cause" => Ok(e
                .cause
                .as_ref()
                .map_or(Value::Nil, |c| Value::Error(c.clone()))),
            _ => Ok(Value::Nil),
        },
        Value::User(u) => u
            .index(key)
            .ok_or_else(|| RuntimeError::new(format!("type {} is not indexable", u.type_name()))),
        Value::Cell(c) => index_get(&c.borrow(), key),
        other => Err(RuntimeError::new(format!(
            "type {} is not indexable",
            other.type_name()
        ))),
    }
}

/// Stores `container[key] = value`.
pub fn index_set(container: &Value, key: Value, value: Value) -> RunResult<()> {
    match container {
        Value::Array(a) => {
            let mut array = a.borrow_mut();
            if array.frozen {
                return Err(RuntimeError::new("cannot assign to frozen array"));
            }
            let idx = seq_index(&key, array.items.len())?;
            array.items[idx] = value;
            Ok(())
        }
        Value::Table(t) => {
            let mut table = t.borrow_mut();
            if table.frozen {
                return Err(RuntimeError::new("cannot assign to frozen table"));
            }
            table.entries.insert(Key::new(key)?, value);
            Ok(())
        }
        Value::Cell(c) => index_set(&c.borrow(), key, value),
        other => Err(RuntimeError::new(format!(
            "type {} does not support index assignment",
            other.type_name()
        ))),
    }
}

/// Evaluates `container[low:high]` with optional bounds.
///
/// Bounds clamp to `0..len`; `low > high` throws.
pub fn slice(container: &Value, low: Option<&Value>, high: Option<&Value>) -> RunResult<Value> {
    let len = match container {
        Value::Array(a) => a.borrow().items.len(),
        Value::Tuple(t) => t.len(),
        Value::String(s) => s.chars().count(),
        Value::Bytes(b) => b.len(),
        Value::Cell(c) => return slice(&c.borrow(), low, high),
        other => {
            return Err(RuntimeError::new(format!(
                "type {} is not sliceable",
                other.type_name()
            )))
        }
    };
    let low = slice_bound(low, 0, len)?;
    let high = slice_bound(high, len, len)?;
    if low > high {
        return Err(RuntimeError::new(format!(
            "invalid slice indices: {low} > {high}"
        )));
    }
    Ok(match container {
        Value::Array(a) => Value::array(a.borrow().items[low..high].to_vec()),
        Value::Tuple(t) => Value::Tuple(t[low..high].iter().cloned().collect()),
        Value::String(s) => Value::string(s.chars().skip(low).take(high - low).collect::<String>()),
        Value::Bytes(b) => Value::Bytes(Rc::from(&b[low..high])),
        _ => unreachable!("checked above"),
    })
}

fn slice_bound(bound: Option<&Value>, default: usize, len: usize) -> RunResult<usize> {
    match bound {
        None => Ok(default),
        Some(Value::Int(v)) => {
            // Negative bounds clamp to the start, oversized ones to the end.
            Ok((*v).clamp(0, len as i64) as usize)
        }
        Some(other) => Err(RuntimeError::new(format!(
            "slice bound must be int, not {}",
            other.type_name()
        ))),
    }
}

/// Validates a sequence index: an int within `0..len`.
fn seq_index(key: &Value, len: usize) -> RunResult<usize> {
    match key {
        Value::Int(v) => {
            if *v >= 0 && (*v as usize) < len {
                Ok(*v as usize)
            } else {
                Err(RuntimeError::new(format!(
                    "index {v} out of range [0:{len}]"
                )))
            }
        }
        other => Err(RuntimeError::new(format!(
            "index must be int, not {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::array(vec![]).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(Value::error("e").is_truthy());
    }

    #[test]
    fn numeric_cross_equality_and_hash() {
        assert!(Value::Int(3).equals(&Value::Float(3.0)));
        assert_eq!(Value::Int(3).hash_u64(), Value::Float(3.0).hash_u64());
        assert!(!Value::Int(3).equals(&Value::Float(3.5)));
    }

    #[test]
    fn structural_equality() {
        let a = Value::array(vec![Value::Int(1), Value::string("x")]);
        let b = Value::array(vec![Value::Int(1), Value::string("x")]);
        assert!(a.equals(&b));
        let c = Value::array(vec![Value::Int(2)]);
        assert!(!a.equals(&c));
    }

    #[test]
    fn unhashable_values() {
        assert!(Value::array(vec![]).hash_u64().is_none());
        assert!(Value::Table(Rc::new(RefCell::new(Table::new()))).hash_u64().is_none());
        assert!(Value::Tuple(Rc::from(vec![Value::Int(1)])).hash_u64().is_some());
        assert!(Value::Tuple(Rc::from(vec![Value::array(vec![])])).hash_u64().is_none());
    }

    #[test]
    fn copy_is_deep() {
        let inner = Value::array(vec![Value::Int(1)]);
        let outer = Value::array(vec![inner.clone()]);
        let copy = outer.copy();
        if let Value::Array(a) = &inner {
            a.borrow_mut().items[0] = Value::Int(99);
        }
        assert_eq!(copy.to_string(), "[[1]]");
        assert_eq!(outer.to_string(), "[[99]]");
    }

    #[test]
    fn freeze_is_transitive_and_rejects_mutation() {
        let inner = Value::array(vec![Value::Int(1)]);
        let outer = Value::array(vec![inner.clone()]);
        freeze(&outer);
        assert!(is_frozen(&outer));
        assert!(is_frozen(&inner));
        let err = index_set(&inner, Value::Int(0), Value::Int(2)).unwrap_err();
        assert!(err.to_string().contains("frozen"));
    }

    #[test]
    fn table_round_trip_with_mixed_keys() {
        let table = Value::Table(Rc::new(RefCell::new(Table::new())));
        index_set(&table, Value::string("k"), Value::Int(1)).unwrap();
        index_set(&table, Value::Int(2), Value::string("two")).unwrap();
        assert!(index_get(&table, &Value::string("k")).unwrap().equals(&Value::Int(1)));
        assert!(index_get(&table, &Value::Int(2)).unwrap().equals(&Value::string("two")));
        // Missing keys read as nil.
        assert!(index_get(&table, &Value::string("absent")).unwrap().is_nil());
        // Unhashable keys are rejected.
        assert!(index_set(&table, Value::array(vec![]), Value::Nil).is_err());
    }

    #[test]
    fn string_indexing_is_char_based() {
        let s = Value::string("héllo");
        assert!(index_get(&s, &Value::Int(1)).unwrap().equals(&Value::Char('é')));
        assert!(index_get(&s, &Value::Int(5)).is_err());
    }

    #[test]
    fn slicing() {
        let a = Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(slice(&a, Some(&Value::Int(1)), None).unwrap().to_string(), "[2, 3]");
        assert_eq!(slice(&a, None, Some(&Value::Int(2))).unwrap().to_string(), "[1, 2]");
        assert_eq!(slice(&a, Some(&Value::Int(-5)), Some(&Value::Int(99))).unwrap().to_string(), "[1, 2, 3]");
        assert!(slice(&a, Some(&Value::Int(2)), Some(&Value::Int(1))).is_err());

        let s = Value::string("héllo");
        assert_eq!(slice(&s, Some(&Value::Int(1)), Some(&Value::Int(3))).unwrap().to_print(), "él");
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::string("hi").to_string(), "\"hi\"");
        assert_eq!(Value::string("hi").to_print(), "hi");
        assert_eq!(Value::error("boom").to_print(), "boom");
        assert_eq!(Value::error("boom").to_string(), "error(\"boom\")");
        let t = Value::Tuple(Rc::from(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(t.to_string(), "(1, 2)");
    }
}
