//! The builtin-function registry.
//!
//! Builtins resolve by name at compile time (through the symbol table's
//! builtin scope) and by index at run time (`GetBuiltin`). The standard set
//! below always occupies the low indices, with `import` fixed at index 0;
//! embedders append their own builtins after it with
//! [`BuiltinRegistry::register`].

use std::rc::Rc;

use crate::error::{RunResult, RuntimeError};
use crate::value::{freeze, is_frozen, BuiltinFn, BuiltinFunction, UserObject, Value};
use crate::vm::Vm;

/// Index of the `import` builtin; the compiler lowers `import("name")`
/// against it.
pub const IMPORT_INDEX: u16 = 0;

/// The builtin table shared by the compiler (names) and the VM (indices).
#[derive(Debug)]
pub struct BuiltinRegistry {
    funcs: Vec<Rc<BuiltinFunction>>,
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl BuiltinRegistry {
    /// The standard registry: `import` plus the core helpers.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self { funcs: vec![] };
        for (name, func) in STANDARD {
            registry.register(name, *func);
        }
        registry
    }

    /// Appends a host builtin, returning its index.
    pub fn register(&mut self, name: &str, func: BuiltinFn) -> u16 {
        let index = u16::try_from(self.funcs.len()).expect("too many builtins");
        self.funcs.push(Rc::new(BuiltinFunction::new(name, func)));
        index
    }

    /// Iterates `(index, name)` pairs for symbol-table registration.
    pub fn names(&self) -> impl Iterator<Item = (u16, &str)> + '_ {
        self.funcs
            .iter()
            .enumerate()
            .map(|(i, f)| (i as u16, f.name.as_str()))
    }

    /// Looks up a builtin by index.
    #[must_use]
    pub fn get(&self, index: u16) -> Option<&Rc<BuiltinFunction>> {
        self.funcs.get(index as usize)
    }
}

const STANDARD: &[(&str, BuiltinFn)] = &[
    ("import", builtin_import),
    ("len", builtin_len),
    ("copy", builtin_copy),
    ("freeze", builtin_freeze),
    ("is_frozen", builtin_is_frozen),
    ("type_name", builtin_type_name),
    ("string", builtin_string),
    ("int", builtin_int),
    ("float", builtin_float),
    ("bool", builtin_bool),
    ("char", builtin_char),
    ("error", builtin_error),
    ("range", builtin_range),
];

fn want_args(name: &str, args: &[Value], n: usize) -> RunResult<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(RuntimeError::new(format!(
            "{name} expects {n} argument(s), got {}",
            args.len()
        )))
    }
}

fn builtin_import(vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("import", args, 1)?;
    match &args[0] {
        Value::String(name) => vm.import_module(name),
        other => Err(RuntimeError::new(format!(
            "import expects a module name string, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_len(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("len", args, 1)?;
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Bytes(b) => b.len(),
        Value::Array(a) => a.borrow().items.len(),
        Value::Tuple(t) => t.len(),
        Value::Table(t) => t.borrow().entries.len(),
        other => {
            return Err(RuntimeError::new(format!(
                "len does not apply to {}",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(len as i64))
}

fn builtin_copy(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("copy", args, 1)?;
    Ok(args[0].copy())
}

fn builtin_freeze(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("freeze", args, 1)?;
    freeze(&args[0]);
    Ok(args[0].clone())
}

fn builtin_is_frozen(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("is_frozen", args, 1)?;
    Ok(Value::Bool(is_frozen(&args[0])))
}

fn builtin_type_name(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("type_name", args, 1)?;
    Ok(Value::string(args[0].type_name()))
}

fn builtin_string(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("string", args, 1)?;
    Ok(Value::string(args[0].to_print()))
}

fn builtin_int(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("int", args, 1)?;
    let v = match &args[0] {
        Value::Int(v) => *v,
        Value::Float(f) => *f as i64,
        Value::Bool(b) => i64::from(*b),
        Value::Char(c) => i64::from(u32::from(*c)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| RuntimeError::new(format!("cannot convert {s:?} to int")))?,
        other => {
            return Err(RuntimeError::new(format!(
                "cannot convert {} to int",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(v))
}

fn builtin_float(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("float", args, 1)?;
    let v = match &args[0] {
        Value::Int(v) => *v as f64,
        Value::Float(f) => *f,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| RuntimeError::new(format!("cannot convert {s:?} to float")))?,
        other => {
            return Err(RuntimeError::new(format!(
                "cannot convert {} to float",
                other.type_name()
            )))
        }
    };
    Ok(Value::Float(v))
}

fn builtin_bool(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("bool", args, 1)?;
    Ok(Value::Bool(args[0].is_truthy()))
}

fn builtin_char(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("char", args, 1)?;
    let c = match &args[0] {
        Value::Char(c) => *c,
        Value::Int(v) => u32::try_from(*v)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| RuntimeError::new(format!("{v} is not a valid char")))?,
        other => {
            return Err(RuntimeError::new(format!(
                "cannot convert {} to char",
                other.type_name()
            )))
        }
    };
    Ok(Value::Char(c))
}

fn builtin_error(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    want_args("error", args, 1)?;
    Ok(Value::error(args[0].to_print()))
}

fn builtin_range(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    let (start, end, step) = match args {
        [Value::Int(end)] => (0, *end, 1),
        [Value::Int(start), Value::Int(end)] => (*start, *end, 1),
        [Value::Int(start), Value::Int(end), Value::Int(step)] => (*start, *end, *step),
        _ => {
            return Err(RuntimeError::new(
                "range expects 1 to 3 int arguments",
            ))
        }
    };
    if step == 0 {
        return Err(RuntimeError::new("range step must not be zero"));
    }
    Ok(Value::User(Rc::new(Range { start, end, step })))
}

/// The iterable produced by `range(...)`; also the reference implementation
/// of the [`UserObject`] capability interface.
#[derive(Debug, Clone, Copy)]
struct Range {
    start: i64,
    end: i64,
    step: i64,
}

impl Range {
    fn len(&self) -> i64 {
        let span = if self.step > 0 {
            self.end.saturating_sub(self.start)
        } else {
            self.start.saturating_sub(self.end)
        };
        if span <= 0 {
            0
        } else {
            (span - 1) / self.step.abs() + 1
        }
    }
}

impl UserObject for Range {
    fn type_name(&self) -> &'static str {
        "range"
    }

    fn display(&self) -> String {
        format!("range({}, {}, {})", self.start, self.end, self.step)
    }

    fn is_truthy(&self) -> bool {
        self.len() > 0
    }

    fn index(&self, key: &Value) -> Option<Value> {
        match key {
            Value::Int(i) if *i >= 0 && *i < self.len() => {
                Some(Value::Int(self.start + i * self.step))
            }
            _ => None,
        }
    }

    fn iterate(&self) -> Option<Box<dyn Iterator<Item = (Value, Value)>>> {
        let range = *self;
        Some(Box::new(
            (0..range.len()).map(move |i| (Value::Int(i), Value::Int(range.start + i * range.step))),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_layout() {
        let registry = BuiltinRegistry::standard();
        let names: Vec<(u16, String)> = registry.names().map(|(i, n)| (i, n.to_owned())).collect();
        assert_eq!(names[IMPORT_INDEX as usize].1, "import");
        assert!(names.iter().any(|(_, n)| n == "len"));
        assert!(registry.get(IMPORT_INDEX).is_some());
        assert!(registry.get(names.len() as u16).is_none());
    }

    #[test]
    fn range_iterates_and_indexes() {
        let range = Range { start: 2, end: 8, step: 3 };
        let values: Vec<i64> = range
            .iterate()
            .unwrap()
            .map(|(_, v)| if let Value::Int(v) = v { v } else { unreachable!() })
            .collect();
        assert_eq!(values, vec![2, 5]);
        assert!(range.index(&Value::Int(1)).unwrap().equals(&Value::Int(5)));
        assert!(range.index(&Value::Int(2)).is_none());

        let down = Range { start: 3, end: 0, step: -1 };
        assert_eq!(down.len(), 3);
    }
}
