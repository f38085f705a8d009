//! Host-supplied modules and the `fmt` reference module.
//!
//! A module is an ordinary value, typically a table of builtin functions.
//! The compiler checks `import("name")` against the registry's names; the
//! VM resolves and caches the value on first import.

use ahash::RandomState;
use indexmap::IndexMap;

use crate::error::{RunResult, RuntimeError};
use crate::value::{Table, Value};
use crate::vm::Vm;

/// Named modules available to `import`.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<String, Value, RandomState>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the standard modules registered (currently `fmt`).
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("fmt", fmt_module());
        registry
    }

    /// Registers (or replaces) a module value under a name.
    pub fn register(&mut self, name: impl Into<String>, module: Value) {
        self.modules.insert(name.into(), module);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.modules.get(name)
    }

    /// Registered module names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.modules.keys().map(String::as_str)
    }
}

/// Builds the `fmt` module table: `print`, `println`, `format`.
#[must_use]
pub fn fmt_module() -> Value {
    Table::from_pairs([
        ("print", Value::Builtin(std::rc::Rc::new(crate::value::BuiltinFunction::new("fmt.print", fmt_print)))),
        ("println", Value::Builtin(std::rc::Rc::new(crate::value::BuiltinFunction::new("fmt.println", fmt_println)))),
        ("format", Value::Builtin(std::rc::Rc::new(crate::value::BuiltinFunction::new("fmt.format", fmt_format)))),
    ])
}

fn join_args(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&arg.to_print());
    }
    out
}

fn fmt_print(vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    vm.print(&join_args(args));
    Ok(Value::Nil)
}

fn fmt_println(vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    let mut text = join_args(args);
    text.push('\n');
    vm.print(&text);
    Ok(Value::Nil)
}

/// `fmt.format(template, args…)`: each `{}` in the template is replaced by
/// the next argument's printable form.
fn fmt_format(_vm: &mut Vm<'_>, args: &[Value]) -> RunResult<Value> {
    let Some((template, rest)) = args.split_first() else {
        return Err(RuntimeError::new("format expects a template string"));
    };
    let Value::String(template) = template else {
        return Err(RuntimeError::new(format!(
            "format template must be string, not {}",
            template.type_name()
        )));
    };
    let mut out = String::with_capacity(template.len());
    let mut next = rest.iter();
    let mut remainder = template.as_ref();
    while let Some(at) = remainder.find("{}") {
        out.push_str(&remainder[..at]);
        match next.next() {
            Some(arg) => out.push_str(&arg.to_print()),
            None => out.push_str("{}"),
        }
        remainder = &remainder[at + 2..];
    }
    out.push_str(remainder);
    Ok(Value::string(out))
}
