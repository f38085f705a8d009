//! Lexical-scope symbol resolution.
//!
//! The compiler maintains a tree of [`SymbolTable`]s: the root holds
//! module-level (global) definitions, each function literal opens a function
//! scope, and each braced block opens a block scope that shares its
//! function's local slot numbering. Resolving a name through an enclosing
//! function turns it into a free variable of every function in between,
//! which is what drives upvalue-cell capture at `Closure` emission time.

use ahash::RandomState;
use indexmap::IndexMap;

/// Where a resolved name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Free,
    Builtin,
}

/// A resolved name.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: u16,
    /// Set once the symbol has been captured by an inner closure and so is
    /// accessed through a shared cell rather than by value.
    pub local_ptr: bool,
}

/// One scope in the symbol-table tree.
///
/// Symbols are kept in insertion order. Block scopes delegate slot
/// allocation to their enclosing function scope so every local in a function
/// body gets a distinct frame slot.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    parent: Option<Box<SymbolTable>>,
    /// True for block scopes, which share the enclosing function's slots.
    block: bool,
    store: IndexMap<String, Symbol, RandomState>,
    /// Slot counter. Only meaningful on global and function scopes; blocks
    /// bubble allocation upward.
    num_definitions: u16,
    /// Free variables captured from enclosing functions, in capture order.
    /// Each entry is the symbol as seen from the *enclosing* scope, which is
    /// what closure emission needs.
    free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Creates the root (global) scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child scope. `block` selects a block scope (shared slots)
    /// over a function scope (fresh slot space).
    #[must_use]
    pub fn enclosed(parent: SymbolTable, block: bool) -> Self {
        Self {
            parent: Some(Box::new(parent)),
            block,
            ..Self::default()
        }
    }

    /// Detaches this scope from its parent, returning `(parent, self)`.
    ///
    /// # Panics
    ///
    /// Panics on the root scope; the compiler only leaves scopes it entered.
    #[must_use]
    pub fn split_parent(mut self) -> (SymbolTable, SymbolTable) {
        let parent = *self.parent.take().expect("cannot leave the global scope");
        (parent, self)
    }

    /// True for the module-level scope.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of slots allocated in this scope (globals for the root,
    /// locals for a function scope).
    #[must_use]
    pub fn num_definitions(&self) -> u16 {
        self.num_definitions
    }

    /// The free variables this function scope captured, in capture order.
    #[must_use]
    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free_symbols
    }

    /// True if `name` is already defined in this exact scope (not a parent).
    #[must_use]
    pub fn is_defined_here(&self, name: &str) -> bool {
        self.store.contains_key(name)
    }

    /// Defines a new symbol in this scope and returns it.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.root_is_global() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let index = self.alloc_slot();
        let symbol = Symbol {
            name: name.to_owned(),
            scope,
            index,
            local_ptr: false,
        };
        self.store.insert(name.to_owned(), symbol.clone());
        symbol
    }

    /// Registers a builtin on the root scope with a fixed index.
    pub fn define_builtin(&mut self, index: u16, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_owned(),
            scope: SymbolScope::Builtin,
            index,
            local_ptr: false,
        };
        self.store.insert(name.to_owned(), symbol.clone());
        symbol
    }

    /// Resolves a name, creating free-variable entries as the lookup crosses
    /// function boundaries.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }
        let parent = self.parent.as_mut()?;
        let symbol = parent.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            SymbolScope::Local | SymbolScope::Free => {
                if self.block {
                    // Same function frame; nothing to capture.
                    Some(symbol)
                } else {
                    parent.mark_captured(name);
                    Some(self.define_free(symbol))
                }
            }
        }
    }

    /// Records a free variable of this function scope. The original symbol
    /// (as seen from the enclosing scope) is kept for closure emission.
    fn define_free(&mut self, original: Symbol) -> Symbol {
        let index = self.free_symbols.len() as u16;
        self.free_symbols.push(original.clone());
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index,
            local_ptr: original.local_ptr,
        };
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Marks the named symbol as captured in whichever scope defines it.
    fn mark_captured(&mut self, name: &str) {
        if let Some(symbol) = self.store.get_mut(name) {
            symbol.local_ptr = true;
        } else if let Some(parent) = self.parent.as_mut() {
            parent.mark_captured(name);
        }
    }

    /// Allocates the next slot, bubbling through block scopes so that every
    /// local in a function body gets a distinct index.
    fn alloc_slot(&mut self) -> u16 {
        if self.block {
            self.parent
                .as_mut()
                .expect("block scope without parent")
                .alloc_slot()
        } else {
            let index = self.num_definitions;
            self.num_definitions += 1;
            index
        }
    }

    /// Whether slot allocation for this scope lands in the global scope.
    fn root_is_global(&self) -> bool {
        if self.block {
            self.parent
                .as_ref()
                .expect("block scope without parent")
                .root_is_global()
        } else {
            self.is_global()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn globals_and_locals() {
        let mut global = SymbolTable::new();
        let a = global.define("a");
        assert_eq!((a.scope, a.index), (SymbolScope::Global, 0));

        let mut func = SymbolTable::enclosed(global, false);
        let x = func.define("x");
        assert_eq!((x.scope, x.index), (SymbolScope::Local, 0));

        // Blocks share the function's slot space.
        let mut block = SymbolTable::enclosed(func, true);
        let y = block.define("y");
        assert_eq!((y.scope, y.index), (SymbolScope::Local, 1));

        // Resolution sees through blocks without capturing.
        assert_eq!(block.resolve("x").unwrap().scope, SymbolScope::Local);
        assert_eq!(block.resolve("a").unwrap().scope, SymbolScope::Global);
    }

    #[test]
    fn free_variable_capture() {
        let mut global = SymbolTable::new();
        global.define("g");
        let mut outer = SymbolTable::enclosed(global, false);
        outer.define("x");
        let mut inner = SymbolTable::enclosed(outer, false);

        let x = inner.resolve("x").unwrap();
        assert_eq!((x.scope, x.index), (SymbolScope::Free, 0));
        // Globals resolve as globals from any depth.
        assert_eq!(inner.resolve("g").unwrap().scope, SymbolScope::Global);
        // The enclosing view of the captured local is recorded.
        assert_eq!(inner.free_symbols().len(), 1);
        assert_eq!(inner.free_symbols()[0].scope, SymbolScope::Local);

        // The defining scope's symbol is flagged as captured.
        let (outer, _inner) = inner.split_parent();
        assert!(outer.store.get("x").unwrap().local_ptr);
    }

    #[test]
    fn intermediate_functions_record_free_vars() {
        let global = SymbolTable::new();
        let mut f1 = SymbolTable::enclosed(global, false);
        f1.define("x");
        let f2 = SymbolTable::enclosed(f1, false);
        let mut f3 = SymbolTable::enclosed(f2, false);

        let x = f3.resolve("x").unwrap();
        assert_eq!(x.scope, SymbolScope::Free);

        let (f2, f3) = f3.split_parent();
        // The middle function captured it too.
        assert_eq!(f3.free_symbols().len(), 1);
        assert_eq!(f3.free_symbols()[0].scope, SymbolScope::Free);
        assert_eq!(f2.free_symbols().len(), 1);
        assert_eq!(f2.free_symbols()[0].scope, SymbolScope::Local);
    }

    #[test]
    fn builtins_resolve_everywhere() {
        let mut global = SymbolTable::new();
        global.define_builtin(3, "len");
        let mut func = SymbolTable::enclosed(global, false);
        let len = func.resolve("len").unwrap();
        assert_eq!((len.scope, len.index), (SymbolScope::Builtin, 3));
    }

    #[test]
    fn shadowing_in_nested_block() {
        let mut global = SymbolTable::new();
        global.define("v");
        let mut block = SymbolTable::enclosed(global, true);
        assert!(!block.is_defined_here("v"));
        let shadow = block.define("v");
        // Module-level block scopes still allocate global slots.
        assert_eq!(shadow.scope, SymbolScope::Global);
        assert_eq!(shadow.index, 1);
        assert_eq!(block.resolve("v").unwrap().index, 1);
    }
}
