//! The compiled artifact and its post-compilation passes.
//!
//! A [`Bytecode`] unit is the compiler's output and the VM's input: a main
//! function, a constant pool shared by the main function and every function
//! constant, the number of global slots, and the source file name. The two
//! pool passes run after compilation: duplicate constants are coalesced and
//! unreferenced constants removed, with every `CONST`/`CLOSURE` operand
//! rewritten to match.

use std::fmt::Write as _;
use std::rc::Rc;

use super::op::{format_instructions, make, read_operands, Opcode};
use crate::value::{CompiledFunction, Value};

/// A compiled unit.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub main: Rc<CompiledFunction>,
    pub constants: Vec<Value>,
    pub num_globals: u16,
    pub file_name: String,
}

impl Bytecode {
    /// Coalesces structurally equal constants, rewriting every referring
    /// operand. Constant order is otherwise preserved.
    pub fn remove_duplicate_constants(&mut self) {
        let mut kept: Vec<Value> = vec![];
        let mut remap: Vec<usize> = Vec::with_capacity(self.constants.len());
        for constant in self.constants.drain(..) {
            match kept.iter().position(|c| const_eq(c, &constant)) {
                Some(existing) => remap.push(existing),
                None => {
                    kept.push(constant);
                    remap.push(kept.len() - 1);
                }
            }
        }
        self.constants = kept;
        self.rewrite_references(&remap);
    }

    /// Drops constants with no referring `CONST`/`CLOSURE` operand reachable
    /// from the main function, compacting indices stably.
    pub fn remove_unused_constants(&mut self) {
        // Reachability: function constants referenced by CLOSURE pull in
        // whatever their own instructions reference.
        let mut used = vec![false; self.constants.len()];
        let mut queue: Vec<Vec<u8>> = vec![self.main.instructions.clone()];
        while let Some(instructions) = queue.pop() {
            for (_, op, operands) in iterate(&instructions) {
                if let Opcode::Constant | Opcode::Closure = op {
                    let idx = operands[0];
                    if !used[idx] {
                        used[idx] = true;
                        if let Value::Function(func) = &self.constants[idx] {
                            queue.push(func.instructions.clone());
                        }
                    }
                }
            }
        }

        let mut remap: Vec<usize> = Vec::with_capacity(self.constants.len());
        let mut next = 0;
        for &keep in &used {
            remap.push(next);
            if keep {
                next += 1;
            }
        }
        let mut kept = Vec::with_capacity(next);
        for (constant, &keep) in self.constants.drain(..).zip(&used) {
            if keep {
                kept.push(constant);
            }
        }
        self.constants = kept;
        self.rewrite_references(&remap);
    }

    /// Rewrites `CONST` and `CLOSURE` constant operands in the main function
    /// and in every function constant according to `remap`.
    fn rewrite_references(&mut self, remap: &[usize]) {
        let rewrite = |instructions: &[u8]| -> Vec<u8> {
            let mut out = Vec::with_capacity(instructions.len());
            for (_, op, mut operands) in iterate(instructions) {
                if let Opcode::Constant | Opcode::Closure = op {
                    operands[0] = remap[operands[0]];
                }
                out.extend(make(op, &operands));
            }
            out
        };

        let mut main = (*self.main).clone();
        main.instructions = rewrite(&main.instructions);
        self.main = Rc::new(main);

        for constant in &mut self.constants {
            if let Value::Function(func) = constant {
                let mut new_func = (**func).clone();
                new_func.instructions = rewrite(&new_func.instructions);
                *constant = Value::Function(Rc::new(new_func));
            }
        }
    }

    /// Formats the constant pool for `--trace` output. Function constants
    /// include their disassembly, indented.
    #[must_use]
    pub fn format_constants(&self) -> String {
        let mut out = String::new();
        for (i, constant) in self.constants.iter().enumerate() {
            match constant {
                Value::Function(func) => {
                    let _ = writeln!(
                        out,
                        "{i:04} <function params={} locals={}>",
                        func.num_params, func.num_locals
                    );
                    for line in format_instructions(&func.instructions).lines() {
                        let _ = writeln!(out, "     {line}");
                    }
                }
                other => {
                    let _ = writeln!(out, "{i:04} {other}");
                }
            }
        }
        out
    }

    /// Formats the main function's disassembly for `--trace` output.
    #[must_use]
    pub fn format_main(&self) -> String {
        format_instructions(&self.main.instructions)
    }
}

/// Structural constant equality, strict about types: `1` and `1.0` compare
/// equal at runtime but must stay distinct pool entries.
fn const_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Function(x), Value::Function(y)) => x == y,
        _ => std::mem::discriminant(a) == std::mem::discriminant(b) && a.equals(b),
    }
}

/// Iterates `(offset, opcode, operands)` over an instruction stream.
///
/// # Panics
///
/// Panics on an undocumented opcode byte; instruction streams only come from
/// the compiler.
pub fn iterate(instructions: &[u8]) -> impl Iterator<Item = (usize, Opcode, Vec<usize>)> + '_ {
    let mut offset = 0;
    std::iter::from_fn(move || {
        if offset >= instructions.len() {
            return None;
        }
        let op = Opcode::from_byte(instructions[offset]).expect("undocumented opcode in instruction stream");
        let (operands, consumed) = read_operands(op, &instructions[offset + 1..]);
        let at = offset;
        offset += 1 + consumed;
        Some((at, op, operands))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn func_const(instructions: Vec<u8>) -> Value {
        Value::Function(Rc::new(CompiledFunction {
            instructions,
            num_locals: 0,
            num_params: 0,
            variadic: false,
            source_file: "test.toy".into(),
        }))
    }

    fn unit(main_instructions: Vec<u8>, constants: Vec<Value>) -> Bytecode {
        Bytecode {
            main: Rc::new(CompiledFunction {
                instructions: main_instructions,
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

    #[test]
    fn duplicates_are_coalesced() {
        let mut code = vec![];
        code.extend(make(Opcode::Constant, &[0]));
        code.extend(make(Opcode::Constant, &[1]));
        code.extend(make(Opcode::Constant, &[2]));
        code.extend(make(Opcode::Constant, &[3]));
        let mut unit = unit(
            code,
            vec![
                Value::Int(7),
                Value::string("x"),
                Value::Int(7),
                Value::Float(7.0),
            ],
        );
        unit.remove_duplicate_constants();

        // Int 7 deduped; Float 7.0 must survive as its own entry.
        assert_eq!(unit.constants.len(), 3);
        let refs: Vec<usize> = iterate(&unit.main.instructions).map(|(_, _, ops)| ops[0]).collect();
        assert_eq!(refs, vec![0, 1, 0, 2]);

        // No two remaining constants are structurally equal.
        for (i, a) in unit.constants.iter().enumerate() {
            for b in unit.constants.iter().skip(i + 1) {
                assert!(!const_eq(a, b));
            }
        }
    }

    #[test]
    fn unused_constants_are_removed() {
        let mut code = vec![];
        code.extend(make(Opcode::Constant, &[2]));
        code.extend(make(Opcode::Suspend, &[]));
        let mut unit = unit(
            code,
            vec![Value::Int(0), Value::Int(1), Value::Int(2), Value::Int(3)],
        );
        unit.remove_unused_constants();

        assert_eq!(unit.constants.len(), 1);
        assert!(unit.constants[0].equals(&Value::Int(2)));
        let refs: Vec<usize> = iterate(&unit.main.instructions)
            .filter(|(_, op, _)| *op == Opcode::Constant)
            .map(|(_, _, ops)| ops[0])
            .collect();
        assert_eq!(refs, vec![0]);
    }

    #[test]
    fn function_constants_keep_their_references_alive() {
        // main: CLOSURE 1 0 — the function at index 1 references constant 0.
        let mut inner = vec![];
        inner.extend(make(Opcode::Constant, &[0]));
        inner.extend(make(Opcode::Return, &[1]));
        let mut code = vec![];
        code.extend(make(Opcode::Closure, &[1, 0]));
        code.extend(make(Opcode::Suspend, &[]));
        let mut unit = unit(
            code,
            vec![Value::string("kept"), func_const(inner), Value::string("dropped")],
        );
        unit.remove_unused_constants();

        assert_eq!(unit.constants.len(), 2);
        assert!(unit.constants[0].equals(&Value::string("kept")));
        assert!(matches!(unit.constants[1], Value::Function(_)));
        // The CLOSURE operand was compacted from 1 to 1 (stable here), and
        // the inner CONST still points at index 0.
        let (_, op, ops) = iterate(&unit.main.instructions).next().unwrap();
        assert_eq!((op, ops[0]), (Opcode::Closure, 1));
    }

    #[test]
    fn reindexing_is_stable() {
        let mut code = vec![];
        for i in [3usize, 1, 3] {
            code.extend(make(Opcode::Constant, &[i]));
        }
        let mut unit = unit(
            code,
            vec![Value::Int(0), Value::Int(1), Value::Int(2), Value::Int(3)],
        );
        unit.remove_unused_constants();
        // Kept constants preserve relative order: 1 before 3.
        assert!(unit.constants[0].equals(&Value::Int(1)));
        assert!(unit.constants[1].equals(&Value::Int(3)));
    }
}
