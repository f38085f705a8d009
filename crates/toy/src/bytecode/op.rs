//! The bytecode instruction set.
//!
//! This is the ABI between the compiler and the VM: one opcode byte followed
//! by that opcode's fixed operand schedule, all operands big-endian. Jump
//! targets are 4-byte absolute offsets. Decoding rejects any byte that is
//! not in the table.

use std::fmt::Write;

/// Bytecode operation codes.
///
/// The operand schedule for each opcode is given by [`Opcode::operand_widths`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Push constant pool entry `n`.
    Constant = 0,
    /// Discard the top of stack.
    Pop,
    True,
    False,
    Nil,
    /// Unconditional jump to an absolute offset.
    Jump,
    /// Pop the condition; jump when falsy.
    JumpFalsy,
    /// Short-circuit `&&`: jump (keeping the operand) when falsy, else pop.
    AndJump,
    /// Short-circuit `||`: jump (keeping the operand) when truthy, else pop.
    OrJump,
    /// Build a string from the top `n` stack parts.
    String,
    /// Build an array from `n` elements; flag 1 means splat elements expand.
    Array,
    /// Build a table from `n` key/value pairs.
    Map,
    /// Build a tuple from `n` elements; flag 1 means splat elements expand.
    Tuple,
    /// Pop key and container, push `container[key]`. With the keep flag set
    /// the container and key stay on the stack below the result, which is
    /// how compound index assignment reads without re-evaluating its target.
    Index,
    /// Pop value, key and container, store `container[key] = value`.
    SetIndex,
    /// Pop bounds and container, push the slice. The flags operand marks
    /// which bounds are present: bit 0 low, bit 1 high.
    Slice,
    /// Pop a sequence and push a spread marker for a splat-bearing call or
    /// composite literal.
    Splat,
    /// Call with `argc` arguments; the second operand is the splat flag.
    Call,
    /// Return `n` values (0 returns nil, more than 1 packs a tuple).
    Return,
    /// Record a deferred call: `argc`, splat flag, has-receiver flag.
    Defer,
    /// Run the current frame's deferred calls in LIFO order.
    RunDefer,
    /// Install an exception handler; operands are the catch and end offsets
    /// relative to the end of this instruction.
    Try,
    /// Pop `n` values (always 1 as emitted) and raise.
    Throw,
    GetGlobal,
    SetGlobal,
    GetLocal,
    SetLocal,
    /// Pop the top of stack into a fresh local slot.
    DefineLocal,
    GetFree,
    SetFree,
    /// Push the cell holding free variable `n` (for nested capture).
    GetFreePtr,
    /// Promote local `n` to a shared cell and push the cell.
    GetLocalPtr,
    /// Push builtin function `n`.
    GetBuiltin,
    /// Assert the sequence on top of the stack has exactly `n` elements.
    IdxAssert,
    /// Push element `i` of the sequence on top of the stack (keeps the
    /// sequence).
    IdxElem,
    /// Build a closure from function constant `n` with `m` captured cells.
    Closure,
    /// Replace the top of stack with an iterator over it.
    IteratorInit,
    /// Advance the iterator. Pushes `false` on exhaustion; otherwise pushes
    /// the requested key/value (per the flags operand) then `true`.
    IteratorNext,
    /// Discard the iterator on top of the stack.
    IteratorClose,
    /// Apply the binary operator identified by the operand.
    BinaryOp,
    /// Apply the unary operator identified by the operand.
    UnaryOp,
    /// Apply the comparison operator identified by the operand.
    Compare,
    /// End of the compilation unit: yield the exported value (if any).
    Suspend,
}

/// Bit flag on [`Opcode::IteratorNext`]: the loop wants the key.
pub const ITER_WANTS_KEY: u8 = 0b01;
/// Bit flag on [`Opcode::IteratorNext`]: the loop wants the value.
pub const ITER_WANTS_VALUE: u8 = 0b10;

/// Bit flag on [`Opcode::Slice`]: a low bound was pushed.
pub const SLICE_HAS_LOW: u8 = 0b01;
/// Bit flag on [`Opcode::Slice`]: a high bound was pushed.
pub const SLICE_HAS_HIGH: u8 = 0b10;

impl Opcode {
    /// Decodes an opcode byte. Any byte outside the table is rejected; the
    /// instruction set is closed.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        if byte <= Opcode::Suspend as u8 {
            // Discriminants are assigned contiguously from 0.
            Some(ALL_OPCODES[byte as usize])
        } else {
            None
        }
    }

    /// The operand byte widths for this opcode.
    #[must_use]
    pub fn operand_widths(self) -> &'static [usize] {
        match self {
            Opcode::Constant => &[2],
            Opcode::Pop | Opcode::True | Opcode::False | Opcode::Nil => &[],
            Opcode::Jump | Opcode::JumpFalsy | Opcode::AndJump | Opcode::OrJump => &[4],
            Opcode::String | Opcode::Map => &[2],
            Opcode::Array | Opcode::Tuple => &[2, 1],
            Opcode::SetIndex | Opcode::Splat => &[],
            Opcode::Index | Opcode::Slice => &[1],
            Opcode::Call => &[1, 1],
            Opcode::Return => &[1],
            Opcode::Defer => &[1, 1, 1],
            Opcode::RunDefer => &[],
            Opcode::Try => &[1, 1],
            Opcode::Throw => &[1],
            Opcode::GetGlobal | Opcode::SetGlobal => &[2],
            Opcode::GetLocal
            | Opcode::SetLocal
            | Opcode::DefineLocal
            | Opcode::GetFree
            | Opcode::SetFree
            | Opcode::GetFreePtr
            | Opcode::GetLocalPtr
            | Opcode::GetBuiltin => &[1],
            Opcode::IdxAssert | Opcode::IdxElem => &[2],
            Opcode::Closure => &[2, 1],
            Opcode::IteratorInit | Opcode::IteratorClose => &[],
            Opcode::IteratorNext => &[1],
            Opcode::BinaryOp | Opcode::UnaryOp | Opcode::Compare => &[1],
            Opcode::Suspend => &[],
        }
    }

    /// The mnemonic used by the disassembler.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Constant => "CONST",
            Opcode::Pop => "POP",
            Opcode::True => "TRUE",
            Opcode::False => "FALSE",
            Opcode::Nil => "NIL",
            Opcode::Jump => "JMP",
            Opcode::JumpFalsy => "JMPF",
            Opcode::AndJump => "ANDJMP",
            Opcode::OrJump => "ORJMP",
            Opcode::String => "STR",
            Opcode::Array => "ARR",
            Opcode::Map => "MAP",
            Opcode::Tuple => "TUPLE",
            Opcode::Index => "INDEX",
            Opcode::SetIndex => "SETINDEX",
            Opcode::Slice => "SLICE",
            Opcode::Splat => "SPLAT",
            Opcode::Call => "CALL",
            Opcode::Return => "RET",
            Opcode::Defer => "DEFER",
            Opcode::RunDefer => "RUNDEFER",
            Opcode::Try => "TRY",
            Opcode::Throw => "THROW",
            Opcode::GetGlobal => "GETG",
            Opcode::SetGlobal => "SETG",
            Opcode::GetLocal => "GETL",
            Opcode::SetLocal => "SETL",
            Opcode::DefineLocal => "DEFL",
            Opcode::GetFree => "GETF",
            Opcode::SetFree => "SETF",
            Opcode::GetFreePtr => "GETFP",
            Opcode::GetLocalPtr => "GETLP",
            Opcode::GetBuiltin => "BUILTIN",
            Opcode::IdxAssert => "IDXASSERT",
            Opcode::IdxElem => "IDXELEM",
            Opcode::Closure => "CLOSURE",
            Opcode::IteratorInit => "ITER",
            Opcode::IteratorNext => "ITNEXT",
            Opcode::IteratorClose => "ITCLOSE",
            Opcode::BinaryOp => "BINARYOP",
            Opcode::UnaryOp => "UNARYOP",
            Opcode::Compare => "CMP",
            Opcode::Suspend => "SUSPEND",
        }
    }
}

/// All opcodes in discriminant order; indexable by opcode byte.
const ALL_OPCODES: [Opcode; Opcode::Suspend as usize + 1] = [
    Opcode::Constant,
    Opcode::Pop,
    Opcode::True,
    Opcode::False,
    Opcode::Nil,
    Opcode::Jump,
    Opcode::JumpFalsy,
    Opcode::AndJump,
    Opcode::OrJump,
    Opcode::String,
    Opcode::Array,
    Opcode::Map,
    Opcode::Tuple,
    Opcode::Index,
    Opcode::SetIndex,
    Opcode::Slice,
    Opcode::Splat,
    Opcode::Call,
    Opcode::Return,
    Opcode::Defer,
    Opcode::RunDefer,
    Opcode::Try,
    Opcode::Throw,
    Opcode::GetGlobal,
    Opcode::SetGlobal,
    Opcode::GetLocal,
    Opcode::SetLocal,
    Opcode::DefineLocal,
    Opcode::GetFree,
    Opcode::SetFree,
    Opcode::GetFreePtr,
    Opcode::GetLocalPtr,
    Opcode::GetBuiltin,
    Opcode::IdxAssert,
    Opcode::IdxElem,
    Opcode::Closure,
    Opcode::IteratorInit,
    Opcode::IteratorNext,
    Opcode::IteratorClose,
    Opcode::BinaryOp,
    Opcode::UnaryOp,
    Opcode::Compare,
    Opcode::Suspend,
];

/// Encodes an instruction: opcode byte followed by big-endian operands.
///
/// # Panics
///
/// Panics if the operand count does not match the opcode's schedule or an
/// operand exceeds its width; operands come from the compiler, which checks
/// its ranges before emitting.
#[must_use]
pub fn make(op: Opcode, operands: &[usize]) -> Vec<u8> {
    let widths = op.operand_widths();
    assert_eq!(operands.len(), widths.len(), "operand count mismatch for {op:?}");
    let mut out = Vec::with_capacity(1 + widths.iter().sum::<usize>());
    out.push(op as u8);
    for (&operand, &width) in operands.iter().zip(widths) {
        match width {
            1 => {
                out.push(u8::try_from(operand).expect("operand exceeds u8"));
            }
            2 => {
                let v = u16::try_from(operand).expect("operand exceeds u16");
                out.extend_from_slice(&v.to_be_bytes());
            }
            4 => {
                let v = u32::try_from(operand).expect("operand exceeds u32");
                out.extend_from_slice(&v.to_be_bytes());
            }
            _ => unreachable!("unsupported operand width"),
        }
    }
    out
}

/// Decodes the operands for `op` starting at `bytes`. Returns the operand
/// values and the number of bytes consumed.
#[must_use]
pub fn read_operands(op: Opcode, bytes: &[u8]) -> (Vec<usize>, usize) {
    let mut operands = Vec::with_capacity(op.operand_widths().len());
    let mut offset = 0;
    for &width in op.operand_widths() {
        let operand = match width {
            1 => bytes[offset] as usize,
            2 => u16::from_be_bytes([bytes[offset], bytes[offset + 1]]) as usize,
            4 => u32::from_be_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]) as usize,
            _ => unreachable!("unsupported operand width"),
        };
        operands.push(operand);
        offset += width;
    }
    (operands, offset)
}

/// Formats an instruction stream as a disassembly listing, one instruction
/// per line with its byte offset.
#[must_use]
pub fn format_instructions(instructions: &[u8]) -> String {
    let mut out = String::new();
    let mut offset = 0;
    while offset < instructions.len() {
        let Some(op) = Opcode::from_byte(instructions[offset]) else {
            let _ = writeln!(out, "{offset:04} <bad opcode {:#04x}>", instructions[offset]);
            break;
        };
        let (operands, consumed) = read_operands(op, &instructions[offset + 1..]);
        let _ = write!(out, "{offset:04} {}", op.name());
        for operand in operands {
            let _ = write!(out, " {operand}");
        }
        out.push('\n');
        offset += 1 + consumed;
    }
    out
}

/// Binary operator identifiers carried by [`Opcode::BinaryOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BinOp {
    Add = 0,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    /// `??`: the left operand unless it is nil. Both operands are evaluated;
    /// only `&&`/`||` short-circuit via their jump opcodes.
    Nullish,
}

impl BinOp {
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<BinOp> {
        use BinOp::*;
        Some(match byte {
            0 => Add,
            1 => Sub,
            2 => Mul,
            3 => Div,
            4 => Rem,
            5 => And,
            6 => Or,
            7 => Xor,
            8 => AndNot,
            9 => Shl,
            10 => Shr,
            11 => Nullish,
            _ => return None,
        })
    }

    /// The source spelling, for error messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::AndNot => "&^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Nullish => "??",
        }
    }
}

/// Comparison operator identifiers carried by [`Opcode::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CmpOp {
    Equal = 0,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl CmpOp {
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<CmpOp> {
        use CmpOp::*;
        Some(match byte {
            0 => Equal,
            1 => NotEqual,
            2 => Less,
            3 => LessEq,
            4 => Greater,
            5 => GreaterEq,
            _ => return None,
        })
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Equal => "==",
            CmpOp::NotEqual => "!=",
            CmpOp::Less => "<",
            CmpOp::LessEq => "<=",
            CmpOp::Greater => ">",
            CmpOp::GreaterEq => ">=",
        }
    }
}

/// Unary operator identifiers carried by [`Opcode::UnaryOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnOp {
    /// `+x`: identity on numbers.
    Pos = 0,
    /// `-x`: arithmetic negation.
    Neg,
    /// `!x`: boolean negation.
    Not,
    /// `^x`: bitwise complement.
    BitNot,
}

impl UnOp {
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<UnOp> {
        Some(match byte {
            0 => UnOp::Pos,
            1 => UnOp::Neg,
            2 => UnOp::Not,
            3 => UnOp::BitNot,
            _ => return None,
        })
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Pos => "+",
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::BitNot => "^",
        }
    }
}
