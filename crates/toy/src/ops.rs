//! Binary, unary and comparison operator dispatch.
//!
//! The VM delegates `BinaryOp`/`UnaryOp`/`Compare` instructions here.
//! Dispatch is by runtime tag: integer arithmetic wraps, division by zero
//! throws, strings concatenate with `+` and repeat with `* int`, and
//! mixed int/float operands promote to float.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::bytecode::op::{BinOp, CmpOp, UnOp};
use crate::error::{RunResult, RuntimeError};
use crate::value::Value;

fn unsupported(op: &str, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::new(format!(
        "unsupported operand types for {op}: {} and {}",
        lhs.type_name(),
        rhs.type_name()
    ))
}

/// Applies a binary operator.
pub fn binary_op(op: BinOp, lhs: &Value, rhs: &Value) -> RunResult<Value> {
    use Value::*;
    match (op, lhs, rhs) {
        // See through promoted cells first.
        (_, Cell(c), _) => {
            let inner = c.borrow().clone();
            binary_op(op, &inner, rhs)
        }
        (_, _, Cell(c)) => {
            let inner = c.borrow().clone();
            binary_op(op, lhs, &inner)
        }

        (BinOp::Nullish, _, _) => Ok(if lhs.is_nil() { rhs.clone() } else { lhs.clone() }),

        (_, Int(a), Int(b)) => int_binary_op(op, *a, *b),
        (_, Float(a), Float(b)) => float_binary_op(op, *a, *b),
        (_, Int(a), Float(b)) => float_binary_op(op, *a as f64, *b),
        (_, Float(a), Int(b)) => float_binary_op(op, *a, *b as f64),

        // Char arithmetic: offsetting by ints, distance between chars.
        (BinOp::Add, Char(c), Int(n)) | (BinOp::Add, Int(n), Char(c)) => char_offset(*c, *n),
        (BinOp::Sub, Char(c), Int(n)) => char_offset(*c, -*n),
        (BinOp::Sub, Char(a), Char(b)) => Ok(Int(i64::from(u32::from(*a)) - i64::from(u32::from(*b)))),

        // String concatenation and repetition.
        (BinOp::Add, String(a), String(b)) => Ok(Value::string(format!("{a}{b}"))),
        (BinOp::Add, String(a), Char(c)) => Ok(Value::string(format!("{a}{c}"))),
        (BinOp::Add, Char(c), String(b)) => Ok(Value::string(format!("{c}{b}"))),
        (BinOp::Mul, String(s), Int(n)) | (BinOp::Mul, Int(n), String(s)) => {
            Ok(Value::string(s.repeat(repeat_count(*n)?)))
        }

        (BinOp::Add, Bytes(a), Bytes(b)) => {
            let mut out = Vec::with_capacity(a.len() + b.len());
            out.extend_from_slice(a);
            out.extend_from_slice(b);
            Ok(Bytes(Rc::from(out)))
        }

        (BinOp::Add, Array(a), Array(b)) => {
            let mut items = a.borrow().items.clone();
            items.extend(b.borrow().items.iter().cloned());
            Ok(Value::array(items))
        }

        _ => Err(unsupported(op.symbol(), lhs, rhs)),
    }
}

fn int_binary_op(op: BinOp, a: i64, b: i64) -> RunResult<Value> {
    let v = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(RuntimeError::new("division by zero"));
            }
            a.wrapping_div(b)
        }
        BinOp::Rem => {
            if b == 0 {
                return Err(RuntimeError::new("division by zero"));
            }
            a.wrapping_rem(b)
        }
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::AndNot => a & !b,
        BinOp::Shl => {
            let shift = shift_amount(b)?;
            if shift >= 64 {
                0
            } else {
                a.wrapping_shl(shift)
            }
        }
        BinOp::Shr => {
            let shift = shift_amount(b)?;
            if shift >= 64 {
                // Arithmetic shift saturates to the sign.
                if a < 0 {
                    -1
                } else {
                    0
                }
            } else {
                a >> shift
            }
        }
        BinOp::Nullish => unreachable!("handled before numeric dispatch"),
    };
    Ok(Value::Int(v))
}

fn float_binary_op(op: BinOp, a: f64, b: f64) -> RunResult<Value> {
    let v = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(RuntimeError::new("division by zero"));
            }
            a / b
        }
        BinOp::Rem => {
            if b == 0.0 {
                return Err(RuntimeError::new("division by zero"));
            }
            a % b
        }
        _ => {
            return Err(RuntimeError::new(format!(
                "unsupported operand types for {}: float and float",
                op.symbol()
            )))
        }
    };
    Ok(Value::Float(v))
}

fn char_offset(c: char, n: i64) -> RunResult<Value> {
    let code = i64::from(u32::from(c)).wrapping_add(n);
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(Value::Char)
        .ok_or_else(|| RuntimeError::new(format!("char offset out of range: {code}")))
}

fn shift_amount(b: i64) -> RunResult<u32> {
    if b < 0 {
        Err(RuntimeError::new("negative shift amount"))
    } else {
        Ok(u32::try_from(b).unwrap_or(u32::MAX))
    }
}

fn repeat_count(n: i64) -> RunResult<usize> {
    if n < 0 {
        Ok(0)
    } else {
        usize::try_from(n).map_err(|_| RuntimeError::new("repeat count out of range"))
    }
}

/// Applies a comparison operator, yielding a bool.
pub fn compare_op(op: CmpOp, lhs: &Value, rhs: &Value) -> RunResult<Value> {
    match op {
        CmpOp::Equal => Ok(Value::Bool(lhs.equals(rhs))),
        CmpOp::NotEqual => Ok(Value::Bool(!lhs.equals(rhs))),
        _ => {
            let ordering = lhs
                .partial_cmp_value(rhs)
                .ok_or_else(|| unsupported(op.symbol(), lhs, rhs))?;
            let result = match op {
                CmpOp::Less => ordering == Ordering::Less,
                CmpOp::LessEq => ordering != Ordering::Greater,
                CmpOp::Greater => ordering == Ordering::Greater,
                CmpOp::GreaterEq => ordering != Ordering::Less,
                CmpOp::Equal | CmpOp::NotEqual => unreachable!("handled above"),
            };
            Ok(Value::Bool(result))
        }
    }
}

/// Applies a unary operator.
pub fn unary_op(op: UnOp, operand: &Value) -> RunResult<Value> {
    match (op, operand) {
        (_, Value::Cell(c)) => {
            let inner = c.borrow().clone();
            unary_op(op, &inner)
        }
        (UnOp::Pos, Value::Int(v)) => Ok(Value::Int(*v)),
        (UnOp::Pos, Value::Float(v)) => Ok(Value::Float(*v)),
        (UnOp::Neg, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
        (UnOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnOp::Not, operand) => Ok(Value::Bool(!operand.is_truthy())),
        (UnOp::BitNot, Value::Int(v)) => Ok(Value::Int(!v)),
        (UnOp::BitNot, Value::Bool(b)) => Ok(Value::Int(!i64::from(*b))),
        _ => Err(RuntimeError::new(format!(
            "unsupported operand type for unary {}: {}",
            op.symbol(),
            operand.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    #[test]
    fn integer_arithmetic_wraps() {
        let r = binary_op(BinOp::Add, &int(i64::MAX), &int(1)).unwrap();
        assert!(r.equals(&int(i64::MIN)));
        let r = binary_op(BinOp::Mul, &int(i64::MAX), &int(2)).unwrap();
        assert!(r.equals(&int(-2)));
        let r = unary_op(UnOp::Neg, &int(i64::MIN)).unwrap();
        assert!(r.equals(&int(i64::MIN)));
    }

    #[test]
    fn division_by_zero_throws() {
        assert!(binary_op(BinOp::Div, &int(1), &int(0)).is_err());
        assert!(binary_op(BinOp::Rem, &int(1), &int(0)).is_err());
        assert!(binary_op(BinOp::Div, &Value::Float(1.0), &Value::Float(0.0)).is_err());
    }

    #[test]
    fn mixed_numeric_promotes_to_float() {
        let r = binary_op(BinOp::Add, &int(1), &Value::Float(0.5)).unwrap();
        assert!(r.equals(&Value::Float(1.5)));
    }

    #[test]
    fn string_operations() {
        let r = binary_op(BinOp::Add, &Value::string("ab"), &Value::string("cd")).unwrap();
        assert_eq!(r.to_print(), "abcd");
        let r = binary_op(BinOp::Mul, &Value::string("ab"), &int(3)).unwrap();
        assert_eq!(r.to_print(), "ababab");
        let r = binary_op(BinOp::Add, &Value::string("h"), &Value::Char('i')).unwrap();
        assert_eq!(r.to_print(), "hi");
        assert!(binary_op(BinOp::Sub, &Value::string("a"), &Value::string("b")).is_err());
    }

    #[test]
    fn bit_operations() {
        assert!(binary_op(BinOp::AndNot, &int(0b1101), &int(0b0101)).unwrap().equals(&int(0b1000)));
        assert!(binary_op(BinOp::Shl, &int(1), &int(70)).unwrap().equals(&int(0)));
        assert!(binary_op(BinOp::Shr, &int(-8), &int(1)).unwrap().equals(&int(-4)));
        assert!(binary_op(BinOp::Shr, &int(-8), &int(70)).unwrap().equals(&int(-1)));
        assert!(binary_op(BinOp::Shl, &int(1), &int(-1)).is_err());
    }

    #[test]
    fn comparisons() {
        let t = compare_op(CmpOp::Less, &int(1), &Value::Float(1.5)).unwrap();
        assert!(t.is_truthy());
        let t = compare_op(CmpOp::GreaterEq, &Value::string("b"), &Value::string("a")).unwrap();
        assert!(t.is_truthy());
        let t = compare_op(CmpOp::Equal, &Value::Nil, &Value::Nil).unwrap();
        assert!(t.is_truthy());
        // Ordering on unordered types throws; equality does not.
        assert!(compare_op(CmpOp::Less, &Value::Nil, &int(1)).is_err());
        assert!(compare_op(CmpOp::Equal, &Value::Nil, &int(1)).unwrap().equals(&Value::Bool(false)));
    }

    #[test]
    fn nullish_selects_non_nil() {
        let r = binary_op(BinOp::Nullish, &Value::Nil, &int(2)).unwrap();
        assert!(r.equals(&int(2)));
        let r = binary_op(BinOp::Nullish, &Value::Bool(false), &int(2)).unwrap();
        assert!(r.equals(&Value::Bool(false)));
        let r = binary_op(BinOp::Nullish, &int(0), &int(2)).unwrap();
        assert!(r.equals(&int(0)));
    }

    #[test]
    fn unary_operators() {
        assert!(unary_op(UnOp::Not, &Value::Nil).unwrap().is_truthy());
        assert!(unary_op(UnOp::BitNot, &int(0)).unwrap().equals(&int(-1)));
        assert!(unary_op(UnOp::Pos, &Value::string("x")).is_err());
    }

    #[test]
    fn array_concat() {
        let a = Value::array(vec![int(1)]);
        let b = Value::array(vec![int(2)]);
        let r = binary_op(BinOp::Add, &a, &b).unwrap();
        assert_eq!(r.to_string(), "[1, 2]");
    }
}
