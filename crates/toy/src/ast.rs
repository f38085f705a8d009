//! Abstract syntax tree produced by the parser.
//!
//! Every node carries the position of its first token. `Display` renders a
//! node back to source-equivalent text: re-parsing the output yields a
//! structurally equal tree (positions aside), which the parser tests rely on.

use std::fmt;

use crate::position::Pos;
use crate::token::Token;

/// An identifier occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One piece of an interpolated string: literal text or an embedded
/// expression.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Lit(String),
    Expr(Expr),
}

/// A function literal: `fn(a, b) { … }` or `fn(a) => expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncLit {
    pub params: Vec<Ident>,
    /// True when the last parameter is `...rest`.
    pub variadic: bool,
    pub body: FuncBody,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FuncBody {
    Block(BlockStmt),
    Arrow(Box<Expr>),
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(Ident),
    IntLit { value: i64, pos: Pos },
    FloatLit { value: f64, pos: Pos },
    CharLit { value: char, pos: Pos },
    BoolLit { value: bool, pos: Pos },
    NilLit { pos: Pos },
    StringLit { value: String, pos: Pos },
    StringInterp { parts: Vec<StringPart>, pos: Pos },
    ArrayLit { elements: Vec<Expr>, pos: Pos },
    MapLit { entries: Vec<(String, Expr)>, pos: Pos },
    Func(FuncLit),
    Call { func: Box<Expr>, args: Vec<Expr>, pos: Pos },
    Index { expr: Box<Expr>, index: Box<Expr>, pos: Pos },
    Slice { expr: Box<Expr>, low: Option<Box<Expr>>, high: Option<Box<Expr>>, pos: Pos },
    Selector { expr: Box<Expr>, field: Ident, pos: Pos },
    Unary { op: Token, expr: Box<Expr>, pos: Pos },
    Binary { op: Token, lhs: Box<Expr>, rhs: Box<Expr>, pos: Pos },
    Ternary { cond: Box<Expr>, then: Box<Expr>, alt: Box<Expr>, pos: Pos },
    /// `...expr` inside a call's arguments or an array literal.
    Splat { expr: Box<Expr>, pos: Pos },
    Import { name: String, pos: Pos },
}

impl Expr {
    /// The position of the expression's first token.
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Ident(i) => i.pos,
            Expr::IntLit { pos, .. }
            | Expr::FloatLit { pos, .. }
            | Expr::CharLit { pos, .. }
            | Expr::BoolLit { pos, .. }
            | Expr::NilLit { pos }
            | Expr::StringLit { pos, .. }
            | Expr::StringInterp { pos, .. }
            | Expr::ArrayLit { pos, .. }
            | Expr::MapLit { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::Slice { pos, .. }
            | Expr::Selector { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Ternary { pos, .. }
            | Expr::Splat { pos, .. }
            | Expr::Import { pos, .. } => *pos,
            Expr::Func(f) => f.pos,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(i) => write!(f, "{i}"),
            Expr::IntLit { value, .. } => write!(f, "{value}"),
            Expr::FloatLit { value, .. } => {
                if value.fract() == 0.0 && value.is_finite() {
                    write!(f, "{value:.1}")
                } else {
                    write!(f, "{value}")
                }
            }
            Expr::CharLit { value, .. } => write!(f, "{value:?}"),
            Expr::BoolLit { value, .. } => write!(f, "{value}"),
            Expr::NilLit { .. } => f.write_str("nil"),
            Expr::StringLit { value, .. } => write_quoted(f, value),
            Expr::StringInterp { parts, .. } => {
                f.write_str("\"")?;
                for part in parts {
                    match part {
                        StringPart::Lit(s) => write_quoted_body(f, s)?,
                        StringPart::Expr(e) => write!(f, "{{{e}}}")?,
                    }
                }
                f.write_str("\"")
            }
            Expr::ArrayLit { elements, .. } => {
                f.write_str("[")?;
                write_list(f, elements)?;
                f.write_str("]")
            }
            Expr::MapLit { entries, .. } => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, k)?;
                    write!(f, ": {v}")?;
                }
                f.write_str("}")
            }
            Expr::Func(func) => write!(f, "{func}"),
            Expr::Call { func, args, .. } => {
                write!(f, "{func}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::Index { expr, index, .. } => write!(f, "({expr}[{index}])"),
            Expr::Slice { expr, low, high, .. } => {
                write!(f, "({expr}[")?;
                if let Some(low) = low {
                    write!(f, "{low}")?;
                }
                f.write_str(":")?;
                if let Some(high) = high {
                    write!(f, "{high}")?;
                }
                f.write_str("])")
            }
            Expr::Selector { expr, field, .. } => write!(f, "({expr}.{field})"),
            Expr::Unary { op, expr, .. } => write!(f, "({op}{expr})"),
            Expr::Binary { op, lhs, rhs, .. } => write!(f, "({lhs} {op} {rhs})"),
            Expr::Ternary { cond, then, alt, .. } => write!(f, "({cond} ? {then} : {alt})"),
            Expr::Splat { expr, .. } => write!(f, "...{expr}"),
            Expr::Import { name, .. } => write!(f, "import({name:?})"),
        }
    }
}

impl fmt::Display for FuncLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fn(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if self.variadic && i == self.params.len() - 1 {
                f.write_str("...")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(")")?;
        match &self.body {
            FuncBody::Block(block) => write!(f, " {block}"),
            FuncBody::Arrow(expr) => write!(f, " => {expr}"),
        }
    }
}

/// Writes a double-quoted string literal in re-scannable form: quotes,
/// backslashes and braces (interpolation openers) are escaped.
fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    write_quoted_body(f, s)?;
    f.write_str("\"")
}

fn write_quoted_body(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '{' => f.write_str("\\{")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    Ok(())
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// A braced statement block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStmt {
    pub stmts: Vec<Stmt>,
    pub pos: Pos,
}

impl fmt::Display for BlockStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, stmt) in self.stmts.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{stmt}")?;
        }
        f.write_str("}")
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr { expr: Expr },
    /// `lhs = rhs`, `lhs := rhs`, or a compound assignment.
    Assign { lhs: Vec<Expr>, rhs: Vec<Expr>, op: Token, pos: Pos },
    IncDec { expr: Expr, op: Token, pos: Pos },
    If { cond: Expr, body: BlockStmt, alt: Option<Box<Stmt>>, pos: Pos },
    ForC {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: BlockStmt,
        pos: Pos,
    },
    ForIn {
        key: Option<Ident>,
        value: Ident,
        iterable: Expr,
        body: BlockStmt,
        pos: Pos,
    },
    Break { label: Option<String>, pos: Pos },
    Continue { label: Option<String>, pos: Pos },
    Return { results: Vec<Expr>, pos: Pos },
    Defer { call: Expr, pos: Pos },
    Throw { value: Expr, pos: Pos },
    Try {
        body: BlockStmt,
        catch_name: Option<Ident>,
        handler: BlockStmt,
        pos: Pos,
    },
    Export { value: Expr, pos: Pos },
    Labeled { label: String, stmt: Box<Stmt>, pos: Pos },
    Block(BlockStmt),
    Empty { pos: Pos },
}

impl Stmt {
    /// The position of the statement's first token.
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Expr { expr } => expr.pos(),
            Stmt::Assign { pos, .. }
            | Stmt::IncDec { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::ForC { pos, .. }
            | Stmt::ForIn { pos, .. }
            | Stmt::Break { pos, .. }
            | Stmt::Continue { pos, .. }
            | Stmt::Return { pos, .. }
            | Stmt::Defer { pos, .. }
            | Stmt::Throw { pos, .. }
            | Stmt::Try { pos, .. }
            | Stmt::Export { pos, .. }
            | Stmt::Labeled { pos, .. }
            | Stmt::Empty { pos } => *pos,
            Stmt::Block(block) => block.pos,
        }
    }

    /// True for statements after which control cannot continue in the same
    /// block; the compiler drops everything that follows one.
    #[must_use]
    pub fn terminates_block(&self) -> bool {
        matches!(
            self,
            Stmt::Return { .. }
                | Stmt::Break { .. }
                | Stmt::Continue { .. }
                | Stmt::Throw { .. }
                | Stmt::Export { .. }
        )
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Expr { expr } => write!(f, "{expr}"),
            Stmt::Assign { lhs, rhs, op, .. } => {
                write_list(f, lhs)?;
                write!(f, " {op} ")?;
                write_list(f, rhs)
            }
            Stmt::IncDec { expr, op, .. } => write!(f, "{expr}{op}"),
            Stmt::If { cond, body, alt, .. } => {
                write!(f, "if {cond} {body}")?;
                if let Some(alt) = alt {
                    write!(f, " else {alt}")?;
                }
                Ok(())
            }
            Stmt::ForC { init, cond, post, body, .. } => {
                f.write_str("for ")?;
                if init.is_some() || post.is_some() {
                    if let Some(init) = init {
                        write!(f, "{init}")?;
                    }
                    f.write_str("; ")?;
                    if let Some(cond) = cond {
                        write!(f, "{cond}")?;
                    }
                    f.write_str("; ")?;
                    if let Some(post) = post {
                        write!(f, "{post}")?;
                    }
                    write!(f, " {body}")
                } else if let Some(cond) = cond {
                    write!(f, "{cond} {body}")
                } else {
                    write!(f, "{body}")
                }
            }
            Stmt::ForIn { key, value, iterable, body, .. } => {
                f.write_str("for ")?;
                if let Some(key) = key {
                    write!(f, "{key}, ")?;
                }
                write!(f, "{value} in {iterable} {body}")
            }
            Stmt::Break { label, .. } => match label {
                Some(l) => write!(f, "break {l}"),
                None => f.write_str("break"),
            },
            Stmt::Continue { label, .. } => match label {
                Some(l) => write!(f, "continue {l}"),
                None => f.write_str("continue"),
            },
            Stmt::Return { results, .. } => {
                if results.is_empty() {
                    f.write_str("return")
                } else {
                    f.write_str("return ")?;
                    write_list(f, results)
                }
            }
            Stmt::Defer { call, .. } => write!(f, "defer {call}"),
            Stmt::Throw { value, .. } => write!(f, "throw {value}"),
            Stmt::Try { body, catch_name, handler, .. } => {
                write!(f, "try {body} catch ")?;
                if let Some(name) = catch_name {
                    write!(f, "({name}) ")?;
                }
                write!(f, "{handler}")
            }
            Stmt::Export { value, .. } => write!(f, "export {value}"),
            Stmt::Labeled { label, stmt, .. } => write!(f, "{label}: {stmt}"),
            Stmt::Block(block) => write!(f, "{block}"),
            Stmt::Empty { .. } => Ok(()),
        }
    }
}

/// A parsed compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub stmts: Vec<Stmt>,
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.stmts.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}
