//! Recursive-descent parser.
//!
//! Binary expressions use precedence climbing over the 7 levels defined on
//! [`Token::precedence`]; the ternary `?:` binds loosest and associates to
//! the right. On an unexpected token the parser reports one error per source
//! line, skips ahead to the next statement-start token, and gives up
//! entirely after [`crate::error::MAX_ERRORS`] to avoid cascades.

use crate::ast::{BlockStmt, Expr, File, FuncBody, FuncLit, Ident, Stmt, StringPart};
use crate::error::ErrorList;
use crate::position::{Pos, SourceFile};
use crate::scanner::{parse_float_literal, parse_int_literal, Scanner};
use crate::token::{Token, TokenLit, LOWEST_PREC};

/// Parses a compilation unit, returning the AST or the aggregated errors.
pub fn parse_file(file: &mut SourceFile, src: &str) -> Result<File, ErrorList> {
    let scanner = Scanner::new(file, src);
    let mut parser = Parser::new(scanner);
    let unit = parser.parse_unit();
    let mut errors = parser.errors;
    errors.extend(parser.scanner.into_errors());
    errors.into_result().map(|()| unit)
}

/// Outcome of parsing a "simple statement" in a `for` header, which may turn
/// out to be the start of a `for … in` loop instead.
enum SimpleOrForIn {
    Simple(Stmt),
    ForIn {
        key: Option<Ident>,
        value: Ident,
        iterable: Expr,
    },
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    cur: TokenLit,
    peek: TokenLit,
    errors: ErrorList,
    /// Line of the most recent error; only the first error per line is kept.
    last_error_line: u32,
}

/// Internal parse failure: the error is already recorded, the caller
/// synchronizes.
type PResult<T> = Result<T, ()>;

impl<'a> Parser<'a> {
    fn new(mut scanner: Scanner<'a>) -> Self {
        let cur = scanner.next_token();
        let peek = scanner.next_token();
        Self {
            scanner,
            cur,
            peek,
            errors: ErrorList::new(),
            last_error_line: 0,
        }
    }

    fn next(&mut self) {
        self.cur = std::mem::replace(&mut self.peek, self.scanner.next_token());
    }

    fn at(&self, token: Token) -> bool {
        self.cur.token == token
    }

    fn error(&mut self, pos: Pos, message: impl Into<String>) {
        let fp = self.scanner.position(pos);
        // Cascading errors on one line are almost always noise.
        if fp.line == self.last_error_line {
            return;
        }
        self.last_error_line = fp.line;
        self.errors.add(fp, message);
    }

    fn error_expected(&mut self, what: &str) {
        let found = if self.cur.token == Token::Eof {
            "end of file".to_owned()
        } else {
            format!("'{}'", self.cur)
        };
        self.error(self.cur.pos, format!("expected {what}, found {found}"));
    }

    fn expect(&mut self, token: Token) -> PResult<Pos> {
        if self.at(token) {
            let pos = self.cur.pos;
            self.next();
            Ok(pos)
        } else {
            self.error_expected(&format!("'{token}'"));
            Err(())
        }
    }

    /// Consumes a statement terminator. A closing brace/paren or EOF is an
    /// acceptable terminator without being consumed.
    fn expect_semi(&mut self) -> PResult<()> {
        match self.cur.token {
            Token::Semicolon => {
                self.next();
                Ok(())
            }
            Token::RBrace | Token::RParen | Token::Eof => Ok(()),
            _ => {
                self.error_expected("';'");
                Err(())
            }
        }
    }

    /// Skips ahead to a likely statement boundary after an error.
    fn synchronize(&mut self) {
        loop {
            match self.cur.token {
                Token::Semicolon => {
                    self.next();
                    return;
                }
                Token::Eof
                | Token::Break
                | Token::Continue
                | Token::For
                | Token::If
                | Token::Return
                | Token::Defer
                | Token::Export => return,
                _ => self.next(),
            }
        }
    }

    fn parse_unit(&mut self) -> File {
        let mut stmts = vec![];
        while !self.at(Token::Eof) && !self.errors.is_full() {
            match self.parse_stmt() {
                Some(Stmt::Empty { .. }) => {}
                Some(stmt) => stmts.push(stmt),
                None => {}
            }
        }
        File { stmts }
    }

    /// Parses one statement, synchronizing on failure.
    fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.parse_stmt_inner() {
            Ok(stmt) => Some(stmt),
            Err(()) => {
                self.synchronize();
                None
            }
        }
    }

    fn parse_stmt_inner(&mut self) -> PResult<Stmt> {
        match self.cur.token {
            Token::Semicolon => {
                let pos = self.cur.pos;
                self.next();
                Ok(Stmt::Empty { pos })
            }
            Token::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Token::If => self.parse_if(),
            Token::For => self.parse_for(),
            Token::Break | Token::Continue => self.parse_branch(),
            Token::Return => self.parse_return(),
            Token::Defer => self.parse_defer(),
            Token::Throw => self.parse_throw(),
            Token::Try => self.parse_try(),
            Token::Export => self.parse_export(),
            Token::Ident if self.peek.token == Token::Colon => {
                let pos = self.cur.pos;
                let label = self.cur.literal.clone();
                self.next();
                self.next();
                let stmt = self.parse_stmt_inner()?;
                Ok(Stmt::Labeled {
                    label,
                    stmt: Box::new(stmt),
                    pos,
                })
            }
            _ => {
                let stmt = match self.parse_simple_stmt(false)? {
                    SimpleOrForIn::Simple(stmt) => stmt,
                    SimpleOrForIn::ForIn { .. } => unreachable!("`in` only allowed in for headers"),
                };
                self.expect_semi()?;
                Ok(stmt)
            }
        }
    }

    /// Parses an expression-list statement: expression, assignment,
    /// short declaration, or increment/decrement. Inside a `for` header the
    /// list may instead be the variables of a `for … in` loop.
    fn parse_simple_stmt(&mut self, for_header: bool) -> PResult<SimpleOrForIn> {
        let pos = self.cur.pos;
        let lhs = self.parse_expr_list()?;

        if for_header && self.at(Token::In) {
            self.next();
            let iterable = self.parse_expr()?;
            let mut idents = Vec::with_capacity(lhs.len());
            for target in lhs {
                match target {
                    Expr::Ident(ident) => idents.push(ident),
                    other => {
                        self.error(other.pos(), "for-in variables must be identifiers");
                        return Err(());
                    }
                }
            }
            if idents.len() > 2 {
                self.error(pos, "too many variables in for-in loop");
                return Err(());
            }
            let mut idents = idents.into_iter();
            let (key, value) = match (idents.next(), idents.next()) {
                (Some(value), None) => (None, value),
                (Some(key), Some(value)) => (Some(key), value),
                _ => return Err(()),
            };
            return Ok(SimpleOrForIn::ForIn { key, value, iterable });
        }

        let op = self.cur.token;
        match op {
            Token::Assign | Token::Define => {
                self.next();
                let rhs = self.parse_expr_list()?;
                self.check_assign_targets(&lhs, op == Token::Define)?;
                self.check_assign_arity(pos, lhs.len(), rhs.len())?;
                Ok(SimpleOrForIn::Simple(Stmt::Assign { lhs, rhs, op, pos }))
            }
            _ if op.assign_op().is_some() => {
                self.next();
                let rhs = self.parse_expr_list()?;
                if lhs.len() != 1 || rhs.len() != 1 {
                    self.error(pos, "compound assignment requires single operands");
                    return Err(());
                }
                self.check_assign_targets(&lhs, false)?;
                Ok(SimpleOrForIn::Simple(Stmt::Assign { lhs, rhs, op, pos }))
            }
            Token::Inc | Token::Dec => {
                self.next();
                let mut lhs = lhs;
                if lhs.len() != 1 {
                    self.error(pos, "expected one operand");
                    return Err(());
                }
                let expr = lhs.pop().unwrap_or(Expr::NilLit { pos });
                self.check_assign_targets(std::slice::from_ref(&expr), false)?;
                Ok(SimpleOrForIn::Simple(Stmt::IncDec { expr, op, pos }))
            }
            _ => {
                if lhs.len() != 1 {
                    self.error(pos, "expected assignment after expression list");
                    return Err(());
                }
                let mut lhs = lhs;
                let expr = lhs.pop().unwrap_or(Expr::NilLit { pos });
                Ok(SimpleOrForIn::Simple(Stmt::Expr { expr }))
            }
        }
    }

    /// Validates assignment targets: identifiers only for `:=`, otherwise
    /// identifiers, index, or selector expressions.
    fn check_assign_targets(&mut self, targets: &[Expr], define: bool) -> PResult<()> {
        for target in targets {
            let ok = match target {
                Expr::Ident(_) => true,
                Expr::Index { .. } | Expr::Selector { .. } => !define,
                _ => false,
            };
            if !ok {
                let what = if define {
                    "':=' requires identifiers on the left"
                } else {
                    "cannot assign to this expression"
                };
                self.error(target.pos(), what);
                return Err(());
            }
        }
        Ok(())
    }

    /// `n = n` assignment, or unpacking a single right-hand value into
    /// several targets.
    fn check_assign_arity(&mut self, pos: Pos, lhs: usize, rhs: usize) -> PResult<()> {
        if lhs == rhs || (rhs == 1 && lhs > 1) {
            Ok(())
        } else {
            self.error(pos, format!("assignment count mismatch: {lhs} = {rhs}"));
            Err(())
        }
    }

    fn parse_block(&mut self) -> PResult<BlockStmt> {
        let pos = self.expect(Token::LBrace)?;
        let mut stmts = vec![];
        while !self.at(Token::RBrace) && !self.at(Token::Eof) && !self.errors.is_full() {
            if let Some(stmt) = self.parse_stmt() {
                if !matches!(stmt, Stmt::Empty { .. }) {
                    stmts.push(stmt);
                }
            }
        }
        self.expect(Token::RBrace)?;
        Ok(BlockStmt { stmts, pos })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::If)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        let alt = if self.at(Token::Else) {
            self.next();
            let stmt = if self.at(Token::If) {
                self.parse_if()?
            } else {
                Stmt::Block(self.parse_block()?)
            };
            Some(Box::new(stmt))
        } else {
            self.expect_semi()?;
            None
        };
        Ok(Stmt::If { cond, body, alt, pos })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::For)?;

        // `for { … }` — no clauses.
        if self.at(Token::LBrace) {
            let body = self.parse_block()?;
            self.expect_semi()?;
            return Ok(Stmt::ForC {
                init: None,
                cond: None,
                post: None,
                body,
                pos,
            });
        }

        let header = if self.at(Token::Semicolon) {
            None
        } else {
            match self.parse_simple_stmt(true)? {
                SimpleOrForIn::ForIn { key, value, iterable } => {
                    let body = self.parse_block()?;
                    self.expect_semi()?;
                    return Ok(Stmt::ForIn {
                        key,
                        value,
                        iterable,
                        body,
                        pos,
                    });
                }
                SimpleOrForIn::Simple(stmt) => Some(stmt),
            }
        };

        // `for cond { … }` — the header must be a bare expression.
        if self.at(Token::LBrace) {
            let cond = match header {
                Some(Stmt::Expr { expr }) => Some(expr),
                None => None,
                Some(other) => {
                    self.error(other.pos(), "expected loop condition");
                    return Err(());
                }
            };
            let body = self.parse_block()?;
            self.expect_semi()?;
            return Ok(Stmt::ForC {
                init: None,
                cond,
                post: None,
                body,
                pos,
            });
        }

        // Classical three-clause form.
        self.expect(Token::Semicolon)?;
        let cond = if self.at(Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::Semicolon)?;
        let post = if self.at(Token::LBrace) {
            None
        } else {
            match self.parse_simple_stmt(false)? {
                SimpleOrForIn::Simple(stmt) => Some(Box::new(stmt)),
                SimpleOrForIn::ForIn { .. } => unreachable!(),
            }
        };
        let body = self.parse_block()?;
        self.expect_semi()?;
        Ok(Stmt::ForC {
            init: header.map(Box::new),
            cond,
            post,
            body,
            pos,
        })
    }

    fn parse_branch(&mut self) -> PResult<Stmt> {
        let token = self.cur.token;
        let pos = self.cur.pos;
        self.next();
        let label = if self.at(Token::Ident) {
            let label = self.cur.literal.clone();
            self.next();
            Some(label)
        } else {
            None
        };
        self.expect_semi()?;
        Ok(match token {
            Token::Break => Stmt::Break { label, pos },
            _ => Stmt::Continue { label, pos },
        })
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Return)?;
        let results = if self.at(Token::Semicolon) || self.at(Token::RBrace) || self.at(Token::Eof) {
            vec![]
        } else {
            self.parse_expr_list()?
        };
        self.expect_semi()?;
        Ok(Stmt::Return { results, pos })
    }

    fn parse_defer(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Defer)?;
        let call = self.parse_expr()?;
        if !matches!(call, Expr::Call { .. }) {
            self.error(call.pos(), "defer requires a function call");
            return Err(());
        }
        self.expect_semi()?;
        Ok(Stmt::Defer { call, pos })
    }

    fn parse_throw(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Throw)?;
        let value = self.parse_expr()?;
        self.expect_semi()?;
        Ok(Stmt::Throw { value, pos })
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Try)?;
        let body = self.parse_block()?;
        self.expect(Token::Catch)?;
        let catch_name = if self.at(Token::LParen) {
            self.next();
            let name = self.parse_ident()?;
            self.expect(Token::RParen)?;
            Some(name)
        } else {
            None
        };
        let handler = self.parse_block()?;
        self.expect_semi()?;
        Ok(Stmt::Try {
            body,
            catch_name,
            handler,
            pos,
        })
    }

    fn parse_export(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Export)?;
        let value = self.parse_expr()?;
        self.expect_semi()?;
        Ok(Stmt::Export { value, pos })
    }

    fn parse_ident(&mut self) -> PResult<Ident> {
        if self.at(Token::Ident) {
            let ident = Ident {
                name: self.cur.literal.clone(),
                pos: self.cur.pos,
            };
            self.next();
            Ok(ident)
        } else {
            self.error_expected("identifier");
            Err(())
        }
    }

    fn parse_expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut list = vec![self.parse_expr()?];
        while self.at(Token::Comma) {
            self.next();
            list.push(self.parse_expr()?);
        }
        Ok(list)
    }

    /// Parses a full expression, including the ternary.
    fn parse_expr(&mut self) -> PResult<Expr> {
        let cond = self.parse_binary_expr(LOWEST_PREC + 1)?;
        if !self.at(Token::Question) {
            return Ok(cond);
        }
        let pos = self.cur.pos;
        self.next();
        let then = self.parse_expr()?;
        self.expect(Token::Colon)?;
        let alt = self.parse_expr()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            alt: Box::new(alt),
            pos,
        })
    }

    /// Precedence climbing over binary operators; left-associative.
    fn parse_binary_expr(&mut self, min_prec: usize) -> PResult<Expr> {
        let mut lhs = self.parse_unary_expr()?;
        loop {
            let op = self.cur.token;
            let prec = op.precedence();
            if prec < min_prec {
                return Ok(lhs);
            }
            let pos = self.cur.pos;
            self.next();
            let rhs = self.parse_binary_expr(prec + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
    }

    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        match self.cur.token {
            Token::Add | Token::Sub | Token::Not | Token::Xor => {
                let op = self.cur.token;
                let pos = self.cur.pos;
                self.next();
                let expr = self.parse_unary_expr()?;
                Ok(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                    pos,
                })
            }
            _ => self.parse_postfix_expr(),
        }
    }

    /// Parses a primary expression followed by call/index/slice/selector
    /// suffixes.
    fn parse_postfix_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.cur.token {
                Token::LParen => {
                    let pos = self.cur.pos;
                    self.next();
                    let args = self.parse_call_args()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        pos,
                    };
                }
                Token::LBrack => {
                    let pos = self.cur.pos;
                    self.next();
                    expr = self.parse_index_suffix(expr, pos)?;
                }
                Token::Period => {
                    let pos = self.cur.pos;
                    self.next();
                    let field = self.parse_ident()?;
                    expr = Expr::Selector {
                        expr: Box::new(expr),
                        field,
                        pos,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Parses `[index]`, `[low:high]`, `[:high]`, `[low:]`, or `[:]` after
    /// the opening bracket.
    fn parse_index_suffix(&mut self, expr: Expr, pos: Pos) -> PResult<Expr> {
        let low = if self.at(Token::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        if self.at(Token::Colon) {
            self.next();
            let high = if self.at(Token::RBrack) {
                None
            } else {
                Some(Box::new(self.parse_expr()?))
            };
            self.expect(Token::RBrack)?;
            return Ok(Expr::Slice {
                expr: Box::new(expr),
                low,
                high,
                pos,
            });
        }
        self.expect(Token::RBrack)?;
        match low {
            Some(index) => Ok(Expr::Index {
                expr: Box::new(expr),
                index,
                pos,
            }),
            None => {
                self.error_expected("index expression");
                Err(())
            }
        }
    }

    /// Parses call arguments after the opening parenthesis; arguments may be
    /// `...expr` splats.
    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args = vec![];
        while !self.at(Token::RParen) {
            args.push(self.parse_possibly_splat()?);
            if self.at(Token::Comma) {
                self.next();
            } else if self.at(Token::Semicolon) && self.peek.token == Token::RParen {
                self.next();
            } else {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn parse_possibly_splat(&mut self) -> PResult<Expr> {
        if self.at(Token::Ellipsis) {
            let pos = self.cur.pos;
            self.next();
            let expr = self.parse_expr()?;
            Ok(Expr::Splat {
                expr: Box::new(expr),
                pos,
            })
        } else {
            self.parse_expr()
        }
    }

    fn parse_primary_expr(&mut self) -> PResult<Expr> {
        let pos = self.cur.pos;
        match self.cur.token {
            Token::Ident => {
                let ident = self.parse_ident()?;
                Ok(Expr::Ident(ident))
            }
            Token::Int => {
                let lit = self.cur.literal.clone();
                self.next();
                match parse_int_literal(&lit) {
                    Some(value) => Ok(Expr::IntLit { value, pos }),
                    None => {
                        self.error(pos, format!("invalid integer literal {lit:?}"));
                        Err(())
                    }
                }
            }
            Token::Float => {
                let lit = self.cur.literal.clone();
                self.next();
                match parse_float_literal(&lit) {
                    Some(value) => Ok(Expr::FloatLit { value, pos }),
                    None => {
                        self.error(pos, format!("invalid float literal {lit:?}"));
                        Err(())
                    }
                }
            }
            Token::Char => {
                let lit = self.cur.literal.clone();
                self.next();
                match lit.chars().next() {
                    Some(value) => Ok(Expr::CharLit { value, pos }),
                    None => {
                        self.error(pos, "empty character literal");
                        Err(())
                    }
                }
            }
            Token::True | Token::False => {
                let value = self.at(Token::True);
                self.next();
                Ok(Expr::BoolLit { value, pos })
            }
            Token::Nil => {
                self.next();
                Ok(Expr::NilLit { pos })
            }
            Token::String => {
                let value = self.cur.literal.clone();
                self.next();
                Ok(Expr::StringLit { value, pos })
            }
            Token::StringBegin => self.parse_string_interp(),
            Token::LParen => {
                self.next();
                let expr = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::LBrack => self.parse_array_lit(),
            Token::LBrace => self.parse_map_lit(),
            Token::Fn => self.parse_func_lit(),
            Token::Import => self.parse_import(),
            _ => {
                self.error_expected("expression");
                Err(())
            }
        }
    }

    fn parse_string_interp(&mut self) -> PResult<Expr> {
        let pos = self.cur.pos;
        let mut parts = vec![StringPart::Lit(self.cur.literal.clone())];
        self.next();
        loop {
            parts.push(StringPart::Expr(self.parse_expr()?));
            match self.cur.token {
                Token::StringNext => {
                    parts.push(StringPart::Lit(self.cur.literal.clone()));
                    self.next();
                }
                Token::StringEnd => {
                    parts.push(StringPart::Lit(self.cur.literal.clone()));
                    self.next();
                    return Ok(Expr::StringInterp { parts, pos });
                }
                _ => {
                    self.error_expected("string continuation");
                    return Err(());
                }
            }
        }
    }

    fn parse_array_lit(&mut self) -> PResult<Expr> {
        let pos = self.expect(Token::LBrack)?;
        let mut elements = vec![];
        while !self.at(Token::RBrack) && !self.at(Token::Eof) {
            elements.push(self.parse_possibly_splat()?);
            if self.at(Token::Comma) {
                self.next();
            } else if self.at(Token::Semicolon) && self.peek.token == Token::RBrack {
                self.next();
            } else {
                break;
            }
        }
        self.expect(Token::RBrack)?;
        Ok(Expr::ArrayLit { elements, pos })
    }

    fn parse_map_lit(&mut self) -> PResult<Expr> {
        let pos = self.expect(Token::LBrace)?;
        let mut entries = vec![];
        while !self.at(Token::RBrace) && !self.at(Token::Eof) {
            let key = match self.cur.token {
                Token::Ident | Token::String => {
                    let key = self.cur.literal.clone();
                    self.next();
                    key
                }
                _ => {
                    self.error_expected("map key");
                    return Err(());
                }
            };
            self.expect(Token::Colon)?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if self.at(Token::Comma) {
                self.next();
            } else if self.at(Token::Semicolon) && self.peek.token == Token::RBrace {
                self.next();
            } else {
                break;
            }
        }
        self.expect(Token::RBrace)?;
        Ok(Expr::MapLit { entries, pos })
    }

    fn parse_func_lit(&mut self) -> PResult<Expr> {
        let pos = self.expect(Token::Fn)?;
        self.expect(Token::LParen)?;
        let mut params = vec![];
        let mut variadic = false;
        while !self.at(Token::RParen) {
            if variadic {
                self.error(self.cur.pos, "rest parameter must be last");
                return Err(());
            }
            if self.at(Token::Ellipsis) {
                self.next();
                variadic = true;
            }
            params.push(self.parse_ident()?);
            if self.at(Token::Comma) {
                self.next();
            } else {
                break;
            }
        }
        self.expect(Token::RParen)?;

        let body = if self.at(Token::Arrow) {
            self.next();
            FuncBody::Arrow(Box::new(self.parse_expr()?))
        } else {
            FuncBody::Block(self.parse_block()?)
        };
        Ok(Expr::Func(FuncLit {
            params,
            variadic,
            body,
            pos,
        }))
    }

    fn parse_import(&mut self) -> PResult<Expr> {
        let pos = self.expect(Token::Import)?;
        self.expect(Token::LParen)?;
        if !self.at(Token::String) {
            self.error_expected("module name string");
            return Err(());
        }
        let name = self.cur.literal.clone();
        self.next();
        self.expect(Token::RParen)?;
        Ok(Expr::Import { name, pos })
    }
}
