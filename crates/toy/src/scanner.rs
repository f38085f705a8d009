//! Lexical scanner: source bytes to `(Token, literal, Pos)` triples.
//!
//! The scanner inserts implicit semicolons at newlines after statement-ending
//! tokens, cooks the three string flavors (`"…"` with escapes, `` `…` `` raw,
//! `''…''` indented) including `{expr}` interpolation, and scans numbers in
//! bases 2/8/10/16 with `_` separators. Errors go to an internal capped list
//! and scanning continues so one pass reports as much as possible.

use crate::error::ErrorList;
use crate::position::{FilePos, Pos, SourceFile};
use crate::token::{Token, TokenLit};

/// Which quote form a suspended (interpolated) string scan belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    /// `"…"` - escapes processed, single line.
    Double,
    /// `` `…` `` - raw, may span lines.
    Raw,
    /// `''…''` - indented, may span lines, `\` + newline continues.
    Indent,
}

/// One suspended string scan: entered at `{`, resumed at the matching `}`.
///
/// `braces` counts `{`/`}` pairs that belong to the interpolated expression
/// itself (map literals, blocks) so the scanner knows which `}` ends the
/// interpolation.
#[derive(Debug)]
struct Interp {
    quote: Quote,
    braces: usize,
}

/// The lexical scanner.
///
/// Pull-based: the parser calls [`Scanner::next_token`] repeatedly until
/// [`Token::Eof`]. The scanner records line starts into its [`SourceFile`]
/// as it goes, so positions can be resolved afterwards.
#[derive(Debug)]
pub struct Scanner<'a> {
    file: &'a mut SourceFile,
    src: &'a str,
    /// Current character, `None` at EOF.
    ch: Option<char>,
    /// Byte offset of `ch`.
    offset: usize,
    /// Byte offset of the next character to read.
    rd: usize,
    /// Whether a newline at this point yields an implicit semicolon.
    insert_semi: bool,
    /// Stack of suspended string scans (interpolation).
    interp: Vec<Interp>,
    errors: ErrorList,
}

impl<'a> Scanner<'a> {
    pub fn new(file: &'a mut SourceFile, src: &'a str) -> Self {
        let mut s = Self {
            file,
            src,
            ch: None,
            offset: 0,
            rd: 0,
            insert_semi: false,
            interp: vec![],
            errors: ErrorList::new(),
        };
        s.next();
        // A byte order mark is permitted only at the very start.
        if s.ch == Some('\u{feff}') {
            s.next();
        }
        s
    }

    /// Returns the errors collected so far.
    #[must_use]
    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    /// Consumes the scanner, returning its error list.
    #[must_use]
    pub fn into_errors(self) -> ErrorList {
        self.errors
    }

    /// Resolves a byte offset in this file to a position.
    #[must_use]
    pub fn pos_at(&self, offset: usize) -> Pos {
        self.file.pos(offset)
    }

    /// Resolves a position to file/line/column; the parser uses this for
    /// its diagnostics.
    #[must_use]
    pub fn position(&self, pos: Pos) -> FilePos {
        self.file.position(pos)
    }

    fn error(&mut self, offset: usize, msg: impl Into<String>) {
        let pos = self.file.position(self.file.pos(offset));
        self.errors.add(pos, msg);
    }

    /// Advances to the next character, recording line starts.
    fn next(&mut self) {
        if self.rd < self.src.len() {
            self.offset = self.rd;
            let ch = self.src[self.rd..].chars().next().unwrap_or('\u{fffd}');
            self.rd += ch.len_utf8();
            if ch == '\n' {
                self.file.add_line(self.offset + 1);
            }
            if ch == '\u{feff}' && self.offset != 0 {
                self.error(self.offset, "illegal byte order mark");
            }
            self.ch = Some(ch);
        } else {
            self.offset = self.src.len();
            self.ch = None;
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.rd..].chars().next()
    }

    /// Scans the next token.
    pub fn next_token(&mut self) -> TokenLit {
        loop {
            if let Some(tok) = self.skip_whitespace() {
                return tok;
            }
            let pos = self.pos_at(self.offset);
            let (token, literal) = match self.ch {
                None => {
                    if self.insert_semi {
                        self.insert_semi = false;
                        return TokenLit {
                            token: Token::Semicolon,
                            literal: "\n".into(),
                            pos,
                        };
                    }
                    (Token::Eof, String::new())
                }
                Some(c) if is_letter(c) => {
                    let name = self.scan_identifier();
                    let token = Token::lookup_keyword(&name).unwrap_or(Token::Ident);
                    (token, name)
                }
                Some(c) if c.is_ascii_digit() => self.scan_number(),
                Some('"') => self.scan_string(Quote::Double, true),
                Some('`') => self.scan_string(Quote::Raw, true),
                Some('\'') => {
                    if self.peek() == Some('\'') {
                        self.next(); // consume the second quote
                        self.scan_string(Quote::Indent, true)
                    } else {
                        self.scan_char()
                    }
                }
                Some('/') => match self.peek() {
                    Some('/') | Some('*') => {
                        self.scan_comment();
                        continue;
                    }
                    _ => self.scan_operator(),
                },
                Some(_) => self.scan_operator(),
            };
            self.insert_semi = token.inserts_semi();
            return TokenLit { token, literal, pos };
        }
    }

    /// Skips spaces, tabs and carriage returns; a newline becomes an
    /// implicit semicolon when the previous token calls for one.
    fn skip_whitespace(&mut self) -> Option<TokenLit> {
        while let Some(c) = self.ch {
            match c {
                ' ' | '\t' | '\r' => self.next(),
                '\n' => {
                    if self.insert_semi {
                        self.insert_semi = false;
                        let pos = self.pos_at(self.offset);
                        self.next();
                        return Some(TokenLit {
                            token: Token::Semicolon,
                            literal: "\n".into(),
                            pos,
                        });
                    }
                    self.next();
                }
                _ => break,
            }
        }
        None
    }

    fn scan_identifier(&mut self) -> String {
        let start = self.offset;
        while let Some(c) = self.ch {
            if is_letter(c) || c.is_ascii_digit() {
                self.next();
            } else {
                break;
            }
        }
        self.src[start..self.offset].to_owned()
    }

    fn scan_comment(&mut self) {
        // self.ch == '/', peek is '/' or '*'
        let start = self.offset;
        self.next();
        if self.ch == Some('/') {
            while let Some(c) = self.ch {
                if c == '\n' {
                    break;
                }
                self.next();
            }
        } else {
            // block comment
            self.next(); // consume '*'
            loop {
                match self.ch {
                    None => {
                        self.error(start, "comment not terminated");
                        break;
                    }
                    Some('*') if self.peek() == Some('/') => {
                        self.next();
                        self.next();
                        break;
                    }
                    _ => self.next(),
                }
            }
        }
    }

    /// Scans an integer or float literal, returning the token and its
    /// original spelling.
    fn scan_number(&mut self) -> (Token, String) {
        let start = self.offset;
        let mut token = Token::Int;

        if self.ch == Some('0') && matches!(self.peek(), Some('b' | 'B' | 'o' | 'O' | 'x' | 'X')) {
            let base_ch = self.peek().unwrap_or('x');
            self.next();
            self.next();
            let hex = matches!(base_ch, 'x' | 'X');
            let is_digit: fn(char) -> bool = match base_ch {
                'b' | 'B' => |c| matches!(c, '0' | '1'),
                'o' | 'O' => |c| matches!(c, '0'..='7'),
                _ => |c: char| c.is_ascii_hexdigit(),
            };
            self.scan_digits(is_digit);
            if hex {
                // Hexadecimal floats: fraction and binary exponent p/P.
                if self.ch == Some('.') {
                    token = Token::Float;
                    self.next();
                    self.scan_digits(|c| c.is_ascii_hexdigit());
                }
                if matches!(self.ch, Some('p' | 'P')) {
                    token = Token::Float;
                    self.next();
                    if matches!(self.ch, Some('+' | '-')) {
                        self.next();
                    }
                    self.scan_digits(|c| c.is_ascii_digit());
                }
            } else if self.ch == Some('.') {
                self.error(self.offset, "radix point requires base 10 or 16");
                self.next();
                self.scan_digits(|c| c.is_ascii_digit());
            }
        } else {
            self.scan_digits(|c| c.is_ascii_digit());
            if self.ch == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
                token = Token::Float;
                self.next();
                self.scan_digits(|c| c.is_ascii_digit());
            }
            if matches!(self.ch, Some('e' | 'E')) {
                token = Token::Float;
                self.next();
                if matches!(self.ch, Some('+' | '-')) {
                    self.next();
                }
                if !self.ch.is_some_and(|c| c.is_ascii_digit()) {
                    self.error(self.offset, "exponent has no digits");
                }
                self.scan_digits(|c| c.is_ascii_digit());
            }
        }

        (token, self.src[start..self.offset].to_owned())
    }

    fn scan_digits(&mut self, is_digit: fn(char) -> bool) {
        while let Some(c) = self.ch {
            if is_digit(c) || c == '_' {
                self.next();
            } else {
                break;
            }
        }
    }

    /// Scans a character literal `'x'`.
    fn scan_char(&mut self) -> (Token, String) {
        let start = self.offset;
        self.next(); // consume opening quote
        let mut value = String::new();
        match self.ch {
            None | Some('\n') => {
                self.error(start, "character literal not terminated");
                return (Token::Char, value);
            }
            Some('\\') => {
                if let Some(c) = self.scan_escape('\'') {
                    value.push(c);
                }
            }
            Some('\'') => {
                self.error(start, "empty character literal");
            }
            Some(c) => {
                value.push(c);
                self.next();
            }
        }
        if self.ch == Some('\'') {
            self.next();
        } else {
            self.error(start, "character literal not terminated");
        }
        (Token::Char, value)
    }

    /// Scans (or resumes) a string. `opening` is true when called at the
    /// opening delimiter, false when resuming after an interpolation's `}`.
    ///
    /// Returns `String` for a complete uninterpolated string, `StringBegin`
    /// when the scan pauses at the first `{`, and `StringNext`/`StringEnd`
    /// for fragments of a resumed scan.
    fn scan_string(&mut self, quote: Quote, opening: bool) -> (Token, String) {
        let start = self.offset;
        if opening {
            self.next(); // consume the delimiter (second `'` already consumed for Indent)
        }
        let mut value = String::new();
        let had_interp = !opening;
        loop {
            match self.ch {
                None => {
                    self.error(start, "string literal not terminated");
                    break;
                }
                Some('\n') if quote == Quote::Double => {
                    self.error(start, "string literal not terminated");
                    break;
                }
                Some('"') if quote == Quote::Double => {
                    self.next();
                    return self.finish_string(quote, value, had_interp, false);
                }
                Some('`') if quote == Quote::Raw => {
                    self.next();
                    return self.finish_string(quote, value, had_interp, false);
                }
                Some('\'') if quote == Quote::Indent && self.peek() == Some('\'') => {
                    self.next();
                    self.next();
                    return self.finish_string(quote, value, had_interp, false);
                }
                Some('{') => {
                    self.next();
                    return self.finish_string(quote, value, had_interp, true);
                }
                Some('\\') if quote == Quote::Double => {
                    if let Some(c) = self.scan_escape('"') {
                        value.push(c);
                    }
                }
                Some('\\') if quote == Quote::Indent && self.peek() == Some('\n') => {
                    // Line continuation: elide the backslash and the newline.
                    self.next();
                    self.next();
                }
                Some(c) => {
                    value.push(c);
                    self.next();
                }
            }
        }
        // Unterminated: report what we have as a complete string.
        self.finish_string(quote, value, had_interp, false)
    }

    /// Classifies a scanned fragment and maintains the interpolation stack.
    fn finish_string(&mut self, quote: Quote, value: String, had_interp: bool, paused: bool) -> (Token, String) {
        match (had_interp, paused) {
            (false, false) => {
                let value = if quote == Quote::Indent { strip_indent(&value) } else { value };
                (Token::String, value)
            }
            (false, true) => {
                self.interp.push(Interp { quote, braces: 0 });
                (Token::StringBegin, value)
            }
            (true, true) => (Token::StringNext, value),
            (true, false) => {
                self.interp.pop();
                (Token::StringEnd, value)
            }
        }
    }

    /// Scans an escape sequence after the backslash; `delim` is the closing
    /// quote of the surrounding literal. Returns the cooked character, or
    /// `None` after reporting an error.
    fn scan_escape(&mut self, delim: char) -> Option<char> {
        let start = self.offset;
        self.next(); // consume backslash
        let c = self.ch?;
        let simple = match c {
            'a' => Some('\x07'),
            'b' => Some('\x08'),
            'f' => Some('\x0c'),
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'v' => Some('\x0b'),
            '0' => Some('\0'),
            '\\' => Some('\\'),
            '{' => Some('{'),
            c if c == delim => Some(c),
            _ => None,
        };
        if let Some(c) = simple {
            self.next();
            return Some(c);
        }
        let digits = match c {
            'x' => 2,
            'u' => 4,
            'U' => 8,
            _ => {
                self.error(start, "unknown escape sequence");
                self.next();
                return None;
            }
        };
        self.next();
        let mut code: u32 = 0;
        for _ in 0..digits {
            let d = self.ch.and_then(|c| c.to_digit(16));
            match d {
                Some(d) => {
                    code = code * 16 + d;
                    self.next();
                }
                None => {
                    self.error(start, "illegal character in escape sequence");
                    return None;
                }
            }
        }
        match char::from_u32(code) {
            Some(c) => Some(c),
            None => {
                self.error(start, "escape sequence is invalid Unicode code point");
                None
            }
        }
    }

    /// Scans an operator or punctuation token starting at `self.ch`.
    fn scan_operator(&mut self) -> (Token, String) {
        let c = self.ch.unwrap_or('\0');
        let start = self.offset;
        self.next();
        let token = match c {
            '+' => self.pick2('+', Token::Inc, '=', Token::AddAssign, Token::Add),
            '-' => self.pick2('-', Token::Dec, '=', Token::SubAssign, Token::Sub),
            '*' => self.pick('=', Token::MulAssign, Token::Mul),
            '/' => self.pick('=', Token::QuoAssign, Token::Quo),
            '%' => self.pick('=', Token::RemAssign, Token::Rem),
            '&' => {
                if self.ch == Some('^') {
                    self.next();
                    self.pick('=', Token::AndNotAssign, Token::AndNot)
                } else {
                    self.pick2('&', Token::LAnd, '=', Token::AndAssign, Token::And)
                }
            }
            '|' => self.pick2('|', Token::LOr, '=', Token::OrAssign, Token::Or),
            '^' => self.pick('=', Token::XorAssign, Token::Xor),
            '<' => {
                if self.ch == Some('<') {
                    self.next();
                    self.pick('=', Token::ShlAssign, Token::Shl)
                } else {
                    self.pick('=', Token::LessEq, Token::Less)
                }
            }
            '>' => {
                if self.ch == Some('>') {
                    self.next();
                    self.pick('=', Token::ShrAssign, Token::Shr)
                } else {
                    self.pick('=', Token::GreaterEq, Token::Greater)
                }
            }
            '=' => self.pick2('=', Token::Equal, '>', Token::Arrow, Token::Assign),
            '!' => self.pick('=', Token::NotEqual, Token::Not),
            ':' => self.pick('=', Token::Define, Token::Colon),
            '?' => {
                if self.ch == Some('?') {
                    self.next();
                    self.pick('=', Token::NullishAssign, Token::Nullish)
                } else {
                    Token::Question
                }
            }
            '.' => {
                if self.ch == Some('.') && self.peek() == Some('.') {
                    self.next();
                    self.next();
                    Token::Ellipsis
                } else {
                    Token::Period
                }
            }
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBrack,
            ']' => Token::RBrack,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '{' => {
                if let Some(top) = self.interp.last_mut() {
                    top.braces += 1;
                }
                Token::LBrace
            }
            '}' => {
                match self.interp.last_mut() {
                    Some(top) if top.braces == 0 => {
                        // This `}` closes an interpolation: resume the string.
                        let quote = top.quote;
                        let (token, literal) = self.scan_string(quote, false);
                        self.insert_semi = token.inserts_semi();
                        return (token, literal);
                    }
                    Some(top) => {
                        top.braces -= 1;
                        Token::RBrace
                    }
                    None => Token::RBrace,
                }
            }
            _ => {
                self.error(start, format!("illegal character {c:?}"));
                Token::Illegal
            }
        };
        (token, String::new())
    }

    /// One-character lookahead selection: `a=` vs `a`.
    fn pick(&mut self, next: char, matched: Token, default: Token) -> Token {
        if self.ch == Some(next) {
            self.next();
            matched
        } else {
            default
        }
    }

    /// Two-way lookahead selection: `aa` vs `a=` vs `a`.
    fn pick2(&mut self, n1: char, t1: Token, n2: char, t2: Token, default: Token) -> Token {
        if self.ch == Some(n1) {
            self.next();
            t1
        } else if self.ch == Some(n2) {
            self.next();
            t2
        } else {
            default
        }
    }
}

/// Returns true for identifier-start characters.
fn is_letter(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

/// Strips the common leading indentation of an `''…''` string.
///
/// A leading newline (the conventional opener) is dropped, then the minimum
/// indentation over non-blank lines is removed from every line.
fn strip_indent(s: &str) -> String {
    let s = s.strip_prefix('\n').unwrap_or(s);
    let min_indent = s
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    if min_indent == 0 {
        return s.to_owned();
    }
    let mut out = String::with_capacity(s.len());
    for (i, line) in s.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if line.len() >= min_indent {
            out.push_str(&line[min_indent..]);
        } else {
            out.push_str(line.trim_start_matches([' ', '\t']));
        }
    }
    if s.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Parses an integer literal spelling (base prefixes, `_` separators).
///
/// Out-of-range literals wrap; the language's integers are 64-bit wrapping.
pub(crate) fn parse_int_literal(lit: &str) -> Option<i64> {
    let clean: String = lit.chars().filter(|&c| c != '_').collect();
    let (digits, radix) = match clean.as_bytes() {
        [b'0', b'b' | b'B', ..] => (&clean[2..], 2),
        [b'0', b'o' | b'O', ..] => (&clean[2..], 8),
        [b'0', b'x' | b'X', ..] => (&clean[2..], 16),
        _ => (clean.as_str(), 10),
    };
    match u64::from_str_radix(digits, radix) {
        Ok(v) => Some(v as i64),
        Err(_) => i64::from_str_radix(digits, radix).ok(),
    }
}

/// Parses a float literal spelling, including hexadecimal floats with a
/// binary exponent (`0x1.8p3`).
pub(crate) fn parse_float_literal(lit: &str) -> Option<f64> {
    let clean: String = lit.chars().filter(|&c| c != '_').collect();
    if let Some(hex) = clean.strip_prefix("0x").or_else(|| clean.strip_prefix("0X")) {
        let (mantissa, exp) = match hex.split_once(['p', 'P']) {
            Some((m, e)) => (m, e.parse::<i32>().ok()?),
            None => (hex, 0),
        };
        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        let mut value = 0.0f64;
        for c in int_part.chars() {
            value = value * 16.0 + f64::from(c.to_digit(16)?);
        }
        let mut scale = 1.0 / 16.0;
        for c in frac_part.chars() {
            value += f64::from(c.to_digit(16)?) * scale;
            scale /= 16.0;
        }
        Some(value * 2f64.powi(exp))
    } else {
        clean.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::FileSet;
    use pretty_assertions::assert_eq;

    fn scan_all(src: &str) -> Vec<(Token, String)> {
        let mut set = FileSet::new();
        let id = set.add_file("test.toy", src.len());
        let mut scanner = Scanner::new(set.file_mut(id), src);
        let mut out = vec![];
        loop {
            let t = scanner.next_token();
            if t.token == Token::Eof {
                break;
            }
            out.push((t.token, t.literal));
        }
        assert!(scanner.errors().is_empty(), "scan errors: {}", scanner.errors());
        out
    }

    fn kinds(src: &str) -> Vec<Token> {
        scan_all(src).into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn identifiers_and_keywords() {
        assert_eq!(
            kinds("fn foo bar_2 return"),
            vec![Token::Fn, Token::Ident, Token::Ident, Token::Return]
        );
    }

    #[test]
    fn semicolon_insertion() {
        assert_eq!(
            kinds("a\nb"),
            vec![Token::Ident, Token::Semicolon, Token::Ident]
        );
        // No insertion after an operator.
        assert_eq!(kinds("a +\nb"), vec![Token::Ident, Token::Add, Token::Ident]);
        // Insertion after ++ and after ).
        assert_eq!(
            kinds("a++\n(b)\nc"),
            vec![
                Token::Ident,
                Token::Inc,
                Token::Semicolon,
                Token::LParen,
                Token::Ident,
                Token::RParen,
                Token::Semicolon,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn numbers() {
        let toks = scan_all("12 1_000 0x1f 0b1010 0o17 1.5 2e10 1_0.5 0x1.8p3");
        assert_eq!(
            toks.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
            vec![
                Token::Int,
                Token::Int,
                Token::Int,
                Token::Int,
                Token::Int,
                Token::Float,
                Token::Float,
                Token::Float,
                Token::Float,
            ]
        );
        assert_eq!(parse_int_literal("1_000"), Some(1000));
        assert_eq!(parse_int_literal("0x1f"), Some(31));
        assert_eq!(parse_int_literal("0b1010"), Some(10));
        assert_eq!(parse_int_literal("0o17"), Some(15));
        assert_eq!(parse_float_literal("1.5"), Some(1.5));
        assert_eq!(parse_float_literal("2e10"), Some(2e10));
        assert_eq!(parse_float_literal("0x1.8p3"), Some(12.0));
    }

    #[test]
    fn strings_plain() {
        let toks = scan_all(r#""hello" `raw \n` "esc\t""#);
        assert_eq!(toks[0], (Token::String, "hello".into()));
        assert_eq!(toks[1], (Token::String, r"raw \n".into()));
        assert_eq!(toks[2], (Token::String, "esc\t".into()));
    }

    #[test]
    fn string_interpolation() {
        let toks = scan_all(r#""a{x}b""#);
        assert_eq!(
            toks,
            vec![
                (Token::StringBegin, "a".into()),
                (Token::Ident, "x".into()),
                (Token::StringEnd, "b".into()),
            ]
        );
    }

    #[test]
    fn string_interpolation_with_braces_and_nesting() {
        let toks = scan_all(r#""a{ {"k": v}["k"] }b""#);
        let ks: Vec<Token> = toks.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            ks,
            vec![
                Token::StringBegin,
                Token::LBrace,
                Token::String,
                Token::Colon,
                Token::Ident,
                Token::RBrace,
                Token::LBrack,
                Token::String,
                Token::RBrack,
                Token::StringEnd,
            ]
        );

        let toks = scan_all(r#""x{ "y{z}w" }v""#);
        assert_eq!(
            toks,
            vec![
                (Token::StringBegin, "x".into()),
                (Token::StringBegin, "y".into()),
                (Token::Ident, "z".into()),
                (Token::StringEnd, "w".into()),
                (Token::StringEnd, "v".into()),
            ]
        );
    }

    #[test]
    fn indented_string() {
        let toks = scan_all("''\n  line one\n  line two\n''");
        assert_eq!(toks[0], (Token::String, "line one\nline two\n".into()));
    }

    #[test]
    fn char_literals() {
        let toks = scan_all(r"'a' '\n' 'é'");
        assert_eq!(toks[0], (Token::Char, "a".into()));
        assert_eq!(toks[1], (Token::Char, "\n".into()));
        assert_eq!(toks[2], (Token::Char, "é".into()));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a // line\nb /* block\nstill */ c"),
            vec![Token::Ident, Token::Semicolon, Token::Ident, Token::Ident]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("a &^= b << 2 ?? c"),
            vec![
                Token::Ident,
                Token::AndNotAssign,
                Token::Ident,
                Token::Shl,
                Token::Int,
                Token::Nullish,
                Token::Ident,
            ]
        );
        assert_eq!(
            kinds("f := fn(x) => x"),
            vec![
                Token::Ident,
                Token::Define,
                Token::Fn,
                Token::LParen,
                Token::Ident,
                Token::RParen,
                Token::Arrow,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn unterminated_comment_is_error() {
        let mut set = FileSet::new();
        let src = "/* never closed";
        let id = set.add_file("test.toy", src.len());
        let mut scanner = Scanner::new(set.file_mut(id), src);
        let t = scanner.next_token();
        assert_eq!(t.token, Token::Eof);
        assert_eq!(scanner.errors().len(), 1);
    }
}
