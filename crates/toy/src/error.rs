//! Error types for compilation and execution.
//!
//! Static errors (scanner, parser, compiler) carry a resolved file position
//! and aggregate into an [`ErrorList`]; the unit is abandoned once the list
//! reaches [`MAX_ERRORS`]. Runtime errors either wrap a throwable script
//! [`ErrorValue`] or signal a non-catchable limit (cancellation, budget,
//! stack overflow).

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::position::FilePos;
use crate::value::ErrorValue;

/// Upper bound on collected static errors; scanning/parsing/compiling stops
/// once the list is full.
pub const MAX_ERRORS: usize = 10;

/// A single static (compile-time) error with its source position.
#[derive(Debug, Clone, Error)]
#[error("{pos}: {message}")]
pub struct CompileError {
    pub pos: FilePos,
    pub message: String,
}

impl CompileError {
    #[must_use]
    pub fn new(pos: FilePos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

/// An aggregated list of static errors, ordered by source position.
#[derive(Debug, Clone, Default)]
pub struct ErrorList(Vec<CompileError>);

impl ErrorList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error. The list silently stops growing at [`MAX_ERRORS`];
    /// callers check [`ErrorList::is_full`] to abort early.
    pub fn add(&mut self, pos: FilePos, message: impl Into<String>) {
        if !self.is_full() {
            self.0.push(CompileError::new(pos, message));
        }
    }

    pub fn push(&mut self, err: CompileError) {
        if !self.is_full() {
            self.0.push(err);
        }
    }

    /// Merges another list into this one, keeping the cap.
    pub fn extend(&mut self, other: ErrorList) {
        for err in other.0 {
            self.push(err);
        }
    }

    /// Sorts errors by file name, then line, then column.
    pub fn sort(&mut self) {
        self.0
            .sort_by(|a, b| {
                (&a.pos.name, a.pos.line, a.pos.column).cmp(&(&b.pos.name, b.pos.line, b.pos.column))
            });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.0.len() >= MAX_ERRORS
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[CompileError] {
        &self.0
    }

    /// Converts the list into a `Result`: `Ok` when empty.
    pub fn into_result(mut self) -> Result<(), ErrorList> {
        if self.is_empty() {
            Ok(())
        } else {
            self.sort();
            Err(self)
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.len() {
            0 => f.write_str("no errors"),
            1 => write!(f, "{}", self.0[0]),
            n => write!(f, "{} (and {} more errors)", self.0[0], n - 1),
        }
    }
}

impl std::error::Error for ErrorList {}

/// An error raised during VM execution.
///
/// `Raised` errors are throwable: `try`/`catch` intercepts them and the
/// handler receives the wrapped [`ErrorValue`]. The limit variants are not
/// catchable; they unwind every frame (deferred calls still run) and surface
/// to the embedder.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// A throwable script error: explicit `throw`, division by zero, bad
    /// conversion, arity mismatch, failed unpack assertion, and so on.
    #[error("runtime error: {0}")]
    Raised(Rc<ErrorValue>),
    /// The embedder's cancellation flag was observed at a suspension point.
    #[error("execution canceled")]
    Canceled,
    /// The configured instruction budget ran out.
    #[error("instruction budget exhausted")]
    BudgetExhausted,
    /// The value or frame stack limit was hit.
    #[error("stack overflow")]
    StackOverflow,
}

impl RuntimeError {
    /// A throwable error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self::Raised(Rc::new(ErrorValue::new(message)))
    }

    /// A throwable error with a cause chain.
    #[must_use]
    pub fn with_cause(message: impl Into<String>, cause: Rc<ErrorValue>) -> Self {
        Self::Raised(Rc::new(ErrorValue {
            message: message.into(),
            cause: Some(cause),
        }))
    }

    /// Whether `try`/`catch` may intercept this error. Stack overflow is an
    /// ordinary runtime error; cancellation and budget exhaustion belong to
    /// the embedder and always unwind fully.
    #[must_use]
    pub fn is_catchable(&self) -> bool {
        matches!(self, Self::Raised(_) | Self::StackOverflow)
    }

    /// The script-visible error value for a catchable error.
    #[must_use]
    pub fn to_error_value(&self) -> Option<Rc<ErrorValue>> {
        match self {
            Self::Raised(e) => Some(e.clone()),
            Self::StackOverflow => Some(Rc::new(ErrorValue::new("stack overflow"))),
            _ => None,
        }
    }
}

impl From<Rc<ErrorValue>> for RuntimeError {
    fn from(err: Rc<ErrorValue>) -> Self {
        Self::Raised(err)
    }
}

/// Shorthand for results of fallible runtime operations.
pub type RunResult<T> = Result<T, RuntimeError>;
