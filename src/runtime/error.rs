//! Runtime failures and the call trace they accumulate.
//!
//! A [`RuntimeError`] is an [`ErrorKind`] plus the functions it unwound
//! through, innermost first. Every call site pushes its callee onto the
//! trace as the error passes back through it, so the trace reads like a
//! stack dump by the time it reaches the driver.
//!
//! The exit signal travels the same path but is not a failure: the driver
//! recognises it with [`RuntimeError::is_exit`] and never prints it.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

use super::function::Function;
use crate::parser::DecodeError;

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("{0}")]
    Link(String),
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Dispatch(String),
    #[error("function '{name}' expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("can't instantiate abstract class '{0}'")]
    AbstractClass(String),
    #[error("function '{0}' is not implemented")]
    NotImplemented(String),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("stack underflow")]
    StackUnderflow,
    #[error("local slot {0} is out of range")]
    LocalOutOfRange(usize),
    #[error("call depth exceeded {0}")]
    CallDepthExceeded(usize),
    #[error("{0}")]
    Raised(String),
    #[error("host error: {0}")]
    Host(Box<dyn Error>),
    #[error("exit with code {0}")]
    Exit(i32),
}

pub struct RuntimeError {
    kind: ErrorKind,
    trace: Vec<Rc<Function>>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind) -> Self {
        RuntimeError {
            kind,
            trace: Vec::new(),
        }
    }

    /// The exit signal carrying a process status.
    pub fn exit(code: i32) -> Self {
        Self::new(ErrorKind::Exit(code))
    }

    /// A user-level error raised by running code.
    pub fn raise(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Raised(message.into()))
    }

    pub fn host(error: impl Into<Box<dyn Error>>) -> Self {
        Self::new(ErrorKind::Host(error.into()))
    }

    pub fn link(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Link(message.into()))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type(message.into()))
    }

    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dispatch(message.into()))
    }

    pub fn mismatch(expected: &str, actual: &str) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }

    /// Converts whatever a native function failed with. Runtime errors
    /// (including the exit signal) pass through untouched.
    pub fn from_native(error: Box<dyn Error>) -> Self {
        match error.downcast::<RuntimeError>() {
            Ok(runtime) => *runtime,
            Err(other) => Self::new(ErrorKind::Host(other)),
        }
    }

    /// Appends a frame as the error unwinds through a call site.
    pub fn with_frame(mut self, function: Rc<Function>) -> Self {
        self.trace.push(function);
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// Innermost first.
    pub fn trace(&self) -> &[Rc<Function>] {
        &self.trace
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.kind, ErrorKind::Exit(_))
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.kind {
            ErrorKind::Exit(code) => Some(code),
            _ => None,
        }
    }

    /// The user-visible dump: one line per frame, then the message.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for function in &self.trace {
            out.push_str(&function.describe());
            out.push('\n');
        }
        out.push_str(&self.kind.to_string());
        out
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl fmt::Debug for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frames: Vec<String> = self.trace.iter().map(|f| f.describe()).collect();
        f.debug_struct("RuntimeError")
            .field("kind", &self.kind)
            .field("trace", &frames)
            .finish()
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            ErrorKind::Host(inner) => Some(inner.as_ref()),
            ErrorKind::Decode(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<ErrorKind> for RuntimeError {
    fn from(kind: ErrorKind) -> Self {
        RuntimeError::new(kind)
    }
}

impl From<DecodeError> for RuntimeError {
    fn from(err: DecodeError) -> Self {
        RuntimeError::new(ErrorKind::Decode(err))
    }
}
