//! Error values carried by rejected promises.
//!
//! A rejection reason is either an error object with a kind and message, or
//! an arbitrary thrown value. Aggregate errors keep every nested reason.

use crate::Value;
use std::fmt;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic error raised by user code
    Error,
    /// Type error (e.g., chaining a promise to itself)
    TypeError,
    /// Value out of allowed range
    RangeError,
    /// Several errors at once (`any` with every input rejected)
    AggregateError,
    /// Internal engine error
    InternalError,
    /// A plain thrown value that is not an error object
    Thrown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::AggregateError => "AggregateError",
            ErrorKind::InternalError => "InternalError",
            ErrorKind::Thrown => "Uncaught",
        };
        write!(f, "{}", name)
    }
}

/// A rejection reason.
///
/// Handlers raise these and downstream reactions catch them. A thrown
/// non-error value is kept in `thrown` so that `reject(42)`-style reasons
/// round-trip unchanged.
///
/// # Examples
///
/// ```
/// use core_types::{JsError, ErrorKind};
///
/// let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
///
/// assert_eq!(error.message, "undefined is not a function");
/// assert_eq!(error.to_string(), "TypeError: undefined is not a function");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The thrown value when the rejection reason is not an error object
    pub thrown: Option<Value>,
    /// Nested errors (populated for `AggregateError`)
    pub errors: Vec<JsError>,
}

impl JsError {
    /// Creates an error object of `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            thrown: None,
            errors: vec![],
        }
    }

    /// Creates a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Wraps an arbitrary thrown value, e.g. `reject("x")`.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::{JsError, Value};
    ///
    /// let error = JsError::thrown(Value::string("x"));
    /// assert_eq!(error.thrown, Some(Value::string("x")));
    /// assert_eq!(error.message, "x");
    /// ```
    pub fn thrown(value: Value) -> Self {
        let mut error = Self::new(ErrorKind::Thrown, value.to_string());
        error.thrown = Some(value);
        error
    }

    /// Creates an `AggregateError` holding `errors`.
    pub fn aggregate(message: impl Into<String>, errors: Vec<JsError>) -> Self {
        let mut error = Self::new(ErrorKind::AggregateError, message);
        error.errors = errors;
        error
    }

    /// Returns true if this reason wraps a thrown value.
    pub fn is_thrown(&self) -> bool {
        self.thrown.is_some()
    }

    /// Returns the rejection reason as a value: the thrown value if there was
    /// one, else the rendered error message.
    pub fn to_value(&self) -> Value {
        match &self.thrown {
            Some(value) => value.clone(),
            None => Value::String(self.to_string()),
        }
    }
}

impl From<Value> for JsError {
    fn from(value: Value) -> Self {
        JsError::thrown(value)
    }
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Thrown => write!(f, "{}", self.message),
            _ => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for JsError {}
