//! Dynamic value representation carried through promises.
//!
//! This module provides the `Value` enum that embedders use as the default
//! payload type of a `Promise<Value, JsError>`. Collections produced by the
//! combinators (ordered result lists, settled-outcome records) have a
//! direct representation here.

use num_bigint::BigInt;
use num_traits::Zero;
use std::collections::BTreeMap;
use std::fmt;

/// Represents any value a promise can settle with.
///
/// Primitive values are stored inline. Aggregates produced by combinators
/// are stored as `Array` (ordered) or `Record` (keyed, deterministic order).
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let undefined = Value::Undefined;
/// let number = Value::Smi(42);
/// let list = Value::Array(vec![Value::Smi(1), Value::Smi(2)]);
///
/// assert!(!undefined.is_truthy());
/// assert!(number.is_truthy());
/// assert_eq!(list.type_of(), "object");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absent value
    Undefined,
    /// The null value
    Null,
    /// Boolean (true or false)
    Boolean(bool),
    /// Small integer
    Smi(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// String value
    String(std::string::String),
    /// Arbitrary precision integer
    BigInt(BigInt),
    /// Ordered list of values
    Array(Vec<Value>),
    /// Keyed record, iterated in key order
    Record(BTreeMap<std::string::String, Value>),
}

impl Value {
    /// Creates a string value.
    pub fn string(s: impl Into<std::string::String>) -> Self {
        Value::String(s.into())
    }

    /// Creates a record from `(key, value)` pairs.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// let record = Value::record([("status", Value::string("fulfilled"))]);
    /// assert_eq!(record.get("status"), Some(&Value::string("fulfilled")));
    /// ```
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<std::string::String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Looks up a field of a record. Returns `None` for non-records.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.get(key),
            _ => None,
        }
    }

    /// Returns the numeric value of `Smi` and `Double` values.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Smi(n) => Some(f64::from(*n)),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns whether this value is truthy.
    ///
    /// The following values are falsy:
    /// - undefined
    /// - null
    /// - false
    /// - 0 (including -0) and NaN
    /// - "" (empty string)
    /// - 0n
    ///
    /// All other values are truthy, including every array and record.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert!(!Value::Undefined.is_truthy());
    /// assert!(!Value::Null.is_truthy());
    /// assert!(!Value::Boolean(false).is_truthy());
    /// assert!(!Value::Smi(0).is_truthy());
    /// assert!(!Value::Double(f64::NAN).is_truthy());
    ///
    /// assert!(Value::Boolean(true).is_truthy());
    /// assert!(Value::Smi(42).is_truthy());
    /// assert!(Value::Array(vec![]).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Smi(n) => *n != 0,
            Value::Double(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::BigInt(n) => !n.is_zero(),
            Value::Array(_) | Value::Record(_) => true,
        }
    }

    /// Returns the `typeof` name for this value.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert_eq!(Value::Undefined.type_of(), "undefined");
    /// assert_eq!(Value::Null.type_of(), "object");
    /// assert_eq!(Value::Boolean(true).type_of(), "boolean");
    /// assert_eq!(Value::Smi(42).type_of(), "number");
    /// ```
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Boolean(_) => "boolean",
            Value::Smi(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::BigInt(_) => "bigint",
            Value::Null | Value::Array(_) | Value::Record(_) => "object",
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Smi(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// String conversion following the usual `String(value)` rules.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// assert_eq!(Value::Undefined.to_string(), "undefined");
/// assert_eq!(Value::Boolean(true).to_string(), "true");
/// assert_eq!(Value::Smi(42).to_string(), "42");
/// assert_eq!(Value::Array(vec![Value::Smi(1), Value::Smi(2)]).to_string(), "1,2");
/// ```
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Smi(n) => write!(f, "{}", n),
            Value::Double(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    if n.is_sign_positive() {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    // Integer-valued doubles display without decimal point
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::BigInt(n) => write!(f, "{}n", n),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Record(_) => write!(f, "[object Object]"),
        }
    }
}
