//! Core value and error types shared by the promise runtime.
//!
//! This crate provides the dynamic payload types that embedders settle
//! promises with: values and rejection reasons.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of dynamic values
//! - [`JsError`] - Rejection reasons: error objects or thrown values
//! - [`ErrorKind`] - Types of errors
//!
//! # Examples
//!
//! ```
//! use core_types::{Value, JsError, ErrorKind};
//!
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
//! assert_eq!(error.kind, ErrorKind::TypeError);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod value;

pub use error::{ErrorKind, JsError};
pub use value::Value;
