//! Errors raised by the runtime itself.
//!
//! Handler failures are ordinary rejections of the caller's error type `E`.
//! The runtime only produces its own errors for conditions it detects:
//! circular adoption, an `any` whose every input rejected, bad configuration
//! and a host loop exceeding its turn budget. Rejection types opt in by
//! implementing `From<PromiseError>` (and `From<AggregateError<E>>` for `any`).

use crate::promise::FutureId;
use core_types::{ErrorKind, JsError};
use thiserror::Error;

/// Errors detected by the promise runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromiseError {
    /// A promise was told to adopt itself, directly or through a chain of
    /// promises that leads back to it.
    #[error("chaining cycle detected for promise {id}")]
    AdoptionCycle {
        /// The promise that would have followed itself
        id: FutureId,
    },

    /// The runtime configuration could not be loaded.
    #[error("invalid runtime configuration: {0}")]
    Config(String),

    /// The event loop ran more turns than its configured budget.
    #[error("event loop exceeded {limit} turns")]
    TurnLimit {
        /// The configured turn budget
        limit: usize,
    },
}

/// Rejection reason of `any` when every input rejected.
///
/// `errors` holds each input's rejection reason in input order.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("all promises were rejected")]
pub struct AggregateError<E> {
    /// Rejection reasons, in input order
    pub errors: Vec<E>,
}

impl From<PromiseError> for JsError {
    fn from(err: PromiseError) -> Self {
        let kind = match err {
            PromiseError::AdoptionCycle { .. } => ErrorKind::TypeError,
            PromiseError::Config(_) => ErrorKind::InternalError,
            PromiseError::TurnLimit { .. } => ErrorKind::RangeError,
        };
        JsError::new(kind, err.to_string())
    }
}

impl From<AggregateError<JsError>> for JsError {
    fn from(err: AggregateError<JsError>) -> Self {
        JsError::aggregate(err.to_string(), err.errors)
    }
}
