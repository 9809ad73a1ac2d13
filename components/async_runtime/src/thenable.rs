//! Resolution of promises with values that may themselves be thenable.
//!
//! Resolving a promise with another promise, or with any foreign object
//! that exposes a registration capability, makes the promise adopt that
//! thenable's eventual outcome instead of fulfilling with the object.
//! Adoption is always scheduled as a microtask. Foreign thenables receive
//! a fresh set of [`Resolvers`] whose latch ignores every call after the
//! first, so a misbehaving implementation cannot settle twice.

use crate::error::PromiseError;
use crate::promise::{Promise, PromiseReason, PromiseValue, Resolvers};
use crate::task_queue::MicroTask;
use std::fmt;
use std::rc::Rc;

/// A foreign object that can report an outcome to a pair of callbacks.
///
/// `then` is called once, from a microtask, with resolvers for the adopting
/// promise. It may call them later, at most once taking effect. Returning
/// `Err` rejects the adopting promise unless it was already resolved.
pub trait Thenable<T, E> {
    /// Registers the adopting promise's resolvers.
    fn then(&self, resolvers: Resolvers<T, E>) -> Result<(), E>;
}

/// Something a promise can be resolved with.
pub enum Resolution<T, E> {
    /// A plain value: fulfills directly.
    Value(T),
    /// A native promise: its outcome is adopted.
    Promise(Promise<T, E>),
    /// A foreign thenable: its outcome is adopted.
    Thenable(Rc<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    /// Wraps a foreign thenable.
    pub fn thenable<H>(thenable: H) -> Self
    where
        H: Thenable<T, E> + 'static,
    {
        Resolution::Thenable(Rc::new(thenable))
    }

    /// Returns true unless this is a plain value.
    pub fn is_thenable(&self) -> bool {
        !matches!(self, Resolution::Value(_))
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Promise(promise)
    }
}

impl<T, E> From<Rc<dyn Thenable<T, E>>> for Resolution<T, E> {
    fn from(thenable: Rc<dyn Thenable<T, E>>) -> Self {
        Resolution::Thenable(thenable)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Resolution::Thenable(_) => write!(f, "Thenable(..)"),
        }
    }
}

/// Settles `promise` according to `resolution`.
///
/// Callers hold the promise's resolver latch, so this runs at most once per
/// latch.
pub(crate) fn resolve_promise<T, E>(promise: &Promise<T, E>, resolution: Resolution<T, E>)
where
    T: PromiseValue,
    E: PromiseReason,
{
    match resolution {
        Resolution::Value(value) => promise.fulfill_now(value),
        Resolution::Promise(target) => {
            if promise.adoption_cycle(&target) {
                tracing::debug!(id = %promise.id(), target = %target.id(), "adoption cycle rejected");
                promise.reject_now(E::from(PromiseError::AdoptionCycle { id: promise.id() }));
                return;
            }
            promise.set_following(&target);
            tracing::debug!(id = %promise.id(), target = %target.id(), "adopting promise");

            let adopter = promise.clone();
            promise.queue().enqueue(MicroTask::new(move || {
                let resolvers = Resolvers::new(adopter);
                target.register(Box::new(move |outcome| match outcome {
                    Ok(value) => {
                        resolvers.fulfill(value);
                    }
                    Err(error) => {
                        resolvers.reject(error);
                    }
                }));
            }));
        }
        Resolution::Thenable(thenable) => {
            if !promise.enter_thenable(&thenable) {
                tracing::debug!(id = %promise.id(), "thenable adoption cycle rejected");
                promise.reject_now(E::from(PromiseError::AdoptionCycle { id: promise.id() }));
                return;
            }
            tracing::debug!(id = %promise.id(), "adopting foreign thenable");
            let adopter = promise.clone();
            promise.queue().enqueue(MicroTask::new(move || {
                let resolvers = Resolvers::new(adopter);
                if let Err(error) = thenable.then(resolvers.clone()) {
                    resolvers.reject(error);
                }
            }));
        }
    }
}
