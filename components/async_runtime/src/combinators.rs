//! Promise combinators: `all`, `all_settled`, `race` and `any`.
//!
//! Every input is first turned into a promise with [`Promise::resolve`], so
//! plain values and foreign thenables mix freely with native promises. The
//! combined promise is driven by raw reactions on the inputs; no derived
//! promises are created for the bookkeeping.

use crate::error::AggregateError;
use crate::promise::{Promise, PromiseReason, PromiseValue};
use crate::task_queue::MicrotaskQueue;
use crate::thenable::Resolution;
use core_types::{JsError, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// The outcome of one input of [`all_settled`].
#[derive(Debug, Clone, PartialEq)]
pub enum SettledOutcome<T, E> {
    /// The input fulfilled with this value.
    Fulfilled(T),
    /// The input rejected with this reason.
    Rejected(E),
}

impl<T, E> SettledOutcome<T, E> {
    /// `"fulfilled"` or `"rejected"`.
    pub fn status(&self) -> &'static str {
        match self {
            SettledOutcome::Fulfilled(_) => "fulfilled",
            SettledOutcome::Rejected(_) => "rejected",
        }
    }

    /// Returns true for a fulfilled input.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, SettledOutcome::Fulfilled(_))
    }
}

impl<T, E> From<Result<T, E>> for SettledOutcome<T, E> {
    fn from(outcome: Result<T, E>) -> Self {
        match outcome {
            Ok(value) => SettledOutcome::Fulfilled(value),
            Err(error) => SettledOutcome::Rejected(error),
        }
    }
}

impl SettledOutcome<Value, JsError> {
    /// Renders the outcome as a `{status, value}` or `{status, reason}` record.
    pub fn to_value(&self) -> Value {
        match self {
            SettledOutcome::Fulfilled(value) => Value::record([
                ("status", Value::string(self.status())),
                ("value", value.clone()),
            ]),
            SettledOutcome::Rejected(error) => Value::record([
                ("status", Value::string(self.status())),
                ("reason", error.to_value()),
            ]),
        }
    }
}

/// Slots filled in input order while outcomes arrive in settlement order.
struct Collector<S> {
    slots: RefCell<Vec<Option<S>>>,
    remaining: Cell<usize>,
}

impl<S> Collector<S> {
    fn new(len: usize) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new((0..len).map(|_| None).collect()),
            remaining: Cell::new(len),
        })
    }

    /// Stores `item` at `index`; returns every item once all slots are filled.
    fn fill(&self, index: usize, item: S) -> Option<Vec<S>> {
        self.slots.borrow_mut()[index] = Some(item);
        let remaining = self.remaining.get() - 1;
        self.remaining.set(remaining);
        if remaining > 0 {
            return None;
        }
        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        Some(slots.into_iter().flatten().collect())
    }
}

fn to_promises<T, E, I>(queue: &MicrotaskQueue, inputs: I) -> Vec<Promise<T, E>>
where
    T: PromiseValue,
    E: PromiseReason,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    inputs
        .into_iter()
        .map(|input| Promise::resolve(queue, input))
        .collect()
}

/// Fulfills with every input's value, in input order, once all inputs
/// fulfill. Rejects with the first rejection to occur; later outcomes are
/// ignored. An empty input fulfills at once with an empty vector.
///
/// # Examples
///
/// ```
/// use async_runtime::{all, MicrotaskQueue, Promise, Resolution};
/// use core_types::{JsError, Value};
///
/// let queue = MicrotaskQueue::new();
/// let combined = all(
///     &queue,
///     vec![
///         Promise::<Value, JsError>::fulfilled(&queue, Value::Smi(1)).into(),
///         Resolution::Value(Value::Smi(2)),
///     ],
/// );
/// queue.drain();
/// assert_eq!(combined.value(), Some(vec![Value::Smi(1), Value::Smi(2)]));
/// ```
pub fn all<T, E, I>(queue: &MicrotaskQueue, inputs: I) -> Promise<Vec<T>, E>
where
    T: PromiseValue,
    E: PromiseReason,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let promises = to_promises(queue, inputs);
    let (combined, resolvers) = Promise::pending(queue);
    tracing::debug!(id = %combined.id(), inputs = promises.len(), "all");
    if promises.is_empty() {
        resolvers.fulfill(Vec::new());
        return combined;
    }

    let collector = Collector::new(promises.len());
    for (index, promise) in promises.iter().enumerate() {
        let collector = Rc::clone(&collector);
        let resolvers = resolvers.clone();
        promise.register(Box::new(move |outcome| match outcome {
            Ok(value) => {
                if let Some(values) = collector.fill(index, value) {
                    resolvers.fulfill(values);
                }
            }
            Err(error) => {
                resolvers.reject(error);
            }
        }));
    }
    combined
}

/// Fulfills, once every input has settled, with each input's outcome in
/// input order. Never rejects.
pub fn all_settled<T, E, I>(
    queue: &MicrotaskQueue,
    inputs: I,
) -> Promise<Vec<SettledOutcome<T, E>>, E>
where
    T: PromiseValue,
    E: PromiseReason,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let promises = to_promises(queue, inputs);
    let (combined, resolvers) = Promise::pending(queue);
    tracing::debug!(id = %combined.id(), inputs = promises.len(), "all_settled");
    if promises.is_empty() {
        resolvers.fulfill(Vec::new());
        return combined;
    }

    let collector = Collector::new(promises.len());
    for (index, promise) in promises.iter().enumerate() {
        let collector = Rc::clone(&collector);
        let resolvers = resolvers.clone();
        promise.register(Box::new(move |outcome| {
            if let Some(outcomes) = collector.fill(index, SettledOutcome::from(outcome)) {
                resolvers.fulfill(outcomes);
            }
        }));
    }
    combined
}

/// Settles like whichever input settles first. An empty input never
/// settles.
pub fn race<T, E, I>(queue: &MicrotaskQueue, inputs: I) -> Promise<T, E>
where
    T: PromiseValue,
    E: PromiseReason,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let promises = to_promises(queue, inputs);
    let (combined, resolvers) = Promise::pending(queue);
    tracing::debug!(id = %combined.id(), inputs = promises.len(), "race");

    for promise in &promises {
        let resolvers = resolvers.clone();
        promise.register(Box::new(move |outcome| match outcome {
            Ok(value) => {
                resolvers.fulfill(value);
            }
            Err(error) => {
                resolvers.reject(error);
            }
        }));
    }
    combined
}

/// Fulfills with the first input to fulfill. Rejects with an
/// [`AggregateError`] of every reason, in input order, once all inputs
/// reject; an empty input rejects at once.
pub fn any<T, E, I>(queue: &MicrotaskQueue, inputs: I) -> Promise<T, E>
where
    T: PromiseValue,
    E: PromiseReason + From<AggregateError<E>>,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let promises = to_promises(queue, inputs);
    let (combined, resolvers) = Promise::pending(queue);
    tracing::debug!(id = %combined.id(), inputs = promises.len(), "any");
    if promises.is_empty() {
        resolvers.reject(E::from(AggregateError { errors: Vec::new() }));
        return combined;
    }

    let collector = Collector::new(promises.len());
    for (index, promise) in promises.iter().enumerate() {
        let collector = Rc::clone(&collector);
        let resolvers = resolvers.clone();
        promise.register(Box::new(move |outcome| match outcome {
            Ok(value) => {
                resolvers.fulfill(value);
            }
            Err(error) => {
                if let Some(errors) = collector.fill(index, error) {
                    resolvers.reject(E::from(AggregateError { errors }));
                }
            }
        }));
    }
    combined
}
