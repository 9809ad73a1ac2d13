//! Coroutine driver for suspendable step functions.
//!
//! A suspendable function is given as a [`StepFunction`]: each call runs it
//! up to its next await point or to completion. The driver starts it
//! synchronously, and whenever it awaits, attaches a reaction to the awaited
//! promise that resumes it from a microtask with the value, or injects the
//! error through [`StepFunction::throw`]. The driver's own promise settles
//! when the step function completes or lets an error escape.
//!
//! ```text
//! Running --await--> Suspended --settled--> Running --> ... --> Completed | Failed
//! ```

use crate::promise::{Promise, PromiseReason, PromiseValue, Resolvers};
use crate::task_queue::MicrotaskQueue;
use crate::thenable::Resolution;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// What a step function did when it was resumed.
pub enum Step<T, E> {
    /// Suspend until this resolves.
    Await(Resolution<T, E>),
    /// Finish with this value.
    Complete(T),
}

/// The body of a suspendable function, as an explicit state machine.
pub trait StepFunction<T, E> {
    /// Runs to the next await point. `input` is `None` on the first call and
    /// the awaited value afterwards. `Err` means an error escaped the body.
    fn resume(&mut self, input: Option<T>) -> Result<Step<T, E>, E>;

    /// Injects the rejection of the awaited promise at the current await
    /// point. By default the body has no handler and the error escapes.
    fn throw(&mut self, error: E) -> Result<Step<T, E>, E> {
        Err(error)
    }
}

/// Adapts a closure into a [`StepFunction`] without an error handler.
///
/// # Examples
///
/// ```
/// use async_runtime::{spawn, FnStep, MicrotaskQueue, Promise, Step};
/// use core_types::{JsError, Value};
///
/// let queue = MicrotaskQueue::new();
/// let inner = queue.clone();
/// let mut awaited = false;
/// let coroutine = spawn(&queue, FnStep::new(move |input: Option<Value>| -> Result<Step<Value, JsError>, JsError> {
///     if !awaited {
///         awaited = true;
///         let p = Promise::<Value, JsError>::fulfilled(&inner, Value::Smi(7));
///         return Ok(Step::Await(p.into()));
///     }
///     Ok(Step::Complete(input.unwrap_or(Value::Undefined)))
/// }));
///
/// queue.drain();
/// assert_eq!(coroutine.promise().value(), Some(Value::Smi(7)));
/// ```
pub struct FnStep<F> {
    f: F,
}

impl<F> FnStep<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, E, F> StepFunction<T, E> for FnStep<F>
where
    F: FnMut(Option<T>) -> Result<Step<T, E>, E>,
{
    fn resume(&mut self, input: Option<T>) -> Result<Step<T, E>, E> {
        (self.f)(input)
    }
}

/// Lifecycle of a driven coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    /// The body is executing.
    Running,
    /// The body is waiting on an awaited promise.
    Suspended,
    /// The body returned a value.
    Completed,
    /// An error escaped the body.
    Failed,
}

enum Resume<T, E> {
    Next(Option<T>),
    Throw(E),
}

struct Driver<T, E> {
    state: Cell<CoroutineState>,
    body: RefCell<Option<Box<dyn StepFunction<T, E>>>>,
    awaited: RefCell<Option<Promise<T, E>>>,
    resolvers: Resolvers<T, E>,
    queue: MicrotaskQueue,
}

impl<T: PromiseValue, E: PromiseReason> Driver<T, E> {
    fn advance(self: &Rc<Self>, input: Resume<T, E>) {
        self.awaited.borrow_mut().take();
        self.state.set(CoroutineState::Running);

        let step = {
            let mut body = self.body.borrow_mut();
            let Some(body) = body.as_mut() else {
                return;
            };
            match input {
                Resume::Next(value) => body.resume(value),
                Resume::Throw(error) => body.throw(error),
            }
        };

        match step {
            Ok(Step::Await(resolution)) => {
                let awaited = Promise::resolve(&self.queue, resolution);
                tracing::trace!(awaited = %awaited.id(), "coroutine suspended");
                self.state.set(CoroutineState::Suspended);
                *self.awaited.borrow_mut() = Some(awaited.clone());

                let driver = Rc::clone(self);
                awaited.register(Box::new(move |outcome| match outcome {
                    Ok(value) => driver.advance(Resume::Next(Some(value))),
                    Err(error) => driver.advance(Resume::Throw(error)),
                }));
            }
            Ok(Step::Complete(value)) => {
                self.finish(CoroutineState::Completed);
                self.resolvers.fulfill(value);
            }
            Err(error) => {
                self.finish(CoroutineState::Failed);
                self.resolvers.reject(error);
            }
        }
    }

    fn finish(&self, state: CoroutineState) {
        tracing::debug!(id = %self.resolvers.promise().id(), ?state, "coroutine finished");
        self.state.set(state);
        self.body.borrow_mut().take();
    }
}

/// Handle to a coroutine started with [`spawn`].
pub struct Coroutine<T, E> {
    driver: Rc<Driver<T, E>>,
}

impl<T: PromiseValue, E: PromiseReason> Coroutine<T, E> {
    /// The promise settled with the coroutine's result.
    pub fn promise(&self) -> Promise<T, E> {
        self.driver.resolvers.promise().clone()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> CoroutineState {
        self.driver.state.get()
    }

    /// The promise the coroutine is suspended on, if any.
    pub fn awaited(&self) -> Option<Promise<T, E>> {
        self.driver.awaited.borrow().clone()
    }
}

impl<T, E> Clone for Coroutine<T, E> {
    fn clone(&self) -> Self {
        Self {
            driver: Rc::clone(&self.driver),
        }
    }
}

impl<T, E> fmt::Debug for Coroutine<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("state", &self.driver.state.get())
            .finish()
    }
}

/// Starts `body` on `queue`, running it synchronously up to its first await.
pub fn spawn<T, E, S>(queue: &MicrotaskQueue, body: S) -> Coroutine<T, E>
where
    T: PromiseValue,
    E: PromiseReason,
    S: StepFunction<T, E> + 'static,
{
    let (promise, resolvers) = Promise::pending(queue);
    tracing::trace!(id = %promise.id(), "coroutine started");
    let driver = Rc::new(Driver {
        state: Cell::new(CoroutineState::Running),
        body: RefCell::new(Some(Box::new(body))),
        awaited: RefCell::new(None),
        resolvers,
        queue: queue.clone(),
    });
    driver.advance(Resume::Next(None));
    Coroutine { driver }
}

/// Starts `body` and returns only its result promise.
pub fn run_coroutine<T, E, S>(queue: &MicrotaskQueue, body: S) -> Promise<T, E>
where
    T: PromiseValue,
    E: PromiseReason,
    S: StepFunction<T, E> + 'static,
{
    spawn(queue, body).promise()
}
