//! Promise state machine.
//!
//! A [`Promise`] holds a value or an error that becomes available exactly
//! once. Reactions attached with [`Promise::then`], [`Promise::catch`],
//! [`Promise::react`] and [`Promise::finally`] always run as microtasks on
//! the promise's queue, whether they were attached before or after
//! settlement, and each produces a derived promise settled with the
//! handler's outcome.

use crate::error::PromiseError;
use crate::task_queue::{MicroTask, MicrotaskQueue};
use crate::thenable::{self, Resolution, Thenable};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Bound for values a promise can be fulfilled with.
pub trait PromiseValue: Clone + 'static {}

impl<T: Clone + 'static> PromiseValue for T {}

/// Bound for reasons a promise can be rejected with.
///
/// The runtime raises [`PromiseError`]s of its own, so rejection types must
/// be able to carry them.
pub trait PromiseReason: Clone + fmt::Debug + From<PromiseError> + 'static {}

impl<E: Clone + fmt::Debug + From<PromiseError> + 'static> PromiseReason for E {}

/// Outcome of a handler: how to settle the derived promise, or the error
/// the handler raised.
pub type HandlerResult<T, E> = Result<Resolution<T, E>, E>;

/// Identifier of a promise, unique within its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FutureId(pub u64);

impl fmt::Display for FutureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The state of a Promise.
///
/// Once settled (Fulfilled or Rejected), a Promise cannot change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been fulfilled with a value.
    Fulfilled,
    /// The promise has been rejected with an error.
    Rejected,
}

enum Settlement<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

pub(crate) type Reaction<T, E> = Box<dyn FnOnce(Result<T, E>)>;

struct Shared<T, E> {
    id: FutureId,
    queue: MicrotaskQueue,
    settlement: RefCell<Settlement<T, E>>,
    reactions: RefCell<Vec<Reaction<T, E>>>,
    handled: Cell<bool>,
    // Set while this promise waits on another promise's outcome.
    following: RefCell<Option<Weak<Shared<T, E>>>>,
    // Foreign thenables this promise has been resolved with while pending.
    thenables: RefCell<Vec<Rc<dyn Thenable<T, E>>>>,
}

impl<T, E> Drop for Shared<T, E> {
    fn drop(&mut self) {
        self.queue.tracker().forget(self.id);
    }
}

/// A value or error that becomes available exactly once.
///
/// `Promise` is a handle: clones refer to the same promise. Settlement
/// goes through the [`Resolvers`] handed out at creation.
///
/// # Examples
///
/// ```
/// use async_runtime::{MicrotaskQueue, Promise, PromiseState, Resolution};
/// use core_types::{JsError, Value};
///
/// let queue = MicrotaskQueue::new();
/// let (promise, resolvers) = Promise::<Value, JsError>::pending(&queue);
/// let doubled = promise.then(|v| {
///     let n = v.as_number().unwrap_or(0.0);
///     Ok(Resolution::Value(Value::Double(n * 2.0)))
/// });
///
/// resolvers.fulfill(Value::Smi(21));
/// assert_eq!(promise.state(), PromiseState::Fulfilled);
/// assert_eq!(doubled.state(), PromiseState::Pending);
///
/// queue.drain();
/// assert_eq!(doubled.value(), Some(Value::Double(42.0)));
/// ```
pub struct Promise<T, E> {
    shared: Rc<Shared<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: PromiseValue, E: PromiseReason> Promise<T, E> {
    /// Creates a pending promise and runs `executor` synchronously with its
    /// resolvers. An `Err` returned by the executor rejects the promise
    /// unless the executor already settled it.
    pub fn new<F>(queue: &MicrotaskQueue, executor: F) -> Self
    where
        F: FnOnce(&Resolvers<T, E>) -> Result<(), E>,
    {
        let (promise, resolvers) = Self::pending(queue);
        if let Err(error) = executor(&resolvers) {
            resolvers.reject(error);
        }
        promise
    }

    /// Creates a pending promise together with the capabilities that settle it.
    pub fn pending(queue: &MicrotaskQueue) -> (Self, Resolvers<T, E>) {
        let promise = Self {
            shared: Rc::new(Shared {
                id: queue.allocate_id(),
                queue: queue.clone(),
                settlement: RefCell::new(Settlement::Pending),
                reactions: RefCell::new(Vec::new()),
                handled: Cell::new(false),
                following: RefCell::new(None),
                thenables: RefCell::new(Vec::new()),
            }),
        };
        let resolvers = Resolvers::new(promise.clone());
        (promise, resolvers)
    }

    /// Returns a promise resolved with `resolution`.
    ///
    /// A promise from the same queue is returned as is. Plain values give an
    /// already fulfilled promise; other promises and thenables are adopted.
    pub fn resolve(queue: &MicrotaskQueue, resolution: Resolution<T, E>) -> Self {
        if let Resolution::Promise(promise) = &resolution {
            if promise.queue().ptr_eq(queue) {
                return promise.clone();
            }
        }
        let (promise, resolvers) = Self::pending(queue);
        resolvers.resolve(resolution);
        promise
    }

    /// Returns a promise already fulfilled with `value`.
    pub fn fulfilled(queue: &MicrotaskQueue, value: T) -> Self {
        Self::resolve(queue, Resolution::Value(value))
    }

    /// Returns a promise already rejected with `error`.
    pub fn rejected(queue: &MicrotaskQueue, error: E) -> Self {
        let (promise, resolvers) = Self::pending(queue);
        resolvers.reject(error);
        promise
    }

    /// Attaches both handlers. Exactly one of them runs, as a microtask,
    /// once this promise settles.
    pub fn react<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: PromiseValue,
        F: FnOnce(T) -> HandlerResult<U, E> + 'static,
        R: FnOnce(E) -> HandlerResult<U, E> + 'static,
    {
        let (derived, resolvers) = Promise::pending(self.queue());
        self.register(Box::new(move |outcome| {
            let next = match outcome {
                Ok(value) => on_fulfilled(value),
                Err(error) => on_rejected(error),
            };
            resolvers.settle_with(next);
        }));
        derived
    }

    /// Attaches a fulfillment handler. A rejection passes through to the
    /// derived promise unchanged.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: PromiseValue,
        F: FnOnce(T) -> HandlerResult<U, E> + 'static,
    {
        let (derived, resolvers) = Promise::pending(self.queue());
        self.register(Box::new(move |outcome| match outcome {
            Ok(value) => resolvers.settle_with(on_fulfilled(value)),
            Err(error) => {
                resolvers.reject(error);
            }
        }));
        derived
    }

    /// Attaches a rejection handler. A fulfillment passes through to the
    /// derived promise unchanged.
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T, E>
    where
        R: FnOnce(E) -> HandlerResult<T, E> + 'static,
    {
        let (derived, resolvers) = Promise::pending(self.queue());
        self.register(Box::new(move |outcome| match outcome {
            Ok(value) => {
                resolvers.fulfill(value);
            }
            Err(error) => resolvers.settle_with(on_rejected(error)),
        }));
        derived
    }

    /// Attaches a handler that runs on either outcome without seeing it.
    ///
    /// The original outcome passes through unless `on_settle` fails, in
    /// which case its error rejects the derived promise.
    pub fn finally<F>(&self, on_settle: F) -> Promise<T, E>
    where
        F: FnOnce() -> Result<(), E> + 'static,
    {
        let (derived, resolvers) = Promise::pending(self.queue());
        self.register(Box::new(move |outcome| match on_settle() {
            Ok(()) => match outcome {
                Ok(value) => {
                    resolvers.fulfill(value);
                }
                Err(error) => {
                    resolvers.reject(error);
                }
            },
            Err(error) => {
                resolvers.reject(error);
            }
        }));
        derived
    }

    /// Attaches a raw reaction that receives the outcome in a microtask.
    ///
    /// Marks the promise as handled. On a settled promise the reaction is
    /// queued right away; on a pending one it is queued at settlement, in
    /// registration order.
    pub(crate) fn register(&self, reaction: Reaction<T, E>) {
        let was_handled = self.shared.handled.replace(true);
        match self.result() {
            None => self.shared.reactions.borrow_mut().push(reaction),
            Some(outcome) => {
                if outcome.is_err() && !was_handled {
                    self.queue().tracker().handler_added(self.id());
                }
                self.queue()
                    .enqueue(MicroTask::new(move || reaction(outcome)));
            }
        }
    }

    pub(crate) fn fulfill_now(&self, value: T) {
        self.settle(Ok(value));
    }

    pub(crate) fn reject_now(&self, error: E) {
        self.settle(Err(error));
    }

    fn settle(&self, outcome: Result<T, E>) {
        {
            let mut settlement = self.shared.settlement.borrow_mut();
            if !matches!(*settlement, Settlement::Pending) {
                return;
            }
            *settlement = match &outcome {
                Ok(value) => Settlement::Fulfilled(value.clone()),
                Err(error) => Settlement::Rejected(error.clone()),
            };
        }
        self.shared.following.borrow_mut().take();
        let _adopted = std::mem::take(&mut *self.shared.thenables.borrow_mut());
        tracing::debug!(id = %self.id(), fulfilled = outcome.is_ok(), "promise settled");

        if let Err(error) = &outcome {
            if !self.shared.handled.get() {
                self.queue()
                    .tracker()
                    .rejected_unhandled(self.id(), format!("{:?}", error));
            }
        }

        let reactions = std::mem::take(&mut *self.shared.reactions.borrow_mut());
        for reaction in reactions {
            let outcome = outcome.clone();
            self.queue()
                .enqueue(MicroTask::new(move || reaction(outcome)));
        }
    }

    /// Returns true if adopting `target` would close a cycle, walking the
    /// chain of adoptions in progress starting at `target`.
    pub(crate) fn adoption_cycle(&self, target: &Promise<T, E>) -> bool {
        let mut cursor = Some(Rc::clone(&target.shared));
        while let Some(node) = cursor {
            if Rc::ptr_eq(&node, &self.shared) {
                return true;
            }
            cursor = node.following.borrow().as_ref().and_then(Weak::upgrade);
        }
        false
    }

    /// Records `thenable` in this promise's adoption chain. Returns false if
    /// it is already there, which means adopting it again would never end.
    pub(crate) fn enter_thenable(&self, thenable: &Rc<dyn Thenable<T, E>>) -> bool {
        let addr = Rc::as_ptr(thenable) as *const ();
        let mut chain = self.shared.thenables.borrow_mut();
        if chain.iter().any(|seen| Rc::as_ptr(seen) as *const () == addr) {
            return false;
        }
        chain.push(Rc::clone(thenable));
        true
    }

    pub(crate) fn set_following(&self, target: &Promise<T, E>) {
        *self.shared.following.borrow_mut() = Some(Rc::downgrade(&target.shared));
    }
}

impl<T: Clone, E: Clone> Promise<T, E> {
    /// The identifier of this promise.
    pub fn id(&self) -> FutureId {
        self.shared.id
    }

    /// The queue this promise schedules its jobs on.
    pub fn queue(&self) -> &MicrotaskQueue {
        &self.shared.queue
    }

    /// The current state.
    pub fn state(&self) -> PromiseState {
        match &*self.shared.settlement.borrow() {
            Settlement::Pending => PromiseState::Pending,
            Settlement::Fulfilled(_) => PromiseState::Fulfilled,
            Settlement::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// Returns true while the promise is pending.
    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Returns true once any reaction has been attached.
    pub fn is_handled(&self) -> bool {
        self.shared.handled.get()
    }

    /// Returns true while the promise is pending on another promise.
    pub fn is_adopting(&self) -> bool {
        self.shared.following.borrow().is_some()
    }

    /// Number of reactions waiting for settlement.
    pub fn pending_reactions(&self) -> usize {
        self.shared.reactions.borrow().len()
    }

    /// The fulfillment value, if fulfilled.
    pub fn value(&self) -> Option<T> {
        match &*self.shared.settlement.borrow() {
            Settlement::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The rejection reason, if rejected.
    pub fn reason(&self) -> Option<E> {
        match &*self.shared.settlement.borrow() {
            Settlement::Rejected(error) => Some(error.clone()),
            _ => None,
        }
    }

    /// The outcome, if settled.
    pub fn result(&self) -> Option<Result<T, E>> {
        match &*self.shared.settlement.borrow() {
            Settlement::Pending => None,
            Settlement::Fulfilled(value) => Some(Ok(value.clone())),
            Settlement::Rejected(error) => Some(Err(error.clone())),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.shared.settlement.borrow() {
            Settlement::Pending => PromiseState::Pending,
            Settlement::Fulfilled(_) => PromiseState::Fulfilled,
            Settlement::Rejected(_) => PromiseState::Rejected,
        };
        f.debug_struct("Promise")
            .field("id", &self.shared.id)
            .field("state", &state)
            .field("handled", &self.shared.handled.get())
            .finish()
    }
}

/// The capabilities that settle one promise.
///
/// All clones share a single latch: whichever call comes first wins and
/// every later call is ignored, returning `false`.
pub struct Resolvers<T, E> {
    promise: Promise<T, E>,
    already_resolved: Rc<Cell<bool>>,
}

impl<T, E> Clone for Resolvers<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            already_resolved: Rc::clone(&self.already_resolved),
        }
    }
}

impl<T: PromiseValue, E: PromiseReason> Resolvers<T, E> {
    /// Creates a fresh set of resolvers for `promise` with its own latch.
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        Self {
            promise,
            already_resolved: Rc::new(Cell::new(false)),
        }
    }

    /// The promise these resolvers settle.
    pub fn promise(&self) -> &Promise<T, E> {
        &self.promise
    }

    /// Resolves the promise. Promises and thenables are adopted, plain
    /// values fulfill it.
    pub fn resolve(&self, resolution: Resolution<T, E>) -> bool {
        if self.already_resolved.replace(true) {
            return false;
        }
        thenable::resolve_promise(&self.promise, resolution);
        true
    }

    /// Fulfills the promise with `value`.
    pub fn fulfill(&self, value: T) -> bool {
        self.resolve(Resolution::Value(value))
    }

    /// Rejects the promise with `error`.
    pub fn reject(&self, error: E) -> bool {
        if self.already_resolved.replace(true) {
            return false;
        }
        self.promise.reject_now(error);
        true
    }

    /// Returns true once either capability has been used.
    pub fn is_resolved(&self) -> bool {
        self.already_resolved.get()
    }

    pub(crate) fn settle_with(&self, next: HandlerResult<T, E>) {
        match next {
            Ok(resolution) => {
                self.resolve(resolution);
            }
            Err(error) => {
                self.reject(error);
            }
        }
    }
}

impl<T, E> fmt::Debug for Resolvers<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolvers")
            .field("promise", &self.promise)
            .field("already_resolved", &self.already_resolved.get())
            .finish()
    }
}
