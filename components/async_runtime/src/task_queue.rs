//! Task and microtask queue management.
//!
//! Tasks are the host's units of work (script runs, timer callbacks, I/O
//! completions). Microtasks are the promise runtime's jobs: reaction calls,
//! adoption steps, combinator bookkeeping and coroutine resumption. The
//! microtask queue is drained to exhaustion after every task.

use crate::config::RuntimeConfig;
use crate::promise::FutureId;
use crate::rejection::UnhandledRejectionTracker;
use core_types::JsError;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A task to be executed by the event loop.
///
/// A failing task is reported by the loop; it does not stop later tasks.
pub struct Task {
    callback: Box<dyn FnOnce() -> Result<(), JsError>>,
}

impl Task {
    /// Creates a new Task from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), JsError> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the task.
    pub fn run(self) -> Result<(), JsError> {
        (self.callback)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task {{ ... }}")
    }
}

/// A microtask: one deferred, zero-argument unit of work.
///
/// A microtask cannot fail. Anything that can go wrong inside it is routed
/// into the promise it settles.
pub struct MicroTask {
    callback: Box<dyn FnOnce()>,
}

impl MicroTask {
    /// Creates a new MicroTask from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the microtask.
    pub fn run(self) {
        (self.callback)()
    }
}

impl fmt::Debug for MicroTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MicroTask {{ ... }}")
    }
}

/// A FIFO queue of tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<Task>,
}

impl TaskQueue {
    /// Creates a new empty TaskQueue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Adds a task to the end of the queue.
    pub fn enqueue(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    /// Removes and returns the next task from the queue.
    pub fn dequeue(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of tasks in the queue.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

struct QueueState {
    jobs: RefCell<VecDeque<MicroTask>>,
    draining: Cell<bool>,
    next_id: Cell<u64>,
    tracker: UnhandledRejectionTracker,
}

/// Handle to a microtask queue.
///
/// Cloning the handle shares the queue. Every promise remembers the queue
/// it was created on and schedules its jobs there, so independent queues
/// (one per test, say) never observe each other's work.
///
/// # Examples
///
/// ```
/// use async_runtime::MicrotaskQueue;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let queue = MicrotaskQueue::new();
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let (q, l) = (queue.clone(), log.clone());
/// queue.queue_microtask(move || {
///     l.borrow_mut().push(1);
///     let l = l.clone();
///     q.queue_microtask(move || l.borrow_mut().push(3));
/// });
/// let l = log.clone();
/// queue.queue_microtask(move || l.borrow_mut().push(2));
///
/// assert_eq!(queue.drain(), 3);
/// assert_eq!(*log.borrow(), vec![1, 2, 3]);
/// ```
#[derive(Clone)]
pub struct MicrotaskQueue {
    state: Rc<QueueState>,
}

impl MicrotaskQueue {
    /// Creates an empty queue with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    /// Creates an empty queue configured by `config`.
    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self {
            state: Rc::new(QueueState {
                jobs: RefCell::new(VecDeque::new()),
                draining: Cell::new(false),
                next_id: Cell::new(0),
                tracker: UnhandledRejectionTracker::with_history_limit(
                    config.track_rejections,
                    config.log_unhandled_rejections,
                    config.rejection_history_limit,
                ),
            }),
        }
    }

    /// Adds a microtask to the end of the queue.
    pub fn enqueue(&self, microtask: MicroTask) {
        self.state.jobs.borrow_mut().push_back(microtask);
    }

    /// Schedules a closure as a microtask.
    pub fn queue_microtask<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        self.enqueue(MicroTask::new(f));
    }

    /// Runs microtasks until the queue is empty, including microtasks
    /// enqueued while draining. Returns the number of microtasks run.
    ///
    /// A drain requested from inside a running microtask returns 0 at once;
    /// the drain already in progress picks up the remaining work. After the
    /// queue empties, unhandled rejections are reported.
    pub fn drain(&self) -> usize {
        if self.state.draining.replace(true) {
            tracing::trace!("drain requested during a drain, deferred");
            return 0;
        }
        let guard = DrainGuard(&self.state.draining);

        let mut ran = 0;
        loop {
            let next = self.state.jobs.borrow_mut().pop_front();
            match next {
                Some(job) => {
                    job.run();
                    ran += 1;
                }
                None => break,
            }
        }
        drop(guard);

        tracing::trace!(jobs = ran, "microtask checkpoint complete");
        self.state.tracker.flush();
        ran
    }

    /// Drains the queue to empty and reports outstanding rejections.
    /// Nothing queued is discarded.
    pub fn shutdown(self) -> usize {
        let ran = self.drain();
        tracing::debug!(jobs = ran, "microtask queue shut down");
        ran
    }

    /// Returns true if no microtask is queued.
    pub fn is_empty(&self) -> bool {
        self.state.jobs.borrow().is_empty()
    }

    /// Returns the number of queued microtasks.
    pub fn len(&self) -> usize {
        self.state.jobs.borrow().len()
    }

    /// Returns true while a drain is running.
    pub fn is_draining(&self) -> bool {
        self.state.draining.get()
    }

    /// The unhandled rejection tracker of this queue.
    pub fn tracker(&self) -> &UnhandledRejectionTracker {
        &self.state.tracker
    }

    /// Returns true if both handles refer to the same queue.
    pub fn ptr_eq(&self, other: &MicrotaskQueue) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn allocate_id(&self) -> FutureId {
        let id = self.state.next_id.get();
        self.state.next_id.set(id + 1);
        FutureId(id)
    }
}

impl Default for MicrotaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("len", &self.len())
            .field("draining", &self.is_draining())
            .finish()
    }
}

/// Clears the draining flag even if a microtask panics.
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
