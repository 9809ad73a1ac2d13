//! Event loop implementation.
//!
//! The event loop is the host side of the runtime: it owns the task queue,
//! a virtual-time timer list and the microtask queue. Each turn runs one
//! task and then drains the microtask queue to exhaustion. Timers fire in
//! due-time order (insertion order among equal due times), advancing the
//! virtual clock; no real time passes.

use crate::config::RuntimeConfig;
use crate::error::PromiseError;
use crate::promise::{Promise, PromiseReason, PromiseValue};
use crate::task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};
use core_types::JsError;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Default)]
struct SchedulerState {
    tasks: TaskQueue,
    timers: BTreeMap<(u64, u64), Task>,
    now: u64,
    next_timer: u64,
}

/// Handle used by timer and I/O sources to schedule host tasks.
///
/// Cloning the handle shares the schedule. Tasks can capture a handle and
/// schedule further tasks from inside their callbacks.
#[derive(Clone, Default)]
pub struct Scheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl Scheduler {
    /// Creates an empty schedule at virtual time 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task to run on a later turn.
    pub fn enqueue_task(&self, task: Task) {
        self.state.borrow_mut().tasks.enqueue(task);
    }

    /// Schedules `task` to run once `delay_ms` of virtual time has passed.
    pub fn set_timeout(&self, delay_ms: u64, task: Task) -> TimerId {
        let mut state = self.state.borrow_mut();
        let seq = state.next_timer;
        state.next_timer += 1;
        let due = state.now.saturating_add(delay_ms);
        state.timers.insert((due, seq), task);
        tracing::trace!(timer = seq, due, "timer scheduled");
        TimerId(seq)
    }

    /// Cancels a timer. Returns false if it already fired or never existed.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.timers.len();
        state.timers.retain(|&(_, seq), _| seq != id.0);
        state.timers.len() != before
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }

    /// Returns true if any task or timer is waiting.
    pub fn has_pending_work(&self) -> bool {
        let state = self.state.borrow();
        !state.tasks.is_empty() || !state.timers.is_empty()
    }

    /// Returns a promise fulfilled with `value` after `delay_ms`.
    pub fn resolve_after<T, E>(&self, queue: &MicrotaskQueue, delay_ms: u64, value: T) -> Promise<T, E>
    where
        T: PromiseValue,
        E: PromiseReason,
    {
        let (promise, resolvers) = Promise::pending(queue);
        self.set_timeout(
            delay_ms,
            Task::new(move || {
                resolvers.fulfill(value);
                Ok(())
            }),
        );
        promise
    }

    /// Returns a promise rejected with `error` after `delay_ms`.
    pub fn reject_after<T, E>(&self, queue: &MicrotaskQueue, delay_ms: u64, error: E) -> Promise<T, E>
    where
        T: PromiseValue,
        E: PromiseReason,
    {
        let (promise, resolvers) = Promise::pending(queue);
        self.set_timeout(
            delay_ms,
            Task::new(move || {
                resolvers.reject(error);
                Ok(())
            }),
        );
        promise
    }

    /// Takes the next task: a queued task if any, else the earliest timer,
    /// advancing the clock to its due time.
    fn next_task(&self) -> Option<Task> {
        let mut state = self.state.borrow_mut();
        if let Some(task) = state.tasks.dequeue() {
            return Some(task);
        }
        let ((due, _), task) = state.timers.pop_first()?;
        state.now = state.now.max(due);
        Some(task)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Scheduler")
            .field("tasks", &state.tasks.len())
            .field("timers", &state.timers.len())
            .field("now", &state.now)
            .finish()
    }
}

/// The host event loop.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Resolution};
/// use core_types::{JsError, Value};
///
/// let mut event_loop = EventLoop::new();
/// let queue = event_loop.microtask_queue().clone();
/// let slow = event_loop
///     .scheduler()
///     .resolve_after::<Value, JsError>(&queue, 100, Value::Smi(1));
/// let doubled = slow.then(|v| Ok(Resolution::Value(Value::Array(vec![v.clone(), v]))));
///
/// event_loop.run_until_done().unwrap();
/// assert_eq!(event_loop.now(), 100);
/// assert_eq!(doubled.value(), Some(Value::Array(vec![Value::Smi(1), Value::Smi(1)])));
/// ```
#[derive(Debug)]
pub struct EventLoop {
    scheduler: Scheduler,
    microtask_queue: MicrotaskQueue,
    config: RuntimeConfig,
    task_errors: Vec<JsError>,
}

impl EventLoop {
    /// Creates an EventLoop with empty queues and the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Creates an EventLoop configured by `config`.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            scheduler: Scheduler::new(),
            microtask_queue: MicrotaskQueue::with_config(&config),
            config,
            task_errors: Vec::new(),
        }
    }

    /// The task schedule, for timer and I/O sources.
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    /// The microtask queue promises on this loop should be created on.
    pub fn microtask_queue(&self) -> &MicrotaskQueue {
        &self.microtask_queue
    }

    /// The configuration this loop was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    /// Adds a task to the task queue.
    pub fn enqueue_task(&mut self, task: Task) {
        self.scheduler.enqueue_task(task);
    }

    /// Adds a microtask to the microtask queue.
    pub fn enqueue_microtask(&mut self, microtask: MicroTask) {
        self.microtask_queue.enqueue(microtask);
    }

    /// Schedules a timer task.
    pub fn set_timeout(&mut self, delay_ms: u64, task: Task) -> TimerId {
        self.scheduler.set_timeout(delay_ms, task)
    }

    /// Returns true if no task or timer is waiting.
    pub fn is_task_queue_empty(&self) -> bool {
        !self.scheduler.has_pending_work()
    }

    /// Returns true if the microtask queue is empty.
    pub fn is_microtask_queue_empty(&self) -> bool {
        self.microtask_queue.is_empty()
    }

    /// Errors returned by tasks so far, in the order they occurred.
    pub fn task_errors(&self) -> &[JsError] {
        &self.task_errors
    }

    /// Runs a synchronous unit of top-level work, then drains microtasks.
    pub fn run_script<F>(&mut self, script: F)
    where
        F: FnOnce() -> Result<(), JsError>,
    {
        if let Err(error) = script() {
            self.record_task_error(error);
        }
        self.run_all_microtasks();
    }

    /// Runs all microtasks in the queue until empty.
    ///
    /// New microtasks added during execution are also processed before this
    /// method returns.
    pub fn run_all_microtasks(&mut self) -> usize {
        self.microtask_queue.drain()
    }

    /// Processes one turn: the next task (if any) followed by all microtasks.
    ///
    /// Returns true if a task ran.
    pub fn process_one_cycle(&mut self) -> bool {
        let ran = match self.scheduler.next_task() {
            Some(task) => {
                if let Err(error) = task.run() {
                    self.record_task_error(error);
                }
                true
            }
            None => false,
        };
        self.run_all_microtasks();
        ran
    }

    /// Runs turns until no task, timer or microtask is left. Returns the
    /// number of turns taken.
    ///
    /// Fails with [`PromiseError::TurnLimit`] when the configured turn
    /// budget runs out first.
    pub fn run_until_done(&mut self) -> Result<usize, PromiseError> {
        self.run_all_microtasks();
        let mut turns = 0;
        while self.scheduler.has_pending_work() || !self.microtask_queue.is_empty() {
            if let Some(limit) = self.config.max_turns {
                if turns >= limit {
                    tracing::warn!(limit, "event loop turn budget exhausted");
                    return Err(PromiseError::TurnLimit { limit });
                }
            }
            self.process_one_cycle();
            turns += 1;
        }
        tracing::debug!(turns, now = self.now(), "event loop idle");
        Ok(turns)
    }

    fn record_task_error(&mut self, error: JsError) {
        tracing::error!(%error, "task failed");
        self.task_errors.push(error);
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
