//! Single-threaded promise runtime.
//!
//! This crate provides the deferred-computation core of a script engine:
//! - Promises with at-most-once settlement and ordered reactions
//! - A FIFO microtask queue drained to exhaustion after each host task
//! - Adoption of nested promises and foreign thenables
//! - Combinators over collections of promises
//! - A coroutine driver for suspend/resume style functions
//! - Unhandled rejection tracking
//!
//! # Overview
//!
//! - [`MicrotaskQueue`] - The job queue every promise schedules on
//! - [`Promise`] - A value or error that becomes available once
//! - [`Resolution`] / [`Thenable`] - What a promise can be resolved with
//! - [`all`], [`all_settled`], [`race`], [`any`] - Combinators
//! - [`spawn`] / [`StepFunction`] - Coroutine driver
//! - [`UnhandledRejectionTracker`] - Reports rejections nobody handled
//! - [`EventLoop`] - Host loop running tasks, timers and microtask drains
//!
//! # Examples
//!
//! ## Reactions run as microtasks
//!
//! ```
//! use async_runtime::{MicrotaskQueue, Promise, Resolution};
//! use core_types::{JsError, Value};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let queue = MicrotaskQueue::new();
//! let promise = Promise::<Value, JsError>::fulfilled(&queue, Value::Smi(1));
//!
//! let seen = Rc::new(Cell::new(false));
//! let flag = seen.clone();
//! promise.then(move |v| {
//!     flag.set(true);
//!     Ok(Resolution::Value(v))
//! });
//!
//! assert!(!seen.get());
//! queue.drain();
//! assert!(seen.get());
//! ```
//!
//! ## Combinators
//!
//! ```
//! use async_runtime::{all_settled, MicrotaskQueue, Promise, Resolution};
//! use core_types::{JsError, Value};
//!
//! let queue = MicrotaskQueue::new();
//! let settled = all_settled(
//!     &queue,
//!     vec![
//!         Resolution::Value(Value::Smi(1)),
//!         Promise::<Value, JsError>::rejected(&queue, JsError::thrown(Value::string("x"))).into(),
//!     ],
//! );
//! queue.drain();
//!
//! let outcomes = settled.value().unwrap();
//! assert_eq!(outcomes[0].status(), "fulfilled");
//! assert_eq!(outcomes[1].status(), "rejected");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combinators;
pub mod config;
pub mod coroutine;
pub mod error;
pub mod event_loop;
pub mod promise;
pub mod rejection;
pub mod task_queue;
pub mod thenable;

// Re-export main types at crate root
pub use combinators::{all, all_settled, any, race, SettledOutcome};
pub use config::RuntimeConfig;
pub use coroutine::{run_coroutine, spawn, Coroutine, CoroutineState, FnStep, Step, StepFunction};
pub use error::{AggregateError, PromiseError};
pub use event_loop::{EventLoop, Scheduler, TimerId};
pub use promise::{
    FutureId, HandlerResult, Promise, PromiseReason, PromiseState, PromiseValue, Resolvers,
};
pub use rejection::{RejectionEvent, UnhandledRejectionTracker};
pub use task_queue::{MicroTask, MicrotaskQueue, Task, TaskQueue};
pub use thenable::{Resolution, Thenable};
