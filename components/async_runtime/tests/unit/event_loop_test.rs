//! Unit tests for EventLoop

use async_runtime::{EventLoop, MicroTask, Promise, PromiseError, Resolution, RuntimeConfig, Task};
use core_types::{JsError, Value};
use std::cell::RefCell;
use std::rc::Rc;

type JsPromise = Promise<Value, JsError>;

#[test]
fn new_event_loop_has_empty_queues() {
    let event_loop = EventLoop::new();
    assert!(event_loop.is_task_queue_empty());
    assert!(event_loop.is_microtask_queue_empty());
}

#[test]
fn enqueue_task_adds_to_task_queue() {
    let mut event_loop = EventLoop::new();
    event_loop.enqueue_task(Task::new(|| Ok(())));
    assert!(!event_loop.is_task_queue_empty());
}

#[test]
fn enqueue_microtask_adds_to_microtask_queue() {
    let mut event_loop = EventLoop::new();
    event_loop.enqueue_microtask(MicroTask::new(|| {}));
    assert!(!event_loop.is_microtask_queue_empty());
}

#[test]
fn run_all_microtasks_empties_queue() {
    let mut event_loop = EventLoop::new();
    event_loop.enqueue_microtask(MicroTask::new(|| {}));
    event_loop.enqueue_microtask(MicroTask::new(|| {}));
    assert_eq!(event_loop.run_all_microtasks(), 2);
    assert!(event_loop.is_microtask_queue_empty());
}

#[test]
fn process_one_cycle_runs_one_task_then_all_microtasks() {
    let mut event_loop = EventLoop::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let queue = event_loop.microtask_queue().clone();

    for name in ["task 1", "task 2"] {
        let (l, q) = (log.clone(), queue.clone());
        event_loop.enqueue_task(Task::new(move || {
            l.borrow_mut().push(name.to_string());
            let l2 = l.clone();
            q.queue_microtask(move || l2.borrow_mut().push(format!("after {}", name)));
            Ok(())
        }));
    }

    assert!(event_loop.process_one_cycle());
    assert_eq!(*log.borrow(), vec!["task 1", "after task 1"]);
    assert!(event_loop.process_one_cycle());
    assert!(!event_loop.process_one_cycle());
    assert_eq!(log.borrow().len(), 4);
}

#[test]
fn run_script_drains_microtasks() {
    let mut event_loop = EventLoop::new();
    let queue = event_loop.microtask_queue().clone();
    let slot: Rc<RefCell<Option<JsPromise>>> = Rc::new(RefCell::new(None));

    let s = slot.clone();
    event_loop.run_script(move || {
        let promise = JsPromise::fulfilled(&queue, Value::Smi(1))
            .then(|v| Ok(Resolution::Value(Value::Array(vec![v]))));
        *s.borrow_mut() = Some(promise);
        Ok(())
    });

    let promise = slot.borrow().clone().expect("script ran");
    assert_eq!(promise.value(), Some(Value::Array(vec![Value::Smi(1)])));
}

#[test]
fn script_error_is_recorded() {
    let mut event_loop = EventLoop::new();
    event_loop.run_script(|| Err(JsError::type_error("script failed")));
    assert_eq!(event_loop.task_errors(), &[JsError::type_error("script failed")]);
}

#[test]
fn timers_advance_virtual_clock() {
    crate::init_tracing();
    let mut event_loop = EventLoop::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let scheduler = event_loop.scheduler();

    let (s, inner) = (seen.clone(), scheduler.clone());
    event_loop.set_timeout(
        10,
        Task::new(move || {
            s.borrow_mut().push(inner.now());
            let s2 = s.clone();
            let nested = inner.clone();
            inner.set_timeout(
                5,
                Task::new(move || {
                    s2.borrow_mut().push(nested.now());
                    Ok(())
                }),
            );
            Ok(())
        }),
    );

    event_loop.run_until_done().expect("loop finishes");
    assert_eq!(*seen.borrow(), vec![10, 15]);
    assert_eq!(event_loop.now(), 15);
}

#[test]
fn huge_delay_after_clock_advanced_saturates() {
    let mut event_loop = EventLoop::new();
    event_loop.set_timeout(10, Task::new(|| Ok(())));
    event_loop.run_until_done().expect("loop finishes");
    assert_eq!(event_loop.now(), 10);

    let fired = Rc::new(RefCell::new(Vec::new()));
    let (f, scheduler) = (fired.clone(), event_loop.scheduler());
    event_loop.set_timeout(
        u64::MAX,
        Task::new(move || {
            f.borrow_mut().push(scheduler.now());
            Ok(())
        }),
    );
    let f = fired.clone();
    let scheduler = event_loop.scheduler();
    event_loop.set_timeout(
        u64::MAX - 5,
        Task::new(move || {
            f.borrow_mut().push(scheduler.now());
            Ok(())
        }),
    );

    event_loop.run_until_done().expect("loop finishes");
    assert_eq!(*fired.borrow(), vec![u64::MAX, u64::MAX]);
    assert_eq!(event_loop.now(), u64::MAX);

    // The clock is pinned at its maximum; later timers still schedule.
    event_loop.set_timeout(1, Task::new(|| Ok(())));
    assert_eq!(event_loop.run_until_done(), Ok(1));
}

#[test]
fn microtasks_from_a_timer_run_before_the_next_timer() {
    let mut event_loop = EventLoop::new();
    let queue = event_loop.microtask_queue().clone();
    let log = Rc::new(RefCell::new(Vec::new()));

    let (l, q) = (log.clone(), queue.clone());
    event_loop.set_timeout(
        1,
        Task::new(move || {
            l.borrow_mut().push("timer 1");
            let l2 = l.clone();
            q.queue_microtask(move || l2.borrow_mut().push("microtask"));
            Ok(())
        }),
    );
    let l = log.clone();
    event_loop.set_timeout(
        1,
        Task::new(move || {
            l.borrow_mut().push("timer 2");
            Ok(())
        }),
    );

    event_loop.run_until_done().expect("loop finishes");
    assert_eq!(*log.borrow(), vec!["timer 1", "microtask", "timer 2"]);
}

#[test]
fn resolve_after_settles_when_timer_fires() {
    let mut event_loop = EventLoop::new();
    let queue = event_loop.microtask_queue().clone();
    let promise: JsPromise = event_loop
        .scheduler()
        .resolve_after(&queue, 40, Value::string("done"));

    assert!(promise.is_pending());
    event_loop.run_until_done().expect("loop finishes");
    assert_eq!(promise.value(), Some(Value::string("done")));
}

#[test]
fn turn_limit_is_reported() {
    let config = RuntimeConfig::from_json(r#"{ "max_turns": 1 }"#).expect("valid config");
    let mut event_loop = EventLoop::with_config(config);
    event_loop.enqueue_task(Task::new(|| Ok(())));
    event_loop.enqueue_task(Task::new(|| Ok(())));
    assert_eq!(
        event_loop.run_until_done(),
        Err(PromiseError::TurnLimit { limit: 1 })
    );
}

#[test]
fn unhandled_rejection_from_task_is_reported_after_its_drain() {
    let mut event_loop = EventLoop::new();
    let queue = event_loop.microtask_queue().clone();
    let q = queue.clone();
    event_loop.enqueue_task(Task::new(move || {
        let _ = JsPromise::rejected(&q, JsError::type_error("dropped"));
        Ok(())
    }));

    assert!(queue.tracker().reports().is_empty());
    event_loop.process_one_cycle();
    assert_eq!(queue.tracker().reports().len(), 1);
}
