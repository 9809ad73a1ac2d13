//! Unit tests for Promise

use async_runtime::{MicrotaskQueue, Promise, PromiseState, Resolution};
use core_types::{ErrorKind, JsError, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type JsPromise = Promise<Value, JsError>;

fn error(message: &str) -> JsError {
    JsError::new(ErrorKind::TypeError, message)
}

#[test]
fn new_promise_is_pending() {
    let queue = MicrotaskQueue::new();
    let (promise, _resolvers) = JsPromise::pending(&queue);
    assert_eq!(promise.state(), PromiseState::Pending);
    assert!(promise.value().is_none());
    assert!(promise.reason().is_none());
}

#[test]
fn fulfill_then_reject_keeps_fulfillment() {
    let queue = MicrotaskQueue::new();
    let (promise, resolvers) = JsPromise::pending(&queue);
    resolvers.fulfill(Value::Smi(1));
    resolvers.reject(error("err"));
    assert_eq!(promise.state(), PromiseState::Fulfilled);
    assert_eq!(promise.value(), Some(Value::Smi(1)));
}

#[test]
fn reject_then_fulfill_keeps_rejection() {
    let queue = MicrotaskQueue::new();
    let (promise, resolvers) = JsPromise::pending(&queue);
    resolvers.reject(error("first"));
    resolvers.fulfill(Value::Smi(42));
    assert_eq!(promise.state(), PromiseState::Rejected);
    assert_eq!(promise.reason(), Some(error("first")));
}

#[test]
fn cloned_resolvers_share_latch() {
    let queue = MicrotaskQueue::new();
    let (promise, resolvers) = JsPromise::pending(&queue);
    let other = resolvers.clone();
    assert!(other.fulfill(Value::Smi(1)));
    assert!(resolvers.is_resolved());
    assert!(!resolvers.fulfill(Value::Smi(2)));
    assert_eq!(promise.value(), Some(Value::Smi(1)));
}

#[test]
fn executor_runs_synchronously() {
    let queue = MicrotaskQueue::new();
    let ran = Cell::new(false);
    let promise = JsPromise::new(&queue, |resolvers| {
        ran.set(true);
        resolvers.fulfill(Value::Smi(1));
        Ok(())
    });
    assert!(ran.get());
    assert_eq!(promise.value(), Some(Value::Smi(1)));
}

#[test]
fn executor_error_rejects() {
    let queue = MicrotaskQueue::new();
    let promise = JsPromise::new(&queue, |_| Err(error("executor threw")));
    assert_eq!(promise.reason(), Some(error("executor threw")));
}

#[test]
fn reaction_on_settled_promise_is_deferred() {
    let queue = MicrotaskQueue::new();
    let promise = JsPromise::fulfilled(&queue, Value::Smi(1));

    let called = Rc::new(Cell::new(false));
    let flag = called.clone();
    let _derived = promise.then(move |v| {
        flag.set(true);
        Ok(Resolution::Value(v))
    });

    assert!(!called.get());
    queue.drain();
    assert!(called.get());
}

#[test]
fn reactions_before_and_after_settlement_run_once_in_order() {
    let queue = MicrotaskQueue::new();
    let (promise, resolvers) = JsPromise::pending(&queue);
    let log = Rc::new(RefCell::new(Vec::new()));

    let l = log.clone();
    promise.then(move |v| {
        l.borrow_mut().push("before");
        Ok(Resolution::Value(v))
    });
    resolvers.fulfill(Value::Smi(1));
    let l = log.clone();
    promise.then(move |v| {
        l.borrow_mut().push("after");
        Ok(Resolution::Value(v))
    });

    queue.drain();
    queue.drain();
    assert_eq!(*log.borrow(), vec!["before", "after"]);
}

#[test]
fn fifo_ordering_across_promises() {
    let queue = MicrotaskQueue::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let (a, ra) = JsPromise::pending(&queue);
    let (b, rb) = JsPromise::pending(&queue);
    let (c, rc) = JsPromise::pending(&queue);

    let l = log.clone();
    a.then(move |v| {
        l.borrow_mut().push("A");
        Ok(Resolution::Value(v))
    });
    let (l, q) = (log.clone(), queue.clone());
    b.then(move |v| {
        l.borrow_mut().push("B");
        let l2 = l.clone();
        q.queue_microtask(move || l2.borrow_mut().push("B-followup"));
        Ok(Resolution::Value(v))
    });
    let l = log.clone();
    c.then(move |v| {
        l.borrow_mut().push("C");
        Ok(Resolution::Value(v))
    });

    ra.fulfill(Value::Smi(1));
    rb.fulfill(Value::Smi(2));
    rc.fulfill(Value::Smi(3));
    queue.drain();

    assert_eq!(*log.borrow(), vec!["A", "B", "C", "B-followup"]);
}

#[test]
fn handler_error_rejects_derived() {
    let queue = MicrotaskQueue::new();
    let promise = JsPromise::fulfilled(&queue, Value::Smi(1));
    let derived: JsPromise = promise.then(|_| Err(error("handler threw")));
    queue.drain();
    assert_eq!(derived.reason(), Some(error("handler threw")));
}

#[test]
fn handler_error_is_recoverable_downstream() {
    let queue = MicrotaskQueue::new();
    let recovered = JsPromise::fulfilled(&queue, Value::Smi(1))
        .then::<Value, _>(|_| Err(error("bad")))
        .catch(|e| Ok(Resolution::Value(Value::string(e.message))));
    queue.drain();
    assert_eq!(recovered.value(), Some(Value::string("bad")));
}

#[test]
fn omitted_rejection_handler_propagates() {
    let queue = MicrotaskQueue::new();
    let called = Rc::new(Cell::new(false));
    let flag = called.clone();
    let derived = JsPromise::rejected(&queue, error("x")).then(move |v| {
        flag.set(true);
        Ok(Resolution::Value(v))
    });
    queue.drain();
    assert!(!called.get());
    assert_eq!(derived.reason(), Some(error("x")));
}

#[test]
fn omitted_fulfillment_handler_propagates() {
    let queue = MicrotaskQueue::new();
    let derived = JsPromise::fulfilled(&queue, Value::Smi(7))
        .catch(|_| Ok(Resolution::Value(Value::Null)));
    queue.drain();
    assert_eq!(derived.value(), Some(Value::Smi(7)));
}

#[test]
fn react_dispatches_to_matching_handler() {
    let queue = MicrotaskQueue::new();
    let ok = JsPromise::fulfilled(&queue, Value::Smi(1)).react(
        |_| Ok(Resolution::Value(Value::string("fulfilled"))),
        |_| Ok(Resolution::Value(Value::string("rejected"))),
    );
    let err = JsPromise::rejected(&queue, error("x")).react(
        |_| Ok(Resolution::Value(Value::string("fulfilled"))),
        |_| Ok(Resolution::Value(Value::string("rejected"))),
    );
    queue.drain();
    assert_eq!(ok.value(), Some(Value::string("fulfilled")));
    assert_eq!(err.value(), Some(Value::string("rejected")));
}

#[test]
fn then_can_change_value_type() {
    let queue = MicrotaskQueue::new();
    let length: Promise<usize, JsError> = JsPromise::fulfilled(&queue, Value::string("four"))
        .then(|v| Ok(Resolution::Value(v.to_string().len())));
    queue.drain();
    assert_eq!(length.value(), Some(4));
}

#[test]
fn handler_returning_promise_is_flattened() {
    let queue = MicrotaskQueue::new();
    let (inner, inner_resolvers) = JsPromise::pending(&queue);
    let inner_for_handler = inner.clone();
    let derived = JsPromise::fulfilled(&queue, Value::Smi(1))
        .then(move |_| Ok(Resolution::Promise(inner_for_handler)));

    queue.drain();
    assert!(derived.is_pending());

    inner_resolvers.fulfill(Value::Smi(99));
    queue.drain();
    assert_eq!(derived.value(), Some(Value::Smi(99)));
}

#[test]
fn finally_passes_outcome_through() {
    let queue = MicrotaskQueue::new();
    let count = Rc::new(Cell::new(0));

    let c = count.clone();
    let ok = JsPromise::fulfilled(&queue, Value::Smi(5)).finally(move || {
        c.set(c.get() + 1);
        Ok(())
    });
    let c = count.clone();
    let err = JsPromise::rejected(&queue, error("kept")).finally(move || {
        c.set(c.get() + 1);
        Ok(())
    });
    queue.drain();

    assert_eq!(count.get(), 2);
    assert_eq!(ok.value(), Some(Value::Smi(5)));
    assert_eq!(err.reason(), Some(error("kept")));
}

#[test]
fn finally_error_overrides_outcome() {
    let queue = MicrotaskQueue::new();
    let derived =
        JsPromise::fulfilled(&queue, Value::Smi(5)).finally(|| Err(error("cleanup failed")));
    queue.drain();
    assert_eq!(derived.reason(), Some(error("cleanup failed")));
}

#[test]
fn thrown_values_survive_as_reasons() {
    let queue = MicrotaskQueue::new();
    let derived = JsPromise::rejected(&queue, JsError::thrown(Value::string("x")))
        .catch(|e| Ok(Resolution::Value(e.to_value())));
    queue.drain();
    assert_eq!(derived.value(), Some(Value::string("x")));
}

#[test]
fn long_chain_settles_in_one_drain() {
    let queue = MicrotaskQueue::new();
    let mut tail = JsPromise::fulfilled(&queue, Value::Smi(0));
    for _ in 0..100 {
        tail = tail.then(|v| {
            let n = v.as_number().unwrap_or(0.0) as i32;
            Ok(Resolution::Value(Value::Smi(n + 1)))
        });
    }
    assert_eq!(queue.drain(), 100);
    assert_eq!(tail.value(), Some(Value::Smi(100)));
}
