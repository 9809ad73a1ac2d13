//! Unhandled rejection tracking.
//!
//! A promise that rejects while no reaction is attached is recorded as a
//! candidate. When the microtask queue finishes a drain, every candidate
//! that still has no reaction is reported once through the report hook.
//! Attaching a reaction to an already reported promise produces a second,
//! `HandledLate` event. Reports are diagnostics only and never change the
//! state of any promise.

use crate::promise::FutureId;
use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// An event emitted by the [`UnhandledRejectionTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionEvent {
    /// The promise rejected and nothing reacted to it before the drain ended.
    Unhandled {
        /// The rejected promise
        id: FutureId,
        /// Debug rendering of the rejection reason
        reason: String,
    },
    /// A reaction was attached to a promise previously reported as unhandled.
    HandledLate {
        /// The promise that is now handled
        id: FutureId,
    },
}

impl RejectionEvent {
    /// The promise this event is about.
    pub fn id(&self) -> FutureId {
        match self {
            RejectionEvent::Unhandled { id, .. } | RejectionEvent::HandledLate { id } => *id,
        }
    }
}

type ReportHook = Box<dyn FnMut(&RejectionEvent)>;

struct Candidate {
    id: FutureId,
    reason: String,
    // Cleared when the promise is dropped before the drain ends.
    alive: bool,
}

/// Number of events kept for [`UnhandledRejectionTracker::reports`] unless
/// configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Observer of promises that reject with no reaction attached.
///
/// One tracker belongs to each [`MicrotaskQueue`](crate::MicrotaskQueue);
/// promises created on that queue report to it. Only the most recent
/// events are kept; [`take_reports`](Self::take_reports) drains them.
pub struct UnhandledRejectionTracker {
    enabled: bool,
    log: bool,
    history_limit: usize,
    pending: RefCell<Vec<Candidate>>,
    // Reported promises that are still alive and may be handled late.
    reported: RefCell<HashSet<FutureId>>,
    history: RefCell<VecDeque<RejectionEvent>>,
    hook: RefCell<Option<ReportHook>>,
    in_hook: Cell<bool>,
    // Events raised while the hook runs, delivered once it returns.
    deferred: RefCell<VecDeque<RejectionEvent>>,
}

impl UnhandledRejectionTracker {
    /// Creates a tracker. A disabled tracker ignores every notification.
    pub fn new(enabled: bool, log: bool) -> Self {
        Self::with_history_limit(enabled, log, DEFAULT_HISTORY_LIMIT)
    }

    /// Creates a tracker that keeps at most `history_limit` events.
    pub fn with_history_limit(enabled: bool, log: bool, history_limit: usize) -> Self {
        Self {
            enabled,
            log,
            history_limit,
            pending: RefCell::new(Vec::new()),
            reported: RefCell::new(HashSet::new()),
            history: RefCell::new(VecDeque::new()),
            hook: RefCell::new(None),
            in_hook: Cell::new(false),
            deferred: RefCell::new(VecDeque::new()),
        }
    }

    /// Installs the report hook, replacing any previous one.
    ///
    /// The hook runs after a drain completes, once per event. Events caused
    /// by the hook itself, such as a `HandledLate` from attaching a handler,
    /// are delivered after it returns.
    pub fn set_hook<F>(&self, hook: F)
    where
        F: FnMut(&RejectionEvent) + 'static,
    {
        *self.hook.borrow_mut() = Some(Box::new(hook));
    }

    /// Returns whether the tracker records anything.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The most recent events, oldest first, without removing them.
    pub fn reports(&self) -> Vec<RejectionEvent> {
        self.history.borrow().iter().cloned().collect()
    }

    /// Removes and returns the kept events, oldest first.
    pub fn take_reports(&self) -> Vec<RejectionEvent> {
        self.history.borrow_mut().drain(..).collect()
    }

    /// Number of rejections awaiting the end of the current drain.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Number of reported promises that are still alive.
    pub fn reported_count(&self) -> usize {
        self.reported.borrow().len()
    }

    /// Records a rejection that happened with no reaction attached.
    pub(crate) fn rejected_unhandled(&self, id: FutureId, reason: String) {
        if !self.enabled {
            return;
        }
        tracing::trace!(%id, "rejection without handler recorded");
        self.pending.borrow_mut().push(Candidate {
            id,
            reason,
            alive: true,
        });
    }

    /// Records that a reaction was attached to a rejected promise that had none.
    pub(crate) fn handler_added(&self, id: FutureId) {
        if !self.enabled {
            return;
        }
        let was_pending = {
            let mut pending = self.pending.borrow_mut();
            let before = pending.len();
            pending.retain(|candidate| candidate.id != id);
            pending.len() != before
        };
        if was_pending {
            return;
        }
        let was_reported = self.reported.borrow_mut().remove(&id);
        if was_reported {
            self.emit(RejectionEvent::HandledLate { id });
        }
    }

    /// Notes that a promise no longer exists. It is still reported if it is
    /// awaiting a flush, but it can never be handled late.
    pub(crate) fn forget(&self, id: FutureId) {
        if !self.enabled {
            return;
        }
        for candidate in self.pending.borrow_mut().iter_mut() {
            if candidate.id == id {
                candidate.alive = false;
            }
        }
        self.reported.borrow_mut().remove(&id);
    }

    /// Reports every rejection still unhandled. Called when a drain ends.
    pub(crate) fn flush(&self) {
        if !self.enabled {
            return;
        }
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        for Candidate { id, reason, alive } in pending {
            if alive {
                self.reported.borrow_mut().insert(id);
            }
            self.emit(RejectionEvent::Unhandled { id, reason });
        }
    }

    fn emit(&self, event: RejectionEvent) {
        if self.log {
            match &event {
                RejectionEvent::Unhandled { id, reason } => {
                    tracing::warn!(%id, %reason, "unhandled promise rejection");
                }
                RejectionEvent::HandledLate { id } => {
                    tracing::warn!(%id, "promise rejection handled asynchronously");
                }
            }
        }
        {
            let mut history = self.history.borrow_mut();
            if self.history_limit > 0 {
                if history.len() == self.history_limit {
                    history.pop_front();
                }
                history.push_back(event.clone());
            }
        }

        if self.in_hook.get() {
            self.deferred.borrow_mut().push_back(event);
            return;
        }
        let Some(mut hook) = self.hook.borrow_mut().take() else {
            return;
        };
        self.in_hook.set(true);
        hook(&event);
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            match next {
                Some(event) => hook(&event),
                None => break,
            }
        }
        self.in_hook.set(false);
        let mut slot = self.hook.borrow_mut();
        if slot.is_none() {
            *slot = Some(hook);
        }
    }
}

impl fmt::Debug for UnhandledRejectionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnhandledRejectionTracker")
            .field("enabled", &self.enabled)
            .field("pending", &self.pending.borrow().len())
            .field("reported", &self.reported.borrow().len())
            .field("history", &self.history.borrow().len())
            .finish()
    }
}

impl Default for UnhandledRejectionTracker {
    fn default() -> Self {
        Self::new(true, true)
    }
}
