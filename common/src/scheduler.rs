//! Discrete-event scheduler
//!
//! Single-threaded virtual-time event queue. Events fire in (time, insertion)
//! order. Callbacks run without any internal borrow held, so they may freely
//! schedule or cancel other events.

use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Error returned by an event callback
#[derive(Debug, Error)]
#[error(transparent)]
pub struct EventError(Box<dyn StdError + Send + Sync + 'static>);

impl EventError {
    /// Wrap any error produced inside a callback
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self(err.into())
    }
}

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("event scheduled at {at:?} failed: {source}")]
    EventFailed {
        at: Duration,
        #[source]
        source: EventError,
    },
}

/// Result type of a scheduled callback
pub type EventResult = Result<(), EventError>;

type Callback = Box<dyn FnOnce() -> EventResult>;

/// Handle to a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct QueuedEvent {
    at: Duration,
    id: EventId,
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct SchedulerInner {
    now: Duration,
    next_id: u64,
    queue: BinaryHeap<Reverse<QueuedEvent>>,
    /// Callbacks of events that are still pending; cancelled events are
    /// removed here and skipped when they reach the head of the queue.
    callbacks: HashMap<EventId, Callback>,
}

/// Virtual-time scheduler shared by every simulated entity
#[derive(Default)]
pub struct Scheduler {
    inner: RefCell<SchedulerInner>,
}

impl Scheduler {
    /// Create a scheduler at virtual time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Schedule `callback` to run `delay` after the current time
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> EventId
    where
        F: FnOnce() -> EventResult + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = EventId(inner.next_id);
        inner.next_id += 1;
        let at = inner.now + delay;
        inner.queue.push(Reverse(QueuedEvent { at, id }));
        inner.callbacks.insert(id, Box::new(callback));
        trace!("Scheduled event {} at {:?}", id, at);
        id
    }

    /// Cancel a pending event. Cancelling an expired or already cancelled
    /// event is a no-op.
    pub fn cancel(&self, id: EventId) {
        if self.inner.borrow_mut().callbacks.remove(&id).is_some() {
            trace!("Cancelled event {}", id);
        }
    }

    /// Whether the event is still waiting to fire
    pub fn is_pending(&self, id: EventId) -> bool {
        self.inner.borrow().callbacks.contains_key(&id)
    }

    /// Number of events still waiting to fire
    pub fn pending_events(&self) -> usize {
        self.inner.borrow().callbacks.len()
    }

    /// Time of the next pending event, if any
    pub fn next_event_time(&self) -> Option<Duration> {
        let mut inner = self.inner.borrow_mut();
        Self::discard_cancelled(&mut inner);
        inner.queue.peek().map(|Reverse(ev)| ev.at)
    }

    fn discard_cancelled(inner: &mut SchedulerInner) {
        while let Some(Reverse(head)) = inner.queue.peek() {
            if inner.callbacks.contains_key(&head.id) {
                break;
            }
            inner.queue.pop();
        }
    }

    /// Run the next pending event. Returns `Ok(false)` when the queue is empty.
    pub fn step(&self) -> Result<bool, SchedulerError> {
        let next = {
            let mut inner = self.inner.borrow_mut();
            Self::discard_cancelled(&mut inner);
            match inner.queue.pop() {
                Some(Reverse(ev)) => {
                    inner.now = ev.at;
                    inner.callbacks.remove(&ev.id).map(|cb| (ev.at, cb))
                }
                None => None,
            }
        };

        match next {
            Some((at, callback)) => {
                callback().map_err(|source| SchedulerError::EventFailed { at, source })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run until no event is left
    pub fn run(&self) -> Result<(), SchedulerError> {
        while self.step()? {}
        Ok(())
    }

    /// Run every event due at or before `until`, then advance the clock to it
    pub fn run_until(&self, until: Duration) -> Result<(), SchedulerError> {
        while let Some(at) = self.next_event_time() {
            if at > until {
                break;
            }
            self.step()?;
        }
        let mut inner = self.inner.borrow_mut();
        if inner.now < until {
            inner.now = until;
        }
        Ok(())
    }

    /// Run every event due within `delta` of the current time
    pub fn advance(&self, delta: Duration) -> Result<(), SchedulerError> {
        let until = self.now() + delta;
        self.run_until(until)
    }
}
