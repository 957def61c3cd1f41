//! Generic active-object runtime.
//!
//! Classic embedded active-object pattern expressed in safe Rust: each
//! active object is one thread plus one bounded event queue plus one event
//! handler. Producers post events (non-blocking); the object's thread
//! removes one event at a time and runs the handler to completion before
//! waiting for the next.
//!
//! ```text
//! ┌──────────────┐  post   ┌──────────────┐  recv   ┌─────────────────┐
//! │ other AOs,   │────────▶│ bounded FIFO │────────▶│ handler thread  │
//! │ timers,      │         │   (Mailbox)  │         │ (run to         │
//! │ console      │         │              │         │  completion)    │
//! └──────────────┘         └──────────────┘         └─────────────────┘
//! ```
//!
//! Because handlers run to completion and each active object has exactly
//! one thread, two events for the same object are never processed
//! concurrently. That is the concurrency invariant the rest of the system
//! relies on: no shared-memory mutation path into another object's state
//! exists, only `post`.
//!
//! A concrete active object is a plain struct implementing [`EventHandler`]
//! that holds whatever private state it needs, plus (if it posts to itself)
//! a clone of its own [`Mailbox`]. There is no base struct to embed.

pub mod timer;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::trace;
use std::thread;

use crate::error::PostError;

// ---------------------------------------------------------------------------
// Event queue
// ---------------------------------------------------------------------------

/// Producer half of an active object's event queue.
///
/// Cheap to clone; every producer (another active object, a timer thread,
/// the console) holds its own clone.
#[derive(Debug)]
pub struct Mailbox<E> {
    tx: Sender<E>,
}

// Manual impl: `#[derive(Clone)]` would require `E: Clone`.
impl<E> Clone for Mailbox<E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<E> Mailbox<E> {
    /// Non-blocking enqueue of one event.
    ///
    /// Returns [`PostError::QueueFull`] rather than blocking when the queue
    /// is at capacity; the existing contents and their order are untouched.
    /// The caller owns the retry/backoff policy.
    pub fn post(&self, event: E) -> Result<(), PostError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PostError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(PostError::Closed),
        }
    }

    /// Number of events currently queued.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Consumer half of an active object's event queue.
///
/// Consumed by [`start`]; tests may instead drain it directly to drive a
/// handler synchronously.
#[derive(Debug)]
pub struct Inbox<E> {
    rx: Receiver<E>,
}

impl<E> Inbox<E> {
    /// Blocking receive. `Err` only when every [`Mailbox`] clone is gone.
    pub fn recv(&self) -> Result<E, crossbeam_channel::RecvError> {
        self.rx.recv()
    }

    /// Non-blocking receive, for synchronous test harnesses.
    pub fn try_recv(&self) -> Option<E> {
        self.rx.try_recv().ok()
    }
}

/// Create a bounded event queue.
///
/// The capacity is fixed for the lifetime of the active object; it cannot
/// be grown later.
pub fn queue<E>(capacity: usize) -> (Mailbox<E>, Inbox<E>) {
    let (tx, rx) = bounded(capacity);
    (Mailbox { tx }, Inbox { rx })
}

// ---------------------------------------------------------------------------
// Event handler
// ---------------------------------------------------------------------------

/// The one event-handler implementation of a concrete active object.
///
/// `on_event` must return having fully processed the event — no blocking
/// other than the queue receive that precedes dispatch (a bounded blocking
/// read of a sensor inside the handler is acceptable).
pub trait EventHandler: Send + 'static {
    type Event: Send + 'static;

    /// Synthetic event delivered to the handler exactly once, before the
    /// event loop starts taking events from the queue.
    const INIT: Self::Event;

    fn on_event(&mut self, event: Self::Event);
}

// ---------------------------------------------------------------------------
// Thread configuration & start
// ---------------------------------------------------------------------------

/// Thread attributes for an active object.
#[derive(Debug, Clone, Copy)]
pub struct ThreadConfig {
    pub name: &'static str,
    pub stack_size: usize,
}

/// Start an active object: spawn its thread and enter the event loop.
///
/// The thread delivers [`EventHandler::INIT`] first, then loops forever:
/// block until an event arrives, dispatch it to completion, repeat. Events
/// are never dropped or reordered (strict FIFO per object).
///
/// All active objects are created during start-up, so a failure to spawn
/// the backing thread is a non-recoverable programming/resource error and
/// halts the system rather than continuing undefined.
pub fn start<H: EventHandler>(
    cfg: ThreadConfig,
    inbox: Inbox<H::Event>,
    mut handler: H,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name(cfg.name.into())
        .stack_size(cfg.stack_size)
        .spawn(move || {
            handler.on_event(H::INIT);

            // The loop ends only when every producer mailbox is gone,
            // which never happens while the system is running.
            while let Ok(event) = inbox.recv() {
                trace!("ACTIVE: {} event received", cfg.name);
                handler.on_event(event);
            }
            trace!("ACTIVE: {} event loop ended", cfg.name);
        })
        .unwrap_or_else(|e| panic!("failed to spawn active object thread '{}': {e}", cfg.name))
}
