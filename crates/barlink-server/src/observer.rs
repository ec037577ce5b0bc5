//! Connection lifecycle notifications.
//!
//! Each observer owns a queue and a delivery thread. Handlers enqueue events
//! without blocking. Admission of `opened` events is capped by the queue
//! capacity; when the cap is reached the event is dropped with a warning, so
//! a slow observer can never stall a connection.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use tracing::{debug, info, warn};

const OBSERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::observer");

/// Identity of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    id: u64,
    peer: SocketAddr,
}

impl Link {
    /// Creates a link for connection `id` from `peer`.
    #[must_use]
    pub const fn new(id: u64, peer: SocketAddr) -> Self {
        Self { id, peer }
    }

    /// Server-assigned connection number, unique for the server's lifetime.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Remote address.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl fmt::Display for Link {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{} ({})", self.id, self.peer)
    }
}

/// Receives connection lifecycle events.
///
/// `opened` is `true` once the handshake succeeds and `false` when that
/// connection later closes. Connections rejected before the handshake
/// completes produce no events.
///
/// Each observer sees either both events of a connection, in order, or
/// neither of them: when its queue is full the `opened` event is dropped
/// together with the `closed` event that would follow it. A `closed` event
/// whose `opened` was queued is always delivered.
pub trait ConnectionObserver: Send + Sync {
    /// Called on the observer's delivery thread.
    fn notify_connection(&self, link: &Link, opened: bool);
}

/// Observer that logs lifecycle events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ConnectionObserver for LoggingObserver {
    fn notify_connection(&self, link: &Link, opened: bool) {
        let state = if opened { "established" } else { "terminated" };
        info!(
            target: OBSERVER_TARGET,
            connection = link.id(),
            peer = %link.peer(),
            "connection from {} {state}",
            link.peer(),
        );
    }
}

#[derive(Debug, Clone, Copy)]
struct ConnectionEvent {
    link: Link,
    opened: bool,
}

struct ObserverSlot {
    sender: Sender<ConnectionEvent>,
    /// Events queued but not yet handled by the observer.
    pending: Arc<AtomicUsize>,
    /// Connections whose `opened` event was queued and not yet closed.
    admitted: HashSet<u64>,
    /// Disconnects when the delivery thread exits.
    finished: Receiver<()>,
    worker: thread::JoinHandle<()>,
}

impl ObserverSlot {
    fn enqueue(&self, event: ConnectionEvent) -> bool {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.sender.send(event).is_ok() {
            return true;
        }
        self.pending.fetch_sub(1, Ordering::AcqRel);
        false
    }
}

/// Fan-out of lifecycle events to registered observers.
pub(crate) struct ObserverHub {
    capacity: usize,
    slots: Mutex<Vec<ObserverSlot>>,
}

impl ObserverHub {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Starts a delivery thread for `observer`.
    pub(crate) fn add(&self, observer: Arc<dyn ConnectionObserver>) -> std::io::Result<()> {
        let (sender, receiver) = unbounded();
        let (finished_tx, finished) = bounded::<()>(0);
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let worker = thread::Builder::new()
            .name(format!("barlink-observer-{}", slots.len()))
            .spawn(move || {
                deliver(&receiver, observer.as_ref(), &worker_pending);
                drop(finished_tx);
            })?;
        slots.push(ObserverSlot {
            sender,
            pending,
            admitted: HashSet::new(),
            finished,
            worker,
        });
        Ok(())
    }

    /// Enqueues an event for every observer without blocking.
    pub(crate) fn publish(&self, link: &Link, opened: bool) {
        let event = ConnectionEvent {
            link: *link,
            opened,
        };
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        for (index, slot) in slots.iter_mut().enumerate() {
            if opened {
                if slot.pending.load(Ordering::Acquire) >= self.capacity {
                    warn!(
                        target: OBSERVER_TARGET,
                        observer = index,
                        connection = link.id(),
                        "observer queue full; dropping lifecycle events for connection"
                    );
                    continue;
                }
                if slot.enqueue(event) {
                    slot.admitted.insert(link.id());
                    continue;
                }
            } else if !slot.admitted.remove(&link.id()) {
                debug!(
                    target: OBSERVER_TARGET,
                    observer = index,
                    connection = link.id(),
                    "skipping close for connection whose open was dropped"
                );
                continue;
            } else if slot.enqueue(event) {
                continue;
            }
            warn!(
                target: OBSERVER_TARGET,
                observer = index,
                connection = link.id(),
                "observer delivery thread has exited"
            );
        }
    }

    /// Closes every queue and waits until `deadline` for pending events to
    /// be delivered.
    ///
    /// Delivery threads still busy at the deadline are detached; they finish
    /// their queued events in the background.
    pub(crate) fn close(&self, deadline: Instant) {
        let slots = std::mem::take(&mut *self.slots.lock().unwrap_or_else(PoisonError::into_inner));
        for (
            index,
            ObserverSlot {
                sender,
                pending,
                finished,
                worker,
                ..
            },
        ) in slots.into_iter().enumerate()
        {
            drop(sender);
            match finished.recv_deadline(deadline) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.join().is_err() {
                        warn!(
                            target: OBSERVER_TARGET,
                            observer = index,
                            "observer delivery thread panicked"
                        );
                    }
                }
                Err(RecvTimeoutError::Timeout) => warn!(
                    target: OBSERVER_TARGET,
                    observer = index,
                    undelivered = pending.load(Ordering::Acquire),
                    "observer did not finish before the drain deadline; detaching it"
                ),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn deliver(
    receiver: &Receiver<ConnectionEvent>,
    observer: &dyn ConnectionObserver,
    pending: &AtomicUsize,
) {
    for event in receiver {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            observer.notify_connection(&event.link, event.opened);
        }));
        pending.fetch_sub(1, Ordering::AcqRel);
        if outcome.is_err() {
            warn!(
                target: OBSERVER_TARGET,
                connection = event.link.id(),
                "observer panicked while handling lifecycle event"
            );
        }
    }
}
