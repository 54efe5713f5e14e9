//! Single-slot "latest value wins" handoff between threads
//!
//! Gamepad snapshots and captured key sets are produced outside the frame loop.
//! The loop only ever wants the newest one, so the handoff is a
//! `tokio::sync::watch` slot: every publish overwrites the previous value and
//! nothing queues up.
//!
//! ```text
//! producer ──publish()──► [ slot ] ──latest()/take_fresh()──► frame loop
//!                        (overwrite)
//! ```

use tokio::sync::watch;
use tracing::debug;

/// Write half of a latest-value slot
#[derive(Debug)]
pub struct LatestSender<T> {
    inner: watch::Sender<Option<T>>,
}

/// Read half of a latest-value slot
#[derive(Debug, Clone)]
pub struct LatestReceiver<T> {
    inner: watch::Receiver<Option<T>>,
}

/// Create an empty slot
pub fn latest_value<T>() -> (LatestSender<T>, LatestReceiver<T>) {
    let (tx, rx) = watch::channel(None);
    (LatestSender { inner: tx }, LatestReceiver { inner: rx })
}

impl<T> LatestSender<T> {
    /// Overwrite the slot; succeeds even when no reader is attached
    pub fn publish(&self, value: T) {
        self.inner.send_replace(Some(value));
    }

    /// Reset the slot to "nothing available"
    pub fn clear(&self) {
        self.inner.send_replace(None);
    }

    pub fn subscribe(&self) -> LatestReceiver<T> {
        LatestReceiver {
            inner: self.inner.subscribe(),
        }
    }
}

impl<T: Clone> LatestReceiver<T> {
    /// Current value regardless of whether it was already seen
    pub fn latest(&self) -> Option<T> {
        self.inner.borrow().clone()
    }

    /// Value published since the last call, `None` if nothing new arrived
    ///
    /// Values overwritten before this call are never observed. The last value
    /// published before the producer went away is still delivered once.
    pub fn take_fresh(&mut self) -> Option<T> {
        let closed = self.inner.has_changed().is_err();
        let value = self.inner.borrow_and_update();
        if !value.has_changed() {
            return None;
        }
        if closed {
            debug!("Latest-value producer dropped, delivering its last value");
        }
        (*value).clone()
    }
}
