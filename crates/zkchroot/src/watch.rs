//! One-shot watch notifications.
//!
//! Delivery belongs to the backend; the facade only rewrites the path carried
//! by the event so callers see the logical path they registered.

use crate::chroot::Chroot;
use crate::error::{Error, Result};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event_type: EventType,
    pub path: String,
}

/// Pending notification for a single watch registration.
///
/// Dropping the watcher abandons the registration.
#[derive(Debug)]
pub struct Watcher {
    rx: oneshot::Receiver<WatchedEvent>,
    chroot: Chroot,
}

impl Watcher {
    /// Backend side: pair a watcher with the sender that will fire it.
    pub fn channel() -> (oneshot::Sender<WatchedEvent>, Watcher) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Watcher {
                rx,
                chroot: Chroot::none(),
            },
        )
    }

    /// Report event paths relative to `chroot`.
    pub(crate) fn scoped(mut self, chroot: &Chroot) -> Self {
        self.chroot = chroot.clone();
        self
    }

    /// Wait for the event. Fails with [`Error::Closed`] if the backend
    /// dropped the registration, e.g. because the session ended.
    pub async fn wait(self) -> Result<WatchedEvent> {
        let mut event = self.rx.await.map_err(|_| Error::Closed)?;
        event.path = self.chroot.to_logical(&event.path);
        Ok(event)
    }
}
