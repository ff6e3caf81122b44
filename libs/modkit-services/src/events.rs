//! Directory change notifications.
//!
//! Every subscriber owns its own queue, so a slow consumer only grows its own
//! backlog. With a bounded queue (`DirectoryConfig::subscriber_buffer`) a
//! subscriber that falls behind is disconnected and its stream ends; the
//! producer never waits.

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use futures_core::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};

pub use tokio::sync::mpsc::error::TryRecvError;

use crate::{key::ServiceKey, service::ServiceRef};

/// A directory event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// A service was registered under `key`.
    Registered { key: ServiceKey, service: ServiceRef },
    /// A service was removed from `key`.
    Deregistered { key: ServiceKey, service: ServiceRef },
    /// `close()` started; closable services are about to be closed.
    DirectoryClosing,
    /// `close()` finished. Last event of every stream.
    DirectoryClosed,
}

impl ServiceEvent {
    #[must_use]
    pub fn key(&self) -> Option<ServiceKey> {
        match self {
            Self::Registered { key, .. } | Self::Deregistered { key, .. } => Some(*key),
            Self::DirectoryClosing | Self::DirectoryClosed => None,
        }
    }

    #[must_use]
    pub fn service(&self) -> Option<&ServiceRef> {
        match self {
            Self::Registered { service, .. } | Self::Deregistered { service, .. } => Some(service),
            Self::DirectoryClosing | Self::DirectoryClosed => None,
        }
    }
}

impl fmt::Display for ServiceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered { key, service } => {
                write!(f, "[ServiceRegistered {key} {}]", service.description())
            }
            Self::Deregistered { key, service } => {
                write!(f, "[ServiceDeregistered {key} {}]", service.description())
            }
            Self::DirectoryClosing => f.write_str("[ServiceDirectoryClosing]"),
            Self::DirectoryClosed => f.write_str("[ServiceDirectoryClosed]"),
        }
    }
}

enum Receiver {
    Bounded(mpsc::Receiver<ServiceEvent>),
    Unbounded(mpsc::UnboundedReceiver<ServiceEvent>),
}

/// Receiving end of one subscription.
///
/// Yields events in emission order and ends (`None`) after
/// [`ServiceEvent::DirectoryClosed`], or early if the subscriber was
/// disconnected for lagging. Also usable as a [`Stream`].
pub struct EventSubscription {
    rx: Receiver,
}

impl EventSubscription {
    /// Wait for the next event. `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<ServiceEvent> {
        match &mut self.rx {
            Receiver::Bounded(rx) => rx.recv().await,
            Receiver::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Take the next event if one is already queued.
    ///
    /// # Errors
    /// `TryRecvError::Empty` when nothing is queued yet,
    /// `TryRecvError::Disconnected` when the stream has ended.
    pub fn try_recv(&mut self) -> Result<ServiceEvent, TryRecvError> {
        match &mut self.rx {
            Receiver::Bounded(rx) => rx.try_recv(),
            Receiver::Unbounded(rx) => rx.try_recv(),
        }
    }

    /// Blocking variant of [`recv`](Self::recv) for synchronous callers.
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_recv(&mut self) -> Option<ServiceEvent> {
        match &mut self.rx {
            Receiver::Bounded(rx) => rx.blocking_recv(),
            Receiver::Unbounded(rx) => rx.blocking_recv(),
        }
    }

    /// Drain everything queued right now without waiting.
    pub fn drain(&mut self) -> Vec<ServiceEvent> {
        std::iter::from_fn(|| self.try_recv().ok()).collect()
    }
}

impl Stream for EventSubscription {
    type Item = ServiceEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.get_mut().rx {
            Receiver::Bounded(rx) => rx.poll_recv(cx),
            Receiver::Unbounded(rx) => rx.poll_recv(cx),
        }
    }
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.rx {
            Receiver::Bounded(_) => "bounded",
            Receiver::Unbounded(_) => "unbounded",
        };
        f.debug_struct("EventSubscription")
            .field("queue", &kind)
            .finish()
    }
}

enum Sender {
    Bounded(mpsc::Sender<ServiceEvent>),
    Unbounded(mpsc::UnboundedSender<ServiceEvent>),
}

struct Subscriber {
    id: u64,
    tx: Sender,
}

/// Fan-out side of the event stream. Owned by the directory and only touched
/// under its write lock, which keeps event order equal to mutation order.
pub struct EventBus {
    directory: String,
    buffer: Option<usize>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    closed: bool,
}

impl EventBus {
    pub fn new(directory: impl Into<String>, buffer: Option<usize>) -> Self {
        Self {
            directory: directory.into(),
            buffer,
            subscribers: Vec::new(),
            next_id: 0,
            closed: false,
        }
    }

    /// Attach a new subscriber. After [`close`](Self::close) the returned
    /// subscription is already terminated.
    pub fn subscribe(&mut self) -> EventSubscription {
        let (tx, rx) = match self.buffer {
            Some(capacity) => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                (Sender::Bounded(tx), Receiver::Bounded(rx))
            }
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Sender::Unbounded(tx), Receiver::Unbounded(rx))
            }
        };

        if self.closed {
            return EventSubscription { rx };
        }

        let id = self.next_id;
        self.next_id += 1;
        tracing::trace!(directory = %self.directory, subscriber = id, "event subscriber attached");
        self.subscribers.push(Subscriber { id, tx });
        EventSubscription { rx }
    }

    /// Enqueue `event` for every live subscriber. Dropped subscriptions are
    /// pruned; lagging bounded subscribers are disconnected.
    pub fn publish(&mut self, event: &ServiceEvent) {
        if self.closed {
            return;
        }

        let directory = &self.directory;
        self.subscribers.retain(|sub| match &sub.tx {
            Sender::Unbounded(tx) => tx.send(event.clone()).is_ok(),
            Sender::Bounded(tx) => match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        directory = %directory,
                        subscriber = sub.id,
                        "Event subscriber fell behind its buffer; disconnecting"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            },
        });
    }

    /// Terminate the stream: current subscribers see the end after draining
    /// their queues, later subscriptions end immediately.
    pub fn close(&mut self) {
        self.closed = true;
        self.subscribers.clear();
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
