use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::job::JobSummary;
use crate::package::Package;

/// Channel carrying [`QueueEvent`]s.
pub const QUEUE_CHANNEL: &str = "queue";

/// Terminal outcome of a job, published on the package's completion channel.
#[derive(Debug, Clone)]
pub struct Completion {
    pub package: Arc<Package>,
    pub success: bool,
    pub exit_code: i32,
}

/// Scheduler-level notifications, published on [`QUEUE_CHANNEL`].
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A request was accepted into the pending queue.
    Accepted { job: JobSummary },
    /// A job became the running head of the queue.
    Started { job: JobSummary },
    /// The last pending job finished and the scheduler went idle.
    Idle,
}

/// Payloads carried by the event bus.
///
/// These decouple the queue from whoever presents its progress: the CLI
/// renderer, a desktop notifier, or a test collecting events.
#[derive(Debug, Clone)]
pub enum Payload {
    /// A job finished (successfully or not).
    Completed(Completion),
    /// A line of output from a running job.
    Progress(String),
    /// A scheduler transition.
    Queue(QueueEvent),
}

/// A payload together with the channel it was published on.
#[derive(Debug, Clone)]
pub struct Notification {
    pub channel: String,
    pub payload: Payload,
}

/// Fire-and-forget publisher used by the queue.
///
/// Implementations must not block and must tolerate publishing with no
/// listeners at all.
pub trait Notifier: Send + Sync {
    fn publish(&self, channel: &str, payload: Payload);
}

struct Subscriber {
    /// `None` receives every channel
    channel: Option<String>,
    tx: UnboundedSender<Notification>,
}

/// In-process publish/subscribe bus backed by unbounded tokio channels.
///
/// Each subscriber gets its own receiver; delivery order per subscriber is
/// publish order. Subscribers whose receiver has been dropped are pruned on
/// the next publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive payloads published on a single channel.
    pub fn subscribe(&self, channel: &str) -> UnboundedReceiver<Notification> {
        self.add_subscriber(Some(channel.to_string()))
    }

    /// Receive payloads published on every channel.
    pub fn subscribe_all(&self) -> UnboundedReceiver<Notification> {
        self.add_subscriber(None)
    }

    /// Number of live subscribers (as of the last publish).
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn add_subscriber(&self, channel: Option<String>) -> UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(Subscriber { channel, tx });
        rx
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        // A panicking subscriber cannot leave the list half-updated, so a
        // poisoned lock is still safe to use.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for EventBus {
    fn publish(&self, channel: &str, payload: Payload) {
        let mut subscribers = self.lock();
        subscribers.retain(|sub| {
            if sub
                .channel
                .as_deref()
                .is_some_and(|wanted| wanted != channel)
            {
                return !sub.tx.is_closed();
            }
            sub.tx
                .send(Notification {
                    channel: channel.to_string(),
                    payload: payload.clone(),
                })
                .is_ok()
        });
    }
}
