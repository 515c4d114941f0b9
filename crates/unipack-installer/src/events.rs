use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    Queued { name: String },
    PackageInstalled { name: String },
    InstallFailed { name: String, reason: String },
    QueueCompleted,
}

impl fmt::Display for InstallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued { name } => write!(f, "queued {name}"),
            Self::PackageInstalled { name } => write!(f, "installed {name}"),
            Self::InstallFailed { name, reason } => write!(f, "failed {name}: {reason}"),
            Self::QueueCompleted => f.write_str("all packages processed"),
        }
    }
}

/// Fan-out of queue notifications to any number of subscribers.
///
/// Events are delivered in emission order. A subscriber only sees events emitted after it
/// subscribed, and dropping its [`Subscription`] detaches it on the next emission.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<InstallEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        Subscription { receiver }
    }

    pub fn emit(&mut self, event: InstallEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<InstallEvent>,
}

impl Subscription {
    pub fn try_next(&self) -> Option<InstallEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Takes every event delivered so far.
    pub fn drain(&self) -> Vec<InstallEvent> {
        self.receiver.try_iter().collect()
    }
}
