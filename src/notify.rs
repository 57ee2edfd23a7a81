use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ulid::Ulid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Ulid,
    pub message: String,
    pub severity: Severity,
}

/// Outbound notification boundary. Best-effort and fire-and-forget: a sink
/// must never block or fail the caller's state transition.
pub trait NotifySink: Send + Sync {
    fn notify(&self, recipient: Ulid, message: &str, severity: Severity);
}

/// Broadcast hub fanning notifications out per recipient. Lagging
/// subscribers drop messages rather than block the sender.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Notification>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a recipient's notifications. Creates the channel if needed.
    pub fn subscribe(&self, recipient: Ulid) -> broadcast::Receiver<Notification> {
        let sender = self
            .channels
            .entry(recipient)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Remove a recipient's channel.
    pub fn remove(&self, recipient: &Ulid) {
        self.channels.remove(recipient);
    }
}

impl NotifySink for NotifyHub {
    /// No-op if nobody is listening.
    fn notify(&self, recipient: Ulid, message: &str, severity: Severity) {
        if let Some(sender) = self.channels.get(&recipient) {
            let _ = sender.send(Notification {
                recipient,
                message: message.to_string(),
                severity,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let user = Ulid::new();
        let mut rx = hub.subscribe(user);

        hub.notify(user, "your consultation was confirmed", Severity::Success);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.recipient, user);
        assert_eq!(received.message, "your consultation was confirmed");
        assert_eq!(received.severity, Severity::Success);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        // No subscriber; must not panic or block.
        hub.notify(Ulid::new(), "nobody home", Severity::Info);
    }

    #[tokio::test]
    async fn notifications_are_per_recipient() {
        let hub = NotifyHub::new();
        let a = Ulid::new();
        let b = Ulid::new();
        let mut rx_a = hub.subscribe(a);
        let mut rx_b = hub.subscribe(b);

        hub.notify(a, "for a", Severity::Info);

        assert_eq!(rx_a.recv().await.unwrap().message, "for a");
        assert!(rx_b.try_recv().is_err());
    }
}
