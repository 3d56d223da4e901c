use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::EventStatus;

const CHANNEL_CAPACITY: usize = 256;

/// What changed on one teacher's timeline. Consumed by UI refresh logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Rebuilt { teacher_id: Ulid, events: usize },
    TimeShifted { teacher_id: Ulid, changed: usize },
    LocationChanged { teacher_id: Ulid, changed: usize },
    StatusChanged { teacher_id: Ulid, event_id: Ulid, status: EventStatus },
    Restored { teacher_id: Ulid },
    Committed { teacher_id: Ulid, applied: usize },
}

/// Broadcast hub with one channel per teacher. Replaces the implicit
/// subscriber-callback globals of the old UI layer with an explicit
/// publish/subscribe seam.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<QueueEvent>>,
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

    /// Subscribe to one teacher's timeline changes. Creates the channel if needed.
    pub fn subscribe(&self, teacher_id: Ulid) -> broadcast::Receiver<QueueEvent> {
        let sender = self
            .channels
            .entry(teacher_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, teacher_id: Ulid, event: QueueEvent) {
        if let Some(sender) = self.channels.get(&teacher_id) {
            let _ = sender.send(event);
        }
    }

    /// Remove a channel (e.g. when a teacher leaves the roster).
    pub fn remove(&self, teacher_id: &Ulid) {
        self.channels.remove(teacher_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let tid = Ulid::new();
        let mut rx = hub.subscribe(tid);

        let event = QueueEvent::TimeShifted {
            teacher_id: tid,
            changed: 3,
        };
        hub.send(tid, event.clone());

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let tid = Ulid::new();
        // No subscriber — should not panic
        hub.send(tid, QueueEvent::Restored { teacher_id: tid });
    }

    #[tokio::test]
    async fn channels_are_per_teacher() {
        let hub = NotifyHub::new();
        let a = Ulid::new();
        let b = Ulid::new();
        let mut rx_a = hub.subscribe(a);
        let _rx_b = hub.subscribe(b);

        hub.send(b, QueueEvent::Restored { teacher_id: b });
        assert!(rx_a.try_recv().is_err());
    }
}
