//! The process-wide sink a hook's `emit()` calls are drained into (spec.md
//! §5 "Shared resources"): a bounded `tokio::sync::mpsc` channel with a
//! drop-oldest overflow policy, so a hook flooding `emit()` cannot grow
//! memory unbounded or block the request it was called from.

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

use deployd_core::EmitEntry;

pub struct EmitSink {
    sender: mpsc::Sender<EmitEntry>,
    receiver: Mutex<mpsc::Receiver<EmitEntry>>,
}

impl EmitSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        EmitSink {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Non-blocking; called from the pipeline's request path. When the
    /// channel is full the oldest queued entry is dropped to make room
    /// rather than backing up the caller.
    pub fn publish(&self, entry: EmitEntry) {
        match self.sender.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                if let Ok(mut receiver) = self.receiver.try_lock() {
                    let _ = receiver.try_recv();
                }
                let _ = self.sender.try_send(entry);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Awaits the next emitted entry. A real-time broadcast fabric (out of
    /// scope here, per spec.md §1) would be the consumer.
    pub async fn recv(&self) -> Option<EmitEntry> {
        self.receiver.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(event: &str) -> EmitEntry {
        EmitEntry {
            event: event.to_string(),
            data: deployd_core::Value::Null,
            room: None,
        }
    }

    #[tokio::test]
    async fn publish_then_recv_round_trips() {
        let sink = EmitSink::new(4);
        sink.publish(entry("a"));
        let received = sink.recv().await.unwrap();
        assert_eq!(received.event, "a");
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let sink = EmitSink::new(2);
        sink.publish(entry("first"));
        sink.publish(entry("second"));
        sink.publish(entry("third"));

        let received = sink.recv().await.unwrap();
        assert_eq!(received.event, "second");
        let received = sink.recv().await.unwrap();
        assert_eq!(received.event, "third");
    }
}
