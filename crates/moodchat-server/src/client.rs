use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;

use moodchat_core::ConnectionId;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A connected WebSocket client's outbound side.
pub struct Client {
    pub id: ConnectionId,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
}

impl Client {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }
}

/// All connected clients, each with a bounded outbound queue.
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, Arc<Client>>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue: max_send_queue.max(1),
        }
    }

    /// Register a new client; the receiver feeds its socket writer.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let client = Arc::new(Client {
            id: id.clone(),
            tx,
            connected: AtomicBool::new(true),
        });
        self.clients.insert(id.clone(), client);
        (id, rx)
    }

    pub fn unregister(&self, id: &ConnectionId) -> bool {
        match self.clients.remove(id) {
            Some((_, client)) => {
                client.mark_disconnected();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Client>> {
        self.clients.get(id).map(|c| Arc::clone(c.value()))
    }

    /// Queue a message for a client. Drops it if the queue is full.
    pub fn send_to(&self, id: &ConnectionId, message: String) -> bool {
        let Some(client) = self.get(id) else {
            return false;
        };
        match client.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!(connection_id = %id, msg_len = msg.len(), "send queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister() {
        let registry = ClientRegistry::new(32);
        let (a, _rx_a) = registry.register();
        let (b, _rx_b) = registry.register();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("conn_"));
        assert_eq!(registry.count(), 2);

        let client = registry.get(&a).unwrap();
        assert!(registry.unregister(&a));
        assert!(!client.is_connected());
        assert!(!registry.unregister(&a));
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn send_to_specific_client() {
        let registry = ClientRegistry::new(32);
        let (id, mut rx) = registry.register();
        let (_other, mut other_rx) = registry.register();

        assert!(registry.send_to(&id, "hello".into()));
        assert_eq!(rx.recv().await.unwrap(), "hello");
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn send_to_unknown_client() {
        let registry = ClientRegistry::new(32);
        assert!(!registry.send_to(&ConnectionId::new(), "x".into()));
    }

    #[test]
    fn full_queue_drops() {
        let registry = ClientRegistry::new(2);
        let (id, _rx) = registry.register();
        assert!(registry.send_to(&id, "1".into()));
        assert!(registry.send_to(&id, "2".into()));
        assert!(!registry.send_to(&id, "3".into()));
    }

    #[test]
    fn closed_receiver_fails_send() {
        let registry = ClientRegistry::new(4);
        let (id, rx) = registry.register();
        drop(rx);
        assert!(!registry.send_to(&id, "x".into()));
    }
}
