//! Connected client sessions.
//!
//! The controller does not own sessions. It keeps a registry of whoever is
//! connected right now and broadcasts to that set as it stands at send time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::models::ControllerEvent;

/// Buffer size per session channel.
/// Events are small and infrequent; a session that falls this far behind
/// loses events rather than stalling the controller.
const SESSION_CHANNEL_SIZE: usize = 32;

pub type ClientId = u64;

/// A connected session's end of the channel
pub struct ClientSession {
    pub id: ClientId,
    pub events: mpsc::Receiver<ControllerEvent>,
}

impl ClientSession {
    /// Collect every event already delivered, without waiting
    pub fn drain(&mut self) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

struct ConnectedClient {
    tx: mpsc::Sender<ControllerEvent>,
    controlled: bool,
}

#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, ConnectedClient>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self) -> ClientSession {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_SIZE);
        self.clients.lock().await.insert(
            id,
            ConnectedClient {
                tx,
                controlled: false,
            },
        );
        debug!(client = id, "Client session connected");
        ClientSession { id, events: rx }
    }

    pub async fn disconnect(&self, id: ClientId) {
        if self.clients.lock().await.remove(&id).is_some() {
            debug!(client = id, "Client session disconnected");
        }
    }

    pub async fn connected(&self) -> usize {
        let mut clients = self.clients.lock().await;
        clients.retain(|_, client| !client.tx.is_closed());
        clients.len()
    }

    pub async fn controlled(&self) -> usize {
        let clients = self.clients.lock().await;
        clients
            .values()
            .filter(|client| client.controlled && !client.tx.is_closed())
            .count()
    }

    /// Take control of every connected session. Returns how many are connected.
    pub async fn claim(&self) -> usize {
        let mut clients = self.clients.lock().await;
        clients.retain(|_, client| !client.tx.is_closed());
        for client in clients.values_mut() {
            client.controlled = true;
        }
        clients.len()
    }

    /// Send an event to every session connected right now.
    /// Returns the number of sessions that received it.
    pub async fn broadcast(&self, event: ControllerEvent) -> usize {
        let mut clients = self.clients.lock().await;
        clients.retain(|_, client| !client.tx.is_closed());

        let mut delivered = 0;
        for (id, client) in clients.iter() {
            match client.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(client = id, event = event.tag(), "Client session lagging, event dropped")
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(client = id, "Client session closed during broadcast")
                }
            }
        }
        debug!(event = event.tag(), delivered = delivered, "Broadcast sent");
        delivered
    }
}
