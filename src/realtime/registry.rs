use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use warp::ws::Message;

use super::protocol::ServerEvent;
use crate::error::Result;
use crate::store::Role;

/// One authenticated live connection
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    sender: mpsc::UnboundedSender<Message>,
}

impl Connection {
    pub fn new(user_id: impl Into<String>, role: Role, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            role,
            sender,
        }
    }

    /// Queue a frame for the socket writer. Returns false if the socket is gone.
    fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }
}

fn encode(event: &ServerEvent) -> Result<Message> {
    Ok(Message::text(serde_json::to_string(event)?))
}

/// Connections currently subscribed to live attendance updates
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn register(&self, connection: Connection) {
        tracing::info!(
            connection_id = %connection.id,
            user_id = %connection.user_id,
            role = %connection.role,
            "Live connection registered"
        );
        let mut connections = self.connections.write().await;
        connections.insert(connection.id.clone(), connection);
    }

    /// Safe to call for connections that never registered.
    pub async fn unregister(&self, connection_id: &str) {
        let mut connections = self.connections.write().await;
        if connections.remove(connection_id).is_some() {
            tracing::info!(connection_id = %connection_id, "Live connection unregistered");
        }
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Serialize once and queue for every registered connection.
    /// Undeliverable connections are skipped.
    pub async fn broadcast(&self, event: &ServerEvent) {
        let message = match encode(event) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize broadcast event");
                return;
            }
        };

        let connections = self.connections.read().await;
        let mut delivered = 0usize;
        for connection in connections.values() {
            if connection.send(message.clone()) {
                delivered += 1;
            } else {
                tracing::debug!(
                    connection_id = %connection.id,
                    "Dropping broadcast for closed connection"
                );
            }
        }

        tracing::debug!(recipients = connections.len(), delivered, "Broadcast event");
    }

    /// Deliver to exactly one connection, registered or not.
    pub fn unicast(&self, connection: &Connection, event: &ServerEvent) {
        match encode(event) {
            Ok(message) => {
                if !connection.send(message) {
                    tracing::debug!(
                        connection_id = %connection.id,
                        "Dropping unicast for closed connection"
                    );
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize unicast event"),
        }
    }
}
