use std::sync::Arc;
use tokio::sync::Mutex;

use super::protocol::{ClientEvent, ProtocolError, ServerEvent};
use super::registry::{Connection, ConnectionRegistry};
use crate::session::SessionManager;
use crate::store::AttendanceStore;

const FINALIZED_MESSAGE: &str = "Attendance persisted";

/// Applies live channel events to the attendance session.
///
/// Teacher events answer with a broadcast so every observer sees the same
/// state. The student self-status query answers only the asking connection.
///
/// Broadcasting events hold `broadcast_order` from the state change until the
/// broadcast is queued, so observers receive echoes in the order the session
/// applied them and no echo follows the `DONE` that closed the session.
pub struct SessionProtocolHandler {
    sessions: Arc<SessionManager>,
    store: Arc<dyn AttendanceStore>,
    registry: Arc<ConnectionRegistry>,
    broadcast_order: Mutex<()>,
}

impl SessionProtocolHandler {
    pub fn new(
        sessions: Arc<SessionManager>,
        store: Arc<dyn AttendanceStore>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            sessions,
            store,
            registry,
            broadcast_order: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Handle one text frame. Any failure becomes an `ERROR` to the sender only.
    pub async fn handle_text(&self, connection: &Connection, text: &str) {
        tracing::debug!(connection_id = %connection.id, "Received live message: {}", text);

        let result = match ClientEvent::parse(text) {
            Ok(event) => self.handle_event(connection, event).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::debug!(
                connection_id = %connection.id,
                user_id = %connection.user_id,
                error = %e,
                "Rejected live event"
            );
            self.registry.unicast(connection, &ServerEvent::error(e.to_string()));
        }
    }

    pub async fn handle_event(
        &self,
        connection: &Connection,
        event: ClientEvent,
    ) -> Result<(), ProtocolError> {
        if !self.sessions.is_active().await {
            return Err(ProtocolError::NoActiveSession);
        }

        let required = event.required_role();
        if connection.role != required {
            tracing::warn!(
                user_id = %connection.user_id,
                role = %connection.role,
                event = event.name(),
                "Role violation on live channel"
            );
            return Err(ProtocolError::RoleViolation(required));
        }

        match event {
            ClientEvent::Mark { student_id, status } => {
                let _order = self.broadcast_order.lock().await;
                self.sessions.mark(&student_id, status).await?;
                self.registry
                    .broadcast(&ServerEvent::AttendanceMarked { student_id, status })
                    .await;
            }
            ClientEvent::Summary => {
                let _order = self.broadcast_order.lock().await;
                let summary = self.sessions.summarize().await?;
                self.registry.broadcast(&ServerEvent::TodaySummary(summary)).await;
            }
            ClientEvent::SelfStatus => {
                let status = self.sessions.status_of(&connection.user_id).await?;
                self.registry
                    .unicast(connection, &ServerEvent::my_attendance(status));
            }
            ClientEvent::Finalize => {
                let _order = self.broadcast_order.lock().await;
                let finalized = self.sessions.finalize(self.store.as_ref()).await?;
                tracing::info!(
                    class_id = %finalized.session.class_id,
                    records = finalized.records_written,
                    finalized_by = %connection.user_id,
                    "Live session closed"
                );
                self.registry
                    .broadcast(&ServerEvent::Done {
                        message: FINALIZED_MESSAGE.to_string(),
                        class_id: finalized.session.class_id,
                        session_id: finalized.session.session_id,
                        present: finalized.summary.present,
                        absent: finalized.summary.absent,
                        total: finalized.summary.total,
                    })
                    .await;
            }
        }

        Ok(())
    }
}
