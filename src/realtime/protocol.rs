use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AttendanceError;
use crate::session::AttendanceSummary;
use crate::store::{AttendanceStatus, Role};

/// Self-status reply for a student nobody has marked yet
pub const NOT_YET_UPDATED: &str = "not yet updated";

/// Raw inbound frame: `{event, data?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkPayload {
    student_id: String,
    status: AttendanceStatus,
}

/// Events a client may send on the live channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// `ATTENDANCE_MARKED`
    Mark {
        student_id: String,
        status: AttendanceStatus,
    },
    /// `TODAY_SUMMARY`
    Summary,
    /// `MY_ATTENDANCE`
    SelfStatus,
    /// `DONE`
    Finalize,
}

impl ClientEvent {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|_| ProtocolError::InvalidFormat)?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        match envelope.event.as_str() {
            "ATTENDANCE_MARKED" => {
                let data = envelope.data.ok_or(ProtocolError::InvalidFormat)?;
                let payload: MarkPayload =
                    serde_json::from_value(data).map_err(|_| ProtocolError::InvalidFormat)?;
                if payload.student_id.trim().is_empty() {
                    return Err(ProtocolError::InvalidFormat);
                }
                Ok(ClientEvent::Mark {
                    student_id: payload.student_id,
                    status: payload.status,
                })
            }
            "TODAY_SUMMARY" => Ok(ClientEvent::Summary),
            "MY_ATTENDANCE" => Ok(ClientEvent::SelfStatus),
            "DONE" => Ok(ClientEvent::Finalize),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    pub fn required_role(&self) -> Role {
        match self {
            ClientEvent::Mark { .. } | ClientEvent::Summary | ClientEvent::Finalize => Role::Teacher,
            ClientEvent::SelfStatus => Role::Student,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Mark { .. } => "ATTENDANCE_MARKED",
            ClientEvent::Summary => "TODAY_SUMMARY",
            ClientEvent::SelfStatus => "MY_ATTENDANCE",
            ClientEvent::Finalize => "DONE",
        }
    }
}

/// Events the server sends on the live channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    AttendanceMarked {
        student_id: String,
        status: AttendanceStatus,
    },

    TodaySummary(AttendanceSummary),

    MyAttendance {
        status: String,
    },

    #[serde(rename_all = "camelCase")]
    Done {
        message: String,
        class_id: String,
        session_id: String,
        present: usize,
        absent: usize,
        total: usize,
    },

    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn my_attendance(status: Option<AttendanceStatus>) -> Self {
        ServerEvent::MyAttendance {
            status: status
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| NOT_YET_UPDATED.to_string()),
        }
    }
}

/// Failures reported to the sender as an `ERROR` event
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid message format")]
    InvalidFormat,

    #[error("Unknown event")]
    UnknownEvent(String),

    #[error("No active attendance session")]
    NoActiveSession,

    #[error("Forbidden, {0} event only")]
    RoleViolation(Role),

    #[error("Unauthorized or invalid token")]
    Unauthorized,

    #[error("Failed to persist attendance: {0}")]
    PersistFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AttendanceError> for ProtocolError {
    fn from(err: AttendanceError) -> Self {
        match err {
            AttendanceError::NoActiveSession => ProtocolError::NoActiveSession,
            AttendanceError::Storage(msg) => ProtocolError::PersistFailed(msg),
            AttendanceError::MissingToken
            | AttendanceError::InvalidToken(_)
            | AttendanceError::TokenExpired => ProtocolError::Unauthorized,
            other => ProtocolError::Internal(other.to_string()),
        }
    }
}
