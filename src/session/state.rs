use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::store::{AttendanceRecord, AttendanceStatus};

/// Counts over the marks recorded so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub total: usize,
}

/// Identity of a live session, as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub class_id: String,
    pub started_at: DateTime<Utc>,
}

/// The in-progress roll call for one class.
#[derive(Debug, Clone)]
pub struct SessionState {
    session_id: String,
    class_id: String,
    started_at: DateTime<Utc>,
    attendance: HashMap<String, AttendanceStatus>,
}

impl SessionState {
    pub fn new(class_id: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            class_id: class_id.into(),
            started_at: Utc::now(),
            attendance: HashMap::new(),
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            class_id: self.class_id.clone(),
            started_at: self.started_at,
        }
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    /// Upsert a student's mark. A later mark replaces the earlier one.
    pub fn mark(&mut self, student_id: impl Into<String>, status: AttendanceStatus) {
        self.attendance.insert(student_id.into(), status);
    }

    pub fn status_of(&self, student_id: &str) -> Option<AttendanceStatus> {
        self.attendance.get(student_id).copied()
    }

    /// Unmarked students are not counted.
    pub fn summarize(&self) -> AttendanceSummary {
        let present = self
            .attendance
            .values()
            .filter(|s| **s == AttendanceStatus::Present)
            .count();

        AttendanceSummary {
            present,
            absent: self.attendance.len() - present,
            total: self.attendance.len(),
        }
    }

    /// Default every unmarked roster student to absent and summarize the result.
    pub fn finalize(&mut self, roster: &HashSet<String>) -> AttendanceSummary {
        for student_id in roster {
            self.attendance
                .entry(student_id.clone())
                .or_insert(AttendanceStatus::Absent);
        }
        self.summarize()
    }

    /// One durable record per student in the map, stamped with this session's id.
    pub fn records(&self, recorded_at: DateTime<Utc>) -> Vec<AttendanceRecord> {
        let mut records: Vec<AttendanceRecord> = self
            .attendance
            .iter()
            .map(|(student_id, status)| AttendanceRecord {
                class_id: self.class_id.clone(),
                student_id: student_id.clone(),
                status: *status,
                session_id: self.session_id.clone(),
                recorded_at,
            })
            .collect();
        records.sort_by(|a, b| a.student_id.cmp(&b.student_id));
        records
    }
}
