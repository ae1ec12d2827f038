use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::state::{AttendanceSummary, SessionInfo, SessionState};
use crate::error::{AttendanceError, Result};
use crate::store::{AttendanceStatus, AttendanceStore};

/// Result of a successful finalize
#[derive(Debug, Clone)]
pub struct FinalizedSession {
    pub session: SessionInfo,
    pub summary: AttendanceSummary,
    pub records_written: usize,
}

/// Owns the single live attendance session.
///
/// Every access goes through one async mutex. Finalize holds it across the
/// roster lookup and the store write, so marks cannot interleave with it.
pub struct SessionManager {
    current: Mutex<Option<SessionState>>,
}

impl SessionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(None),
        })
    }

    /// Open a session for the class. Fails while another session is active.
    pub async fn start(&self, class_id: &str) -> Result<SessionInfo> {
        let mut current = self.current.lock().await;

        if let Some(active) = current.as_ref() {
            return Err(AttendanceError::SessionAlreadyActive(
                active.class_id().to_string(),
            ));
        }

        let session = SessionState::new(class_id);
        let info = session.info();
        *current = Some(session);

        tracing::info!(
            class_id = %info.class_id,
            session_id = %info.session_id,
            "Attendance session started"
        );
        Ok(info)
    }

    pub async fn is_active(&self) -> bool {
        self.current.lock().await.is_some()
    }

    pub async fn current(&self) -> Option<SessionInfo> {
        self.current.lock().await.as_ref().map(SessionState::info)
    }

    pub async fn mark(&self, student_id: &str, status: AttendanceStatus) -> Result<()> {
        let mut current = self.current.lock().await;
        let session = current.as_mut().ok_or(AttendanceError::NoActiveSession)?;
        session.mark(student_id, status);

        tracing::debug!(student_id = %student_id, status = %status, "Attendance marked");
        Ok(())
    }

    pub async fn summarize(&self) -> Result<AttendanceSummary> {
        let current = self.current.lock().await;
        current
            .as_ref()
            .map(SessionState::summarize)
            .ok_or(AttendanceError::NoActiveSession)
    }

    pub async fn status_of(&self, student_id: &str) -> Result<Option<AttendanceStatus>> {
        let current = self.current.lock().await;
        current
            .as_ref()
            .map(|s| s.status_of(student_id))
            .ok_or(AttendanceError::NoActiveSession)
    }

    /// Close the session: default unmarked enrolled students to absent,
    /// write one record per student and clear the slot.
    ///
    /// A failed roster lookup falls back to the students already marked. A
    /// failed write leaves the session untouched and active.
    pub async fn finalize(&self, store: &dyn AttendanceStore) -> Result<FinalizedSession> {
        let mut current = self.current.lock().await;
        let active = current.as_ref().ok_or(AttendanceError::NoActiveSession)?;

        let roster = match store.enrolled_students(active.class_id()).await {
            Ok(roster) => roster,
            Err(e) => {
                tracing::warn!(
                    class_id = %active.class_id(),
                    error = %e,
                    "Roster lookup failed, finalizing with marked students only"
                );
                HashSet::new()
            }
        };

        let mut finalized = active.clone();
        let summary = finalized.finalize(&roster);
        let records = finalized.records(Utc::now());
        let records_written = records.len();

        if let Err(e) = store.insert_attendance(records).await {
            tracing::error!(
                class_id = %finalized.class_id(),
                error = %e,
                "Failed to persist attendance, session kept active"
            );
            return Err(match e {
                err @ AttendanceError::Storage(_) => err,
                other => AttendanceError::storage(other.to_string()),
            });
        }

        let session = finalized.info();
        *current = None;

        tracing::info!(
            class_id = %session.class_id,
            session_id = %session.session_id,
            present = summary.present,
            absent = summary.absent,
            total = summary.total,
            "Attendance session finalized"
        );

        Ok(FinalizedSession {
            session,
            summary,
            records_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::FlakyStore;
    use crate::store::MemoryStore;

    async fn class_with_roster(store: &MemoryStore, students: &[&str]) -> String {
        let class = store.create_class("Physics", "t1").await.unwrap();
        for student in students {
            store.add_student(&class.id, student).await.unwrap();
        }
        class.id
    }

    #[tokio::test]
    async fn test_start_rejects_second_session() {
        let manager = SessionManager::new();
        manager.start("c101").await.unwrap();

        let result = manager.start("c102").await;
        assert!(matches!(result, Err(AttendanceError::SessionAlreadyActive(id)) if id == "c101"));
        assert_eq!(manager.current().await.unwrap().class_id, "c101");
    }

    #[tokio::test]
    async fn test_operations_require_active_session() {
        let manager = SessionManager::new();
        let store = MemoryStore::new();

        assert!(!manager.is_active().await);
        assert!(matches!(
            manager.mark("s100", AttendanceStatus::Present).await,
            Err(AttendanceError::NoActiveSession)
        ));
        assert!(matches!(manager.summarize().await, Err(AttendanceError::NoActiveSession)));
        assert!(matches!(manager.status_of("s100").await, Err(AttendanceError::NoActiveSession)));
        assert!(matches!(
            manager.finalize(store.as_ref()).await,
            Err(AttendanceError::NoActiveSession)
        ));
        assert!(store.records_for_class("c101").await.is_empty());
    }

    #[tokio::test]
    async fn test_finalize_writes_records_and_clears_session() {
        let store = MemoryStore::new();
        let class_id = class_with_roster(&store, &["s100", "s101"]).await;
        let manager = SessionManager::new();

        let info = manager.start(&class_id).await.unwrap();
        manager.mark("s100", AttendanceStatus::Present).await.unwrap();

        let finalized = manager.finalize(store.as_ref()).await.unwrap();
        assert_eq!(finalized.summary, AttendanceSummary { present: 1, absent: 1, total: 2 });
        assert_eq!(finalized.records_written, 2);
        assert_eq!(finalized.session.session_id, info.session_id);
        assert!(!manager.is_active().await);

        let records = store.records_for_class(&class_id).await;
        assert_eq!(records.len(), 2);
        let s101 = records.iter().find(|r| r.student_id == "s101").unwrap();
        assert_eq!(s101.status, AttendanceStatus::Absent);

        // A new session can start once the previous one is closed
        assert!(manager.start(&class_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_finalize_falls_back_when_roster_lookup_fails() {
        let memory = MemoryStore::new();
        let class_id = class_with_roster(&memory, &["s100", "s101"]).await;
        let store = FlakyStore::new(memory.clone());
        store.fail_roster(true);

        let manager = SessionManager::new();
        manager.start(&class_id).await.unwrap();
        manager.mark("s100", AttendanceStatus::Present).await.unwrap();

        let finalized = manager.finalize(store.as_ref()).await.unwrap();
        assert_eq!(finalized.summary, AttendanceSummary { present: 1, absent: 0, total: 1 });
        assert_eq!(memory.records_for_class(&class_id).await.len(), 1);
        assert!(!manager.is_active().await);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_session_and_marks() {
        let memory = MemoryStore::new();
        let class_id = class_with_roster(&memory, &["s100", "s101"]).await;
        let store = FlakyStore::new(memory.clone());
        store.fail_writes(true);

        let manager = SessionManager::new();
        manager.start(&class_id).await.unwrap();
        manager.mark("s100", AttendanceStatus::Present).await.unwrap();

        let result = manager.finalize(store.as_ref()).await;
        assert!(matches!(result, Err(AttendanceError::Storage(_))));
        assert!(manager.is_active().await);
        // Unmarked roster students were not defaulted into the live session
        assert_eq!(
            manager.summarize().await.unwrap(),
            AttendanceSummary { present: 1, absent: 0, total: 1 }
        );

        store.fail_writes(false);
        let finalized = manager.finalize(store.as_ref()).await.unwrap();
        assert_eq!(finalized.summary.total, 2);
        assert_eq!(memory.records_for_class(&class_id).await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_marks_and_finalize_serialize() {
        for _ in 0..50 {
            let store = MemoryStore::new();
            let class_id = class_with_roster(&store, &[]).await;
            let manager = SessionManager::new();
            manager.start(&class_id).await.unwrap();

            let mut marks = Vec::new();
            for i in 0..20 {
                let manager = manager.clone();
                let student_id = format!("s{}", i);
                let status = if i % 3 == 0 {
                    AttendanceStatus::Absent
                } else {
                    AttendanceStatus::Present
                };
                marks.push(tokio::spawn(async move {
                    let result = manager.mark(&student_id, status).await;
                    (student_id, status, result)
                }));
            }

            let finalizer = {
                let manager = manager.clone();
                let store = store.clone();
                tokio::spawn(async move { manager.finalize(store.as_ref()).await })
            };

            let finalized = finalizer.await.unwrap().unwrap();
            let records = store.records_for_class(&class_id).await;

            let mut accepted = 0;
            for handle in marks {
                let (student_id, status, result) = handle.await.unwrap();
                match result {
                    Ok(()) => {
                        accepted += 1;
                        let record = records.iter().find(|r| r.student_id == student_id);
                        assert_eq!(record.map(|r| r.status), Some(status), "{} lost", student_id);
                    }
                    Err(e) => {
                        assert!(matches!(e, AttendanceError::NoActiveSession));
                        assert!(records.iter().all(|r| r.student_id != student_id));
                    }
                }
            }

            assert_eq!(accepted, records.len());
            assert_eq!(finalized.summary.total, records.len());
            assert_eq!(finalized.records_written, records.len());
            assert!(!manager.is_active().await);
        }
    }
}
