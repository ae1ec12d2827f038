//! Persistence for users, classes and finalized attendance.
//!
//! The live session core only touches the store through the enrollment
//! lookups (`class_exists`, `class_owner`, `enrolled_students`,
//! `is_enrolled`) and `insert_attendance`. Everything else serves the REST
//! layer.

mod memory;
pub mod models;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryStore;
pub use models::{AttendanceRecord, AttendanceStatus, Class, NewUser, Role, StudentSummary, User};

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::Result;

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Fails with `DuplicateEmail` when the email is taken (case-insensitive)
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn find_user(&self, user_id: &str) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn list_students(&self) -> Result<Vec<User>>;

    async fn create_class(&self, class_name: &str, teacher_id: &str) -> Result<Class>;

    async fn find_class(&self, class_id: &str) -> Result<Option<Class>>;

    /// Enrolls a student. Adding an already-enrolled student is a no-op.
    async fn add_student(&self, class_id: &str, student_id: &str) -> Result<Class>;

    /// Writes a batch of finalized records. Either all are stored or none.
    async fn insert_attendance(&self, records: Vec<AttendanceRecord>) -> Result<()>;

    /// Most recently recorded entry for a student in a class
    async fn latest_attendance(
        &self,
        class_id: &str,
        student_id: &str,
    ) -> Result<Option<AttendanceRecord>>;

    async fn class_exists(&self, class_id: &str) -> Result<bool> {
        Ok(self.find_class(class_id).await?.is_some())
    }

    async fn class_owner(&self, class_id: &str) -> Result<Option<String>> {
        Ok(self.find_class(class_id).await?.map(|c| c.teacher_id))
    }

    async fn enrolled_students(&self, class_id: &str) -> Result<HashSet<String>> {
        Ok(self
            .find_class(class_id)
            .await?
            .map(|c| c.student_ids.into_iter().collect())
            .unwrap_or_default())
    }

    async fn is_enrolled(&self, class_id: &str, student_id: &str) -> Result<bool> {
        Ok(self
            .find_class(class_id)
            .await?
            .map(|c| c.is_enrolled(student_id))
            .unwrap_or(false))
    }
}
