use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::models::{AttendanceRecord, Class, NewUser, User};
use super::{AttendanceStore, MemoryStore};
use crate::error::{AttendanceError, Result};

/// Delegates to a MemoryStore but can be told to fail roster lookups or writes
pub(crate) struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    fail_roster: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_roster: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn fail_roster(&self, fail: bool) {
        self.fail_roster.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AttendanceStore for FlakyStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.inner.create_user(user).await
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        self.inner.find_user(user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn list_students(&self) -> Result<Vec<User>> {
        self.inner.list_students().await
    }

    async fn create_class(&self, class_name: &str, teacher_id: &str) -> Result<Class> {
        self.inner.create_class(class_name, teacher_id).await
    }

    async fn find_class(&self, class_id: &str) -> Result<Option<Class>> {
        self.inner.find_class(class_id).await
    }

    async fn add_student(&self, class_id: &str, student_id: &str) -> Result<Class> {
        self.inner.add_student(class_id, student_id).await
    }

    async fn insert_attendance(&self, records: Vec<AttendanceRecord>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AttendanceError::storage("disk gone"));
        }
        self.inner.insert_attendance(records).await
    }

    async fn latest_attendance(
        &self,
        class_id: &str,
        student_id: &str,
    ) -> Result<Option<AttendanceRecord>> {
        self.inner.latest_attendance(class_id, student_id).await
    }

    async fn enrolled_students(&self, class_id: &str) -> Result<HashSet<String>> {
        if self.fail_roster.load(Ordering::SeqCst) {
            return Err(AttendanceError::storage("roster unavailable"));
        }
        self.inner.enrolled_students(class_id).await
    }
}
