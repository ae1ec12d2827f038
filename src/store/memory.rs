use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{AttendanceRecord, Class, NewUser, Role, User};
use super::AttendanceStore;
use crate::error::{AttendanceError, Result};

/// In-process store. Data lives for the lifetime of the server process.
#[derive(Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    classes: Arc<RwLock<HashMap<String, Class>>>,
    attendance: Arc<RwLock<Vec<AttendanceRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.write().await;

        let email = user.email.trim().to_lowercase();
        if users.values().any(|u| u.email == email) {
            return Err(AttendanceError::DuplicateEmail(email));
        }

        let created = User {
            id: Uuid::new_v4().to_string(),
            name: user.name,
            email,
            password_hash: user.password_hash,
            role: user.role,
        };
        users.insert(created.id.clone(), created.clone());

        tracing::info!(user_id = %created.id, role = %created.role, "User created");
        Ok(created)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn list_students(&self) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut students: Vec<User> = users
            .values()
            .filter(|u| u.role == Role::Student)
            .cloned()
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(students)
    }

    async fn create_class(&self, class_name: &str, teacher_id: &str) -> Result<Class> {
        let class = Class {
            id: Uuid::new_v4().to_string(),
            class_name: class_name.to_string(),
            teacher_id: teacher_id.to_string(),
            student_ids: Vec::new(),
        };

        let mut classes = self.classes.write().await;
        classes.insert(class.id.clone(), class.clone());

        tracing::info!(class_id = %class.id, teacher_id = %teacher_id, "Class created");
        Ok(class)
    }

    async fn find_class(&self, class_id: &str) -> Result<Option<Class>> {
        let classes = self.classes.read().await;
        Ok(classes.get(class_id).cloned())
    }

    async fn add_student(&self, class_id: &str, student_id: &str) -> Result<Class> {
        let mut classes = self.classes.write().await;

        let class = classes
            .get_mut(class_id)
            .ok_or_else(|| AttendanceError::ClassNotFound(class_id.to_string()))?;

        if !class.is_enrolled(student_id) {
            class.student_ids.push(student_id.to_string());
            tracing::info!(class_id = %class_id, student_id = %student_id, "Student enrolled");
        }

        Ok(class.clone())
    }

    async fn insert_attendance(&self, records: Vec<AttendanceRecord>) -> Result<()> {
        let count = records.len();
        let mut attendance = self.attendance.write().await;
        attendance.extend(records);

        tracing::debug!(count, "Attendance records stored");
        Ok(())
    }

    async fn latest_attendance(
        &self,
        class_id: &str,
        student_id: &str,
    ) -> Result<Option<AttendanceRecord>> {
        let attendance = self.attendance.read().await;
        // Records are appended in finalize order, so the last match is the newest
        Ok(attendance
            .iter()
            .rev()
            .find(|r| r.class_id == class_id && r.student_id == student_id)
            .cloned())
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Every stored record for a class, oldest first
    pub(crate) async fn records_for_class(&self, class_id: &str) -> Vec<AttendanceRecord> {
        let attendance = self.attendance.read().await;
        attendance
            .iter()
            .filter(|r| r.class_id == class_id)
            .cloned()
            .collect()
    }
}
