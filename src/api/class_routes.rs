use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::filters::{authenticated, json_body, require_role, with_state};
use super::reply::respond;
use crate::auth::Claims;
use crate::error::{AttendanceError, Result};
use crate::state::AppState;
use crate::store::{AttendanceStatus, Class, Role, StudentSummary, User};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    pub class_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStudentRequest {
    pub student_id: String,
}

/// A class with its enrolled students resolved to profiles
#[derive(Debug, Serialize)]
pub struct ClassDetails {
    #[serde(flatten)]
    pub class: Class,
    pub students: Vec<StudentSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyAttendance {
    pub class_id: String,
    pub status: Option<AttendanceStatus>,
}

pub fn class_routes(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let create = warp::path!("class")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(json_body::<CreateClassRequest>())
        .and(with_state(state.clone()))
        .and_then(|claims: Claims, body: CreateClassRequest, state: AppState| async move {
            Ok::<_, Rejection>(respond(
                create_class(&claims, body, &state).await,
                StatusCode::CREATED,
            ))
        });

    let add_student = warp::path!("class" / String / "add-student")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(json_body::<AddStudentRequest>())
        .and(with_state(state.clone()))
        .and_then(
            |class_id: String, claims: Claims, body: AddStudentRequest, state: AppState| async move {
                Ok::<_, Rejection>(respond(
                    add_student(&claims, &class_id, body, &state).await,
                    StatusCode::OK,
                ))
            },
        );

    let my_attendance = warp::path!("class" / String / "my-attendance")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state.clone()))
        .and_then(|class_id: String, claims: Claims, state: AppState| async move {
            Ok::<_, Rejection>(respond(
                my_attendance(&claims, &class_id, &state).await,
                StatusCode::OK,
            ))
        });

    let details = warp::path!("class" / String)
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state.clone()))
        .and_then(|class_id: String, claims: Claims, state: AppState| async move {
            Ok::<_, Rejection>(respond(
                class_details(&claims, &class_id, &state).await,
                StatusCode::OK,
            ))
        });

    let students = warp::path!("students")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state))
        .and_then(|claims: Claims, state: AppState| async move {
            Ok::<_, Rejection>(respond(list_students(&claims, &state).await, StatusCode::OK))
        });

    create
        .or(add_student)
        .unify()
        .or(my_attendance)
        .unify()
        .or(details)
        .unify()
        .or(students)
        .unify()
}

/// Load a class and check the caller teaches it.
pub(crate) async fn owned_class(claims: &Claims, class_id: &str, state: &AppState) -> Result<Class> {
    require_role(claims, Role::Teacher)?;

    let class = state
        .store
        .find_class(class_id)
        .await?
        .ok_or_else(|| AttendanceError::ClassNotFound(class_id.to_string()))?;

    if class.teacher_id != claims.user_id {
        return Err(AttendanceError::NotClassOwner);
    }
    Ok(class)
}

async fn create_class(claims: &Claims, body: CreateClassRequest, state: &AppState) -> Result<Class> {
    require_role(claims, Role::Teacher)?;

    let class_name = body.class_name.trim();
    if class_name.is_empty() {
        return Err(AttendanceError::validation("className is required"));
    }

    state.store.create_class(class_name, &claims.user_id).await
}

async fn add_student(
    claims: &Claims,
    class_id: &str,
    body: AddStudentRequest,
    state: &AppState,
) -> Result<Class> {
    let class = owned_class(claims, class_id, state).await?;

    let student = state.store.find_user(&body.student_id).await?;
    match student {
        Some(user) if user.role == Role::Student => {}
        _ => return Err(AttendanceError::StudentNotFound(body.student_id)),
    }

    state.store.add_student(&class.id, &body.student_id).await
}

async fn class_details(claims: &Claims, class_id: &str, state: &AppState) -> Result<ClassDetails> {
    let class = state
        .store
        .find_class(class_id)
        .await?
        .ok_or_else(|| AttendanceError::ClassNotFound(class_id.to_string()))?;

    match claims.role {
        Role::Teacher if class.teacher_id != claims.user_id => {
            return Err(AttendanceError::NotClassOwner)
        }
        Role::Student if !class.is_enrolled(&claims.user_id) => {
            return Err(AttendanceError::NotEnrolled)
        }
        _ => {}
    }

    let mut students = Vec::with_capacity(class.student_ids.len());
    for student_id in &class.student_ids {
        if let Some(user) = state.store.find_user(student_id).await? {
            students.push(StudentSummary::from(&user));
        }
    }

    Ok(ClassDetails { class, students })
}

async fn my_attendance(claims: &Claims, class_id: &str, state: &AppState) -> Result<MyAttendance> {
    require_role(claims, Role::Student)?;

    if !state.store.class_exists(class_id).await? {
        return Err(AttendanceError::ClassNotFound(class_id.to_string()));
    }
    if !state.store.is_enrolled(class_id, &claims.user_id).await? {
        return Err(AttendanceError::NotEnrolled);
    }

    let record = state
        .store
        .latest_attendance(class_id, &claims.user_id)
        .await?;

    Ok(MyAttendance {
        class_id: class_id.to_string(),
        status: record.map(|r| r.status),
    })
}

async fn list_students(claims: &Claims, state: &AppState) -> Result<Vec<User>> {
    require_role(claims, Role::Teacher)?;
    state.store.list_students().await
}
