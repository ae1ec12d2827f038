#![allow(dead_code)]

use serde_json::{json, Value};
use warp::http::StatusCode;

use attendance_server::api::routes;
use attendance_server::config::AuthConfig;
use attendance_server::store::MemoryStore;
use attendance_server::AppState;

pub fn test_state() -> AppState {
    let auth = AuthConfig {
        jwt_secret: "integration-secret".to_string(),
        token_ttl_secs: 3600,
    };
    AppState::new(auth, MemoryStore::new())
}

/// Issue one request against the full route tree and decode the JSON envelope.
pub async fn call(
    state: &AppState,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = warp::test::request().method(method).path(path);
    if let Some(token) = token {
        request = request.header("authorization", token);
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    let api = routes(state.clone());
    let response = request.reply(&api).await;
    let status = response.status();
    let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
    (status, body)
}

pub struct Account {
    pub id: String,
    pub token: String,
}

/// Sign up and log in, returning the new user's id and token.
pub async fn register(state: &AppState, name: &str, email: &str, role: &str) -> Account {
    let (status, body) = call(
        state,
        "POST",
        "/auth/signup",
        None,
        Some(json!({ "name": name, "email": email, "password": "password1", "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        state,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": "password1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    Account { id, token }
}

pub async fn create_class(state: &AppState, teacher: &Account, name: &str) -> String {
    let (status, body) = call(
        state,
        "POST",
        "/class",
        Some(&teacher.token),
        Some(json!({ "className": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create class failed: {}", body);
    body["data"]["id"].as_str().unwrap().to_string()
}

pub async fn enroll(state: &AppState, teacher: &Account, class_id: &str, student: &Account) {
    let (status, body) = call(
        state,
        "POST",
        &format!("/class/{}/add-student", class_id),
        Some(&teacher.token),
        Some(json!({ "studentId": student.id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "enroll failed: {}", body);
}
