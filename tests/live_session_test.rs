// In-process tests for the live attendance channel

mod common;

use common::{call, create_class, enroll, register, test_state, Account};
use serde_json::{json, Value};
use tokio::time::{timeout, Duration};
use warp::http::StatusCode;
use warp::test::WsClient;

use attendance_server::api::routes;
use attendance_server::AppState;

async fn connect(state: &AppState, token: &str) -> WsClient {
    let mut client = warp::test::ws()
        .path(&format!("/ws?token={}", token))
        .handshake(routes(state.clone()))
        .await
        .expect("handshake");

    // The reply proves the server finished registering this connection
    send(&mut client, json!({"event": "HELLO"})).await;
    assert_eq!(recv(&mut client).await, error("Unknown event"));
    client
}

async fn send(client: &mut WsClient, frame: Value) {
    client.send_text(frame.to_string()).await;
}

async fn recv(client: &mut WsClient) -> Value {
    let message = timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("timed out waiting for message")
        .expect("socket error");
    serde_json::from_str(message.to_str().expect("text frame")).expect("json frame")
}

async fn assert_silent(client: &mut WsClient) {
    let pending = timeout(Duration::from_millis(150), client.recv()).await;
    assert!(pending.is_err(), "unexpected message: {:?}", pending);
}

fn error(message: &str) -> Value {
    json!({"event": "ERROR", "data": {"message": message}})
}

struct Classroom {
    teacher: Account,
    present: Account,
    absent: Account,
    class_id: String,
}

async fn classroom(state: &AppState) -> Classroom {
    let teacher = register(state, "Ada", "ada@school.edu", "teacher").await;
    let present = register(state, "Sam", "sam@school.edu", "student").await;
    let absent = register(state, "Olive", "olive@school.edu", "student").await;
    let class_id = create_class(state, &teacher, "c101").await;
    enroll(state, &teacher, &class_id, &present).await;
    enroll(state, &teacher, &class_id, &absent).await;

    Classroom {
        teacher,
        present,
        absent,
        class_id,
    }
}

async fn start_session(state: &AppState, room: &Classroom) {
    let (status, body) = call(
        state,
        "POST",
        "/attendance/start",
        Some(&room.teacher.token),
        Some(json!({"classId": room.class_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "start failed: {}", body);
}

#[tokio::test]
async fn test_handshake_rejects_bad_token() {
    let state = test_state();

    let mut client = warp::test::ws()
        .path("/ws?token=not-a-token")
        .handshake(routes(state.clone()))
        .await
        .expect("handshake");
    assert_eq!(recv(&mut client).await, error("Unauthorized or invalid token"));

    let mut client = warp::test::ws()
        .path("/ws")
        .handshake(routes(state.clone()))
        .await
        .expect("handshake");
    assert_eq!(recv(&mut client).await, error("Unauthorized or invalid token"));

    assert_eq!(state.live.registry().len().await, 0);
}

#[tokio::test]
async fn test_events_require_active_session() {
    let state = test_state();
    let room = classroom(&state).await;
    let mut teacher = connect(&state, &room.teacher.token).await;

    send(&mut teacher, json!({"event": "TODAY_SUMMARY"})).await;
    assert_eq!(recv(&mut teacher).await, error("No active attendance session"));

    send(&mut teacher, json!({"event": "DONE"})).await;
    assert_eq!(recv(&mut teacher).await, error("No active attendance session"));

    for student in [&room.present, &room.absent] {
        let record = state.store.latest_attendance(&room.class_id, &student.id).await.unwrap();
        assert!(record.is_none());
    }
}

#[tokio::test]
async fn test_malformed_frame_is_reported_to_sender() {
    let state = test_state();
    let room = classroom(&state).await;
    start_session(&state, &room).await;
    let mut teacher = connect(&state, &room.teacher.token).await;
    let mut student = connect(&state, &room.present.token).await;

    teacher.send_text("this is not json").await;
    assert_eq!(recv(&mut teacher).await, error("Invalid message format"));

    send(
        &mut teacher,
        json!({"event": "ATTENDANCE_MARKED", "data": {"studentId": room.present.id, "status": "late"}}),
    )
    .await;
    assert_eq!(recv(&mut teacher).await, error("Invalid message format"));

    assert_silent(&mut student).await;
}

#[tokio::test]
async fn test_student_cannot_mark() {
    let state = test_state();
    let room = classroom(&state).await;
    start_session(&state, &room).await;
    let mut teacher = connect(&state, &room.teacher.token).await;
    let mut student = connect(&state, &room.present.token).await;

    send(
        &mut student,
        json!({"event": "ATTENDANCE_MARKED", "data": {"studentId": room.present.id, "status": "present"}}),
    )
    .await;
    assert_eq!(recv(&mut student).await, error("Forbidden, teacher event only"));
    assert_silent(&mut teacher).await;

    send(&mut teacher, json!({"event": "TODAY_SUMMARY"})).await;
    let summary = json!({"event": "TODAY_SUMMARY", "data": {"present": 0, "absent": 0, "total": 0}});
    assert_eq!(recv(&mut teacher).await, summary);
    assert_eq!(recv(&mut student).await, summary);
}

#[tokio::test]
async fn test_full_roll_call() {
    let state = test_state();
    let room = classroom(&state).await;
    start_session(&state, &room).await;

    let mut teacher = connect(&state, &room.teacher.token).await;
    let mut student = connect(&state, &room.present.token).await;
    let mut classmate = connect(&state, &room.absent.token).await;

    // Summary before any marks
    send(&mut teacher, json!({"event": "TODAY_SUMMARY"})).await;
    let empty = json!({"event": "TODAY_SUMMARY", "data": {"present": 0, "absent": 0, "total": 0}});
    assert_eq!(recv(&mut teacher).await, empty);
    assert_eq!(recv(&mut student).await, empty);
    assert_eq!(recv(&mut classmate).await, empty);

    // Self-status before being marked
    send(&mut student, json!({"event": "MY_ATTENDANCE"})).await;
    assert_eq!(
        recv(&mut student).await,
        json!({"event": "MY_ATTENDANCE", "data": {"status": "not yet updated"}})
    );

    // Mark is echoed to everyone
    send(
        &mut teacher,
        json!({"event": "ATTENDANCE_MARKED", "data": {"studentId": room.present.id, "status": "present"}}),
    )
    .await;
    let echo = json!({"event": "ATTENDANCE_MARKED", "data": {"studentId": room.present.id, "status": "present"}});
    assert_eq!(recv(&mut teacher).await, echo);
    assert_eq!(recv(&mut student).await, echo);
    assert_eq!(recv(&mut classmate).await, echo);

    // Self-status is private to the asking student
    send(&mut student, json!({"event": "MY_ATTENDANCE"})).await;
    assert_eq!(
        recv(&mut student).await,
        json!({"event": "MY_ATTENDANCE", "data": {"status": "present"}})
    );
    assert_silent(&mut teacher).await;
    assert_silent(&mut classmate).await;

    // Finalize defaults the unmarked classmate to absent
    send(&mut teacher, json!({"event": "DONE"})).await;
    for client in [&mut teacher, &mut student, &mut classmate] {
        let done = recv(client).await;
        assert_eq!(done["event"], "DONE");
        assert_eq!(done["data"]["present"], 1);
        assert_eq!(done["data"]["absent"], 1);
        assert_eq!(done["data"]["total"], 2);
        assert_eq!(done["data"]["classId"], room.class_id.as_str());
    }

    assert!(!state.sessions.is_active().await);
    for student in [&room.present, &room.absent] {
        let record = state.store.latest_attendance(&room.class_id, &student.id).await.unwrap();
        assert!(record.is_some());
    }

    // Durable results are visible over REST
    let (status, body) = call(
        &state,
        "GET",
        &format!("/class/{}/my-attendance", room.class_id),
        Some(&room.present.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "present");

    let (_, body) = call(
        &state,
        "GET",
        &format!("/class/{}/my-attendance", room.class_id),
        Some(&room.absent.token),
        None,
    )
    .await;
    assert_eq!(body["data"]["status"], "absent");

    // The slot is free again
    send(&mut teacher, json!({"event": "TODAY_SUMMARY"})).await;
    assert_eq!(recv(&mut teacher).await, error("No active attendance session"));
    start_session(&state, &room).await;
}

#[tokio::test]
async fn test_disconnect_unregisters_connection() {
    let state = test_state();
    let room = classroom(&state).await;

    let mut teacher = connect(&state, &room.teacher.token).await;
    assert_eq!(state.live.registry().len().await, 1);

    teacher.send(warp::ws::Message::close()).await;

    let mut remaining = state.live.registry().len().await;
    for _ in 0..20 {
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
        remaining = state.live.registry().len().await;
    }
    assert_eq!(remaining, 0);
}
