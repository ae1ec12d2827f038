//! HTTP surface: REST endpoints and the live WebSocket upgrade.

mod attendance_routes;
mod auth_routes;
mod class_routes;
pub mod filters;
mod live_routes;
pub mod reply;

use serde_json::json;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

pub use attendance_routes::{attendance_routes, StartAttendanceRequest};
pub use auth_routes::{auth_routes, LoginRequest, LoginResponse, SignupRequest};
pub use class_routes::{class_routes, AddStudentRequest, ClassDetails, CreateClassRequest, MyAttendance};
pub use live_routes::{handle_live_socket, live_route, LiveQuery};

use crate::state::AppState;
use filters::with_state;

pub const SERVICE_NAME: &str = "Attendance Server";

/// Every route, with rejections recovered into the response envelope
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    health_check(state.clone())
        .or(auth_routes(state.clone()))
        .or(class_routes(state.clone()))
        .or(attendance_routes(state.clone()))
        .or(live_route(state))
        .recover(reply::handle_rejection)
        .with(warp::trace::request())
}

pub fn health_check(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .and_then(|state: AppState| async move {
            let body = json!({
                "status": "healthy",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "activeSession": state.sessions.current().await,
                "connections": state.live.registry().len().await,
            });
            Ok::<_, Rejection>(reply::success(&body, StatusCode::OK))
        })
}
