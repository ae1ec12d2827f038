use serde::Deserialize;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::class_routes::owned_class;
use super::filters::{authenticated, json_body, with_state};
use super::reply::respond;
use crate::auth::Claims;
use crate::error::Result;
use crate::session::SessionInfo;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttendanceRequest {
    pub class_id: String,
}

pub fn attendance_routes(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("attendance" / "start")
        .and(warp::post())
        .and(authenticated(state.clone()))
        .and(json_body::<StartAttendanceRequest>())
        .and(with_state(state))
        .and_then(|claims: Claims, body: StartAttendanceRequest, state: AppState| async move {
            Ok::<_, Rejection>(respond(start(&claims, body, &state).await, StatusCode::OK))
        })
}

async fn start(claims: &Claims, body: StartAttendanceRequest, state: &AppState) -> Result<SessionInfo> {
    let class = owned_class(claims, &body.class_id, state).await?;
    state.sessions.start(&class.id).await
}
