use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

use crate::error::{AttendanceError, Result};

pub fn success<T: Serialize>(data: &T, status: StatusCode) -> Response {
    let body = json!({ "success": true, "data": data });
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

pub fn failure(message: &str, status: StatusCode) -> Response {
    let body = json!({ "success": false, "error": message });
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// Wrap a handler outcome in the `{success, data|error}` envelope.
pub fn respond<T: Serialize>(result: Result<T>, status: StatusCode) -> Response {
    match result {
        Ok(data) => success(&data, status),
        Err(e) => error_response(&e),
    }
}

pub fn error_response(err: &AttendanceError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    } else {
        tracing::debug!(error = %err, status = status.as_u16(), "Request rejected");
    }
    failure(&err.to_string(), status)
}

pub async fn handle_rejection(err: Rejection) -> std::result::Result<Response, Infallible> {
    if let Some(e) = err.find::<AttendanceError>() {
        return Ok(error_response(e));
    }

    let (message, status) = if err.is_not_found() {
        ("Route not found".to_string(), StatusCode::NOT_FOUND)
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (format!("Invalid request body: {}", e), StatusCode::BAD_REQUEST)
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        ("Invalid query string".to_string(), StatusCode::BAD_REQUEST)
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        ("Request body too large".to_string(), StatusCode::PAYLOAD_TOO_LARGE)
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        ("Content-Length required".to_string(), StatusCode::LENGTH_REQUIRED)
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        ("Expected application/json".to_string(), StatusCode::UNSUPPORTED_MEDIA_TYPE)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ("Method not allowed".to_string(), StatusCode::METHOD_NOT_ALLOWED)
    } else {
        tracing::error!(rejection = ?err, "Unhandled rejection");
        ("Internal server error".to_string(), StatusCode::INTERNAL_SERVER_ERROR)
    };

    Ok(failure(&message, status))
}
