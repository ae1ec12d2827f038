use serde::de::DeserializeOwned;
use std::convert::Infallible;
use warp::{Filter, Rejection};

use crate::auth::{decode_token, token_from_header, Claims};
use crate::error::{AttendanceError, Result};
use crate::state::AppState;
use crate::store::Role;

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Verifies the raw token in the `Authorization` header and yields its claims.
pub fn authenticated(
    state: AppState,
) -> impl Filter<Extract = (Claims,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: AppState| async move {
            let token = token_from_header(header.as_deref()).map_err(warp::reject::custom)?;
            decode_token(token, &state.auth).map_err(warp::reject::custom)
        })
}

pub fn require_role(claims: &Claims, role: Role) -> Result<()> {
    if claims.role == role {
        Ok(())
    } else {
        Err(AttendanceError::RoleRequired(role.to_string()))
    }
}
