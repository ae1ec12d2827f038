use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection};

use super::filters::{authenticated, json_body, with_state};
use super::reply::respond;
use crate::auth::{hash_password, issue_token, verify_password, Claims};
use crate::error::{AttendanceError, Result};
use crate::state::AppState;
use crate::store::{NewUser, Role, User};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl SignupRequest {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AttendanceError::validation("name is required"));
        }
        if !is_valid_email(&self.email) {
            return Err(AttendanceError::validation("email is invalid"));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(AttendanceError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub fn auth_routes(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let signup = warp::path!("auth" / "signup")
        .and(warp::post())
        .and(json_body::<SignupRequest>())
        .and(with_state(state.clone()))
        .and_then(|body: SignupRequest, state: AppState| async move {
            Ok::<_, Rejection>(respond(signup(body, &state).await, StatusCode::CREATED))
        });

    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(json_body::<LoginRequest>())
        .and(with_state(state.clone()))
        .and_then(|body: LoginRequest, state: AppState| async move {
            Ok::<_, Rejection>(respond(login(body, &state).await, StatusCode::OK))
        });

    let me = warp::path!("auth" / "me")
        .and(warp::get())
        .and(authenticated(state.clone()))
        .and(with_state(state))
        .and_then(|claims: Claims, state: AppState| async move {
            Ok::<_, Rejection>(respond(me(&claims, &state).await, StatusCode::OK))
        });

    signup.or(login).unify().or(me).unify()
}

async fn signup(body: SignupRequest, state: &AppState) -> Result<User> {
    body.validate()?;

    let password = body.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AttendanceError::internal(format!("hashing task failed: {}", e)))??;

    state
        .store
        .create_user(NewUser {
            name: body.name.trim().to_string(),
            email: body.email,
            password_hash,
            role: body.role,
        })
        .await
}

async fn login(body: LoginRequest, state: &AppState) -> Result<LoginResponse> {
    let user = state
        .store
        .find_user_by_email(&body.email)
        .await?
        .ok_or(AttendanceError::InvalidCredentials)?;

    let hash = user.password_hash.clone();
    let password = body.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AttendanceError::internal(format!("verify task failed: {}", e)))??;

    if !matches {
        tracing::debug!(user_id = %user.id, "Login rejected");
        return Err(AttendanceError::InvalidCredentials);
    }

    let token = issue_token(&user.id, user.role, &state.auth)?;
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(LoginResponse { token })
}

async fn me(claims: &Claims, state: &AppState) -> Result<User> {
    state
        .store
        .find_user(&claims.user_id)
        .await?
        .ok_or_else(|| AttendanceError::UserNotFound(claims.user_id.clone()))
}
