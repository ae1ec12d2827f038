pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod realtime;
pub mod session;
pub mod state;
pub mod store;

pub use error::{AttendanceError, Result};
pub use state::AppState;
