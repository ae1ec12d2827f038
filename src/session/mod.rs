mod manager;
mod state;

pub use manager::{FinalizedSession, SessionManager};
pub use state::{AttendanceSummary, SessionInfo, SessionState};
