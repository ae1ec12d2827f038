//! Live attendance channel: wire protocol, connection fan-out and the
//! event state machine that drives the session.

mod handler;
mod protocol;
mod registry;

pub use handler::SessionProtocolHandler;
pub use protocol::{ClientEvent, Envelope, ProtocolError, ServerEvent};
pub use registry::{Connection, ConnectionRegistry};
