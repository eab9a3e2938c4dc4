//! Session Multiplexer (§4.2): framed Unix-socket sharing of a single PTY
//! session between a local controlling terminal and at most one attached
//! remote client at a time.

pub mod client;
pub mod config;
pub mod discovery;
pub mod framing;
pub mod list;
pub mod lock;
pub mod server;
pub mod termios;

pub use client::{report_outcome, run as run_client, ClientOutcome};
pub use config::SessionConfig;
pub use discovery::{discover_role, Role};
pub use framing::{Frame, FrameDecoder, MAX_FRAME_PAYLOAD, PROTOCOL_VERSION};
pub use list::{list_sessions, SessionEntry};
pub use lock::SessionLock;
pub use server::Server;
pub use termios::{window_size, RawModeGuard};
