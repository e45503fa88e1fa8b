//! Realtime client for a shared board.
//!
//! Binds one [`session::BoardSession`] to the relay: applies remote events
//! to the local stores, sends local edits and cursor positions, and keeps
//! the connection alive across drops.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`bridge`] | Sans-IO protocol state machine between session and relay |
//! | [`driver`] | Tokio task owning the websocket, reconnect and backoff |
//! | [`session`] | Per-board stores: objects, cursors, roster, role |
//! | [`config`] | Environment-driven client settings |
//! | [`error`] | Client error type |

pub mod bridge;
pub mod config;
pub mod driver;
pub mod error;
pub mod session;

pub use bridge::{Bridge, BridgeOptions, Command, ConnectionStatus};
pub use config::ClientConfig;
pub use driver::{BridgeHandle, spawn, spawn_bridge};
pub use error::ClientError;
pub use session::BoardSession;
