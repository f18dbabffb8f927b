//! Backend link subsystem.
//!
//! # Data Flow
//! ```text
//! manager.rs (connect / supervise / close)
//!     → link.rs (one TCP connection, reader + writer tasks)
//!     → codec.rs (`<len>#<json>` framing)
//!     → connection.rs (link identity, state machine)
//!
//! Link States:
//!     Disconnected → Connecting → Connected → Closed
//! ```
//!
//! # Design Decisions
//! - Exactly one link at a time, replaced wholesale on reconnect
//! - Reconnects are driven by a supervisor task with exponential backoff
//! - Closed is terminal; nothing reconnects after shutdown

pub mod codec;
pub mod connection;
pub mod link;
pub mod manager;

pub use codec::{CodecError, PacketCodec};
pub use connection::{ConnectionId, ConnectionState};
pub use link::Link;
pub use manager::ConnectionManager;
