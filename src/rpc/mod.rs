//! RPC protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound (gateway → backend):
//!     dispatcher.rs (call / emit)
//!     → transport (link writer)
//!     → correlation.rs (response matched back to the caller)
//!
//! Inbound (backend → gateway):
//!     link reader
//!     → handlers.rs (command-dispatch table)
//!     → status.rs (gateway_status)
//!     → reply written back on the same link
//! ```
//!
//! # Design Decisions
//! - One physical link, two logical channels: an outbound correlation table
//!   and an inbound dispatch table that never touch each other
//! - Every packet shares one envelope (packet.rs)

pub mod correlation;
pub mod dispatcher;
pub mod handlers;
pub mod packet;
pub mod status;

pub use correlation::{CorrelationTable, PendingCall};
pub use dispatcher::Dispatcher;
pub use handlers::{HandlerRegistry, MessageHandler};
pub use packet::{Packet, PacketKind, Pattern};
pub use status::{register_reverse_handlers, GatewayStatus};
