//! Shared protocol types for cyberfarm
//!
//! Defines the JSON structures exchanged between the visual client and the
//! remote script server: the one-shot bootstrap payload and the messages
//! carried over the `/ws/run` channel.

pub mod bootstrap;
pub mod error;
pub mod farm;
pub mod messages;

pub use bootstrap::*;
pub use error::ProtocolError;
pub use farm::*;
pub use messages::*;
