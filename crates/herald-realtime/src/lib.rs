//! Live delivery for Herald: socket handles, the per-process connection
//! registry, the event broadcaster and the client message protocol.
//!
//! Nothing here knows about axum or any particular WebSocket library. A
//! transport wraps each accepted socket in a [`SocketHandle`] and drains the
//! handle's outbound [`Frame`] queue onto the wire.

pub mod broadcaster;
pub mod error;
pub mod registry;
pub mod session;
pub mod socket;
pub mod sweeper;

pub use broadcaster::{DeliveryPolicy, EventBroadcaster};
pub use error::{Error, Result};
pub use registry::{ConnectionRegistry, RegistryStats};
pub use socket::{Frame, ReadyState, SocketHandle, SocketId};
pub use sweeper::{SweepConfig, spawn_sweeper};

#[cfg(test)]
mod testing;
