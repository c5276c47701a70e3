//! Robot Bridge Shared Protocol Types
//!
//! This crate provides the wire envelopes, JSON codec and action state machine
//! shared by the bridge process and controller peers.

pub mod codec;
pub mod envelope;
pub mod state_machine;

// Re-export commonly used types at crate root
pub use envelope::{CommandEnvelope, CommandKind, ResponseEnvelope, ResponseStatus};

/// Protocol limits and defaults
pub mod limits {
    /// Largest datagram the bridge reads; anything longer is truncated by the socket
    pub const MAX_DATAGRAM_SIZE: usize = 4096;

    /// Largest payload a single UDP datagram can carry over IPv4
    pub const MAX_UDP_PAYLOAD: usize = 65_507;

    /// Port the bridge listens on when none is configured
    pub const DEFAULT_LISTEN_PORT: u16 = 5005;

    /// Receive timeout of the poll loop
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

    /// Handler tasks allowed to run at once
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

    /// How long shutdown waits for in-flight handlers
    pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 10_000;

    /// Time the extended hand waits for the player to take it
    pub const HANDSHAKE_PEER_WAIT_MS: u64 = 3000;
}
