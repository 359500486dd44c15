//! Peer connection state the choker reads and writes.
//!
//! This module models the slice of a peer wire connection (BEP-3, BEP-6)
//! that upload scheduling touches: choke and interest flags, transfer
//! counters, the outbound message queue, and the fast extension's
//! allowed-fast pieces.

mod choking;
mod connection;
mod fast;
mod message;
mod queue;

pub use choking::{ChokingState, ReviewState};
pub use connection::{PeerConnection, PeerState};
pub use fast::{generate_allowed_fast_set, FastExtensionState};
pub use message::{BlockRequest, Message};
pub use queue::{ChokeOutcome, OutboundQueue};
