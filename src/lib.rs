//! rchoke - BitTorrent upload slot scheduling
//!
//! This library decides which peers of a torrent may download from us. It
//! implements tit-for-tat choking with an optimistic unchoke (BEP-3), a
//! ratio-ranked alternative strategy, and the BEP-6 fast extension rules for
//! rejecting queued uploads when a peer is choked.
//!
//! # Modules
//!
//! - [`choke`] - The choker: peer classification, slot allocation, optimistic unchoke
//! - [`peer`] - Per-peer choke state, outbound queue, BEP-6 allowed-fast set
//! - [`swarm`] - The torrent's peer table and upload slot counter
//! - [`bandwidth`] - Transfer counters and rolling rate monitors
//! - [`config`] - Choker configuration and validation
//! - [`constants`] - Protocol and scheduling defaults
//!
//! # Example
//!
//! ```
//! use rchoke::{Choker, ChokerConfig, NoRequests, Swarm};
//! use rchoke::peer::PeerConnection;
//!
//! let mut swarm = Swarm::new();
//! for port in 6881..6885 {
//!     let mut peer = PeerConnection::new(format!("192.0.2.7:{port}").parse().unwrap());
//!     peer.set_peer_interested(true);
//!     swarm.add_peer(peer);
//! }
//!
//! let mut choker = Choker::new(ChokerConfig::default().with_upload_slots(2)).unwrap();
//! choker.tick(&mut swarm, &mut NoRequests);
//! assert_eq!(swarm.upload_slots_in_use(), 2);
//! ```

pub mod bandwidth;
pub mod choke;
pub mod config;
pub mod constants;
pub mod peer;
pub mod swarm;

pub use bandwidth::{RateMonitor, TransferStats};
pub use choke::{
    spawn_choker, Buckets, Choker, ChokerHandle, PeerBucket, RateKey, RatioRanking, ReviewSummary,
    ReviewTrigger, SlotBudget, TickOutcome,
};
pub use config::{ChokerConfig, ConfigError, Strategy};
pub use peer::{ChokeOutcome, FastExtensionState, Message, PeerConnection, PeerState};
pub use swarm::{NoRequests, PieceRequester, Swarm};
