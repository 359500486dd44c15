//! Upload slot scheduling (choking).
//!
//! A [`Choker`] decides, once per tick, which peers may download from us.
//! The default strategy is tit-for-tat with an optimistic unchoke:
//!
//! 1. **Classify** every connected, non-seeding peer into one of three
//!    [`PeerBucket`]s: *nascent* (unchoked and still warming up),
//!    *candidate* (proven uploader, or a peer that unchoked us on its own),
//!    and *optimistic* (interested, nothing to judge it by).
//! 2. **Sort** each bucket by the rate that matters: what the peer sent us
//!    while downloading, what we sent it while seeding.
//! 3. **Allocate** slots bucket by bucket. Peers already unchoked keep their
//!    slot; at most half the slots change hands per review unless fewer than
//!    half are in use.
//! 4. **Explore**: one slot goes to a random optimistic candidate, favouring
//!    peers not tried recently, unless the nascent bucket fills every slot or
//!    the current optimistic peer is still warming up.
//! 5. **Deallocate**: every unconsumed bucket member is choked, except the
//!    optimistic peer.
//!
//! Reviews are rate-gated. Between reviews a tick only fills open slots, or
//! unchokes everyone if there are more slots than interested peers.
//!
//! [`Strategy::Ratio`](crate::Strategy::Ratio) swaps the bucket machinery
//! for a greedy ranking by received/sent ratio under an upload budget.
//!
//! # Example
//!
//! ```
//! use rchoke::{Choker, ChokerConfig, Swarm};
//! use rchoke::peer::PeerConnection;
//! use std::time::{Duration, Instant};
//!
//! let mut swarm = Swarm::new();
//! for port in 6881..6891 {
//!     let mut peer = PeerConnection::new(format!("10.0.0.1:{port}").parse().unwrap());
//!     peer.set_peer_interested(true);
//!     swarm.add_peer(peer);
//! }
//!
//! let mut choker = Choker::new(ChokerConfig::default().with_upload_slots(4)).unwrap();
//! let start = Instant::now();
//! let mut requester = |_: &mut PeerConnection| {};
//!
//! choker.tick_at(&mut swarm, &mut requester, start);
//! assert!(swarm.upload_slots_in_use() <= 4);
//!
//! choker.tick_at(&mut swarm, &mut requester, start + Duration::from_secs(31));
//! assert_eq!(choker.reviews_executed(), 2);
//! ```

mod allocate;
mod bucket;
mod classify;
mod driver;
mod optimistic;
mod ratio;
mod scheduler;

pub use allocate::SlotBudget;
pub use bucket::{Buckets, PeerBucket, RateKey};
pub use driver::{spawn_choker, ChokerHandle};
pub use ratio::RatioRanking;
pub use scheduler::{Choker, ReviewSummary, ReviewTrigger, TickOutcome};
