use std::cmp::Ordering;
use std::net::SocketAddr;
use std::time::Instant;

use rand::Rng;

use crate::constants::OPTIMISTIC_WEIGHT_CAP_SECS;
use crate::swarm::Swarm;

/// Which measured rate orders a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateKey {
    /// What the peer sent us last period. Used while downloading.
    Download,
    /// What we sent the peer last period. Used while seeding.
    Upload,
}

impl RateKey {
    pub fn for_torrent(seeding: bool) -> Self {
        if seeding {
            RateKey::Upload
        } else {
            RateKey::Download
        }
    }
}

/// An ordered list of peers staged by one review.
///
/// Buckets hold addresses, never peers; every lookup goes through the
/// [`Swarm`]. A cursor marks how far allocation has consumed the bucket.
#[derive(Debug, Clone, Default)]
pub struct PeerBucket {
    peers: Vec<SocketAddr>,
    consumed: usize,
}

impl PeerBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, addr: SocketAddr) {
        self.peers.push(addr);
    }

    pub fn clear(&mut self) {
        self.peers.clear();
        self.consumed = 0;
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.contains(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SocketAddr> {
        self.peers.iter()
    }

    /// Peers not yet consumed by allocation.
    pub fn remaining(&self) -> &[SocketAddr] {
        &self.peers[self.consumed..]
    }

    /// Consumes and returns the next peer.
    pub fn next_unconsumed(&mut self) -> Option<SocketAddr> {
        let addr = self.peers.get(self.consumed).copied()?;
        self.consumed += 1;
        Some(addr)
    }

    /// Drops a peer that left the swarm.
    pub fn forget(&mut self, addr: &SocketAddr) {
        if let Some(pos) = self.peers.iter().position(|a| a == addr) {
            self.peers.remove(pos);
            if pos < self.consumed {
                self.consumed -= 1;
            }
        }
    }

    /// Stable sort, best rate first. Resets the cursor.
    pub fn sort_by_rate(&mut self, swarm: &Swarm, key: RateKey) {
        let rate = |addr: &SocketAddr| {
            swarm.peer(addr).map_or(0.0, |peer| match key {
                RateKey::Download => peer.review.last_review_download_rate,
                RateKey::Upload => peer.review.last_review_upload_rate,
            })
        };
        self.peers
            .sort_by(|a, b| rate(b).partial_cmp(&rate(a)).unwrap_or(Ordering::Equal));
        self.consumed = 0;
    }

    /// First peer, consumed or not, that wants data and is still choked.
    pub fn first_interested_choked(&self, swarm: &Swarm) -> Option<SocketAddr> {
        self.peers.iter().copied().find(|addr| {
            swarm.peer(addr).is_some_and(|peer| {
                peer.is_connected() && !peer.is_seeder && peer.is_interested() && peer.is_choked()
            })
        })
    }

    /// Consumes one remaining peer at random, favouring peers we have not
    /// unchoked recently.
    ///
    /// A peer's weight is the seconds since we last unchoked it, capped, plus
    /// one; peers never unchoked get the cap. Peers that left the swarm are
    /// skipped.
    pub fn take_weighted<R: Rng + ?Sized>(
        &mut self,
        swarm: &Swarm,
        rng: &mut R,
        now: Instant,
    ) -> Option<SocketAddr> {
        let weights: Vec<u64> = self
            .remaining()
            .iter()
            .map(|addr| match swarm.peer(addr) {
                Some(peer) if peer.is_connected() => {
                    let idle = peer
                        .review
                        .unchoked_for(now)
                        .map_or(OPTIMISTIC_WEIGHT_CAP_SECS, |d| {
                            d.as_secs().min(OPTIMISTIC_WEIGHT_CAP_SECS)
                        });
                    idle + 1
                }
                _ => 0,
            })
            .collect();

        let total: u64 = weights.iter().sum();
        if total == 0 {
            return None;
        }

        let mut pick = rng.random_range(0..total);
        let offset = weights.iter().position(|&w| {
            if pick < w {
                true
            } else {
                pick -= w;
                false
            }
        })?;

        // Move the pick to the cursor so the rest keep their order.
        let index = self.consumed + offset;
        self.peers[self.consumed..=index].rotate_right(1);
        let addr = self.peers[self.consumed];
        self.consumed += 1;
        Some(addr)
    }
}

/// The three buckets of a review, in allocation priority order.
#[derive(Debug, Clone, Default)]
pub struct Buckets {
    /// Unchoked peers still warming up.
    pub nascent: PeerBucket,
    /// Proven or reciprocating peers.
    pub candidates: PeerBucket,
    /// Interested peers with nothing to judge them by.
    pub optimistic: PeerBucket,
}

impl Buckets {
    pub fn clear(&mut self) {
        self.nascent.clear();
        self.candidates.clear();
        self.optimistic.clear();
    }

    pub fn sort_by_rate(&mut self, swarm: &Swarm, key: RateKey) {
        for bucket in self.in_priority_order_mut() {
            bucket.sort_by_rate(swarm, key);
        }
    }

    pub fn forget(&mut self, addr: &SocketAddr) {
        for bucket in self.in_priority_order_mut() {
            bucket.forget(addr);
        }
    }

    pub fn in_priority_order(&self) -> [&PeerBucket; 3] {
        [&self.nascent, &self.candidates, &self.optimistic]
    }

    pub fn in_priority_order_mut(&mut self) -> [&mut PeerBucket; 3] {
        [&mut self.nascent, &mut self.candidates, &mut self.optimistic]
    }
}
