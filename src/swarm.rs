//! The torrent-level view the choker works against.
//!
//! A [`Swarm`] holds a torrent's connected peers, its completion flag, its
//! aggregate transfer monitor, and the count of upload slots in use. The
//! choke and unchoke primitives live here so that the slot counter always
//! moves together with a peer's `am_choking` flag.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::bandwidth::TransferStats;
use crate::peer::{ChokeOutcome, PeerConnection};

/// Queues more block requests for a peer we are interested in.
///
/// This is the piece picker's side of the tick; the choker calls it once per
/// tick for every connected peer we want data from.
pub trait PieceRequester {
    fn queue_requests(&mut self, peer: &mut PeerConnection);
}

impl<F> PieceRequester for F
where
    F: FnMut(&mut PeerConnection),
{
    fn queue_requests(&mut self, peer: &mut PeerConnection) {
        self(peer)
    }
}

/// A requester that never queues anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRequests;

impl PieceRequester for NoRequests {
    fn queue_requests(&mut self, _peer: &mut PeerConnection) {}
}

/// Connected peers and torrent state for one torrent.
pub struct Swarm {
    peers: BTreeMap<SocketAddr, PeerConnection>,
    complete: bool,
    transfer: Arc<TransferStats>,
    upload_slots_in_use: usize,
}

impl Swarm {
    pub fn new() -> Self {
        Self::with_transfer(TransferStats::new())
    }

    /// Creates a swarm whose torrent-wide rates come from `transfer`.
    pub fn with_transfer(transfer: Arc<TransferStats>) -> Self {
        Self {
            peers: BTreeMap::new(),
            complete: false,
            transfer,
            upload_slots_in_use: 0,
        }
    }

    /// Adds a peer, replacing any peer with the same address.
    pub fn add_peer(&mut self, peer: PeerConnection) -> Option<PeerConnection> {
        let holds_slot = !peer.is_choked();
        let previous = self.remove_peer(&peer.addr);
        if holds_slot {
            self.upload_slots_in_use += 1;
        }
        self.peers.insert(peer.addr, peer);
        previous
    }

    /// Removes a peer, releasing its upload slot if it held one.
    pub fn remove_peer(&mut self, addr: &SocketAddr) -> Option<PeerConnection> {
        let peer = self.peers.remove(addr)?;
        if !peer.is_choked() {
            self.upload_slots_in_use = self.upload_slots_in_use.saturating_sub(1);
        }
        Some(peer)
    }

    pub fn peer(&self, addr: &SocketAddr) -> Option<&PeerConnection> {
        self.peers.get(addr)
    }

    /// Mutable access for the connection layer.
    ///
    /// Callers must not flip `am_choking` directly; use [`Swarm::choke`] and
    /// [`Swarm::unchoke`] so the slot count stays accurate.
    pub fn peer_mut(&mut self, addr: &SocketAddr) -> Option<&mut PeerConnection> {
        self.peers.get_mut(addr)
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerConnection> {
        self.peers.values()
    }

    pub fn peers_mut(&mut self) -> impl Iterator<Item = &mut PeerConnection> {
        self.peers.values_mut()
    }

    /// Addresses of every peer, in a stable order.
    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.peers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
    }

    /// Seeding means we have everything and only upload.
    pub fn is_seeding(&self) -> bool {
        self.complete
    }

    pub fn transfer(&self) -> &TransferStats {
        &self.transfer
    }

    /// Number of peers we are currently uploading to.
    pub fn upload_slots_in_use(&self) -> usize {
        self.upload_slots_in_use
    }

    /// Chokes a peer. Returns `None` if it is unknown or already choked.
    pub fn choke(&mut self, addr: &SocketAddr) -> Option<ChokeOutcome> {
        let outcome = self.peers.get_mut(addr)?.choke()?;
        self.upload_slots_in_use = self.upload_slots_in_use.saturating_sub(1);
        Some(outcome)
    }

    /// Unchokes a peer. Returns false if it is unknown or already unchoked.
    pub fn unchoke(&mut self, addr: &SocketAddr, now: Instant) -> bool {
        let unchoked = self
            .peers
            .get_mut(addr)
            .is_some_and(|peer| peer.unchoke(now));
        if unchoked {
            self.upload_slots_in_use += 1;
        }
        unchoked
    }
}

impl Default for Swarm {
    fn default() -> Self {
        Self::new()
    }
}
