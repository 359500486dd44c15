use super::choking::{ChokingState, ReviewState};
use super::fast::{generate_allowed_fast_set, FastExtensionState};
use super::message::Message;
use super::queue::{ChokeOutcome, OutboundQueue};
use crate::bandwidth::TransferStats;
use crate::constants::ALLOWED_FAST_SET_SIZE;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// The connection state of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// TCP connection in progress.
    Connecting,
    /// Connected, performing BitTorrent handshake.
    Handshaking,
    /// Fully connected and ready for data exchange.
    Connected,
    /// Connection has been closed.
    Disconnected,
}

/// A peer connection as seen by the choker.
///
/// The connection layer owns these and keeps the wire-driven fields current
/// (interest, seeder status, transfer counters). The choker writes only
/// `choking.am_choking`, `review`, and the front of `outbound`.
///
/// # Examples
///
/// ```
/// use rchoke::peer::{Message, PeerConnection};
/// use std::time::Instant;
///
/// let mut peer = PeerConnection::new("192.168.1.100:6881".parse().unwrap());
/// peer.choking.peer_interested = true;
///
/// assert!(peer.unchoke(Instant::now()));
/// assert_eq!(peer.outbound.front(), Some(&Message::Unchoke));
/// ```
pub struct PeerConnection {
    /// The peer's socket address. Identifies the peer.
    pub addr: SocketAddr,
    /// Current connection state.
    pub state: PeerState,
    /// Choking state for this connection.
    pub choking: ChokingState,
    /// Whether the peer has every piece.
    pub is_seeder: bool,
    /// Whether both sides advertised the Fast Extension (BEP-6).
    pub supports_fast: bool,
    /// When the connection was established.
    pub connected_at: Instant,
    /// Live transfer counters, written by the I/O path.
    pub transfer: Arc<TransferStats>,
    /// Choker bookkeeping carried between reviews.
    pub review: ReviewState,
    /// Pieces we allowed the peer to fetch while choked.
    pub fast: FastExtensionState,
    /// Messages waiting to be written.
    pub outbound: OutboundQueue,
}

impl PeerConnection {
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_transfer(addr, TransferStats::new())
    }

    pub fn with_transfer(addr: SocketAddr, transfer: Arc<TransferStats>) -> Self {
        Self {
            addr,
            state: PeerState::Connected,
            choking: ChokingState::default(),
            is_seeder: false,
            supports_fast: false,
            connected_at: Instant::now(),
            transfer,
            review: ReviewState::default(),
            fast: FastExtensionState::new(),
            outbound: OutboundQueue::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == PeerState::Connected
    }

    pub fn is_choked(&self) -> bool {
        self.choking.am_choking
    }

    /// Whether the peer wants data from us.
    pub fn is_interested(&self) -> bool {
        self.choking.peer_interested
    }

    pub fn set_interested(&mut self, interested: bool) {
        self.choking.am_interested = interested;
    }

    pub fn set_peer_interested(&mut self, interested: bool) {
        self.choking.peer_interested = interested;
    }

    pub fn disconnect(&mut self) {
        self.state = PeerState::Disconnected;
    }

    /// Computes the peer's allowed-fast set, records it and queues the
    /// AllowedFast messages. Does nothing unless BEP-6 was negotiated.
    pub fn grant_allowed_fast(&mut self, info_hash: &[u8; 20], num_pieces: u32) -> Vec<u32> {
        if !self.supports_fast {
            return Vec::new();
        }

        let pieces =
            generate_allowed_fast_set(info_hash, self.addr.ip(), num_pieces, ALLOWED_FAST_SET_SIZE);
        for &piece in &pieces {
            self.fast.allow(piece);
            self.outbound.push_back(Message::AllowedFast { piece });
        }
        pieces
    }

    /// Chokes the peer.
    ///
    /// Returns `None` if it was already choked. Otherwise queues a `Choke`
    /// ahead of everything else and reconciles queued piece uploads.
    pub fn choke(&mut self) -> Option<ChokeOutcome> {
        if self.choking.am_choking {
            return None;
        }
        self.choking.am_choking = true;

        let fast = self.supports_fast.then_some(&self.fast);
        let outcome = self.outbound.reconcile_on_choke(fast);
        self.outbound.push_front(Message::Choke);

        trace!(
            "Choked {}: {} uploads kept, {} cancelled, {} rejected",
            self.addr,
            outcome.retained,
            outcome.cancelled,
            outcome.rejected
        );
        Some(outcome)
    }

    /// Unchokes the peer and starts its warm-up period.
    ///
    /// Returns false if it was already unchoked.
    pub fn unchoke(&mut self, now: Instant) -> bool {
        if !self.choking.am_choking {
            return false;
        }
        self.choking.am_choking = false;
        self.outbound.push_front(Message::Unchoke);
        self.review.last_unchoked_at = Some(now);
        self.review.first_review_period = true;

        trace!("Unchoked {}", self.addr);
        true
    }
}
