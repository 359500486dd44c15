use std::time::{Duration, Instant};

/// The four choke/interest flags of a peer connection.
///
/// `am_choking` belongs to the choker; the other three follow the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChokingState {
    pub am_choking: bool,
    pub am_interested: bool,
    pub peer_choking: bool,
    pub peer_interested: bool,
}

impl Default for ChokingState {
    fn default() -> Self {
        Self {
            am_choking: true,
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
        }
    }
}

/// Per-peer bookkeeping the choker carries from one review to the next.
#[derive(Debug, Clone, Default)]
pub struct ReviewState {
    /// When we last unchoked the peer.
    pub last_unchoked_at: Option<Instant>,
    /// Set on unchoke, cleared once the peer has been unchoked for a full
    /// review interval.
    pub first_review_period: bool,
    pub bytes_uploaded_at_last_review: u64,
    pub bytes_downloaded_at_last_review: u64,
    /// Bytes/sec we sent during the last review period; zero if unjudged.
    pub last_review_upload_rate: f64,
    /// Bytes/sec we received during the last review period; zero if unjudged.
    pub last_review_download_rate: f64,
    /// Upload bandwidth it would cost to reciprocate with this peer, as
    /// estimated by the connection layer. Used by the ratio strategy.
    pub upload_rate_for_recip: u64,
    /// Bytes received per byte sent. Recomputed by the ratio strategy.
    pub ratio: f64,
}

impl ReviewState {
    /// How long the peer has been unchoked, or `None` if never unchoked.
    pub fn unchoked_for(&self, now: Instant) -> Option<Duration> {
        self.last_unchoked_at
            .map(|at| now.saturating_duration_since(at))
    }

    /// Bytes transferred since the last review snapshot, given live totals.
    ///
    /// Saturates at zero so a torn read can never go negative.
    pub fn deltas(&self, uploaded: u64, downloaded: u64) -> (u64, u64) {
        (
            uploaded.saturating_sub(self.bytes_uploaded_at_last_review),
            downloaded.saturating_sub(self.bytes_downloaded_at_last_review),
        )
    }

    pub fn snapshot(&mut self, uploaded: u64, downloaded: u64) {
        self.bytes_uploaded_at_last_review = uploaded;
        self.bytes_downloaded_at_last_review = downloaded;
    }

    pub fn reset_rates(&mut self) {
        self.last_review_upload_rate = 0.0;
        self.last_review_download_rate = 0.0;
    }
}
