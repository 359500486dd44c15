//! Choking constants and tuning parameters.
//!
//! These are defaults, not protocol requirements. Every value that a torrent
//! may want to tune is also exposed through [`ChokerConfig`](crate::ChokerConfig).

use std::time::Duration;

// ============================================================================
// Upload slots
// ============================================================================

/// Upload slots per torrent (qBittorrent: 4, libtorrent: 8)
/// One of these is reserved for the optimistic unchoke when there is room.
pub const DEFAULT_UPLOAD_SLOTS: usize = 4;

// ============================================================================
// Reviews
// ============================================================================

/// Minimum time between two full choke reviews.
/// A peer must stay unchoked at least this long before it is judged.
pub const MIN_TIME_BETWEEN_REVIEWS: Duration = Duration::from_secs(30);

/// Skip a review while the torrent runs at or above this share of its
/// configured maximum rate (download while leeching, upload while seeding)
pub const PERCENT_OF_MAX_RATE_TO_SKIP_REVIEW: u8 = 90;

/// Cadence of the periodic choker tick
pub const CHOKING_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// Optimistic unchoke
// ============================================================================

/// Upper bound on the "not recently tried" weight of an optimistic candidate,
/// in seconds since it was last unchoked
pub const OPTIMISTIC_WEIGHT_CAP_SECS: u64 = 300;

// ============================================================================
// Rate measurement
// ============================================================================

/// Sliding window used by rate monitors
pub const RATE_CALC_WINDOW: Duration = Duration::from_secs(5);

/// Samples older than this many windows are dropped outright
pub const RATE_SAMPLE_RETENTION: u32 = 2;

// ============================================================================
// Fast extension (BEP-6)
// ============================================================================

/// Number of pieces in an allowed-fast set
pub const ALLOWED_FAST_SET_SIZE: usize = 10;
