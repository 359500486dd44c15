use std::net::SocketAddr;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use super::allocate::{allocate_fast, deallocate};
use super::bucket::{Buckets, RateKey};
use super::classify::{classify, ReviewContext};
use super::optimistic::allocate_with_optimistic;
use super::ratio::{rank_by_ratio, RatioRanking};
use crate::config::{ChokerConfig, ConfigError, Strategy};
use crate::swarm::{PieceRequester, Swarm};

/// Why a tick ran a full review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewTrigger {
    /// The first tick of the torrent.
    FirstTick,
    /// The torrent just finished downloading.
    StartedSeeding,
    /// The review interval elapsed and the torrent is not near its rate cap.
    Due,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A full review ran.
    Review(ReviewTrigger),
    /// Every interested peer fit in the slots and was unchoked directly.
    CapacitySufficient { unchoked: usize },
    /// Open slots were filled from the previous review's buckets.
    FastAllocation { unchoked: usize },
}

/// Counts from one tit-for-tat review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSummary {
    pub nascent: usize,
    pub candidates: usize,
    pub optimistic_candidates: usize,
    /// Peers choked by the deallocation pass.
    pub choked: usize,
    pub optimistic: Option<SocketAddr>,
}

/// Interest and choke counts gathered at the start of a tick.
#[derive(Debug, Default)]
struct Scan {
    interested: usize,
    already_unchoked: usize,
    choked_interested: Vec<SocketAddr>,
}

/// The upload slot scheduler for one torrent.
///
/// Drive it with [`Choker::tick`] at a fixed cadence (see
/// [`spawn_choker`](crate::spawn_choker)). Each tick either runs a full
/// review, which classifies peers into buckets, allocates slots with
/// hysteresis and rotates the optimistic unchoke, or takes a cheap path
/// that only fills open slots.
///
/// # Examples
///
/// ```
/// use rchoke::{Choker, ChokerConfig, NoRequests, Swarm, TickOutcome, ReviewTrigger};
/// use rchoke::peer::PeerConnection;
///
/// let mut swarm = Swarm::new();
/// let mut peer = PeerConnection::new("10.0.0.2:6881".parse().unwrap());
/// peer.set_peer_interested(true);
/// swarm.add_peer(peer);
///
/// let mut choker = Choker::new(ChokerConfig::default().with_rng_seed(1)).unwrap();
/// let outcome = choker.tick(&mut swarm, &mut NoRequests);
///
/// assert_eq!(outcome, TickOutcome::Review(ReviewTrigger::FirstTick));
/// assert_eq!(swarm.upload_slots_in_use(), 1);
/// ```
pub struct Choker {
    config: ChokerConfig,
    last_review_at: Instant,
    reviews_executed: u64,
    is_downloading: bool,
    first_call: bool,
    optimistic_peer: Option<SocketAddr>,
    buckets: Buckets,
    rng: StdRng,
}

impl Choker {
    pub fn new(config: ChokerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            config,
            last_review_at: Instant::now(),
            reviews_executed: 0,
            is_downloading: false,
            first_call: true,
            optimistic_peer: None,
            buckets: Buckets::default(),
            rng,
        })
    }

    pub fn config(&self) -> &ChokerConfig {
        &self.config
    }

    /// Number of full reviews run so far.
    pub fn reviews_executed(&self) -> u64 {
        self.reviews_executed
    }

    /// The peer holding the optimistic unchoke slot, if any.
    pub fn optimistic_peer(&self) -> Option<SocketAddr> {
        self.optimistic_peer
    }

    pub fn is_downloading(&self) -> bool {
        self.is_downloading
    }

    pub fn last_review_at(&self) -> Instant {
        self.last_review_at
    }

    /// The buckets as the last review left them.
    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// Drops every reference to a peer that left the swarm.
    pub fn forget_peer(&mut self, addr: &SocketAddr) {
        if self.optimistic_peer.as_ref() == Some(addr) {
            self.optimistic_peer = None;
        }
        self.buckets.forget(addr);
    }

    pub fn tick<R: PieceRequester + ?Sized>(
        &mut self,
        swarm: &mut Swarm,
        requester: &mut R,
    ) -> TickOutcome {
        self.tick_at(swarm, requester, Instant::now())
    }

    /// Runs one scheduling tick at `now`.
    pub fn tick_at<R: PieceRequester + ?Sized>(
        &mut self,
        swarm: &mut Swarm,
        requester: &mut R,
        now: Instant,
    ) -> TickOutcome {
        let scan = scan(swarm, requester);
        let complete = swarm.is_complete();

        if self.first_call {
            self.first_call = false;
            self.is_downloading = !complete;
            self.run_review(swarm, now);
            return TickOutcome::Review(ReviewTrigger::FirstTick);
        }

        if self.is_downloading && complete {
            self.is_downloading = false;
            info!("Torrent complete, switching choker to seeding");
            self.run_review(swarm, now);
            return TickOutcome::Review(ReviewTrigger::StartedSeeding);
        }
        if !self.is_downloading && !complete {
            self.is_downloading = true;
        }

        if scan.interested <= self.config.upload_slots {
            let mut unchoked = 0;
            for addr in &scan.choked_interested {
                if swarm.unchoke(addr, now) {
                    unchoked += 1;
                }
            }
            return TickOutcome::CapacitySufficient { unchoked };
        }

        if self.review_due(swarm, now) {
            self.run_review(swarm, now);
            return TickOutcome::Review(ReviewTrigger::Due);
        }

        let unchoked = allocate_fast(
            swarm,
            &self.buckets,
            &scan.choked_interested,
            self.config.upload_slots,
            scan.already_unchoked,
            now,
        );
        debug!(
            "No review due; fast allocation unchoked {} ({} interested, {} already unchoked)",
            unchoked, scan.interested, scan.already_unchoked
        );
        TickOutcome::FastAllocation { unchoked }
    }

    fn review_due(&self, swarm: &Swarm, now: Instant) -> bool {
        self.config.reviews_enabled()
            && now.saturating_duration_since(self.last_review_at)
                >= self.config.min_time_between_reviews
            && !self.near_rate_cap(swarm, now)
    }

    /// True while the torrent runs close enough to its configured maximum
    /// rate that reshuffling slots is not worth it.
    fn near_rate_cap(&self, swarm: &Swarm, now: Instant) -> bool {
        let (max_rate, current) = if self.is_downloading {
            (
                self.config.max_download_rate,
                swarm.transfer().download_rate_at(now),
            )
        } else {
            (
                self.config.max_upload_rate,
                swarm.transfer().upload_rate_at(now),
            )
        };
        let threshold =
            max_rate as f64 * f64::from(self.config.percent_of_max_rate_to_skip_review) / 100.0;
        max_rate > 0 && current >= threshold
    }

    fn run_review(&mut self, swarm: &mut Swarm, now: Instant) {
        match self.config.strategy {
            Strategy::TitForTat => {
                self.review_at(swarm, now);
            }
            Strategy::Ratio => {
                self.review_by_ratio_at(swarm, now);
            }
        }
    }

    pub fn review(&mut self, swarm: &mut Swarm) -> ReviewSummary {
        self.review_at(swarm, Instant::now())
    }

    /// Runs a full tit-for-tat review at `now`, whatever the tick gating says.
    pub fn review_at(&mut self, swarm: &mut Swarm, now: Instant) -> ReviewSummary {
        let since_last_review = now.saturating_duration_since(self.last_review_at);
        self.last_review_at = now;
        self.reviews_executed += 1;

        let seeding = swarm.is_seeding();
        self.optimistic_peer = self.optimistic_peer.filter(|addr| {
            swarm.peer(addr).is_some_and(|peer| {
                peer.is_connected() && !peer.is_seeder && !peer.is_choked()
            })
        });

        let ctx = ReviewContext {
            now,
            since_last_review,
            min_time_between_reviews: self.config.min_time_between_reviews,
            seeding,
        };
        classify(swarm, &mut self.buckets, &ctx);
        self.buckets.sort_by_rate(swarm, RateKey::for_torrent(seeding));

        let outcome = allocate_with_optimistic(
            swarm,
            &mut self.buckets,
            self.config.upload_slots,
            self.optimistic_peer,
            &mut self.rng,
            now,
        );
        self.optimistic_peer = outcome.optimistic;

        let choked = deallocate(swarm, &self.buckets, self.optimistic_peer);

        let summary = ReviewSummary {
            nascent: self.buckets.nascent.len(),
            candidates: self.buckets.candidates.len(),
            optimistic_candidates: self.buckets.optimistic.len(),
            choked,
            optimistic: self.optimistic_peer,
        };
        debug!(
            "Review #{}: {} nascent, {} candidates, {} optimistic candidates; \
             {} slots left, {} choked, optimistic {:?}{}",
            self.reviews_executed,
            summary.nascent,
            summary.candidates,
            summary.optimistic_candidates,
            outcome.budget.slots,
            choked,
            summary.optimistic,
            if outcome.rotated { "" } else { " (kept)" }
        );
        summary
    }

    pub fn review_by_ratio(&mut self, swarm: &mut Swarm) -> Option<RatioRanking> {
        self.review_by_ratio_at(swarm, Instant::now())
    }

    /// Runs a ratio-ranked review at `now`.
    ///
    /// While seeding this is a plain [`Choker::review_at`] and returns `None`.
    pub fn review_by_ratio_at(&mut self, swarm: &mut Swarm, now: Instant) -> Option<RatioRanking> {
        if swarm.is_seeding() {
            self.review_at(swarm, now);
            return None;
        }

        self.last_review_at = now;
        self.reviews_executed += 1;
        self.buckets.clear();
        self.optimistic_peer = None;

        let ranking = rank_by_ratio(swarm, self.config.max_upload_rate, now);
        debug!(
            "Ratio review #{}: {} unchoked, {} B/s committed",
            self.reviews_executed,
            ranking.unchoked.len(),
            ranking.committed
        );
        Some(ranking)
    }
}

/// Queues requests for peers we want data from, chokes peers that no longer
/// want any, and counts the rest.
fn scan<R: PieceRequester + ?Sized>(swarm: &mut Swarm, requester: &mut R) -> Scan {
    let mut scan = Scan::default();

    for addr in swarm.addrs() {
        let Some(peer) = swarm.peer_mut(&addr) else {
            continue;
        };
        if !peer.is_connected() {
            // A dropped connection must not keep holding a slot.
            if !peer.is_choked() {
                swarm.choke(&addr);
            }
            continue;
        }
        if peer.choking.am_interested {
            requester.queue_requests(peer);
        }

        let (is_seeder, interested, choked) =
            (peer.is_seeder, peer.is_interested(), peer.is_choked());

        // Seeders never download; neither do uninterested peers.
        if is_seeder || !interested {
            if !choked {
                swarm.choke(&addr);
            }
            continue;
        }

        scan.interested += 1;
        if choked {
            scan.choked_interested.push(addr);
        } else {
            scan.already_unchoked += 1;
        }
    }

    scan
}
