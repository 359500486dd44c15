use std::time::{Duration, Instant};

use super::bucket::Buckets;
use crate::peer::PeerConnection;
use crate::swarm::Swarm;

/// Inputs shared by every peer in one review.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReviewContext {
    pub now: Instant,
    pub since_last_review: Duration,
    pub min_time_between_reviews: Duration,
    pub seeding: bool,
}

/// Which bucket a peer lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PeerClass {
    Nascent,
    Candidate,
    OptimisticCandidate,
}

/// Rebuilds the buckets from the swarm's connected, non-seeding peers.
///
/// Every classified peer gets its per-period rates recomputed and its byte
/// snapshot advanced exactly once.
pub(crate) fn classify(swarm: &mut Swarm, buckets: &mut Buckets, ctx: &ReviewContext) {
    buckets.clear();

    for peer in swarm.peers_mut() {
        if !peer.is_connected() || peer.is_seeder {
            continue;
        }
        match classify_peer(peer, ctx) {
            Some(PeerClass::Nascent) => buckets.nascent.push(peer.addr),
            Some(PeerClass::Candidate) => buckets.candidates.push(peer.addr),
            Some(PeerClass::OptimisticCandidate) => buckets.optimistic.push(peer.addr),
            None => {}
        }
    }
}

pub(crate) fn classify_peer(peer: &mut PeerConnection, ctx: &ReviewContext) -> Option<PeerClass> {
    let uploaded = peer.transfer.uploaded();
    let downloaded = peer.transfer.downloaded();
    let (sent, received) = peer.review.deltas(uploaded, downloaded);
    let transferred = if ctx.seeding { sent } else { received };
    let elapsed = ctx.since_last_review;

    peer.review.reset_rates();

    let unchoked = !peer.is_choked();
    // Unchoked without a timestamp means someone else unchoked it long ago.
    let warmed_up = peer
        .review
        .unchoked_for(ctx.now)
        .map_or(true, |d| d >= ctx.min_time_between_reviews);

    let class = if unchoked && (!warmed_up || (peer.review.first_review_period && transferred > 0))
    {
        Some(PeerClass::Nascent)
    } else if unchoked && transferred > 0 {
        peer.review.last_review_upload_rate = per_second(sent, elapsed);
        peer.review.last_review_download_rate = per_second(received, elapsed);
        Some(PeerClass::Candidate)
    } else if !ctx.seeding && !unchoked && peer.is_interested() && received > 0 {
        // The peer unchoked us on its own; credit at least its current rate.
        peer.review.last_review_upload_rate = per_second(sent, elapsed);
        peer.review.last_review_download_rate = per_second(received, elapsed)
            .max(peer.transfer.download_rate_at(ctx.now));
        Some(PeerClass::Candidate)
    } else if peer.is_interested() {
        Some(PeerClass::OptimisticCandidate)
    } else {
        None
    };

    peer.review.snapshot(uploaded, downloaded);
    if unchoked && warmed_up {
        peer.review.first_review_period = false;
    }

    class
}

fn per_second(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    const MIN_REVIEW: Duration = Duration::from_secs(30);

    fn peer(port: u16) -> PeerConnection {
        let mut peer = PeerConnection::new(SocketAddr::from(([172, 16, 0, 1], port)));
        peer.set_peer_interested(true);
        peer
    }

    fn ctx(now: Instant, seeding: bool) -> ReviewContext {
        ReviewContext {
            now,
            since_last_review: Duration::from_secs(10),
            min_time_between_reviews: MIN_REVIEW,
            seeding,
        }
    }

    #[test]
    fn test_recently_unchoked_is_nascent() {
        let start = Instant::now();
        let mut p = peer(1);
        p.unchoke(start);
        p.transfer.record_download_at(start, 5000);

        let class = classify_peer(&mut p, &ctx(start + Duration::from_secs(10), false));
        assert_eq!(class, Some(PeerClass::Nascent));
        assert_eq!(p.review.last_review_download_rate, 0.0);
        // still inside its warm-up
        assert!(p.review.first_review_period);
    }

    #[test]
    fn test_first_period_with_traffic_is_nascent() {
        let start = Instant::now();
        let mut p = peer(1);
        p.unchoke(start);
        p.transfer.record_download_at(start, 5000);

        let class = classify_peer(&mut p, &ctx(start + Duration::from_secs(40), false));
        assert_eq!(class, Some(PeerClass::Nascent));
        // warmed up now, so the next review judges it
        assert!(!p.review.first_review_period);
    }

    #[test]
    fn test_proven_peer_is_candidate_with_rates() {
        let start = Instant::now();
        let mut p = peer(1);
        p.unchoke(start);
        p.review.first_review_period = false;
        p.transfer.record_download_at(start, 5000);
        p.transfer.record_upload_at(start, 2000);

        let class = classify_peer(&mut p, &ctx(start + Duration::from_secs(40), false));
        assert_eq!(class, Some(PeerClass::Candidate));
        assert!((p.review.last_review_download_rate - 500.0).abs() < 1e-9);
        assert!((p.review.last_review_upload_rate - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_seeding_judges_upload_bytes() {
        let start = Instant::now();
        let mut p = peer(1);
        p.unchoke(start);
        p.review.first_review_period = false;
        p.transfer.record_download_at(start, 5000);

        let now = start + Duration::from_secs(40);
        // nothing sent: judged as idle while seeding
        assert_eq!(
            classify_peer(&mut p, &ctx(now, true)),
            Some(PeerClass::OptimisticCandidate)
        );
    }

    #[test]
    fn test_reciprocating_peer_credited_with_best_rate() {
        let start = Instant::now();
        let mut p = peer(1);
        // 10 KiB arrived just now: the 5 s window rate beats the 10 s average
        p.transfer.record_download_at(start, 10_240);

        let class = classify_peer(&mut p, &ctx(start, false));
        assert_eq!(class, Some(PeerClass::Candidate));
        assert!((p.review.last_review_download_rate - 2048.0).abs() < 1e-9);
    }

    #[test]
    fn test_reciprocation_ignored_while_seeding() {
        let start = Instant::now();
        let mut p = peer(1);
        p.transfer.record_download_at(start, 10_240);

        assert_eq!(
            classify_peer(&mut p, &ctx(start, true)),
            Some(PeerClass::OptimisticCandidate)
        );
    }

    #[test]
    fn test_uninterested_choked_peer_is_excluded() {
        let mut p = peer(1);
        p.set_peer_interested(false);
        assert_eq!(classify_peer(&mut p, &ctx(Instant::now(), false)), None);
    }

    #[test]
    fn test_snapshot_prevents_double_counting() {
        let start = Instant::now();
        let mut p = peer(1);
        p.unchoke(start);
        p.review.first_review_period = false;
        p.transfer.record_download_at(start, 5000);

        let now = start + Duration::from_secs(40);
        assert_eq!(classify_peer(&mut p, &ctx(now, false)), Some(PeerClass::Candidate));
        assert_eq!(p.review.bytes_downloaded_at_last_review, 5000);

        // no new bytes: the same 5000 must not be credited again
        assert_eq!(
            classify_peer(&mut p, &ctx(now + Duration::from_secs(10), false)),
            Some(PeerClass::OptimisticCandidate)
        );
        assert_eq!(p.review.last_review_download_rate, 0.0);
    }

    #[test]
    fn test_zero_elapsed_gives_zero_rate() {
        let start = Instant::now();
        let mut p = peer(1);
        p.unchoke(start);
        p.review.first_review_period = false;
        p.transfer.record_download_at(start, 5000);

        let mut zero = ctx(start + Duration::from_secs(40), false);
        zero.since_last_review = Duration::ZERO;
        assert_eq!(classify_peer(&mut p, &zero), Some(PeerClass::Candidate));
        assert_eq!(p.review.last_review_download_rate, 0.0);
        assert!(p.review.last_review_download_rate.is_finite());
    }

    #[test]
    fn test_classify_skips_seeders_and_disconnected() {
        let mut swarm = Swarm::new();
        let mut seeder = peer(1);
        seeder.is_seeder = true;
        let mut gone = peer(2);
        gone.disconnect();
        swarm.add_peer(seeder);
        swarm.add_peer(gone);
        swarm.add_peer(peer(3));

        let mut buckets = Buckets::default();
        classify(&mut swarm, &mut buckets, &ctx(Instant::now(), false));

        assert!(buckets.nascent.is_empty());
        assert!(buckets.candidates.is_empty());
        assert_eq!(buckets.optimistic.len(), 1);
    }
}
