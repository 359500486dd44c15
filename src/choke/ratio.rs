use std::cmp::Ordering;
use std::net::SocketAddr;
use std::time::Instant;

use crate::swarm::Swarm;

/// Peers whose choke state the ratio ranking settled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatioRanking {
    /// Peers holding an upload slot, best ratio first.
    pub unchoked: Vec<SocketAddr>,
    /// Upload bandwidth committed to them, in bytes/sec.
    pub committed: u64,
}

/// Bytes received per byte sent. A peer we never sent to counts as if we
/// had sent it one byte.
pub(crate) fn efficiency(received: u64, sent: u64) -> f64 {
    received as f64 / sent.max(1) as f64
}

/// Ranks every connected peer by ratio and unchokes interested peers, best
/// first, until the upload budget is spent.
///
/// A peer is admitted while the bandwidth already committed is below
/// `max_upload_rate`, so the last admitted peer may overshoot it. A zero
/// budget is unlimited. Seeders and uninterested peers are choked.
pub(crate) fn rank_by_ratio(swarm: &mut Swarm, max_upload_rate: u64, now: Instant) -> RatioRanking {
    let mut ranked: Vec<(SocketAddr, f64)> = Vec::with_capacity(swarm.len());
    for peer in swarm.peers_mut() {
        if !peer.is_connected() {
            continue;
        }
        peer.review.ratio = efficiency(peer.transfer.downloaded(), peer.transfer.uploaded());
        ranked.push((peer.addr, peer.review.ratio));
    }
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut ranking = RatioRanking::default();
    for (addr, _) in ranked {
        let Some(peer) = swarm.peer(&addr) else {
            continue;
        };
        let within_budget = max_upload_rate == 0 || ranking.committed < max_upload_rate;

        if within_budget && !peer.is_seeder && peer.is_interested() {
            ranking.committed = ranking
                .committed
                .saturating_add(peer.review.upload_rate_for_recip);
            swarm.unchoke(&addr, now);
            ranking.unchoked.push(addr);
        } else {
            swarm.choke(&addr);
        }
    }
    ranking
}
