use std::net::SocketAddr;
use std::time::Instant;

use tracing::trace;

use super::bucket::{Buckets, PeerBucket};
use crate::swarm::Swarm;

/// What is left to hand out while walking the buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBudget {
    /// Slots not yet filled.
    pub slots: usize,
    /// Choked peers we may still unchoke this review.
    pub new_unchokes: usize,
}

impl SlotBudget {
    /// At most half the slots change hands per review, unless fewer than
    /// half are filled, in which case every open slot may be filled.
    pub fn new(slots: usize, unchoked: usize) -> Self {
        Self {
            slots,
            new_unchokes: (slots / 2).max(slots.saturating_sub(unchoked)),
        }
    }
}

/// Fills up to `slots` slots from the buckets in priority order.
///
/// Already-unchoked peers keep their slot; choked peers are unchoked while
/// the hysteresis budget lasts and skipped otherwise.
pub(crate) fn reallocate(
    swarm: &mut Swarm,
    buckets: &mut Buckets,
    slots: usize,
    now: Instant,
) -> SlotBudget {
    let mut budget = SlotBudget::new(slots, swarm.upload_slots_in_use());
    for bucket in buckets.in_priority_order_mut() {
        if budget.slots == 0 {
            break;
        }
        budget = drain_bucket(swarm, bucket, budget, now);
    }
    budget
}

fn drain_bucket(
    swarm: &mut Swarm,
    bucket: &mut PeerBucket,
    mut budget: SlotBudget,
    now: Instant,
) -> SlotBudget {
    while budget.slots > 0 {
        let Some(addr) = bucket.next_unconsumed() else {
            break;
        };
        let Some(peer) = swarm.peer(&addr) else {
            continue;
        };

        if !peer.is_choked() {
            budget.slots -= 1;
        } else if budget.new_unchokes > 0 {
            swarm.unchoke(&addr, now);
            budget.slots -= 1;
            budget.new_unchokes -= 1;
        }
    }
    budget
}

/// Chokes every unconsumed bucket member except `keep`.
///
/// Returns the number of peers choked.
pub(crate) fn deallocate(swarm: &mut Swarm, buckets: &Buckets, keep: Option<SocketAddr>) -> usize {
    let mut choked = 0;
    for bucket in buckets.in_priority_order() {
        for addr in bucket.remaining() {
            if Some(*addr) == keep {
                continue;
            }
            if swarm.choke(addr).is_some() {
                choked += 1;
            }
        }
    }
    choked
}

/// Fills open slots without a review.
///
/// Draws interested, choked peers from the previous review's buckets first,
/// then from `choked_interested` (this tick's scan). Returns the number of
/// peers unchoked.
pub(crate) fn allocate_fast(
    swarm: &mut Swarm,
    buckets: &Buckets,
    choked_interested: &[SocketAddr],
    slots: usize,
    already_unchoked: usize,
    now: Instant,
) -> usize {
    let available = slots.saturating_sub(already_unchoked);
    if available == 0 {
        return 0;
    }

    let mut unchoked = 0;
    for bucket in buckets.in_priority_order() {
        while unchoked < available {
            let Some(addr) = bucket.first_interested_choked(swarm) else {
                break;
            };
            swarm.unchoke(&addr, now);
            unchoked += 1;
        }
    }

    for addr in choked_interested {
        if unchoked == available {
            break;
        }
        let eligible = swarm.peer(addr).is_some_and(|peer| {
            peer.is_connected() && !peer.is_seeder && peer.is_interested() && peer.is_choked()
        });
        if eligible && swarm.unchoke(addr, now) {
            unchoked += 1;
        }
    }

    trace!("Fast allocation filled {} of {} open slots", unchoked, available);
    unchoked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerConnection;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([10, 10, 0, 1], port))
    }

    fn interested(port: u16) -> PeerConnection {
        let mut peer = PeerConnection::new(addr(port));
        peer.set_peer_interested(true);
        peer
    }

    #[test]
    fn test_hysteresis_budget() {
        assert_eq!(SlotBudget::new(10, 8).new_unchokes, 5);
        assert_eq!(SlotBudget::new(10, 2).new_unchokes, 8);
        assert_eq!(SlotBudget::new(10, 12).new_unchokes, 5);
        assert_eq!(SlotBudget::new(1, 1).new_unchokes, 0);
        assert_eq!(SlotBudget::new(1, 0).new_unchokes, 1);
        assert_eq!(SlotBudget::new(0, 0).new_unchokes, 0);
    }

    #[test]
    fn test_reallocate_retains_then_unchokes_in_priority_order() {
        let now = Instant::now();
        let mut swarm = Swarm::new();
        for port in 1..=4 {
            swarm.add_peer(interested(port));
        }
        swarm.unchoke(&addr(1), now);

        let mut buckets = Buckets::default();
        buckets.nascent.push(addr(1));
        buckets.candidates.push(addr(2));
        buckets.candidates.push(addr(3));
        buckets.optimistic.push(addr(4));

        // 3 slots, 1 filled: up to 2 new unchokes
        let budget = reallocate(&mut swarm, &mut buckets, 3, now);
        assert_eq!(budget, SlotBudget { slots: 0, new_unchokes: 0 });
        assert!(!swarm.peer(&addr(2)).unwrap().is_choked());
        assert!(!swarm.peer(&addr(3)).unwrap().is_choked());
        assert!(swarm.peer(&addr(4)).unwrap().is_choked());
        assert_eq!(buckets.optimistic.remaining(), &[addr(4)]);
    }

    #[test]
    fn test_reallocate_skips_choked_when_budget_spent() {
        let now = Instant::now();
        let mut swarm = Swarm::new();
        for port in 1..=4 {
            swarm.add_peer(interested(port));
        }
        swarm.unchoke(&addr(3), now);
        swarm.unchoke(&addr(4), now);

        let mut buckets = Buckets::default();
        for port in 1..=4 {
            buckets.candidates.push(addr(port));
        }

        // 2 slots, 2 filled: only one slot may change hands
        let budget = reallocate(&mut swarm, &mut buckets, 2, now);
        assert_eq!(budget.slots, 0);
        assert!(!swarm.peer(&addr(1)).unwrap().is_choked());
        assert!(swarm.peer(&addr(2)).unwrap().is_choked());
        assert!(!swarm.peer(&addr(3)).unwrap().is_choked());
        assert_eq!(buckets.candidates.remaining(), &[addr(4)]);

        let choked = deallocate(&mut swarm, &buckets, None);
        assert_eq!(choked, 1);
        assert!(swarm.peer(&addr(4)).unwrap().is_choked());
        assert_eq!(swarm.upload_slots_in_use(), 2);
    }

    #[test]
    fn test_deallocate_spares_optimistic_peer() {
        let now = Instant::now();
        let mut swarm = Swarm::new();
        swarm.add_peer(interested(1));
        swarm.add_peer(interested(2));
        swarm.unchoke(&addr(1), now);
        swarm.unchoke(&addr(2), now);

        let mut buckets = Buckets::default();
        buckets.optimistic.push(addr(1));
        buckets.optimistic.push(addr(2));

        assert_eq!(deallocate(&mut swarm, &buckets, Some(addr(2))), 1);
        assert!(swarm.peer(&addr(1)).unwrap().is_choked());
        assert!(!swarm.peer(&addr(2)).unwrap().is_choked());
    }

    #[test]
    fn test_allocate_fast_uses_buckets_then_scan() {
        let now = Instant::now();
        let mut swarm = Swarm::new();
        for port in 1..=5 {
            swarm.add_peer(interested(port));
        }

        let mut buckets = Buckets::default();
        buckets.candidates.push(addr(3));

        let scanned = [addr(1), addr(2), addr(3), addr(4), addr(5)];
        let unchoked = allocate_fast(&mut swarm, &buckets, &scanned, 4, 1, now);
        assert_eq!(unchoked, 3);

        let open: Vec<_> = swarm.peers().filter(|p| !p.is_choked()).map(|p| p.addr.port()).collect();
        assert_eq!(open, vec![1, 2, 3]);
    }

    #[test]
    fn test_allocate_fast_noop_when_full() {
        let now = Instant::now();
        let mut swarm = Swarm::new();
        swarm.add_peer(interested(1));
        let unchoked = allocate_fast(&mut swarm, &Buckets::default(), &[addr(1)], 2, 2, now);
        assert_eq!(unchoked, 0);
        assert!(swarm.peer(&addr(1)).unwrap().is_choked());
    }
}
