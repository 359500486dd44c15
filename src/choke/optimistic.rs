use std::net::SocketAddr;
use std::time::Instant;

use rand::Rng;

use super::allocate::{reallocate, SlotBudget};
use super::bucket::Buckets;
use crate::swarm::Swarm;

/// Result of allocating slots around the optimistic unchoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OptimisticOutcome {
    pub budget: SlotBudget,
    /// The peer holding the optimistic slot after this review.
    pub optimistic: Option<SocketAddr>,
    /// Whether a new optimistic peer was drawn this review.
    pub rotated: bool,
}

/// Allocates regular slots, then reserves one for exploration if there is
/// room.
///
/// When `current` is still warming up, or the nascent bucket already fills
/// the slots, allocation uses every slot and no new peer is drawn; `current`
/// stays the optimistic peer either way. Otherwise one slot is held back and
/// a new optimistic peer is drawn from the optimistic-candidate bucket.
///
/// `current` must already be revalidated: connected, not a seeder, unchoked.
pub(crate) fn allocate_with_optimistic<R: Rng + ?Sized>(
    swarm: &mut Swarm,
    buckets: &mut Buckets,
    slots: usize,
    current: Option<SocketAddr>,
    rng: &mut R,
    now: Instant,
) -> OptimisticOutcome {
    let current_warming_up = current.is_some_and(|addr| buckets.nascent.contains(&addr));

    if current_warming_up || buckets.nascent.len() >= slots {
        let budget = reallocate(swarm, buckets, slots, now);
        return OptimisticOutcome {
            budget,
            optimistic: current,
            rotated: false,
        };
    }

    let budget = reallocate(swarm, buckets, slots - 1, now);
    let optimistic = buckets.optimistic.take_weighted(swarm, rng, now);
    if let Some(addr) = optimistic {
        swarm.unchoke(&addr, now);
    }

    OptimisticOutcome {
        budget,
        optimistic,
        rotated: true,
    }
}
