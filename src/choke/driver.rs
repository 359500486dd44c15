use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tracing::trace;

use super::scheduler::Choker;
use crate::swarm::{PieceRequester, Swarm};

/// Handle to a running choker task.
pub struct ChokerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Choker>,
}

impl ChokerHandle {
    /// Stops the task after its current tick and hands the choker back.
    pub async fn shutdown(self) -> Result<Choker, JoinError> {
        let _ = self.shutdown.send(true);
        self.task.await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Ticks `choker` every `tick_interval` on the current tokio runtime.
///
/// The swarm lock is held for the whole tick, so ticks for one torrent never
/// overlap with each other or with connection-layer updates. A late tick is
/// delayed rather than bunched up.
///
/// # Examples
///
/// ```no_run
/// use parking_lot::Mutex;
/// use rchoke::{spawn_choker, Choker, ChokerConfig, NoRequests, Swarm};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let swarm = Arc::new(Mutex::new(Swarm::new()));
/// let choker = Choker::new(ChokerConfig::default())?;
///
/// let handle = spawn_choker(choker, swarm.clone(), NoRequests);
/// // ... torrent runs ...
/// let choker = handle.shutdown().await?;
/// println!("{} reviews", choker.reviews_executed());
/// # Ok(())
/// # }
/// ```
pub fn spawn_choker<R>(mut choker: Choker, swarm: Arc<Mutex<Swarm>>, mut requester: R) -> ChokerHandle
where
    R: PieceRequester + Send + 'static,
{
    let (shutdown, mut stop) = watch::channel(false);
    let period = choker.config().tick_interval;

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = {
                        let mut swarm = swarm.lock();
                        choker.tick(&mut swarm, &mut requester)
                    };
                    trace!("Choker tick: {:?}", outcome);
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        choker
    });

    ChokerHandle { shutdown, task }
}
