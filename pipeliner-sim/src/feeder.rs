use std::{sync::Arc, time::Duration};

use pipeliner_core::{NodeId, Pipeline, Rejected, TaskId, TaskType};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    sync::{Mutex, RwLock},
    time::sleep,
};
use tracing::{error, info, warn};

use crate::{
    rejection_tracker::RejectionTracker,
    shutdown::{shutdown_manager::Shutdown, shutdown_reason::ShutdownReason},
};

/// Offer one random task to the board.
pub fn feed_once<R: Rng>(pipeline: &mut Pipeline, rng: &mut R) -> Result<(NodeId, TaskId), Rejected> {
    let task_type = TaskType::ALL[rng.gen_range(0..TaskType::ALL.len())];
    let task = pipeline.create_task(task_type);
    pipeline.dispatch(task)
}

/// Linear backoff after `failures` refusals in a row.
fn backoff(feed_interval: Duration, failures: usize) -> Duration {
    feed_interval.saturating_mul(u32::try_from(failures).unwrap_or(u32::MAX))
}

pub async fn start_feeder_fiber(
    pipeline: Arc<Mutex<Pipeline>>,
    feed_interval: Duration,
    seed: u64,
    max_rejection_tolerance: usize,
    rejections: Arc<RwLock<RejectionTracker>>,
    shutdown: Arc<Shutdown<ShutdownReason>>,
) {
    let finalizer_shutdown = shutdown.clone();
    let fiber = tokio::spawn(async move {
        let mut rng = StdRng::seed_from_u64(seed);
        loop {
            sleep(feed_interval).await;

            let fed = {
                let mut pipeline = pipeline.lock().await;
                feed_once(&mut pipeline, &mut rng)
            };

            match fed {
                Ok((node, task)) => {
                    info!("Fed {} to {}", task, node);
                    let mut tracker = rejections.write().await;
                    tracker.feeder.clear();
                }
                Err(rejected) => {
                    warn!("No room for new work: {}", rejected);

                    let (should_shutdown, delay) = {
                        let mut tracker = rejections.write().await;
                        tracker.feeder.push(rejected.reason);

                        let delay = backoff(feed_interval, tracker.feeder.len());
                        if tracker.feeder.len() > max_rejection_tolerance {
                            (Some(tracker.clone()), delay)
                        } else {
                            (None, delay)
                        }
                    };

                    if let Some(tracker) = should_shutdown {
                        error!("Reached max rejection tolerance, shutting down");

                        tokio::spawn(async move {
                            shutdown.trigger(ShutdownReason::Stalled(tracker)).await;
                        });

                        break;
                    }

                    sleep(delay).await;
                }
            }
        }
    });

    finalizer_shutdown
        .register_shutdown_task(
            move || {
                Box::pin(async move {
                    fiber.abort();
                    info!("Aborted feeder fiber");
                    let exit = fiber.await;
                    info!("feeder exited: {:?}", exit);
                })
            },
            "feeder",
        )
        .await;
}
