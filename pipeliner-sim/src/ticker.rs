use std::{sync::Arc, time::Duration};

use futures_util::StreamExt;
use pipeliner_core::{Node, Pipeline, Task};
use tokio::{
    sync::{Mutex, RwLock},
    time::interval,
};
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};

use crate::{
    board,
    rejection_tracker::RejectionTracker,
    shutdown::{shutdown_manager::Shutdown, shutdown_reason::ShutdownReason},
};

#[derive(Debug, Default, PartialEq)]
pub struct TickOutcome {
    pub completed: usize,
    pub failed: usize,
    pub requeued: usize,
    pub dropped: usize,
    // Days worked by the node that is furthest behind.
    pub days: u32,
}

/// One tick of the board: update every node, then put tasks released at the
/// end of a working day back on the board.
pub fn advance(pipeline: &mut Pipeline, hours: f32, rejections: &mut RejectionTracker) -> TickOutcome {
    let report = pipeline.tick(hours);
    let mut outcome = TickOutcome::default();

    for (node, task) in report.completed() {
        info!("{} finished {}", node, task);
        outcome.completed += 1;
    }
    for (node, task) in report.failed() {
        warn!("{} failed {}", node, task);
        outcome.failed += 1;
    }
    let day_ended = report.days_ended().count() > 0;

    let (requeued, dropped) = requeue(pipeline, report.into_released(), rejections);
    outcome.requeued = requeued;
    outcome.dropped = dropped;

    if day_ended {
        info!("End of a working day\n{}", board::render(pipeline));
    }

    outcome.days = pipeline.nodes().map(Node::days_worked).min().unwrap_or(0);
    outcome
}

/// Put released tasks back on the board. Returns how many were placed and
/// how many found no node.
pub fn requeue(pipeline: &mut Pipeline, released: Vec<Task>, rejections: &mut RejectionTracker) -> (usize, usize) {
    let (mut requeued, mut dropped) = (0, 0);
    for task in released {
        match pipeline.dispatch(task) {
            Ok((node, task)) => {
                info!("Requeued {} on {}", task, node);
                rejections.requeue.clear();
                requeued += 1;
            }
            Err(rejected) => {
                warn!("Dropping released work: {}", rejected);
                rejections.requeue.push(rejected.reason);
                if rejections.requeue.len() > 1 {
                    warn!("{} released tasks in a row found no node", rejections.requeue.len());
                }
                dropped += 1;
            }
        }
    }
    (requeued, dropped)
}

pub async fn start_ticker_fiber(
    pipeline: Arc<Mutex<Pipeline>>,
    tick_interval: Duration,
    hours_per_tick: f32,
    max_days: u32,
    rejections: Arc<RwLock<RejectionTracker>>,
    shutdown: Arc<Shutdown<ShutdownReason>>,
) {
    let finalizer_shutdown = shutdown.clone();
    let fiber = tokio::spawn(async move {
        let mut ticks = IntervalStream::new(interval(tick_interval));
        while ticks.next().await.is_some() {
            let outcome = {
                let mut pipeline = pipeline.lock().await;
                let mut rejections = rejections.write().await;
                advance(&mut pipeline, hours_per_tick, &mut rejections)
            };

            debug!(
                "Tick: {} completed, {} failed, {} requeued, {} dropped",
                outcome.completed, outcome.failed, outcome.requeued, outcome.dropped
            );

            if outcome.days >= max_days {
                info!("Every node worked {} days, shutting down", outcome.days);

                tokio::spawn(async move {
                    shutdown
                        .trigger(ShutdownReason::Done { days: outcome.days })
                        .await;
                });

                break;
            }
        }
    });

    finalizer_shutdown
        .register_shutdown_task(
            move || {
                Box::pin(async move {
                    fiber.abort();
                    info!("Aborted ticker fiber");
                    let exit = fiber.await;
                    info!("ticker exited: {:?}", exit);
                })
            },
            "ticker",
        )
        .await;
}
