use std::sync::Arc;

use pipeliner_core::{EngineError, FixedChance, Pipeline, PipelineConfig};
use tokio::sync::{oneshot::error::RecvError, Mutex, RwLock};
use tracing::{info, warn};

use crate::{
  board,
  config::SimConfig,
  feeder::start_feeder_fiber,
  rejection_tracker::RejectionTracker,
  scenario,
  shutdown::{shutdown_manager::ShutdownManager, shutdown_reason::ShutdownReason},
  supervisor::start_supervisor_fiber,
  ticker::start_ticker_fiber,
};

pub struct Simulation {
  pipeline: Arc<Mutex<Pipeline>>,
  shutdown: ShutdownManager<ShutdownReason>,
}

impl Simulation {
  pub async fn new(config: SimConfig) -> Result<Self, EngineError> {
    info!("Starting simulation with config: {:?}", config);

    let mut pipeline = Pipeline::with_policy(
      PipelineConfig {
        seed: Some(config.seed),
      },
      FixedChance(config.failure_chance),
    );
    let nodes = scenario::prototype(&mut pipeline, config.day_end_policy)?;
    info!("Built a board with {} nodes\n{}", nodes.len(), board::render(&pipeline));

    let pipeline = Arc::new(Mutex::new(pipeline));
    let shutdown_manager = ShutdownManager::new();
    let rejections = Arc::new(RwLock::new(RejectionTracker::default()));

    start_ticker_fiber(
      pipeline.clone(),
      config.tick_interval,
      config.hours_per_tick,
      config.max_days,
      rejections.clone(),
      shutdown_manager.shutdown.clone(),
    )
    .await;

    start_feeder_fiber(
      pipeline.clone(),
      config.feed_interval,
      config.seed.wrapping_add(1),
      config.max_rejection_tolerance,
      rejections.clone(),
      shutdown_manager.shutdown.clone(),
    )
    .await;

    start_supervisor_fiber(
      pipeline.clone(),
      config.review_interval,
      config.reject_chance,
      config.seed.wrapping_add(2),
      shutdown_manager.shutdown.clone(),
    )
    .await;

    let shutdown = shutdown_manager.shutdown.clone();
    let interrupt_handle = tokio::spawn(async move {
      match tokio::signal::ctrl_c().await {
        Ok(()) => {
          if shutdown.is_triggered().await {
            info!("Received ctrl-c, already shutting down");
            return;
          }
          info!("Received ctrl-c");
          tokio::spawn(async move {
            shutdown.trigger(ShutdownReason::Interrupted).await;
          });
        }
        Err(err) => warn!("Cannot listen for ctrl-c: {}", err),
      }
    });

    shutdown_manager
      .shutdown
      .register_shutdown_task(
        || {
          Box::pin(async move {
            interrupt_handle.abort();
          })
        },
        "ctrl-c listener",
      )
      .await;

    Ok(Simulation {
      pipeline,
      shutdown: shutdown_manager,
    })
  }

  pub fn pipeline(&self) -> Arc<Mutex<Pipeline>> {
    self.pipeline.clone()
  }

  /// Wait for one of the fibers to end the run, then log the final board.
  pub async fn await_shutdown(self) -> Result<ShutdownReason, RecvError> {
    let reason = self.shutdown.await_shutdown().await?;
    let pipeline = self.pipeline.lock().await;
    info!("Final board\n{}", board::render(&pipeline));
    Ok(reason)
  }
}
