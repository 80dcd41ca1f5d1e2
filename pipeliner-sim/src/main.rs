use config::SimConfig;
use simulation::Simulation;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod board;
mod config;
mod feeder;
mod rejection_tracker;
mod scenario;
mod shutdown;
mod simulation;
mod supervisor;
mod ticker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = SimConfig::from_env()?;

    let simulation = Simulation::new(config).await?;

    let shutdown_reason = simulation.await_shutdown().await?;

    info!("Shutting down due to: {:?}", shutdown_reason);

    Ok(())
}
