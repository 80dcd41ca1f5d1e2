use pipeliner_core::EngineError;

/// Consecutive placement failures, cleared whenever a placement succeeds.
#[derive(Debug, Clone, Default)]
pub struct RejectionTracker {
    pub feeder: Vec<EngineError>,
    pub requeue: Vec<EngineError>,
}
