use crate::rejection_tracker::RejectionTracker;

#[derive(Debug)]
pub enum ShutdownReason {
  // Every node has worked the configured number of days.
  Done { days: u32 },
  Interrupted,
  // The board stayed full for too long.
  Stalled(RejectionTracker),
}
