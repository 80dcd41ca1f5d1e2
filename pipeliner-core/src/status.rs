//! Review workflow of a task.
//!
//! Statuses belong to the task rather than to the node working it, so they
//! move independently of [`crate::TaskState`]: a task can be done in
//! production and still be waiting in review.

use std::fmt;

use crate::Rgba;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub enum TaskStatus {
  #[default]
  NotReady,
  Ready,
  InProgress,
  Done,
  Review,
  Approved,
  Rejected,
}

impl TaskStatus {
  /// Statuses reachable in one step.
  pub const fn successors(self) -> &'static [TaskStatus] {
    use TaskStatus::*;
    match self {
      NotReady => &[Ready],
      Ready => &[InProgress],
      InProgress => &[Done],
      Done => &[Review],
      Review => &[Approved, Rejected],
      // rework
      Rejected => &[Ready],
      Approved => &[],
    }
  }

  pub fn can_transition_to(self, to: TaskStatus) -> bool {
    self.successors().contains(&to)
  }

  pub const fn label(self) -> &'static str {
    match self {
      TaskStatus::NotReady => "Not Ready",
      TaskStatus::Ready => "Ready",
      TaskStatus::InProgress => "In Progress",
      TaskStatus::Done => "Done",
      TaskStatus::Review => "Review",
      TaskStatus::Approved => "Approved",
      TaskStatus::Rejected => "Rejected",
    }
  }

  pub const fn color_tag(self) -> Rgba {
    match self {
      TaskStatus::NotReady => Rgba::opaque(128, 128, 128),
      TaskStatus::Ready => Rgba::opaque(128, 200, 128),
      TaskStatus::InProgress => Rgba::opaque(128, 128, 200),
      TaskStatus::Done => Rgba::opaque(200, 128, 128),
      TaskStatus::Review => Rgba::opaque(200, 200, 128),
      TaskStatus::Approved => Rgba::opaque(128, 200, 200),
      TaskStatus::Rejected => Rgba::opaque(200, 128, 200),
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}
