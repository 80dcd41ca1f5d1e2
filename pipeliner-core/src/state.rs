use std::fmt;

use crate::Rgba;

/// Production progress of a task on its node.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub enum TaskState {
  /// Not picked up by a node yet. Every unassigned task is in this state.
  #[default]
  NotStarted,
  InProgress,
  Done,
  /// The assignee botched it. Only a retry brings it back.
  Failed,
}

impl TaskState {
  pub fn can_transition_to(self, to: TaskState) -> bool {
    use TaskState::*;
    matches!(
      (self, to),
      (NotStarted, InProgress) | (InProgress, Done) | (InProgress, Failed) | (Failed, InProgress)
    )
  }

  /// Done and Failed are only left through a retry.
  pub fn is_terminal(self) -> bool {
    matches!(self, TaskState::Done | TaskState::Failed)
  }

  pub const fn label(self) -> &'static str {
    match self {
      TaskState::NotStarted => "Not Started",
      TaskState::InProgress => "In Progress",
      TaskState::Done => "Done",
      TaskState::Failed => "Failed",
    }
  }

  pub const fn color_tag(self) -> Rgba {
    match self {
      TaskState::NotStarted => Rgba::opaque(128, 128, 128),
      TaskState::InProgress => Rgba::opaque(96, 96, 200),
      TaskState::Done => Rgba::opaque(128, 200, 128),
      TaskState::Failed => Rgba::opaque(200, 150, 64),
    }
  }
}

impl fmt::Display for TaskState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}
