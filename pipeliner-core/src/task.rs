//! Tasks are the smallest unit of work in the pipeline.
//!
//! A task carries a type, a production state, a review status, its progress
//! and a difficulty. Difficulty is fixed when the task is created and decides
//! how long the work takes: the same production rate moves a hard task
//! along slower than an easy one.

use tracing::debug;

use crate::{
  error::{EngineError, Result, Transition},
  state::TaskState,
  status::TaskStatus,
  task_type::TaskType,
  NodeId, TaskId,
};

/// Each extra node level makes the same work this much easier.
const LEVEL_DIFFICULTY_FACTOR: f32 = 0.8;

/// Time multiplier for a difficulty in `[0, 1]`: `1 + 2 * difficulty`.
///
/// A trivial task progresses at the full production rate, the hardest one
/// takes three times as long.
pub fn difficulty_scaling(difficulty: f32) -> f32 {
  1.0 + 2.0 * difficulty.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
  id: TaskId,
  name: String,
  task_type: TaskType,
  state: TaskState,
  status: TaskStatus,
  assignee: Option<NodeId>,
  progress: f32,
  difficulty: f32,
}

impl Task {
  /// Fresh, unassigned task. `difficulty_base` is clamped into `[0, 1]`.
  pub fn new(id: TaskId, task_type: TaskType, difficulty_base: f32) -> Self {
    let difficulty = if difficulty_base.is_nan() {
      task_type.base_difficulty()
    } else {
      difficulty_base.clamp(0.0, 1.0)
    };

    Self {
      id,
      name: task_type.name().to_string(),
      task_type,
      state: TaskState::NotStarted,
      status: TaskStatus::NotReady,
      assignee: None,
      progress: 0.0,
      difficulty,
    }
  }

  /// Task whose difficulty is derived from its type and the level of the
  /// node expected to work it: `base * 0.8^(level - 1)`.
  pub fn for_level(id: TaskId, task_type: TaskType, level: u32) -> Self {
    let steps = level.max(1) - 1;
    let difficulty = task_type.base_difficulty() * LEVEL_DIFFICULTY_FACTOR.powi(steps as i32);
    Self::new(id, task_type, difficulty)
  }

  /// Placeholder work used to fill a node.
  pub fn empty(id: TaskId) -> Self {
    Self::new(id, TaskType::Empty, 0.0)
  }

  pub fn simple_compositing(id: TaskId) -> Self {
    Self::new(id, TaskType::Compositing, 0.1).with_name("Simple Compositing")
  }

  pub fn medium_compositing(id: TaskId) -> Self {
    Self::new(id, TaskType::Compositing, 0.5).with_name("Medium Compositing")
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn id(&self) -> TaskId {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn task_type(&self) -> TaskType {
    self.task_type
  }

  pub fn state(&self) -> TaskState {
    self.state
  }

  pub fn status(&self) -> TaskStatus {
    self.status
  }

  pub fn assignee(&self) -> Option<NodeId> {
    self.assignee
  }

  pub fn progress(&self) -> f32 {
    self.progress
  }

  pub fn difficulty(&self) -> f32 {
    self.difficulty
  }

  /// Advance the work by `delta_time` hours at the assignee's production
  /// rate. Returns `true` on the tick that finishes the task.
  ///
  /// Does nothing unless the task is in progress.
  pub fn tick(&mut self, delta_time: f32, production_rate: f32) -> bool {
    if self.state != TaskState::InProgress || !(delta_time > 0.0) || !(production_rate > 0.0) {
      return false;
    }

    let step = delta_time * production_rate / difficulty_scaling(self.difficulty);
    self.progress = (self.progress + step).min(1.0);

    if self.progress >= 1.0 {
      self.state = TaskState::Done;
      debug!("{} finished on {:?}", self.id, self.assignee);
      return true;
    }
    false
  }

  /// Put a failed task back to work on the same node, from scratch.
  pub fn retry(&mut self) -> Result<()> {
    self.transition(TaskState::InProgress, TaskState::Failed)?;
    if self.assignee.is_none() {
      return Err(EngineError::NotAssigned { task: self.id });
    }
    self.progress = 0.0;
    self.state = TaskState::InProgress;
    debug!("{} retried on {:?}", self.id, self.assignee);
    Ok(())
  }

  /// Move the review workflow one step to `next`.
  pub fn advance_status(&mut self, next: TaskStatus) -> Result<TaskStatus> {
    if !self.status.can_transition_to(next) {
      return Err(EngineError::InvalidTransition(Transition::Status {
        from: self.status,
        to: next,
      }));
    }
    self.status = next;
    Ok(next)
  }

  pub(crate) fn assign(&mut self, node: NodeId) {
    self.assignee = Some(node);
    if self.state == TaskState::NotStarted {
      self.state = TaskState::InProgress;
    }
  }

  /// Detach from the assignee. Progress is kept so the work can resume
  /// elsewhere.
  pub(crate) fn release(&mut self) {
    self.assignee = None;
    self.state = TaskState::NotStarted;
  }

  pub(crate) fn fail(&mut self) -> Result<()> {
    self.transition(TaskState::Failed, TaskState::InProgress)?;
    self.state = TaskState::Failed;
    debug!("{} failed on {:?}", self.id, self.assignee);
    Ok(())
  }

  /// Checks that the task sits in `expected` and may move on to `to`.
  fn transition(&self, to: TaskState, expected: TaskState) -> Result<()> {
    if self.state != expected || !self.state.can_transition_to(to) {
      return Err(EngineError::InvalidTransition(Transition::State {
        from: self.state,
        to,
      }));
    }
    Ok(())
  }
}
