//! Error taxonomy of the engine.
//!
//! Every error is recoverable: a failed operation leaves nodes and tasks
//! exactly as they were, so the caller can reject a drop or an assignment
//! and carry on.

use std::fmt;

use thiserror::Error;

use crate::{state::TaskState, status::TaskStatus, task::Task, task_type::TaskType, NodeId, TaskId};

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
  #[error("{node} has no free task slot ({slots} slots)")]
  CapacityExceeded { node: NodeId, slots: usize },

  #[error("{node} does not accept {task_type} tasks")]
  TypeNotAccepted { node: NodeId, task_type: TaskType },

  #[error("invalid {0}")]
  InvalidTransition(Transition),

  #[error("{task} is already queued on {node}")]
  DuplicateTask { node: NodeId, task: TaskId },

  #[error("{node} holds {queued} tasks, cannot shrink to {slots} slots")]
  SlotsInUse { node: NodeId, slots: usize, queued: usize },

  #[error("{task} is not queued on {node}")]
  TaskNotFound { node: NodeId, task: TaskId },

  #[error("{task} has no assignee")]
  NotAssigned { task: TaskId },

  #[error("{0} does not exist")]
  NodeNotFound(NodeId),

  #[error("no node can take {task_type} tasks right now")]
  NoCandidate { task_type: TaskType },

  #[error("cannot connect {0} to itself")]
  SelfConnection(NodeId),

  #[error("{from} is already connected to {to}")]
  DuplicateConnection { from: NodeId, to: NodeId },

  #[error("{from} is not connected to {to}")]
  ConnectionNotFound { from: NodeId, to: NodeId },

  #[error("unknown task type '{0}'")]
  UnknownTaskType(String),

  #[error("unknown day end policy '{0}'")]
  UnknownDayEndPolicy(String),
}

/// A move that was refused by one of the two task state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  State { from: TaskState, to: TaskState },
  Status { from: TaskStatus, to: TaskStatus },
}

impl fmt::Display for Transition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Transition::State { from, to } => write!(f, "state transition {from} -> {to}"),
      Transition::Status { from, to } => write!(f, "status transition {from} -> {to}"),
    }
  }
}

/// A task that could not be placed, handed back to the caller untouched.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} rejected: {reason}", .task.id())]
pub struct Rejected {
  pub task: Task,
  pub reason: EngineError,
}

impl Rejected {
  pub fn new(task: Task, reason: EngineError) -> Self {
    Self { task, reason }
  }

  pub fn into_task(self) -> Task {
    self.task
  }
}
