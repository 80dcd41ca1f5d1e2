//! Task assignment and lifecycle engine for the pipeline game.
//!
//! Nodes (actors) hold a bounded number of task slots and accept tasks by
//! capability. Tasks progress through a production [`TaskState`] while a
//! separate review [`TaskStatus`] tracks sign-off. The [`Pipeline`] owns the
//! nodes, the connections between them and drives them one tick at a time.
//! Nothing in here draws anything; a renderer reads the plain values back.

use std::fmt::{self, Debug, Display};

pub mod connection;
pub mod error;
pub mod failure;
pub mod node;
pub mod pipeline;
pub mod state;
pub mod status;
pub mod task;
pub mod task_type;

pub use connection::Connection;
pub use error::{EngineError, Rejected, Result, Transition};
pub use failure::{FailurePolicy, FixedChance, NeverFail};
pub use node::{DayEndPolicy, Node, NodeConfig, NodeReport};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport};
pub use state::TaskState;
pub use status::TaskStatus;
pub use task::{difficulty_scaling, Task};
pub use task_type::TaskType;

#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl Debug for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "node-{}", self.0)
  }
}

impl Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    Debug::fmt(self, f)
  }
}

#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl Debug for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "task-{}", self.0)
  }
}

impl Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    Debug::fmt(self, f)
  }
}

/// Colour tag carried as metadata for the renderer.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Rgba {
  pub r: u8,
  pub g: u8,
  pub b: u8,
  pub a: u8,
}

impl Rgba {
  pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
    Self { r, g, b, a }
  }

  pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
    Self::new(r, g, b, 255)
  }
}
