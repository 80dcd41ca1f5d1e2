use std::fmt;

use crate::NodeId;

/// Directed edge: the output of `source` feeds the input of `target`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Connection {
  pub source: NodeId,
  pub target: NodeId,
}

impl Connection {
  pub fn new(source: NodeId, target: NodeId) -> Self {
    Self { source, target }
  }

  pub fn touches(&self, node: NodeId) -> bool {
    self.source == node || self.target == node
  }
}

impl fmt::Display for Connection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Connection: {} -> {}", self.source, self.target)
  }
}
