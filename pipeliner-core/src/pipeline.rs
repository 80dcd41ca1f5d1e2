//! The pipeline owns every node and the connections between them.
//!
//! It hands out node and task ids, places tasks on nodes and ticks all nodes
//! together. Nodes never look at each other during a tick; the topology is
//! only read or changed between ticks.

use std::collections::BTreeMap;

use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info};

use crate::{
  connection::Connection,
  error::{EngineError, Rejected, Result},
  failure::{FailurePolicy, NeverFail},
  node::{Node, NodeConfig, NodeReport},
  state::TaskState,
  status::TaskStatus,
  task::Task,
  task_type::TaskType,
  NodeId, TaskId,
};

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
  /// Seed for failure rolls. `None` seeds from the OS.
  pub seed: Option<u64>,
}

/// Per node reports of one pipeline tick, in node id order.
#[derive(Debug, Default)]
pub struct PipelineReport {
  pub nodes: Vec<(NodeId, NodeReport)>,
}

impl PipelineReport {
  pub fn completed(&self) -> impl Iterator<Item = (NodeId, TaskId)> + '_ {
    self
      .nodes
      .iter()
      .flat_map(|(node, report)| report.completed.iter().map(move |task| (*node, *task)))
  }

  pub fn failed(&self) -> impl Iterator<Item = (NodeId, TaskId)> + '_ {
    self
      .nodes
      .iter()
      .flat_map(|(node, report)| report.failed.iter().map(move |task| (*node, *task)))
  }

  pub fn days_ended(&self) -> impl Iterator<Item = NodeId> + '_ {
    self
      .nodes
      .iter()
      .filter(|(_, report)| report.day_ended)
      .map(|(node, _)| *node)
  }

  /// Tasks that nodes let go of at the end of their day.
  pub fn into_released(self) -> Vec<Task> {
    self
      .nodes
      .into_iter()
      .flat_map(|(_, report)| report.released)
      .collect()
  }
}

pub struct Pipeline {
  nodes: BTreeMap<NodeId, Node>,
  connections: Vec<Connection>,
  next_node: u32,
  next_task: u64,
  policy: Box<dyn FailurePolicy>,
  rng: StdRng,
}

impl Pipeline {
  /// Pipeline whose nodes never fail.
  pub fn new(config: PipelineConfig) -> Self {
    Self::with_policy(config, NeverFail)
  }

  pub fn with_policy(config: PipelineConfig, policy: impl FailurePolicy + 'static) -> Self {
    let rng = match config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };

    Self {
      nodes: BTreeMap::new(),
      connections: Vec::new(),
      next_node: 1,
      next_task: 1,
      policy: Box::new(policy),
      rng,
    }
  }

  pub fn set_policy(&mut self, policy: impl FailurePolicy + 'static) {
    self.policy = Box::new(policy);
  }

  pub fn add_node(&mut self, config: NodeConfig) -> NodeId {
    let id = NodeId(self.next_node);
    self.next_node += 1;
    info!("Adding {} ({})", id, config.name);
    self.nodes.insert(id, Node::new(id, config));
    id
  }

  /// Remove a node together with its tasks and every connection touching it.
  pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
    let node = self.nodes.remove(&id).ok_or(EngineError::NodeNotFound(id))?;
    self.connections.retain(|connection| !connection.touches(id));
    info!("Removed {}", id);
    Ok(node)
  }

  pub fn node(&self, id: NodeId) -> Option<&Node> {
    self.nodes.get(&id)
  }

  pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
    self.nodes.get_mut(&id)
  }

  pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
    self.nodes.values()
  }

  fn existing_node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
    self.nodes.get_mut(&id).ok_or(EngineError::NodeNotFound(id))
  }

  pub fn connect(&mut self, source: NodeId, target: NodeId) -> Result<Connection> {
    if source == target {
      return Err(EngineError::SelfConnection(source));
    }
    for id in [source, target] {
      if !self.nodes.contains_key(&id) {
        return Err(EngineError::NodeNotFound(id));
      }
    }

    let connection = Connection::new(source, target);
    if self.connections.contains(&connection) {
      return Err(EngineError::DuplicateConnection {
        from: source,
        to: target,
      });
    }
    info!("Connect {} to {}", source, target);
    self.connections.push(connection);
    Ok(connection)
  }

  pub fn disconnect(&mut self, source: NodeId, target: NodeId) -> Result<()> {
    let connection = Connection::new(source, target);
    let before = self.connections.len();
    self.connections.retain(|existing| *existing != connection);
    if self.connections.len() == before {
      return Err(EngineError::ConnectionNotFound {
        from: source,
        to: target,
      });
    }
    Ok(())
  }

  pub fn connections(&self) -> &[Connection] {
    &self.connections
  }

  pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Connection> + '_ {
    self
      .connections
      .iter()
      .filter(move |connection| connection.source == node)
  }

  pub fn incoming(&self, node: NodeId) -> impl Iterator<Item = &Connection> + '_ {
    self
      .connections
      .iter()
      .filter(move |connection| connection.target == node)
  }

  fn next_task_id(&mut self) -> TaskId {
    let id = TaskId(self.next_task);
    self.next_task += 1;
    id
  }

  /// New task at its type's base difficulty.
  pub fn create_task(&mut self, task_type: TaskType) -> Task {
    let id = self.next_task_id();
    Task::new(id, task_type, task_type.base_difficulty())
  }

  /// New task whose difficulty is scaled to the level of `node`.
  pub fn create_task_for(&mut self, task_type: TaskType, node: NodeId) -> Result<Task> {
    let level = self.node(node).ok_or(EngineError::NodeNotFound(node))?.level();
    let id = self.next_task_id();
    Ok(Task::for_level(id, task_type, level))
  }

  /// Build a task from a preset constructor with a fresh id.
  pub fn create_with(&mut self, preset: impl FnOnce(TaskId) -> Task) -> Task {
    let id = self.next_task_id();
    preset(id)
  }

  /// Refuses a task whose id is already queued anywhere on the board.
  fn check_unique(&self, task: Task) -> Result<Task, Rejected> {
    match self.find_task(task.id()) {
      Some((holder, _)) => {
        let reason = EngineError::DuplicateTask {
          node: holder,
          task: task.id(),
        };
        Err(Rejected::new(task, reason))
      }
      None => Ok(task),
    }
  }

  pub fn assign(&mut self, node: NodeId, task: Task) -> Result<TaskId, Rejected> {
    let task = self.check_unique(task)?;
    match self.nodes.get_mut(&node) {
      Some(target) => target.add_task(task),
      None => Err(Rejected::new(task, EngineError::NodeNotFound(node))),
    }
  }

  /// Place a task on the first node, in id order, that accepts its type and
  /// has a free slot.
  pub fn dispatch(&mut self, task: Task) -> Result<(NodeId, TaskId), Rejected> {
    let task = self.check_unique(task)?;
    let task_type = task.task_type();
    let candidate = self
      .nodes
      .values_mut()
      .find(|node| node.free_slots() > 0 && node.accepts(task_type));

    match candidate {
      Some(node) => {
        let node_id = node.id();
        node.add_task(task).map(|task_id| (node_id, task_id))
      }
      None => Err(Rejected::new(task, EngineError::NoCandidate { task_type })),
    }
  }

  pub fn remove_task(&mut self, node: NodeId, task: TaskId) -> Result<Task> {
    self.existing_node_mut(node)?.remove_task(task)
  }

  pub fn retry(&mut self, node: NodeId, task: TaskId) -> Result<()> {
    self.existing_node_mut(node)?.retry_task(task)
  }

  pub fn advance_status(&mut self, node: NodeId, task: TaskId, next: TaskStatus) -> Result<TaskStatus> {
    self.existing_node_mut(node)?.advance_status(task, next)
  }

  pub fn level_up(&mut self, node: NodeId) -> Result<()> {
    self.existing_node_mut(node)?.level_up();
    Ok(())
  }

  pub fn find_task(&self, task: TaskId) -> Option<(NodeId, &Task)> {
    self
      .nodes
      .values()
      .find_map(|node| node.task(task).map(|found| (node.id(), found)))
  }

  /// Every queued task with the node it sits on.
  pub fn tasks(&self) -> impl Iterator<Item = (NodeId, &Task)> + '_ {
    self
      .nodes
      .values()
      .flat_map(|node| node.tasks().iter().map(move |task| (node.id(), task)))
  }

  pub fn tasks_in_state(&self, state: TaskState) -> Vec<(NodeId, TaskId)> {
    self
      .tasks()
      .filter(|(_, task)| task.state() == state)
      .map(|(node, task)| (node, task.id()))
      .collect()
  }

  /// Update every node by `delta_time` hours, rolling the failure policy.
  pub fn tick(&mut self, delta_time: f32) -> PipelineReport {
    let mut report = PipelineReport::default();
    for (id, node) in self.nodes.iter_mut() {
      let node_report = node.update_with(delta_time, self.policy.as_ref(), &mut self.rng);
      if !node_report.is_quiet() {
        debug!(
          "{}: {} completed, {} failed, {} released",
          id,
          node_report.completed.len(),
          node_report.failed.len(),
          node_report.released.len()
        );
      }
      report.nodes.push((*id, node_report));
    }
    report
  }
}
