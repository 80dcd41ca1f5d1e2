//! Nodes are the workers of the pipeline.
//!
//! A node has a limited number of task slots, accepts only some task types
//! and works a limited number of hours per day. Every update advances its
//! clock and the tasks it is working on.

use std::{collections::HashSet, str::FromStr};

use rand::Rng;
use tracing::{debug, trace};

use crate::{
  error::{EngineError, Rejected, Result},
  failure::{effective_chance, FailurePolicy},
  state::TaskState,
  status::TaskStatus,
  task::Task,
  task_type::TaskType,
  NodeId, TaskId,
};

pub const DEFAULT_TASK_SLOTS: usize = 2;
pub const DEFAULT_WORK_HOURS: u32 = 8;
pub const DEFAULT_PRODUCTION_RATE: f32 = 1.0;

/// What happens to the queued tasks when a node's working day ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayEndPolicy {
  /// Only the work clock starts over.
  #[default]
  KeepTasks,
  /// Every task is handed back to the caller, keeping its progress.
  ClearTasks,
}

impl FromStr for DayEndPolicy {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "keep" | "keep-tasks" => Ok(DayEndPolicy::KeepTasks),
      "clear" | "clear-tasks" => Ok(DayEndPolicy::ClearTasks),
      _ => Err(EngineError::UnknownDayEndPolicy(s.to_string())),
    }
  }
}

/// Capability and capacity of a node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
  pub name: String,
  pub level: u32,
  pub production_rate: f32,
  pub task_slots: usize,
  pub work_hours: u32,
  pub accept_types: HashSet<TaskType>,
  pub provide_types: HashSet<TaskType>,
  pub day_end_policy: DayEndPolicy,
}

impl NodeConfig {
  /// Generalist that accepts and provides every task type.
  pub fn artist() -> Self {
    Self {
      name: "A".to_string(),
      level: 1,
      production_rate: DEFAULT_PRODUCTION_RATE,
      task_slots: DEFAULT_TASK_SLOTS,
      work_hours: DEFAULT_WORK_HOURS,
      accept_types: TaskType::ALL.into_iter().collect(),
      provide_types: TaskType::ALL.into_iter().collect(),
      day_end_policy: DayEndPolicy::default(),
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_task_slots(mut self, task_slots: usize) -> Self {
    self.task_slots = task_slots;
    self
  }

  pub fn with_work_hours(mut self, work_hours: u32) -> Self {
    self.work_hours = work_hours;
    self
  }

  pub fn with_level(mut self, level: u32) -> Self {
    self.level = level;
    self
  }

  pub fn with_day_end_policy(mut self, policy: DayEndPolicy) -> Self {
    self.day_end_policy = policy;
    self
  }

  pub fn accepting(mut self, types: impl IntoIterator<Item = TaskType>) -> Self {
    self.accept_types = types.into_iter().collect();
    self
  }

  pub fn providing(mut self, types: impl IntoIterator<Item = TaskType>) -> Self {
    self.provide_types = types.into_iter().collect();
    self
  }
}

impl Default for NodeConfig {
  fn default() -> Self {
    Self::artist()
  }
}

/// What a single update did to a node.
#[derive(Debug, Default)]
pub struct NodeReport {
  pub completed: Vec<TaskId>,
  pub failed: Vec<TaskId>,
  /// Tasks dropped at the end of the day under [`DayEndPolicy::ClearTasks`].
  pub released: Vec<Task>,
  pub day_ended: bool,
}

impl NodeReport {
  pub fn is_quiet(&self) -> bool {
    self.completed.is_empty() && self.failed.is_empty() && self.released.is_empty() && !self.day_ended
  }
}

#[derive(Debug, Clone)]
pub struct Node {
  id: NodeId,
  name: String,
  level: u32,
  production_rate: f32,
  task_slots: usize,
  work_hours: u32,
  current_hour: f32,
  days_worked: u32,
  accept_types: HashSet<TaskType>,
  provide_types: HashSet<TaskType>,
  day_end_policy: DayEndPolicy,
  tasks: Vec<Task>,
}

impl Node {
  pub fn new(id: NodeId, config: NodeConfig) -> Self {
    Self {
      id,
      name: config.name,
      level: config.level.max(1),
      production_rate: config.production_rate,
      task_slots: config.task_slots,
      work_hours: config.work_hours.max(1),
      current_hour: 0.0,
      days_worked: 0,
      accept_types: config.accept_types,
      provide_types: config.provide_types,
      day_end_policy: config.day_end_policy,
      tasks: Vec::new(),
    }
  }

  /// Queue a task and start working on it.
  ///
  /// A full node refuses any task; otherwise the type has to be accepted.
  /// A refused task comes back inside the error and the node is unchanged.
  pub fn add_task(&mut self, mut task: Task) -> Result<TaskId, Rejected> {
    if self.tasks.len() >= self.task_slots {
      let reason = EngineError::CapacityExceeded {
        node: self.id,
        slots: self.task_slots,
      };
      return Err(Rejected::new(task, reason));
    }
    if !self.accepts(task.task_type()) {
      let reason = EngineError::TypeNotAccepted {
        node: self.id,
        task_type: task.task_type(),
      };
      return Err(Rejected::new(task, reason));
    }
    if self.task(task.id()).is_some() {
      let reason = EngineError::DuplicateTask {
        node: self.id,
        task: task.id(),
      };
      return Err(Rejected::new(task, reason));
    }

    task.assign(self.id);
    let id = task.id();
    debug!("{} took {} ({})", self.id, id, task.task_type());
    self.tasks.push(task);
    Ok(id)
  }

  /// [`Node::add_task`] for each task in order. Earlier successes stay in
  /// place when a later task is refused.
  pub fn add_tasks<I>(&mut self, tasks: I) -> Vec<Result<TaskId, Rejected>>
  where
    I: IntoIterator<Item = Task>,
  {
    tasks.into_iter().map(|task| self.add_task(task)).collect()
  }

  /// Take a task off the node. Its progress is kept.
  pub fn remove_task(&mut self, task: TaskId) -> Result<Task> {
    let index = self.position(task)?;
    let mut task = self.tasks.remove(index);
    task.release();
    debug!("{} dropped {}", self.id, task.id());
    Ok(task)
  }

  /// Start a failed task over on this node.
  pub fn retry_task(&mut self, task: TaskId) -> Result<()> {
    let index = self.position(task)?;
    self.tasks[index].retry()
  }

  pub fn advance_status(&mut self, task: TaskId, next: TaskStatus) -> Result<TaskStatus> {
    let index = self.position(task)?;
    self.tasks[index].advance_status(next)
  }

  /// Difficulty of queued tasks stays as it was.
  pub fn level_up(&mut self) {
    self.level += 1;
    self.production_rate += 0.5;
    self.work_hours += 1;
    debug!("{} reached level {}", self.id, self.level);
  }

  /// Advance the work clock and every task in progress. Nothing fails.
  pub fn update(&mut self, delta_time: f32) -> NodeReport {
    self.advance(delta_time, |_| false)
  }

  /// Like [`Node::update`], then rolls `policy` for every task still in
  /// progress after its tick.
  pub fn update_with<R>(&mut self, delta_time: f32, policy: &dyn FailurePolicy, rng: &mut R) -> NodeReport
  where
    R: Rng + ?Sized,
  {
    let level = self.level;
    self.advance(delta_time, |task| {
      effective_chance(policy, level, task.difficulty(), delta_time).is_some_and(|chance| rng.gen_bool(chance))
    })
  }

  fn advance(&mut self, delta_time: f32, mut roll_failure: impl FnMut(&Task) -> bool) -> NodeReport {
    let mut report = NodeReport::default();
    if !(delta_time > 0.0) {
      return report;
    }

    self.current_hour += delta_time;
    if self.current_hour >= self.work_hours as f32 {
      self.current_hour = 0.0;
      self.days_worked += 1;
      report.day_ended = true;
      debug!("{} finished day {}", self.id, self.days_worked);

      if self.day_end_policy == DayEndPolicy::ClearTasks {
        report.released = self
          .tasks
          .drain(..)
          .map(|mut task| {
            task.release();
            task
          })
          .collect();
      }
    }

    let rate = self.production_rate;
    for task in self.tasks.iter_mut().filter(|task| task.state() == TaskState::InProgress) {
      if task.tick(delta_time, rate) {
        report.completed.push(task.id());
      } else if roll_failure(&*task) && task.fail().is_ok() {
        report.failed.push(task.id());
      }
    }

    trace!("{} at hour {:.2}/{}", self.id, self.current_hour, self.work_hours);
    report
  }

  fn position(&self, task: TaskId) -> Result<usize> {
    self
      .tasks
      .iter()
      .position(|queued| queued.id() == task)
      .ok_or(EngineError::TaskNotFound { node: self.id, task })
  }

  pub fn id(&self) -> NodeId {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn level(&self) -> u32 {
    self.level
  }

  pub fn production_rate(&self) -> f32 {
    self.production_rate
  }

  pub fn tasks(&self) -> &[Task] {
    &self.tasks
  }

  pub fn task(&self, task: TaskId) -> Option<&Task> {
    self.tasks.iter().find(|queued| queued.id() == task)
  }

  /// The oldest task still in progress, the one the progress bar follows.
  pub fn current_task(&self) -> Option<&Task> {
    self.tasks.iter().find(|task| task.state() == TaskState::InProgress)
  }

  pub fn task_slots(&self) -> usize {
    self.task_slots
  }

  /// Resize the queue. It cannot shrink below the tasks already queued.
  pub fn set_task_slots(&mut self, task_slots: usize) -> Result<()> {
    if task_slots < self.tasks.len() {
      return Err(EngineError::SlotsInUse {
        node: self.id,
        slots: task_slots,
        queued: self.tasks.len(),
      });
    }
    self.task_slots = task_slots;
    Ok(())
  }

  pub fn free_slots(&self) -> usize {
    self.task_slots.saturating_sub(self.tasks.len())
  }

  /// Occupied share of the slots, what the load indicator shows.
  pub fn load(&self) -> f32 {
    if self.task_slots == 0 {
      return 1.0;
    }
    (self.tasks.len() as f32 / self.task_slots as f32).min(1.0)
  }

  pub fn work_hours(&self) -> u32 {
    self.work_hours
  }

  pub fn current_hour(&self) -> f32 {
    self.current_hour
  }

  /// How much of today's hours are used up, for the work hours bar.
  pub fn hour_fraction(&self) -> f32 {
    (self.current_hour / self.work_hours as f32).clamp(0.0, 1.0)
  }

  pub fn days_worked(&self) -> u32 {
    self.days_worked
  }

  pub fn day_end_policy(&self) -> DayEndPolicy {
    self.day_end_policy
  }

  pub fn accepts(&self, task_type: TaskType) -> bool {
    self.accept_types.contains(&task_type)
  }

  pub fn provides(&self, task_type: TaskType) -> bool {
    self.provide_types.contains(&task_type)
  }

  pub fn accept_types(&self) -> &HashSet<TaskType> {
    &self.accept_types
  }

  pub fn provide_types(&self) -> &HashSet<TaskType> {
    &self.provide_types
  }
}

#[cfg(test)]
mod tests {
  use rand::{rngs::StdRng, SeedableRng};

  use super::*;
  use crate::failure::{FixedChance, NeverFail};

  fn node(config: NodeConfig) -> Node {
    Node::new(NodeId(1), config)
  }

  fn empty(id: u64) -> Task {
    Task::empty(TaskId(id))
  }

  #[test]
  fn add_task_assigns_and_starts() {
    let mut node = node(NodeConfig::artist());
    let id = node.add_task(Task::medium_compositing(TaskId(4))).unwrap();
    let task = node.task(id).unwrap();
    assert_eq!(task.assignee(), Some(NodeId(1)));
    assert_eq!(task.state(), TaskState::InProgress);
    assert_eq!(task.status(), TaskStatus::NotReady);
  }

  #[test]
  fn refuses_types_it_does_not_accept() {
    let mut node = node(NodeConfig::artist().accepting([TaskType::Empty]));
    let rejected = node.add_task(Task::simple_compositing(TaskId(1))).unwrap_err();
    assert_eq!(
      rejected.reason,
      EngineError::TypeNotAccepted {
        node: NodeId(1),
        task_type: TaskType::Compositing,
      }
    );
    assert_eq!(rejected.task.state(), TaskState::NotStarted);
    assert_eq!(rejected.task.assignee(), None);
    assert!(node.tasks().is_empty());
  }

  #[test]
  fn capacity_is_checked_before_type() {
    let mut node = node(NodeConfig::artist().accepting([TaskType::Empty]).with_task_slots(1));
    node.add_task(empty(1)).unwrap();
    let rejected = node.add_task(Task::simple_compositing(TaskId(2))).unwrap_err();
    assert!(matches!(rejected.reason, EngineError::CapacityExceeded { slots: 1, .. }));
  }

  #[test]
  fn zero_slots_refuses_everything() {
    let mut node = node(NodeConfig::artist().with_task_slots(0));
    assert!(node.add_task(empty(1)).is_err());
    assert_eq!(node.load(), 1.0);
  }

  #[test]
  fn batch_fills_the_free_slots_in_order() {
    let mut node = node(NodeConfig::artist());
    let results = node.add_tasks((1..=4).map(empty));
    let added: Vec<bool> = results.iter().map(Result::is_ok).collect();
    assert_eq!(added, vec![true, true, false, false]);
    let queued: Vec<TaskId> = node.tasks().iter().map(Task::id).collect();
    assert_eq!(queued, vec![TaskId(1), TaskId(2)]);
  }

  #[test]
  fn batch_keeps_earlier_successes_after_a_type_mismatch() {
    let mut node = node(NodeConfig::artist().accepting([TaskType::Empty]).with_task_slots(3));
    let results = node.add_tasks([empty(1), Task::simple_compositing(TaskId(2)), empty(3)]);
    let added: Vec<bool> = results.iter().map(Result::is_ok).collect();
    assert_eq!(added, vec![true, false, true]);
    assert_eq!(node.tasks().len(), 2);
  }

  #[test]
  fn refuses_a_task_id_it_already_holds() {
    let mut node = node(NodeConfig::artist());
    node.add_task(empty(1)).unwrap();

    let rejected = node.add_task(empty(1)).unwrap_err();
    assert_eq!(
      rejected.reason,
      EngineError::DuplicateTask {
        node: NodeId(1),
        task: TaskId(1),
      }
    );
    assert_eq!(rejected.task.assignee(), None);
    assert_eq!(node.tasks().len(), 1);

    assert!(node.remove_task(TaskId(1)).is_ok());
    assert!(node.remove_task(TaskId(1)).is_err());
  }

  #[test]
  fn slots_cannot_shrink_below_the_queue() {
    let mut node = node(NodeConfig::artist().with_task_slots(3));
    node.add_tasks((1..=3).map(empty));

    assert_eq!(
      node.set_task_slots(1),
      Err(EngineError::SlotsInUse {
        node: NodeId(1),
        slots: 1,
        queued: 3,
      })
    );
    assert_eq!(node.task_slots(), 3);

    assert_eq!(node.set_task_slots(5), Ok(()));
    assert_eq!(node.free_slots(), 2);
    node.remove_task(TaskId(3)).unwrap();
    assert_eq!(node.set_task_slots(2), Ok(()));
    assert_eq!(node.free_slots(), 0);
  }

  #[test]
  fn current_task_is_the_oldest_in_progress() {
    let mut node = node(NodeConfig::artist().with_task_slots(3));
    assert!(node.current_task().is_none());

    node.add_tasks([empty(1), Task::medium_compositing(TaskId(2))]);
    node.update(1.0);
    assert_eq!(node.current_task().map(Task::id), Some(TaskId(2)));

    node.update(4.0);
    assert!(node.current_task().is_none());
  }

  #[test]
  fn remove_twice_succeeds_once() {
    let mut node = node(NodeConfig::artist());
    node.add_task(empty(1)).unwrap();
    assert!(node.remove_task(TaskId(1)).is_ok());
    assert_eq!(
      node.remove_task(TaskId(1)),
      Err(EngineError::TaskNotFound {
        node: NodeId(1),
        task: TaskId(1),
      })
    );
  }

  #[test]
  fn removal_keeps_progress_and_frees_the_slot() {
    let mut node = node(NodeConfig::artist().with_task_slots(1));
    node.add_task(empty(1)).unwrap();
    node.update(0.25);

    let task = node.remove_task(TaskId(1)).unwrap();
    assert_eq!(task.assignee(), None);
    assert_eq!(task.state(), TaskState::NotStarted);
    assert!((task.progress() - 0.25).abs() < 1e-6);
    assert_eq!(node.free_slots(), 1);

    let mut other = Node::new(NodeId(2), NodeConfig::artist());
    other.add_task(task).unwrap();
    let resumed = other.task(TaskId(1)).unwrap();
    assert!((resumed.progress() - 0.25).abs() < 1e-6);
    assert_eq!(resumed.assignee(), Some(NodeId(2)));
  }

  #[test]
  fn update_advances_tasks_by_the_node_rate() {
    let mut node = node(NodeConfig::artist());
    node.level_up();
    node.add_task(Task::medium_compositing(TaskId(1))).unwrap();
    node.update(0.5);
    // 0.5h * 1.5 / (1 + 2 * 0.5)
    assert!((node.task(TaskId(1)).unwrap().progress() - 0.375).abs() < 1e-6);
    assert!((node.current_hour() - 0.5).abs() < 1e-6);
  }

  #[test]
  fn update_reports_completions() {
    let mut node = node(NodeConfig::artist());
    node.add_task(empty(1)).unwrap();
    node.add_task(Task::medium_compositing(TaskId(2))).unwrap();
    let report = node.update(1.0);
    assert_eq!(report.completed, vec![TaskId(1)]);
    assert_eq!(node.task(TaskId(1)).unwrap().state(), TaskState::Done);

    let report = node.update(1.0);
    assert_eq!(report.completed, vec![TaskId(2)]);
    assert!(node.update(1.0).completed.is_empty());
  }

  #[test]
  fn day_end_keeps_tasks_by_default() {
    let mut node = node(NodeConfig::artist().with_work_hours(8));
    node.add_task(Task::medium_compositing(TaskId(1))).unwrap();
    let report = node.update(8.0);
    assert!(report.day_ended);
    assert_eq!(node.current_hour(), 0.0);
    assert_eq!(node.days_worked(), 1);
    assert_eq!(node.tasks().len(), 1);
    assert_eq!(node.task(TaskId(1)).unwrap().state(), TaskState::Done);
  }

  #[test]
  fn day_end_can_clear_tasks() {
    let config = NodeConfig::artist()
      .with_work_hours(8)
      .with_day_end_policy(DayEndPolicy::ClearTasks);
    let mut node = node(config);
    node.add_task(Task::medium_compositing(TaskId(1))).unwrap();
    node.update(0.5);
    let report = node.update(7.5);

    assert!(report.day_ended);
    assert_eq!(node.current_hour(), 0.0);
    assert!(node.tasks().is_empty());
    assert_eq!(report.released.len(), 1);
    let released = &report.released[0];
    assert_eq!(released.assignee(), None);
    assert_eq!(released.state(), TaskState::NotStarted);
    assert!((released.progress() - 0.25).abs() < 1e-6);
  }

  #[test]
  fn level_up_leaves_difficulty_alone() {
    let mut node = node(NodeConfig::artist());
    node.add_task(Task::medium_compositing(TaskId(1))).unwrap();
    node.level_up();
    assert_eq!(node.level(), 2);
    assert_eq!(node.production_rate(), 1.5);
    assert_eq!(node.work_hours(), 9);
    assert_eq!(node.task(TaskId(1)).unwrap().difficulty(), 0.5);
  }

  #[test]
  fn certain_failure_fails_unfinished_tasks_only() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut node = node(NodeConfig::artist());
    node.add_task(empty(1)).unwrap();
    node.add_task(Task::medium_compositing(TaskId(2))).unwrap();

    let report = node.update_with(1.0, &FixedChance(1.0), &mut rng);
    assert_eq!(report.completed, vec![TaskId(1)]);
    assert_eq!(report.failed, vec![TaskId(2)]);
    assert_eq!(node.task(TaskId(2)).unwrap().state(), TaskState::Failed);
  }

  #[test]
  fn retry_resets_progress_unlike_removal() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut node = node(NodeConfig::artist());
    node.add_task(Task::medium_compositing(TaskId(1))).unwrap();
    node.update_with(0.5, &FixedChance(1.0), &mut rng);
    assert!(node.task(TaskId(1)).unwrap().progress() > 0.0);

    node.retry_task(TaskId(1)).unwrap();
    let task = node.task(TaskId(1)).unwrap();
    assert_eq!(task.state(), TaskState::InProgress);
    assert_eq!(task.progress(), 0.0);
    assert!(node.retry_task(TaskId(9)).is_err());
  }

  #[test]
  fn never_fail_matches_plain_update() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut node = node(NodeConfig::artist());
    node.add_task(Task::medium_compositing(TaskId(1))).unwrap();
    for _ in 0..3 {
      assert!(node.update_with(0.5, &NeverFail, &mut rng).failed.is_empty());
    }
  }

  #[test]
  fn zero_time_changes_nothing() {
    let mut node = node(NodeConfig::artist());
    node.add_task(empty(1)).unwrap();
    assert!(node.update(0.0).is_quiet());
    assert_eq!(node.current_hour(), 0.0);
    assert_eq!(node.task(TaskId(1)).unwrap().progress(), 0.0);
  }

  #[test]
  fn load_and_hours_for_the_renderer() {
    let mut node = node(NodeConfig::artist().with_task_slots(4));
    node.add_tasks((1..=3).map(empty));
    assert_eq!(node.load(), 0.75);
    node.update(2.0);
    assert_eq!(node.hour_fraction(), 0.25);
  }

  #[test]
  fn day_end_policy_parses() {
    assert_eq!("clear".parse::<DayEndPolicy>(), Ok(DayEndPolicy::ClearTasks));
    assert_eq!("Keep".parse::<DayEndPolicy>(), Ok(DayEndPolicy::KeepTasks));
    assert!("drop".parse::<DayEndPolicy>().is_err());
  }
}
