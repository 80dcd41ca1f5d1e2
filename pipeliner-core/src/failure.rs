//! How likely a node is to botch the work it is doing.
//!
//! Lower level nodes and harder tasks should fail more often, but there is no
//! agreed curve for that yet, so the chance is a pluggable policy. The
//! default never fails.

/// Probability that a task in progress fails during one update.
pub trait FailurePolicy: Send + Sync {
  /// `level` is the assignee's level, `difficulty` the task's, `delta_time`
  /// the length of the update in hours. Values outside `[0, 1]` are clamped.
  fn failure_chance(&self, level: u32, difficulty: f32, delta_time: f32) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFail;

impl FailurePolicy for NeverFail {
  fn failure_chance(&self, _level: u32, _difficulty: f32, _delta_time: f32) -> f64 {
    0.0
  }
}

/// Same chance for every task on every update.
#[derive(Debug, Clone, Copy)]
pub struct FixedChance(pub f64);

impl FailurePolicy for FixedChance {
  fn failure_chance(&self, _level: u32, _difficulty: f32, _delta_time: f32) -> f64 {
    self.0
  }
}

impl<F> FailurePolicy for F
where
  F: Fn(u32, f32, f32) -> f64 + Send + Sync,
{
  fn failure_chance(&self, level: u32, difficulty: f32, delta_time: f32) -> f64 {
    self(level, difficulty, delta_time)
  }
}

/// Normalised chance, `None` when there is nothing to roll for.
pub(crate) fn effective_chance(policy: &dyn FailurePolicy, level: u32, difficulty: f32, delta_time: f32) -> Option<f64> {
  let chance = policy.failure_chance(level, difficulty, delta_time);
  if chance > 0.0 {
    Some(chance.min(1.0))
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn never_fail_has_nothing_to_roll() {
    assert_eq!(effective_chance(&NeverFail, 1, 1.0, 8.0), None);
  }

  #[test]
  fn chances_are_clamped() {
    assert_eq!(effective_chance(&FixedChance(3.0), 1, 0.5, 1.0), Some(1.0));
    assert_eq!(effective_chance(&FixedChance(-0.5), 1, 0.5, 1.0), None);
    assert_eq!(effective_chance(&FixedChance(f64::NAN), 1, 0.5, 1.0), None);
  }

  #[test]
  fn closures_are_policies() {
    let by_level = |level: u32, difficulty: f32, _: f32| difficulty as f64 / level as f64;
    assert_eq!(effective_chance(&by_level, 2, 0.5, 1.0), Some(0.25));
  }
}
