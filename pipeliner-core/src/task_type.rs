use std::{fmt, str::FromStr};

use crate::{error::EngineError, Rgba};

/// Category of work. Nodes use it as a capability tag.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskType {
  Empty,
  Compositing,
  Rendering,
  Modeling,
  Rotoscoping,
}

impl TaskType {
  pub const ALL: [TaskType; 5] = [
    TaskType::Empty,
    TaskType::Compositing,
    TaskType::Rendering,
    TaskType::Modeling,
    TaskType::Rotoscoping,
  ];

  /// Case-insensitive lookup by display name.
  pub fn get(name: &str) -> Option<TaskType> {
    let name = name.trim();
    Self::ALL
      .into_iter()
      .find(|task_type| task_type.name().eq_ignore_ascii_case(name))
  }

  pub const fn name(self) -> &'static str {
    match self {
      TaskType::Empty => "Empty",
      TaskType::Compositing => "Compositing",
      TaskType::Rendering => "Rendering",
      TaskType::Modeling => "Modeling",
      TaskType::Rotoscoping => "Rotoscoping",
    }
  }

  pub const fn color_tag(self) -> Rgba {
    match self {
      TaskType::Empty => Rgba::opaque(128, 128, 128),
      TaskType::Compositing => Rgba::opaque(200, 128, 128),
      TaskType::Rendering => Rgba::opaque(128, 200, 128),
      TaskType::Modeling => Rgba::opaque(128, 128, 200),
      TaskType::Rotoscoping => Rgba::opaque(200, 200, 128),
    }
  }

  /// Difficulty of this kind of work for a level 1 node.
  pub const fn base_difficulty(self) -> f32 {
    match self {
      TaskType::Empty => 0.0,
      TaskType::Compositing => 0.5,
      TaskType::Rendering => 0.8,
      TaskType::Modeling => 0.6,
      TaskType::Rotoscoping => 0.3,
    }
  }
}

impl fmt::Display for TaskType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for TaskType {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    TaskType::get(s).ok_or_else(|| EngineError::UnknownTaskType(s.to_string()))
  }
}
