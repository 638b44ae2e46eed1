use std::collections::HashMap;

use tracing::debug;

use crate::config::Config;
use crate::form::{
  TaskPriority,
  TaskStatus,
  TaskType
};
use crate::recurrence::{
  EndCondition,
  Frequency,
  Weekday
};

const LABEL_PREFIX: &str = "label.";

/// A variant with a display label that
/// config can override under
/// `label.<GROUP>.<key>`.
pub trait Labeled: Copy {
  const GROUP: &'static str;

  fn key(self) -> &'static str;

  fn default_label(self) -> &'static str;
}

#[derive(Debug, Clone, Default)]
pub struct Labels {
  overrides: HashMap<String, String>
}

impl Labels {
  #[must_use]
  pub fn from_config(
    cfg: &Config
  ) -> Self {
    let overrides: HashMap<_, _> = cfg
      .with_prefix(LABEL_PREFIX)
      .map(|(key, value)| {
        (key.to_string(), value.to_string())
      })
      .collect();
    debug!(
      overrides = overrides.len(),
      "loaded label overrides"
    );
    Self {
      overrides
    }
  }

  pub fn label<T: Labeled>(
    &self,
    value: T
  ) -> &str {
    self
      .overrides
      .get(&format!(
        "{}.{}",
        T::GROUP,
        value.key()
      ))
      .map(String::as_str)
      .unwrap_or_else(|| {
        value.default_label()
      })
  }
}

impl Labeled for TaskStatus {
  const GROUP: &'static str = "status";

  fn key(self) -> &'static str {
    match self {
      | Self::NotStarted => "not_started",
      | Self::InProgress => "in_progress",
      | Self::Completed => "completed",
      | Self::Cancelled => "cancelled"
    }
  }

  fn default_label(self) -> &'static str {
    match self {
      | Self::NotStarted => "Not started",
      | Self::InProgress => "In progress",
      | Self::Completed => "Completed",
      | Self::Cancelled => "Cancelled"
    }
  }
}

impl Labeled for TaskPriority {
  const GROUP: &'static str =
    "priority";

  fn key(self) -> &'static str {
    match self {
      | Self::Low => "low",
      | Self::Medium => "medium",
      | Self::High => "high",
      | Self::Critical => "critical"
    }
  }

  fn default_label(self) -> &'static str {
    match self {
      | Self::Low => "Low",
      | Self::Medium => "Medium",
      | Self::High => "High",
      | Self::Critical => "Critical"
    }
  }
}

impl Labeled for TaskType {
  const GROUP: &'static str = "type";

  fn key(self) -> &'static str {
    match self {
      | Self::Study => "study",
      | Self::Work => "work",
      | Self::Hobby => "hobby",
      | Self::Health => "health",
      | Self::Habit => "habit",
      | Self::Chores => "chores",
      | Self::Commute => "commute"
    }
  }

  fn default_label(self) -> &'static str {
    match self {
      | Self::Study => "Study",
      | Self::Work => "Work",
      | Self::Hobby => "Hobby",
      | Self::Health => "Health",
      | Self::Habit => "Habit",
      | Self::Chores => "Chores",
      | Self::Commute => "Commute"
    }
  }
}

impl Labeled for Frequency {
  const GROUP: &'static str =
    "frequency";

  fn key(self) -> &'static str {
    match self {
      | Self::Daily => "daily",
      | Self::Weekly => "weekly",
      | Self::Monthly => "monthly"
    }
  }

  fn default_label(self) -> &'static str {
    match self {
      | Self::Daily => "Daily",
      | Self::Weekly => "Weekly",
      | Self::Monthly => "Monthly"
    }
  }
}

impl Labeled for EndCondition {
  const GROUP: &'static str = "end";

  fn key(self) -> &'static str {
    match self {
      | Self::Never => "never",
      | Self::AfterCount => "after_count",
      | Self::UntilDate => "until_date"
    }
  }

  fn default_label(self) -> &'static str {
    match self {
      | Self::Never => "Never",
      | Self::AfterCount => {
        "After a number of occurrences"
      }
      | Self::UntilDate => "On a date"
    }
  }
}

impl Labeled for Weekday {
  const GROUP: &'static str = "weekday";

  fn key(self) -> &'static str {
    match self {
      | Self::Mon => "mon",
      | Self::Tue => "tue",
      | Self::Wed => "wed",
      | Self::Thu => "thu",
      | Self::Fri => "fri",
      | Self::Sat => "sat",
      | Self::Sun => "sun"
    }
  }

  fn default_label(self) -> &'static str {
    match self {
      | Self::Mon => "Mon",
      | Self::Tue => "Tue",
      | Self::Wed => "Wed",
      | Self::Thu => "Thu",
      | Self::Fri => "Fri",
      | Self::Sat => "Sat",
      | Self::Sun => "Sun"
    }
  }
}
