//! Form sessions for tasks and time
//! blocks.
//!
//! A session owns one synchronizer and
//! one recurrence draft. `submit` runs
//! every validation and produces the
//! payload handed to the persistence
//! layer; on error nothing in the
//! session changes.

use std::sync::OnceLock;

use regex::Regex;
use serde::{
  Deserialize,
  Serialize
};
use thiserror::Error;
use tracing::{
  debug,
  info
};
use uuid::Uuid;

use crate::recurrence::{
  RecurrenceDraft,
  RecurrenceError,
  RecurrencePattern
};
use crate::schedule::{
  ScheduleError,
  TimeRangeSynchronizer
};
use crate::tags::parse_tags;
use crate::wall_clock::{
  Instant,
  WallClock
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
pub enum TaskStatus {
  #[default]
  NotStarted,
  InProgress,
  Completed,
  Cancelled
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
pub enum TaskPriority {
  Low,
  #[default]
  Medium,
  High,
  Critical
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
pub enum TaskType {
  Study,
  Work,
  Hobby,
  Health,
  Habit,
  Chores,
  Commute
}

#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum FormError {
  #[error("title must not be blank")]
  MissingTitle,
  #[error(
    "color must be #RGB or #RRGGBB, \
     got {0:?}"
  )]
  InvalidColor(String),
  #[error(transparent)]
  Schedule(#[from] ScheduleError),
  #[error(transparent)]
  Recurrence(#[from] RecurrenceError)
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
  pub title:                   String,
  pub description:             Option<String>,
  pub status:                  TaskStatus,
  pub priority:                TaskPriority,
  pub task_type:               Option<TaskType>,
  pub color:                   Option<String>,
  pub scheduled_time:          Option<Instant>,
  pub is_all_day:              bool,
  pub time_estimate_minutes:   Option<u32>,
  pub actual_duration_minutes: Option<u32>,
  #[serde(default)]
  pub tags:                    Vec<String>,
  #[serde(default)]
  pub collaborator_ids:        Vec<Uuid>,
  pub assignee_id:             Option<Uuid>,
  pub parent_id:               Option<Uuid>,
  pub is_recurring:            bool,
  pub recurrence_pattern:      Option<RecurrencePattern>
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlockPayload {
  pub title:              String,
  pub description:        Option<String>,
  pub color:              Option<String>,
  pub start_time:         Instant,
  pub end_time:           Instant,
  pub is_all_day:         bool,
  pub duration_minutes:   u32,
  #[serde(default)]
  pub tags:               Vec<String>,
  pub task_id:            Option<Uuid>,
  pub is_recurring:       bool,
  pub recurrence_pattern: Option<RecurrencePattern>
}

#[derive(Debug, Clone)]
pub struct TaskForm {
  pub title:                   String,
  pub description:             String,
  pub status:                  TaskStatus,
  pub priority:                TaskPriority,
  pub task_type:               Option<TaskType>,
  pub color:                   String,
  pub schedule:                TimeRangeSynchronizer,
  pub actual_duration_minutes: Option<u32>,
  pub tags_text:               String,
  pub collaborator_ids:        Vec<Uuid>,
  pub assignee_id:             Option<Uuid>,
  pub parent_id:               Option<Uuid>,
  pub is_recurring:            bool,
  pub recurrence:              RecurrenceDraft
}

impl TaskForm {
  #[must_use]
  pub fn new(clock: WallClock) -> Self {
    Self {
      title: String::new(),
      description: String::new(),
      status: TaskStatus::default(),
      priority: TaskPriority::default(),
      task_type: None,
      color: String::new(),
      schedule: TimeRangeSynchronizer::new(
        clock
      ),
      actual_duration_minutes: None,
      tags_text: String::new(),
      collaborator_ids: vec![],
      assignee_id: None,
      parent_id: None,
      is_recurring: false,
      recurrence: RecurrenceDraft::default()
    }
  }

  #[tracing::instrument(skip(self))]
  pub fn submit(
    &self
  ) -> Result<TaskPayload, FormError> {
    let title =
      required_title(&self.title)?;
    let color = optional_color(&self.color)?;
    let schedule =
      self.schedule.finalize()?;
    let recurrence_pattern =
      self.recurrence.build(
        self.is_recurring,
        &self.schedule.clock()
      )?;

    let mut collaborator_ids =
      self.collaborator_ids.clone();
    if let Some(assignee) =
      self.assignee_id
      && !collaborator_ids.contains(&assignee)
    {
      debug!(%assignee, "adding assignee to collaborators");
      collaborator_ids.push(assignee);
    }

    let payload = TaskPayload {
      title,
      description: optional_text(
        &self.description
      ),
      status: self.status,
      priority: self.priority,
      task_type: self.task_type,
      color,
      scheduled_time: schedule.scheduled,
      is_all_day: schedule.is_all_day,
      time_estimate_minutes: schedule
        .duration_minutes,
      actual_duration_minutes: self
        .actual_duration_minutes,
      tags: parse_tags(&self.tags_text),
      collaborator_ids,
      assignee_id: self.assignee_id,
      parent_id: self.parent_id,
      is_recurring: self.is_recurring,
      recurrence_pattern
    };
    info!(
      title = %payload.title,
      recurring = payload.is_recurring,
      "task form submitted"
    );
    Ok(payload)
  }
}

#[derive(Debug, Clone)]
pub struct TimeBlockForm {
  pub title:        String,
  pub description:  String,
  pub color:        String,
  pub schedule:     TimeRangeSynchronizer,
  pub tags_text:    String,
  pub task_id:      Option<Uuid>,
  pub is_recurring: bool,
  pub recurrence:   RecurrenceDraft
}

impl TimeBlockForm {
  #[must_use]
  pub fn new(clock: WallClock) -> Self {
    Self {
      title: String::new(),
      description: String::new(),
      color: String::new(),
      schedule: TimeRangeSynchronizer::new(
        clock
      ),
      tags_text: String::new(),
      task_id: None,
      is_recurring: false,
      recurrence: RecurrenceDraft::default()
    }
  }

  #[tracing::instrument(skip(self))]
  pub fn submit(
    &self
  ) -> Result<TimeBlockPayload, FormError>
  {
    let title =
      required_title(&self.title)?;
    let color = optional_color(&self.color)?;
    let schedule =
      self.schedule.finalize()?;
    let start_time = schedule
      .scheduled
      .ok_or(ScheduleError::MissingStart)?;
    let end_time = schedule
      .end
      .ok_or(ScheduleError::MissingEnd)?;
    let recurrence_pattern =
      self.recurrence.build(
        self.is_recurring,
        &self.schedule.clock()
      )?;

    let duration_minutes = schedule
      .duration_minutes
      .unwrap_or_else(|| {
        u32::try_from(
          start_time
            .minutes_until(end_time)
            .max(0)
        )
        .unwrap_or(u32::MAX)
      });

    let payload = TimeBlockPayload {
      title,
      description: optional_text(
        &self.description
      ),
      color,
      start_time,
      end_time,
      is_all_day: schedule.is_all_day,
      duration_minutes,
      tags: parse_tags(&self.tags_text),
      task_id: self.task_id,
      is_recurring: self.is_recurring,
      recurrence_pattern
    };
    info!(
      title = %payload.title,
      %start_time,
      %end_time,
      "time block form submitted"
    );
    Ok(payload)
  }
}

fn required_title(
  text: &str
) -> Result<String, FormError> {
  optional_text(text)
    .ok_or(FormError::MissingTitle)
}

fn optional_text(
  text: &str
) -> Option<String> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_string())
  }
}

fn optional_color(
  text: &str
) -> Result<Option<String>, FormError> {
  let Some(color) = optional_text(text)
  else {
    return Ok(None);
  };
  if is_hex_color(&color) {
    Ok(Some(color))
  } else {
    Err(FormError::InvalidColor(color))
  }
}

fn is_hex_color(value: &str) -> bool {
  static HEX_COLOR: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  HEX_COLOR
    .get_or_init(|| {
      Regex::new(
        r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$"
      )
      .map_err(|err| {
        tracing::error!(error = %err, "internal regex compile failure");
      })
      .ok()
    })
    .as_ref()
    .is_some_and(|re| re.is_match(value))
}
