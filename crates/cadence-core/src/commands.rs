use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Instant as MonoInstant;

use anyhow::{
  Context,
  anyhow
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  info,
  warn
};
use uuid::Uuid;

use crate::cli::{
  Command,
  ParentsArgs,
  RecurrenceArgs,
  ScheduleArgs,
  TagsArgs
};
use crate::config::Config;
use crate::flash::TransientFlag;
use crate::hierarchy::{
  TaskNode,
  check_parent,
  compute_excluded,
  filter_candidate_parents
};
use crate::labels::Labels;
use crate::recurrence::{
  EndCondition,
  Frequency,
  RecurrenceDraft,
  RecurrencePattern,
  Weekday
};
use crate::schedule::{
  FinalSchedule,
  ScheduleError,
  TimeRangeSynchronizer
};
use crate::tags::{
  TagCorpus,
  TagSuggestionMatcher
};
use crate::wall_clock::{
  WallClock,
  parse_date_field,
  parse_time_field
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleReport {
  #[serde(flatten)]
  pub schedule:    FinalSchedule,
  pub zone:        String,
  pub start_local: Option<String>,
  pub end_local:   Option<String>,
  /// Whether the invalid-range flag on
  /// the end fields is still showing.
  pub end_flagged: bool
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceReport {
  pub pattern: Option<RecurrencePattern>,
  pub summary: Option<String>
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentsReport<'a> {
  pub excluded:   Vec<Uuid>,
  pub candidates: Vec<&'a TaskNode>
}

#[derive(Debug, Deserialize)]
struct TaggedItem {
  #[serde(default)]
  tags: Vec<String>
}

#[tracing::instrument(skip_all)]
pub fn dispatch<W: Write>(
  cfg: &Config,
  command: Command,
  out: &mut W
) -> anyhow::Result<()> {
  let clock = cfg.wall_clock();
  match command {
    | Command::Schedule(args) => {
      cmd_schedule(cfg, clock, &args, out)
    }
    | Command::Recurrence(args) => {
      cmd_recurrence(cfg, clock, &args, out)
    }
    | Command::Tags(args) => {
      cmd_tags(&args, out)
    }
    | Command::Parents(args) => {
      cmd_parents(&args, out)
    }
  }
}

fn cmd_schedule<W: Write>(
  cfg: &Config,
  clock: WallClock,
  args: &ScheduleArgs,
  out: &mut W
) -> anyhow::Result<()> {
  let mut sync =
    TimeRangeSynchronizer::new(clock);
  let mut flash = TransientFlag::new(
    cfg.invalid_range_flash()
  );

  sync.set_start(
    parse_date_field(&args.start_date)?,
    parse_time_field(&args.start_time)?
  )?;

  if let Some(end_date) = &args.end_date {
    let edit = sync.set_end(
      parse_date_field(end_date)?,
      parse_time_field(&args.end_time)?
    );
    match edit {
      | Err(ScheduleError::InvalidRange {
        start,
        end
      }) => {
        flash.raise(MonoInstant::now());
        warn!(
          %start,
          %end,
          flash_ms = flash.ttl().as_millis(),
          "end precedes start; flagged end fields"
        );
      }
      | other => other?
    }
  }

  if args.duration.is_some() {
    sync.set_duration(args.duration)?;
  }

  let schedule = sync
    .finalize()
    .context("schedule cannot be submitted")?;
  let report = ScheduleReport {
    schedule,
    zone: clock.zone_name(),
    start_local: schedule
      .scheduled
      .map(|at| clock.format(at))
      .transpose()?,
    end_local: schedule
      .end
      .map(|at| clock.format(at))
      .transpose()?,
    end_flagged: flash
      .is_visible(MonoInstant::now())
  };
  write_json(out, &report)
}

fn cmd_recurrence<W: Write>(
  cfg: &Config,
  clock: WallClock,
  args: &RecurrenceArgs,
  out: &mut W
) -> anyhow::Result<()> {
  let draft = RecurrenceDraft {
    frequency: args
      .frequency
      .as_deref()
      .map(str::parse::<Frequency>)
      .transpose()?,
    interval: args.interval,
    days_of_week: args
      .days
      .iter()
      .map(|day| day.parse::<Weekday>())
      .collect::<anyhow::Result<_>>()?,
    end_condition: args
      .end
      .parse::<EndCondition>()?,
    end_count: args.count,
    end_date: args
      .until
      .as_deref()
      .map(parse_date_field)
      .transpose()?
  };

  let pattern = draft
    .build(true, &clock)
    .context("recurrence is incomplete")?;
  let labels = Labels::from_config(cfg);
  let summary = pattern
    .as_ref()
    .map(|pattern| describe(&labels, pattern));
  info!(?summary, "recurrence validated");

  write_json(out, &RecurrenceReport {
    pattern,
    summary
  })
}

fn cmd_tags<W: Write>(
  args: &TagsArgs,
  out: &mut W
) -> anyhow::Result<()> {
  if let Some(tag) = &args.commit {
    let text = TagSuggestionMatcher::commit(
      &args.input,
      tag
    );
    return write_json(out, &text);
  }

  let items: Vec<TaggedItem> =
    read_json(&args.corpus)?;
  let corpus = TagCorpus::from_tag_lists(
    items.into_iter().map(|item| item.tags)
  );
  let matcher =
    TagSuggestionMatcher::new(&corpus);
  write_json(
    out,
    &matcher.suggest(&args.input)
  )
}

fn cmd_parents<W: Write>(
  args: &ParentsArgs,
  out: &mut W
) -> anyhow::Result<()> {
  let tasks: Vec<TaskNode> =
    read_json(&args.tasks)?;

  if let Some(parent) = args.parent {
    check_parent(args.task, parent, &tasks)?;
    return write_json(out, &parent);
  }

  let excluded =
    compute_excluded(args.task, &tasks);
  let candidates =
    filter_candidate_parents(
      &args.search,
      &tasks,
      &excluded
    );

  // Input order keeps the output stable.
  let excluded = tasks
    .iter()
    .map(|task| task.id)
    .filter(|id| excluded.contains(id))
    .chain(
      (!tasks
        .iter()
        .any(|task| task.id == args.task))
      .then_some(args.task)
    )
    .collect();

  write_json(out, &ParentsReport {
    excluded,
    candidates
  })
}

/// Human-readable rule summary built
/// from configured labels.
#[must_use]
pub fn describe(
  labels: &Labels,
  pattern: &RecurrencePattern
) -> String {
  let mut text = format!(
    "{}, every {} {}",
    labels.label(pattern.frequency),
    pattern.interval,
    pattern.frequency.unit()
  );
  if !pattern.days_of_week.is_empty() {
    let days: Vec<&str> = pattern
      .days_of_week
      .iter()
      .map(|day| labels.label(*day))
      .collect();
    text.push_str(&format!(
      " on {}",
      days.join(", ")
    ));
  }
  text.push_str(&format!(
    " ({})",
    labels.label(pattern.end.condition())
  ));
  text
}

fn read_json<T>(
  path: &Path
) -> anyhow::Result<T>
where
  T: for<'de> Deserialize<'de>
{
  let raw = fs::read_to_string(path)
    .with_context(|| {
      format!(
        "failed to read {}",
        path.display()
      )
    })?;
  serde_json::from_str(&raw).with_context(
    || {
      format!(
        "failed to parse {}",
        path.display()
      )
    }
  )
}

fn write_json<W, T>(
  out: &mut W,
  value: &T
) -> anyhow::Result<()>
where
  W: Write,
  T: Serialize + ?Sized
{
  serde_json::to_writer_pretty(
    &mut *out, value
  )
  .map_err(|e| {
    anyhow!("failed to encode output: {e}")
  })?;
  writeln!(out)
    .context("failed to write output")?;
  Ok(())
}
