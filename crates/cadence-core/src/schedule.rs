//! Start/end/duration synchronization
//! for one schedulable unit.
//!
//! Every edit goes through one of the
//! `set_*` operations, which leave the
//! five fields consistent. Between
//! `set_duration` and `set_end` the last
//! call wins; no field is remembered as
//! authoritative.

use chrono::{
  NaiveDate,
  NaiveTime
};
use serde::{
  Deserialize,
  Serialize
};
use thiserror::Error;
use tracing::{
  debug,
  warn
};

use crate::wall_clock::{
  ClockError,
  Instant,
  WallClock
};

#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum ScheduleError {
  #[error(
    "end {end} precedes start {start}"
  )]
  InvalidRange {
    start: Instant,
    end:   Instant
  },
  #[error("a start date is required")]
  MissingStart,
  #[error("an end date is required")]
  MissingEnd,
  #[error(transparent)]
  Clock(#[from] ClockError)
}

/// Resolved schedule produced on
/// submit.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct FinalSchedule {
  pub scheduled:        Option<Instant>,
  pub end:              Option<Instant>,
  pub is_all_day:       bool,
  pub duration_minutes: Option<u32>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRangeSynchronizer {
  clock:            WallClock,
  start_date:       Option<NaiveDate>,
  start_time:       Option<NaiveTime>,
  end_date:         Option<NaiveDate>,
  end_time:         Option<NaiveTime>,
  duration_minutes: Option<u32>
}

impl TimeRangeSynchronizer {
  #[must_use]
  pub fn new(clock: WallClock) -> Self {
    Self {
      clock,
      start_date: None,
      start_time: None,
      end_date: None,
      end_time: None,
      duration_minutes: None
    }
  }

  /// Seeds a synchronizer from a saved
  /// schedule, e.g. when reopening a
  /// unit for editing.
  pub fn from_schedule(
    clock: WallClock,
    schedule: &FinalSchedule
  ) -> Result<Self, ScheduleError> {
    let mut sync = Self::new(clock);
    sync.duration_minutes =
      schedule.duration_minutes;

    if let Some(start) =
      schedule.scheduled
    {
      let (date, time) =
        clock.split(start)?;
      sync.start_date = Some(date);
      sync.start_time =
        (!schedule.is_all_day)
          .then_some(time);
    }

    if let Some(end) = schedule.end {
      let (date, time) =
        clock.split(end)?;
      sync.end_date = Some(date);
      sync.end_time =
        (!schedule.is_all_day)
          .then_some(time);
    }

    Ok(sync)
  }

  #[must_use]
  pub fn clock(&self) -> WallClock {
    self.clock
  }

  #[must_use]
  pub fn start_date(
    &self
  ) -> Option<NaiveDate> {
    self.start_date
  }

  #[must_use]
  pub fn start_time(
    &self
  ) -> Option<NaiveTime> {
    self.start_time
  }

  #[must_use]
  pub fn end_date(
    &self
  ) -> Option<NaiveDate> {
    self.end_date
  }

  #[must_use]
  pub fn end_time(
    &self
  ) -> Option<NaiveTime> {
    self.end_time
  }

  #[must_use]
  pub fn duration_minutes(
    &self
  ) -> Option<u32> {
    self.duration_minutes
  }

  #[must_use]
  pub fn is_all_day(&self) -> bool {
    self.start_time.is_none()
  }

  pub fn start_instant(
    &self
  ) -> Result<Option<Instant>, ClockError>
  {
    self
      .start_date
      .map(|date| {
        self
          .clock
          .to_instant(date, self.start_time)
      })
      .transpose()
  }

  pub fn end_instant(
    &self
  ) -> Result<Option<Instant>, ClockError>
  {
    self
      .end_date
      .map(|date| {
        self
          .clock
          .to_instant(date, self.end_time)
      })
      .transpose()
  }

  /// Moves the start. A known duration
  /// re-projects the end; otherwise the
  /// end only moves when it would fall
  /// before the new start.
  #[tracing::instrument(skip(self))]
  pub fn set_start(
    &mut self,
    date: NaiveDate,
    time: Option<NaiveTime>
  ) -> Result<(), ScheduleError> {
    let start =
      self.clock.to_instant(date, time)?;

    if let Some(minutes) =
      self.duration_minutes
    {
      let (end_date, end_time) = self
        .clock
        .split(start.plus_minutes(minutes))?;
      self.start_date = Some(date);
      self.start_time = time;
      self.end_date = Some(end_date);
      self.end_time =
        time.map(|_| end_time);
      debug!(
        minutes,
        %end_date,
        "projected end from duration"
      );
      return Ok(());
    }

    let end = self.end_instant()?;
    self.start_date = Some(date);
    self.start_time = time;

    if let Some(end) = end
      && end < start
    {
      debug!(
        %end,
        %start,
        "end fell behind start; moving it forward"
      );
      self.end_date = Some(date);
      self.end_time = time;
    }

    Ok(())
  }

  /// Moves the end and derives the
  /// duration. An end before the start
  /// is kept as typed but reported as
  /// [`ScheduleError::InvalidRange`]
  /// with the duration left alone.
  #[tracing::instrument(skip(self))]
  pub fn set_end(
    &mut self,
    date: NaiveDate,
    time: Option<NaiveTime>
  ) -> Result<(), ScheduleError> {
    let end =
      self.clock.to_instant(date, time)?;
    let start = self.start_instant()?;

    self.end_date = Some(date);
    self.end_time = time;

    let Some(start) = start else {
      debug!(
        "no start yet; duration not \
         derived"
      );
      return Ok(());
    };

    if end < start {
      warn!(
        %start,
        %end,
        "end precedes start"
      );
      return Err(
        ScheduleError::InvalidRange {
          start,
          end
        }
      );
    }

    let minutes = clamp_minutes(
      start.minutes_until(end)
    );
    debug!(
      minutes,
      "derived duration from end"
    );
    self.duration_minutes =
      Some(minutes);
    Ok(())
  }

  /// Stores the duration and projects
  /// the end from the current start.
  /// Clearing the duration leaves the
  /// end untouched.
  #[tracing::instrument(skip(self))]
  pub fn set_duration(
    &mut self,
    minutes: Option<u32>
  ) -> Result<(), ScheduleError> {
    let Some(minutes) = minutes else {
      self.duration_minutes = None;
      return Ok(());
    };

    let start = self.start_instant()?;
    let projected = start
      .map(|start| {
        self
          .clock
          .split(start.plus_minutes(minutes))
      })
      .transpose()?;

    self.duration_minutes =
      Some(minutes);
    if let Some((end_date, end_time)) =
      projected
    {
      self.end_date = Some(end_date);
      self.end_time = self
        .start_time
        .map(|_| end_time);
    }
    Ok(())
  }

  /// Blanks both end fields; the
  /// duration is kept.
  pub fn clear_end(&mut self) {
    self.end_date = None;
    self.end_time = None;
  }

  /// Resolves the submit-time schedule
  /// without touching any field.
  #[tracing::instrument(skip(self))]
  pub fn finalize(
    &self
  ) -> Result<FinalSchedule, ScheduleError>
  {
    let is_all_day = self.is_all_day();
    let Some(start) =
      self.start_instant()?
    else {
      return Ok(FinalSchedule {
        scheduled: None,
        end: None,
        is_all_day,
        duration_minutes: self
          .duration_minutes
      });
    };

    let end = self.end_instant()?;
    if let Some(end) = end
      && end < start
    {
      warn!(
        %start,
        %end,
        "refusing to finalize inverted range"
      );
      return Err(
        ScheduleError::InvalidRange {
          start,
          end
        }
      );
    }

    let typed = self.duration_minutes;
    let schedule = match (end, typed) {
      | (None, Some(minutes))
        if is_all_day && minutes > 0 =>
      {
        FinalSchedule {
          scheduled: Some(start),
          end: None,
          is_all_day,
          duration_minutes: Some(
            minutes
          )
        }
      }
      | (Some(end), _) => {
        FinalSchedule {
          scheduled: Some(start),
          end: Some(end),
          is_all_day,
          duration_minutes: Some(
            clamp_minutes(
              start.minutes_until(end)
            )
          )
        }
      }
      | (None, Some(minutes))
        if !is_all_day =>
      {
        FinalSchedule {
          scheduled: Some(start),
          end: Some(
            start.plus_minutes(minutes)
          ),
          is_all_day,
          duration_minutes: Some(
            minutes
          )
        }
      }
      | (None, _) => {
        FinalSchedule {
          scheduled: Some(start),
          end: None,
          is_all_day,
          duration_minutes: None
        }
      }
    };

    debug!(
      ?schedule,
      "finalized schedule"
    );
    Ok(schedule)
  }
}

fn clamp_minutes(minutes: i64) -> u32 {
  u32::try_from(minutes.max(0))
    .unwrap_or(u32::MAX)
}
