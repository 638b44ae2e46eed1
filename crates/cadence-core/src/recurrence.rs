use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use thiserror::Error;
use tracing::debug;

use crate::wall_clock::{
  ClockError,
  Instant,
  WallClock
};

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
#[serde(rename_all = "lowercase")]
pub enum Frequency {
  Daily,
  Weekly,
  Monthly
}

impl Frequency {
  /// Unit counted by the interval.
  #[must_use]
  pub fn unit(self) -> &'static str {
    match self {
      | Self::Daily => "days",
      | Self::Weekly => "weeks",
      | Self::Monthly => "months"
    }
  }
}

impl FromStr for Frequency {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "daily" | "day" => {
        Ok(Self::Daily)
      }
      | "weekly" | "week" => {
        Ok(Self::Weekly)
      }
      | "monthly" | "month" => {
        Ok(Self::Monthly)
      }
      | other => {
        Err(anyhow!(
          "unknown frequency: {other}"
        ))
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
  Mon,
  Tue,
  Wed,
  Thu,
  Fri,
  Sat,
  Sun
}

impl FromStr for Weekday {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "monday" | "mon" => {
        Ok(Self::Mon)
      }
      | "tuesday" | "tue" | "tues" => {
        Ok(Self::Tue)
      }
      | "wednesday" | "wed" => {
        Ok(Self::Wed)
      }
      | "thursday" | "thu" | "thur"
      | "thurs" => Ok(Self::Thu),
      | "friday" | "fri" => {
        Ok(Self::Fri)
      }
      | "saturday" | "sat" => {
        Ok(Self::Sat)
      }
      | "sunday" | "sun" => {
        Ok(Self::Sun)
      }
      | other => {
        Err(anyhow!(
          "unknown weekday: {other}"
        ))
      }
    }
  }
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
#[serde(rename_all = "camelCase")]
pub enum EndCondition {
  #[default]
  Never,
  AfterCount,
  UntilDate
}

impl FromStr for EndCondition {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "never" => Ok(Self::Never),
      | "count" | "after" | "aftercount" => {
        Ok(Self::AfterCount)
      }
      | "until" | "date" | "untildate" => {
        Ok(Self::UntilDate)
      }
      | other => {
        Err(anyhow!(
          "unknown end condition: \
           {other}"
        ))
      }
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum RecurrenceError {
  #[error(
    "recurring items need a frequency"
  )]
  MissingFrequency,
  #[error(
    "recurrence interval must be at \
     least 1"
  )]
  MissingInterval,
  #[error(
    "weekly recurrence needs at least \
     one weekday"
  )]
  MissingWeekdays,
  #[error(
    "recurrence ending after a count \
     needs a positive occurrence count"
  )]
  MissingOccurrenceCount,
  #[error(
    "recurrence ending on a date needs \
     an end date"
  )]
  MissingEndDate,
  #[error(transparent)]
  Clock(#[from] ClockError)
}

/// Form-side recurrence state. Numeric
/// fields are signed so out-of-range
/// input reaches the validator.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct RecurrenceDraft {
  pub frequency:     Option<Frequency>,
  pub interval:      Option<i64>,
  pub days_of_week:  BTreeSet<Weekday>,
  pub end_condition: EndCondition,
  pub end_count:     Option<i64>,
  pub end_date:      Option<NaiveDate>
}

/// How a recurrence stops. Exactly one
/// of the end fields exists per
/// variant.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(
  tag = "endCondition",
  rename_all = "camelCase"
)]
pub enum RecurrenceEnd {
  Never,
  #[serde(rename_all = "camelCase")]
  AfterCount {
    end_count: u32
  },
  #[serde(rename_all = "camelCase")]
  UntilDate {
    end_date: Instant
  }
}

impl RecurrenceEnd {
  #[must_use]
  pub fn condition(
    &self
  ) -> EndCondition {
    match self {
      | Self::Never => {
        EndCondition::Never
      }
      | Self::AfterCount { .. } => {
        EndCondition::AfterCount
      }
      | Self::UntilDate { .. } => {
        EndCondition::UntilDate
      }
    }
  }
}

/// Validated recurrence rule as it is
/// submitted.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePattern {
  pub frequency:    Frequency,
  pub interval:     u32,
  #[serde(
    default,
    skip_serializing_if = "Vec::is_empty"
  )]
  pub days_of_week: Vec<Weekday>,
  #[serde(flatten)]
  pub end:          RecurrenceEnd
}

/// Checks a draft. Nothing is checked
/// when the item is not recurring.
#[tracing::instrument(skip(draft))]
pub fn validate(
  draft: &RecurrenceDraft,
  is_recurring: bool
) -> Result<(), RecurrenceError> {
  if !is_recurring {
    return Ok(());
  }

  let frequency =
    draft.frequency.ok_or(
      RecurrenceError::MissingFrequency
    )?;

  if !matches!(draft.interval, Some(n) if n > 0)
  {
    return Err(
      RecurrenceError::MissingInterval
    );
  }

  if frequency == Frequency::Weekly
    && draft.days_of_week.is_empty()
  {
    return Err(
      RecurrenceError::MissingWeekdays
    );
  }

  match draft.end_condition {
    | EndCondition::Never => {}
    | EndCondition::AfterCount => {
      if !matches!(draft.end_count, Some(n) if n > 0)
      {
        return Err(RecurrenceError::MissingOccurrenceCount);
      }
    }
    | EndCondition::UntilDate => {
      if draft.end_date.is_none() {
        return Err(
          RecurrenceError::MissingEndDate
        );
      }
    }
  }

  Ok(())
}

impl RecurrenceDraft {
  pub fn toggle_weekday(
    &mut self,
    day: Weekday
  ) {
    if !self.days_of_week.remove(&day) {
      self.days_of_week.insert(day);
    }
  }

  /// Rebuilds a draft from a saved
  /// pattern.
  pub fn from_pattern(
    pattern: &RecurrencePattern,
    clock: &WallClock
  ) -> Result<Self, RecurrenceError> {
    let mut draft = Self {
      frequency: Some(
        pattern.frequency
      ),
      interval: Some(i64::from(
        pattern.interval
      )),
      days_of_week: pattern
        .days_of_week
        .iter()
        .copied()
        .collect(),
      end_condition: pattern
        .end
        .condition(),
      end_count: None,
      end_date: None
    };

    match pattern.end {
      | RecurrenceEnd::Never => {}
      | RecurrenceEnd::AfterCount {
        end_count
      } => {
        draft.end_count =
          Some(i64::from(end_count));
      }
      | RecurrenceEnd::UntilDate {
        end_date
      } => {
        let (date, _) =
          clock.split(end_date)?;
        draft.end_date = Some(date);
      }
    }

    Ok(draft)
  }

  /// Validates and materializes the
  /// submitted shape: `None` unless
  /// recurring, weekdays only for
  /// weekly rules, and only the end
  /// field matching the condition.
  #[tracing::instrument(skip(self, clock))]
  pub fn build(
    &self,
    is_recurring: bool,
    clock: &WallClock
  ) -> Result<
    Option<RecurrencePattern>,
    RecurrenceError
  > {
    validate(self, is_recurring)?;
    if !is_recurring {
      return Ok(None);
    }

    let (Some(frequency), Some(interval)) =
      (self.frequency, self.interval)
    else {
      return Err(
        RecurrenceError::MissingFrequency
      );
    };
    let interval =
      u32::try_from(interval).map_err(
        |_| {
          RecurrenceError::MissingInterval
        }
      )?;

    let days_of_week =
      if frequency == Frequency::Weekly {
        self
          .days_of_week
          .iter()
          .copied()
          .collect()
      } else {
        vec![]
      };

    let end = match self.end_condition {
      | EndCondition::Never => {
        RecurrenceEnd::Never
      }
      | EndCondition::AfterCount => {
        let end_count = self
          .end_count
          .and_then(|n| {
            u32::try_from(n).ok()
          })
          .ok_or(RecurrenceError::MissingOccurrenceCount)?;
        RecurrenceEnd::AfterCount {
          end_count
        }
      }
      | EndCondition::UntilDate => {
        let date = self.end_date.ok_or(
          RecurrenceError::MissingEndDate
        )?;
        RecurrenceEnd::UntilDate {
          end_date: clock
            .to_instant(date, None)?
        }
      }
    };

    let pattern = RecurrencePattern {
      frequency,
      interval,
      days_of_week,
      end
    };
    debug!(?pattern, "built recurrence pattern");
    Ok(Some(pattern))
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    EndCondition,
    Frequency,
    RecurrenceDraft,
    RecurrenceEnd,
    RecurrenceError,
    Weekday,
    validate
  };
  use crate::wall_clock::WallClock;

  fn weekly_draft() -> RecurrenceDraft {
    RecurrenceDraft {
      frequency: Some(Frequency::Weekly),
      interval: Some(1),
      days_of_week: [
        Weekday::Mon,
        Weekday::Thu
      ]
      .into_iter()
      .collect(),
      ..RecurrenceDraft::default()
    }
  }

  #[test]
  fn weekly_without_days_is_rejected() {
    let draft = RecurrenceDraft {
      frequency: Some(Frequency::Weekly),
      interval: Some(1),
      ..RecurrenceDraft::default()
    };
    assert_eq!(
      validate(&draft, true),
      Err(
        RecurrenceError::MissingWeekdays
      )
    );
  }

  #[test]
  fn missing_fields_are_reported_in_order()
   {
    let mut draft =
      RecurrenceDraft::default();
    assert_eq!(
      validate(&draft, true),
      Err(
        RecurrenceError::MissingFrequency
      )
    );

    draft.frequency =
      Some(Frequency::Daily);
    assert_eq!(
      validate(&draft, true),
      Err(
        RecurrenceError::MissingInterval
      )
    );

    draft.interval = Some(0);
    assert_eq!(
      validate(&draft, true),
      Err(
        RecurrenceError::MissingInterval
      )
    );

    draft.interval = Some(3);
    draft.end_condition =
      EndCondition::AfterCount;
    assert_eq!(
      validate(&draft, true),
      Err(RecurrenceError::MissingOccurrenceCount)
    );

    draft.end_count = Some(4);
    assert_eq!(
      validate(&draft, true),
      Ok(())
    );
  }

  #[test]
  fn not_recurring_skips_validation() {
    let draft =
      RecurrenceDraft::default();
    assert_eq!(
      validate(&draft, false),
      Ok(())
    );
    assert_eq!(
      draft
        .build(false, &WallClock::local())
        .expect("build"),
      None
    );
  }

  #[test]
  fn build_drops_days_for_non_weekly() {
    let mut draft = weekly_draft();
    draft.frequency =
      Some(Frequency::Monthly);
    let pattern = draft
      .build(true, &WallClock::local())
      .expect("build")
      .expect("recurring");
    assert!(
      pattern.days_of_week.is_empty()
    );
    assert_eq!(
      pattern.end,
      RecurrenceEnd::Never
    );
  }

  #[test]
  fn build_keeps_only_matching_end_field()
   {
    let clock = WallClock::with_zone(
      chrono_tz::UTC
    );
    let mut draft = weekly_draft();
    draft.end_count = Some(8);
    draft.end_date =
      NaiveDate::from_ymd_opt(2024, 12, 31);
    draft.end_condition =
      EndCondition::UntilDate;

    let pattern = draft
      .build(true, &clock)
      .expect("build")
      .expect("recurring");
    assert_eq!(
      pattern.days_of_week,
      vec![Weekday::Mon, Weekday::Thu]
    );
    let expected = clock
      .to_instant(
        NaiveDate::from_ymd_opt(
          2024, 12, 31
        )
        .expect("date"),
        None
      )
      .expect("instant");
    assert_eq!(
      pattern.end,
      RecurrenceEnd::UntilDate {
        end_date: expected
      }
    );

    let json =
      serde_json::to_value(&pattern)
        .expect("serialize");
    assert_eq!(
      json["endCondition"],
      "untilDate"
    );
    assert!(json.get("endCount").is_none());
    assert_eq!(
      json["daysOfWeek"],
      serde_json::json!(["mon", "thu"])
    );

    let reopened =
      RecurrenceDraft::from_pattern(
        &pattern, &clock
      )
      .expect("reopen");
    assert_eq!(
      reopened.end_date,
      draft.end_date
    );
    assert_eq!(reopened.end_count, None);
  }

  #[test]
  fn until_date_requires_date() {
    let mut draft = weekly_draft();
    draft.end_condition =
      EndCondition::UntilDate;
    assert_eq!(
      validate(&draft, true),
      Err(
        RecurrenceError::MissingEndDate
      )
    );
  }

  #[test]
  fn toggling_weekdays() {
    let mut draft =
      RecurrenceDraft::default();
    draft.toggle_weekday(Weekday::Fri);
    draft.toggle_weekday(Weekday::Tue);
    draft.toggle_weekday(Weekday::Fri);
    assert_eq!(
      draft
        .days_of_week
        .iter()
        .copied()
        .collect::<Vec<_>>(),
      vec![Weekday::Tue]
    );
  }

  #[test]
  fn parses_names() {
    assert_eq!(
      "Thursday"
        .parse::<Weekday>()
        .expect("weekday"),
      Weekday::Thu
    );
    assert_eq!(
      "weekly"
        .parse::<Frequency>()
        .expect("frequency"),
      Frequency::Weekly
    );
    assert_eq!(
      "count"
        .parse::<EndCondition>()
        .expect("end"),
      EndCondition::AfterCount
    );
    assert!(
      "fortnightly"
        .parse::<Frequency>()
        .is_err()
    );
  }
}
