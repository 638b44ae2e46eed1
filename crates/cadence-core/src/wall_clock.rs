use std::fmt;
use std::fs;
use std::path::PathBuf;

use chrono::{
  DateTime,
  Local,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};
use thiserror::Error;

const TIMEZONE_CONFIG_FILE: &str =
  "cadence-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "CADENCE_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "CADENCE_TIME_CONFIG";

pub const MILLIS_PER_MINUTE: i64 =
  60_000;

/// Absolute point in time, in
/// milliseconds since the Unix epoch.
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
#[serde(transparent)]
pub struct Instant(i64);

impl Instant {
  #[must_use]
  pub const fn from_millis(
    millis: i64
  ) -> Self {
    Self(millis)
  }

  #[must_use]
  pub const fn as_millis(self) -> i64 {
    self.0
  }

  #[must_use]
  pub fn plus_minutes(
    self,
    minutes: u32
  ) -> Self {
    Self(self.0.saturating_add(
      i64::from(minutes)
        * MILLIS_PER_MINUTE
    ))
  }

  /// Minutes from `self` to `later`,
  /// rounded to the nearest minute
  /// with halves rounding up.
  #[must_use]
  pub fn minutes_until(
    self,
    later: Instant
  ) -> i64 {
    let diff =
      later.0.saturating_sub(self.0);
    diff
      .saturating_add(
        MILLIS_PER_MINUTE / 2
      )
      .div_euclid(MILLIS_PER_MINUTE)
  }
}

impl fmt::Display for Instant {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match DateTime::<Utc>::from_timestamp_millis(self.0) {
      | Some(dt) => {
        write!(
          f,
          "{}",
          dt.format("%Y-%m-%dT%H:%M:%SZ")
        )
      }
      | None => {
        write!(f, "{}ms", self.0)
      }
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum ClockError {
  #[error(
    "local time {date} {time} does \
     not exist in {zone}"
  )]
  NonexistentLocalTime {
    date: NaiveDate,
    time: NaiveTime,
    zone: String
  },
  #[error(
    "instant {0} ms is outside the \
     representable range"
  )]
  InstantOutOfRange(i64),
  #[error(
    "invalid date {0:?}; expected \
     YYYY-MM-DD"
  )]
  InvalidDate(String),
  #[error(
    "invalid time {0:?}; expected \
     HH:MM"
  )]
  InvalidTime(String)
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Zone {
  Local,
  Named(Tz)
}

/// Converts between local wall-clock
/// date/time fields and [`Instant`]s.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct WallClock {
  zone: Zone
}

impl Default for WallClock {
  fn default() -> Self {
    Self::local()
  }
}

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

impl WallClock {
  #[must_use]
  pub const fn local() -> Self {
    Self {
      zone: Zone::Local
    }
  }

  #[must_use]
  pub const fn with_zone(
    tz: Tz
  ) -> Self {
    Self {
      zone: Zone::Named(tz)
    }
  }

  /// Picks the zone from the
  /// configured id, then
  /// `CADENCE_TIMEZONE`, then the
  /// timezone file, falling back to
  /// the platform's local zone.
  #[tracing::instrument]
  pub fn resolve(
    configured: Option<&str>
  ) -> Self {
    if let Some(raw) = configured
      && let Some(tz) =
        parse_timezone(raw, "config")
    {
      return Self::with_zone(tz);
    }

    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && let Some(tz) = parse_timezone(
        &raw,
        TIMEZONE_ENV_VAR
      )
    {
      return Self::with_zone(tz);
    }

    if let Some(path) =
      timezone_config_path()
      && let Some(tz) =
        load_timezone_from_file(&path)
    {
      return Self::with_zone(tz);
    }

    tracing::debug!(
      "no timezone configured; using \
       platform local zone"
    );
    Self::local()
  }

  #[must_use]
  pub fn zone(&self) -> Zone {
    self.zone
  }

  #[must_use]
  pub fn zone_name(&self) -> String {
    match self.zone {
      | Zone::Local => {
        "local".to_string()
      }
      | Zone::Named(tz) => {
        tz.name().to_string()
      }
    }
  }

  /// Resolves a date plus optional
  /// time-of-day (midnight when
  /// absent) to an instant.
  pub fn to_instant(
    &self,
    date: NaiveDate,
    time: Option<NaiveTime>
  ) -> Result<Instant, ClockError> {
    let time =
      time.unwrap_or(NaiveTime::MIN);
    let naive = date.and_time(time);
    let millis = match self.zone {
      | Zone::Local => {
        local_to_millis(&Local, &naive)
      }
      | Zone::Named(tz) => {
        local_to_millis(&tz, &naive)
      }
    };

    millis.map(Instant::from_millis).ok_or_else(|| {
      ClockError::NonexistentLocalTime {
        date,
        time,
        zone: self.zone_name()
      }
    })
  }

  /// Splits an instant back into its
  /// local date and time-of-day.
  pub fn split(
    &self,
    instant: Instant
  ) -> Result<
    (NaiveDate, NaiveTime),
    ClockError
  > {
    let utc =
      DateTime::<Utc>::from_timestamp_millis(
        instant.as_millis()
      )
      .ok_or(
        ClockError::InstantOutOfRange(
          instant.as_millis()
        )
      )?;
    let naive = match self.zone {
      | Zone::Local => {
        utc
          .with_timezone(&Local)
          .naive_local()
      }
      | Zone::Named(tz) => {
        utc
          .with_timezone(&tz)
          .naive_local()
      }
    };
    Ok((naive.date(), naive.time()))
  }

  pub fn format(
    &self,
    instant: Instant
  ) -> Result<String, ClockError> {
    let (date, time) =
      self.split(instant)?;
    Ok(format!(
      "{} {}",
      date.format("%Y-%m-%d"),
      time.format("%H:%M")
    ))
  }
}

fn local_to_millis<T: TimeZone>(
  tz: &T,
  naive: &NaiveDateTime
) -> Option<i64> {
  match tz.from_local_datetime(naive) {
    | LocalResult::Single(dt) => {
      Some(dt.timestamp_millis())
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      let first =
        first.timestamp_millis();
      let second =
        second.timestamp_millis();
      tracing::warn!(
        local = %naive,
        first,
        second,
        "ambiguous local datetime; using earliest"
      );
      Some(first.min(second))
    }
    | LocalResult::None => None
  }
}

/// Parses a `YYYY-MM-DD` form field.
pub fn parse_date_field(
  raw: &str
) -> Result<NaiveDate, ClockError> {
  let trimmed = raw.trim();
  NaiveDate::parse_from_str(
    trimmed, "%Y-%m-%d"
  )
  .map_err(|_| {
    ClockError::InvalidDate(
      trimmed.to_string()
    )
  })
}

/// Parses an `HH:MM` form field; a
/// blank field means no time-of-day.
pub fn parse_time_field(
  raw: &str
) -> Result<Option<NaiveTime>, ClockError>
{
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Ok(None);
  }

  for fmt in ["%H:%M", "%H:%M:%S"] {
    if let Ok(time) =
      NaiveTime::parse_from_str(
        trimmed, fmt
      )
    {
      return Ok(Some(time));
    }
  }

  Err(ClockError::InvalidTime(
    trimmed.to_string()
  ))
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured wall clock timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}
