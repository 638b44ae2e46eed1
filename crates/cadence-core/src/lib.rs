pub mod cli;
pub mod commands;
pub mod config;
pub mod flash;
pub mod form;
pub mod hierarchy;
pub mod labels;
pub mod recurrence;
pub mod schedule;
pub mod tags;
pub mod wall_clock;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

pub use form::{
  FormError,
  TaskForm,
  TaskPayload,
  TimeBlockForm,
  TimeBlockPayload
};
pub use hierarchy::{
  HierarchyError,
  TaskNode,
  compute_excluded,
  filter_candidate_parents
};
pub use recurrence::{
  RecurrenceDraft,
  RecurrenceError,
  RecurrencePattern,
  validate
};
pub use schedule::{
  FinalSchedule,
  ScheduleError,
  TimeRangeSynchronizer
};
pub use tags::{
  TagCorpus,
  TagSuggestionMatcher
};
pub use wall_clock::{
  Instant,
  WallClock
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting cadence CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.cadencerc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let stdout = std::io::stdout();
  let mut out = stdout.lock();
  commands::dispatch(
    &cfg,
    cli.command,
    &mut out
  )?;

  info!("done");
  Ok(())
}
