use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "cadence",
    version,
    about = "Cadence: schedule, recurrence and hierarchy checks for task forms"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "cadencerc", global = true)]
    pub cadencerc: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Replay start, end and duration edits and print the final schedule
    Schedule(ScheduleArgs),
    /// Validate a recurrence rule and print its submitted shape
    Recurrence(RecurrenceArgs),
    /// Suggest tags for a partially typed tag field
    Tags(TagsArgs),
    /// List the tasks allowed as parents of a task
    Parents(ParentsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    #[arg(long = "start-date")]
    pub start_date: String,

    #[arg(long = "start-time", default_value = "")]
    pub start_time: String,

    #[arg(long = "end-date")]
    pub end_date: Option<String>,

    #[arg(long = "end-time", default_value = "")]
    pub end_time: String,

    #[arg(long = "duration")]
    pub duration: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct RecurrenceArgs {
    #[arg(long = "frequency")]
    pub frequency: Option<String>,

    #[arg(long = "interval", allow_hyphen_values = true)]
    pub interval: Option<i64>,

    #[arg(long = "days", value_delimiter = ',')]
    pub days: Vec<String>,

    #[arg(long = "end", default_value = "never")]
    pub end: String,

    #[arg(long = "count", allow_hyphen_values = true)]
    pub count: Option<i64>,

    #[arg(long = "until")]
    pub until: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TagsArgs {
    /// JSON array of objects carrying a `tags` list
    #[arg(long = "corpus")]
    pub corpus: PathBuf,

    #[arg(long = "input", allow_hyphen_values = true)]
    pub input: String,

    #[arg(long = "commit")]
    pub commit: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ParentsArgs {
    /// JSON array of objects with `id`, `parentId` and `title`
    #[arg(long = "tasks")]
    pub tasks: PathBuf,

    #[arg(long = "task")]
    pub task: Uuid,

    #[arg(long = "search", default_value = "")]
    pub search: String,

    /// Check one proposed parent instead of listing candidates
    #[arg(long = "parent")]
    pub parent: Option<Uuid>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
