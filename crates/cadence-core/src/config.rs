use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::flash::DEFAULT_FLASH_TTL;
use crate::wall_clock::WallClock;

const RC_ENV_VAR: &str = "CADENCERC";
const RC_FILE_NAME: &str = ".cadencerc";

pub const TIMEZONE_KEY: &str =
  "timezone";
pub const FLASH_TTL_KEY: &str =
  "flash.invalid_range_ms";

#[derive(Debug, Clone, Default)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::with_defaults();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading cadencerc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no cadencerc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[must_use]
  pub fn with_defaults() -> Self {
    let mut cfg = Self::default();
    cfg.map.insert(
      FLASH_TTL_KEY.to_string(),
      DEFAULT_FLASH_TTL
        .as_millis()
        .to_string()
    );
    cfg
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> Option<u64> {
    let raw = self.map.get(key)?;
    match raw.trim().parse::<u64>() {
      | Ok(value) => Some(value),
      | Err(err) => {
        warn!(
          key,
          value = %raw,
          error = %err,
          "ignoring non-numeric config value"
        );
        None
      }
    }
  }

  /// Entries whose key starts with
  /// `prefix`, with the prefix removed.
  pub fn with_prefix<'a>(
    &'a self,
    prefix: &'a str
  ) -> impl Iterator<Item = (&'a str, &'a str)>
  {
    self.map.iter().filter_map(
      move |(k, v)| {
        k.strip_prefix(prefix)
          .map(|rest| (rest, v.as_str()))
      }
    )
  }

  #[must_use]
  pub fn wall_clock(&self) -> WallClock {
    WallClock::resolve(
      self.get(TIMEZONE_KEY).as_deref()
    )
  }

  #[must_use]
  pub fn invalid_range_flash(
    &self
  ) -> Duration {
    self
      .get_u64(FLASH_TTL_KEY)
      .map(Duration::from_millis)
      .unwrap_or(DEFAULT_FLASH_TTL)
  }

  #[tracing::instrument(skip(self))]
  pub fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping cadencerc"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use tempfile::tempdir;

  use super::{
    Config,
    FLASH_TTL_KEY
  };

  #[test]
  fn loads_file_with_include() {
    let dir = tempdir().expect("tempdir");
    let extra = dir.path().join("labels.rc");
    fs::write(
      &extra,
      "label.priority.critical = Urgent\n"
    )
    .expect("write include");
    let main = dir.path().join("main.rc");
    fs::write(
      &main,
      "# cadence settings\n\
       timezone = Asia/Tokyo # trailing\n\
       include labels.rc\n\
       include missing.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(main.as_path()))
      .expect("load config");
    assert_eq!(
      cfg.get("timezone").as_deref(),
      Some("Asia/Tokyo")
    );
    assert_eq!(
      cfg
        .get("label.priority.critical")
        .as_deref(),
      Some("Urgent")
    );
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.wall_clock().zone_name(),
      "Asia/Tokyo"
    );
  }

  #[test]
  fn rejects_malformed_line() {
    let dir = tempdir().expect("tempdir");
    let main = dir.path().join("bad.rc");
    fs::write(&main, "timezone\n")
      .expect("write rc");
    assert!(Config::load(Some(main.as_path())).is_err());
  }

  #[test]
  fn overrides_and_flash_ttl() {
    let mut cfg = Config::with_defaults();
    assert_eq!(
      cfg.invalid_range_flash(),
      Duration::from_millis(500)
    );

    cfg.apply_overrides([(
      format!("rc.{FLASH_TTL_KEY}"),
      "250".to_string()
    )]);
    assert_eq!(
      cfg.invalid_range_flash(),
      Duration::from_millis(250)
    );

    cfg.apply_overrides([(
      FLASH_TTL_KEY.to_string(),
      "soon".to_string()
    )]);
    assert_eq!(
      cfg.invalid_range_flash(),
      Duration::from_millis(500)
    );
  }

  #[test]
  fn prefix_iteration_strips_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides([
      (
        "label.status.completed"
          .to_string(),
        "Done".to_string()
      ),
      (
        "timezone".to_string(),
        "UTC".to_string()
      ),
    ]);
    let labels: Vec<_> = cfg
      .with_prefix("label.")
      .collect();
    assert_eq!(
      labels,
      vec![("status.completed", "Done")]
    );
  }
}
