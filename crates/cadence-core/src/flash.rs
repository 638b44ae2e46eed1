use std::time::{
  Duration,
  Instant
};

pub const DEFAULT_FLASH_TTL: Duration =
  Duration::from_millis(500);

/// Auto-clearing UI flag, e.g. the
/// invalid-range highlight on the end
/// fields. Raising it again re-arms the
/// deadline. It never touches form
/// data.
#[derive(Debug, Clone, Copy)]
pub struct TransientFlag {
  ttl:       Duration,
  raised_at: Option<Instant>
}

impl Default for TransientFlag {
  fn default() -> Self {
    Self::new(DEFAULT_FLASH_TTL)
  }
}

impl TransientFlag {
  #[must_use]
  pub const fn new(
    ttl: Duration
  ) -> Self {
    Self {
      ttl,
      raised_at: None
    }
  }

  #[must_use]
  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  pub fn raise(&mut self, now: Instant) {
    self.raised_at = Some(now);
  }

  pub fn clear(&mut self) {
    self.raised_at = None;
  }

  #[must_use]
  pub fn is_visible(
    &self,
    now: Instant
  ) -> bool {
    self.raised_at.is_some_and(|at| {
      now.saturating_duration_since(at)
        < self.ttl
    })
  }
}
