//! Goal: a named, recurring reminder definition.
//!
//! A `Goal` is immutable once built. The `ScheduleManager` owns every goal it
//! tracks and creates one `Action` per occurrence.

use chrono::Duration;
use std::fmt;
use std::sync::Arc;

use crate::error::{ReminderError, Result};

/// Zero-argument side effect invoked when a goal's occurrence becomes ready.
pub type Callback = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
pub struct Goal {
    name: String,
    frequency: Duration,
    callback: Callback,
}

impl Goal {
    /// Build a goal. Fails with `InvalidFrequency` unless `frequency > 0`.
    pub fn new(name: impl Into<String>, frequency: Duration, callback: Callback) -> Result<Self> {
        if frequency <= Duration::zero() {
            return Err(ReminderError::InvalidFrequency(format_frequency(
                frequency,
            )));
        }
        Ok(Self {
            name: name.into(),
            frequency,
            callback,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    pub(crate) fn invoke(&self) -> anyhow::Result<()> {
        (self.callback)()
    }
}

impl fmt::Debug for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Goal")
            .field("name", &self.name)
            .field("frequency", &format_frequency(self.frequency))
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Frequency text format: <n><unit>, unit one of s, m, h, d, w
// ---------------------------------------------------------------------------

/// Parse a frequency such as `30m`, `12h`, `7d` or `2w`.
pub fn parse_frequency(text: &str) -> Result<Duration> {
    let invalid = || ReminderError::InvalidFrequency(text.to_string());
    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (digits, unit) = trimmed.split_at(split);
    let n: i64 = digits.parse().map_err(|_| invalid())?;

    let duration = match unit.trim() {
        "s" => Duration::try_seconds(n),
        "m" => Duration::try_minutes(n),
        "h" => Duration::try_hours(n),
        "d" => Duration::try_days(n),
        "w" => Duration::try_weeks(n),
        _ => None,
    }
    .ok_or_else(invalid)?;

    if duration <= Duration::zero() {
        return Err(invalid());
    }
    Ok(duration)
}

/// Render a duration in the largest whole unit `parse_frequency` accepts.
pub fn format_frequency(d: Duration) -> String {
    let secs = d.num_seconds();
    if secs != 0 {
        for (unit, size) in [("w", 7 * 86_400), ("d", 86_400), ("h", 3_600), ("m", 60)] {
            if secs % size == 0 {
                return format!("{}{unit}", secs / size);
            }
        }
    }
    format!("{secs}s")
}
