use crate::error::{ReminderError, Result};
use crate::goal::{format_frequency, parse_frequency};
use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

// ---------------------------------------------------------------------------
// ScheduleConfig
// ---------------------------------------------------------------------------

/// Timing of each occurrence's ready window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleConfig {
    /// Gap between creating an action and its window opening.
    pub ready_delay: Duration,
    /// Upper bound on how long the window stays open. A goal's own frequency
    /// caps it further.
    pub ready_window: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            ready_delay: Duration::minutes(1),
            ready_window: Duration::days(1),
        }
    }
}

impl ScheduleConfig {
    /// Ready delay and window length for a goal repeating every `frequency`.
    ///
    /// The window always closes by `created_at + frequency`, so the action is
    /// retired before the next occurrence falls due. Frequencies no longer
    /// than twice the delay split evenly between delay and window.
    pub fn window_for(&self, frequency: Duration) -> (Duration, Duration) {
        let delay = self.ready_delay.min(frequency / 2);
        let window = self.ready_window.min(frequency - delay);
        (delay, window)
    }
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

pub const ENV_EMAIL_TO: &str = "EMAIL_TO";
pub const ENV_SENDER_ADDRESS: &str = "ROBOT_EMAIL_ADDRESS";
pub const ENV_SENDER_PASSWORD: &str = "ROBOT_EMAIL_PASSWORD";
pub const ENV_SENDER_HOST: &str = "ROBOT_EMAIL_HOST";
pub const ENV_SENDER_PORT: &str = "ROBOT_EMAIL_PORT";

/// Recipient and sender account for reminder mail.
#[derive(Clone, PartialEq)]
pub struct EmailConfig {
    pub to: String,
    pub sender_address: String,
    pub sender_password: String,
    pub host: String,
    pub port: u16,
}

impl EmailConfig {
    /// Read all five settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Missing or blank values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ReminderError::Config(format!("{key} is not set")))
        };

        let port_raw = required(ENV_SENDER_PORT)?;
        let port = port_raw.parse::<u16>().map_err(|_| {
            ReminderError::Config(format!(
                "{ENV_SENDER_PORT} must be a port number, got '{port_raw}'"
            ))
        })?;

        let config = Self {
            to: required(ENV_EMAIL_TO)?,
            sender_address: required(ENV_SENDER_ADDRESS)?,
            sender_password: required(ENV_SENDER_PASSWORD)?,
            host: required(ENV_SENDER_HOST)?,
            port,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that no field is blank. Used for configs built by hand.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            (ENV_EMAIL_TO, &self.to),
            (ENV_SENDER_ADDRESS, &self.sender_address),
            (ENV_SENDER_PASSWORD, &self.sender_password),
            (ENV_SENDER_HOST, &self.host),
        ];
        for (key, value) in fields {
            if value.trim().is_empty() {
                return Err(ReminderError::Config(format!("{key} is not set")));
            }
        }
        if self.port == 0 {
            return Err(ReminderError::Config(format!("{ENV_SENDER_PORT} is not set")));
        }
        Ok(())
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("to", &self.to)
            .field("sender_address", &self.sender_address)
            .field("sender_password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

pub const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub email: EmailConfig,
    /// Sleep between driver polls.
    pub poll_interval: std::time::Duration,
    pub schedule: ScheduleConfig,
}

impl AppConfig {
    pub fn new(email: EmailConfig) -> Self {
        Self {
            email,
            poll_interval: DEFAULT_POLL_INTERVAL,
            schedule: ScheduleConfig::default(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: std::time::Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

// ---------------------------------------------------------------------------
// Goals file
// ---------------------------------------------------------------------------

/// One goal as written in a goals file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalEntry {
    pub name: String,
    #[serde(
        serialize_with = "serialize_frequency",
        deserialize_with = "deserialize_frequency"
    )]
    pub frequency: Duration,
}

impl GoalEntry {
    pub fn new(name: impl Into<String>, frequency: Duration) -> Self {
        Self {
            name: name.into(),
            frequency,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalsFile {
    #[serde(default)]
    pub goals: Vec<GoalEntry>,
}

impl GoalsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let file: Self = serde_yaml::from_str(text)?;
        let mut seen = std::collections::HashSet::new();
        for goal in &file.goals {
            if !seen.insert(goal.name.as_str()) {
                return Err(ReminderError::DuplicateGoal(goal.name.clone()));
            }
        }
        Ok(file)
    }

    /// The goals used when no file is given.
    pub fn builtin() -> Self {
        let goals = [
            ("Call Mom", 1),
            ("Call Dad", 1),
            ("Call Grandma", 2),
            ("Call Grandpa", 2),
            ("Call Cousin", 4),
            ("Call Uncle", 4),
        ]
        .into_iter()
        .map(|(name, weeks)| GoalEntry::new(name, Duration::weeks(weeks)))
        .collect();
        Self { goals }
    }
}

fn serialize_frequency<S>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&format_frequency(*d))
}

fn deserialize_frequency<'de, D>(d: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(d)?;
    parse_frequency(&text).map_err(serde::de::Error::custom)
}
