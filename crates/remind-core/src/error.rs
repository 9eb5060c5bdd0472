use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("goal already exists: {0}")]
    DuplicateGoal(String),

    #[error("goal not found: {0}")]
    GoalNotFound(String),

    #[error("invalid frequency '{0}': expected a positive duration such as 30m, 12h, 7d or 2w")]
    InvalidFrequency(String),

    #[error("already running")]
    AlreadyRunning,

    #[error("already stopped")]
    AlreadyStopped,

    #[error("no tokio runtime: start() must be called from within a runtime")]
    NoRuntime,

    #[error("action for goal '{0}' was already called")]
    ActionAlreadyCalled(String),

    #[error("action for goal '{0}' is outside its ready window")]
    ActionNotReady(String),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl ReminderError {
    /// True for errors raised by `start()`/`stop()` misuse.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRunning | Self::AlreadyStopped | Self::NoRuntime
        )
    }
}

pub type Result<T> = std::result::Result<T, ReminderError>;
