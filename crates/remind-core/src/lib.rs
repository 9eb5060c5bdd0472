pub mod action;
pub mod app;
pub mod clock;
pub mod config;
pub mod email;
pub mod error;
pub mod goal;
pub mod manager;
pub mod messaging;
pub mod ticker;

pub use action::{Action, ActionState};
pub use app::ReminderApp;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, EmailConfig, GoalEntry, GoalsFile, ScheduleConfig};
pub use email::EmailManager;
pub use error::{ReminderError, Result};
pub use goal::{callback, format_frequency, parse_frequency, Callback, Goal};
pub use manager::{GoalStatus, RunReport, ScheduleManager};
pub use messaging::{KeywordRouter, LogMessenger, MemoryMessenger, Messenger};
pub use ticker::{Interval, Ticker};
