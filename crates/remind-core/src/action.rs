//! Action: one scheduled occurrence of a goal.
//!
//! An `Action` carries a half-open ready window `[due_at, expires_at)`. Inside
//! the window it may be called exactly once; once the window has passed it is
//! completed, whether or not it was called.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ReminderError, Result};

// ---------------------------------------------------------------------------
// ActionState
// ---------------------------------------------------------------------------

/// Lifecycle state of an action at a given instant.
///
/// Transitions: `Pending → Ready → Called → Completed`, or
/// `Ready → Completed` when the window ends without a call (missed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    /// Window has not opened yet.
    Pending,
    /// Inside the window and not yet called.
    Ready,
    /// Called; window still open.
    Called,
    /// Window has closed. Terminal.
    Completed,
}

impl ActionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Called => "called",
            Self::Completed => "completed",
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Action {
    pub id: Uuid,
    /// Name of the owning goal.
    pub goal: String,
    pub created_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    called_at: Option<DateTime<Utc>>,
}

impl Action {
    /// Create an occurrence of `goal` at `created_at`. The window opens after
    /// `ready_delay` and stays open for `window`.
    pub fn new(
        goal: impl Into<String>,
        created_at: DateTime<Utc>,
        ready_delay: Duration,
        window: Duration,
    ) -> Self {
        let due_at = created_at + ready_delay;
        Self {
            id: Uuid::new_v4(),
            goal: goal.into(),
            created_at,
            due_at,
            expires_at: due_at + window,
            called_at: None,
        }
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn called_at(&self) -> Option<DateTime<Utc>> {
        self.called_at
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.in_window(now) && !self.is_called()
    }

    pub fn is_called(&self) -> bool {
        self.called_at.is_some()
    }

    pub fn is_completed(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn state(&self, now: DateTime<Utc>) -> ActionState {
        if self.is_completed(now) {
            ActionState::Completed
        } else if self.is_called() {
            ActionState::Called
        } else if now >= self.due_at {
            ActionState::Ready
        } else {
            ActionState::Pending
        }
    }

    /// Record that the callback ran. Refuses a second call and calls outside
    /// the window, so the side effect can never be repeated through here.
    pub fn mark_called(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.is_called() {
            return Err(ReminderError::ActionAlreadyCalled(self.goal.clone()));
        }
        if !self.in_window(now) {
            return Err(ReminderError::ActionNotReady(self.goal.clone()));
        }
        self.called_at = Some(now);
        Ok(())
    }

    fn in_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.due_at && now < self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
