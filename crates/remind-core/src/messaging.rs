//! Messaging boundary.
//!
//! The reconciliation loop only needs two things from a mail transport:
//! sending a message and being told when a reply carries a keyword. The
//! [`Messenger`] trait captures exactly that. Transports plug in behind it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::error::{ReminderError, Result};

/// Zero-argument handler invoked when a reply carries its keyword.
pub type KeywordCallback = Arc<dyn Fn() + Send + Sync>;

pub trait Messenger: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;

    fn add_keyword(&self, keyword: &str, callback: KeywordCallback);
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// KeywordRouter
// ---------------------------------------------------------------------------

/// Routes reply bodies to keyword callbacks.
///
/// Matching is on the first word of the reply, case-insensitive, with
/// trailing punctuation ignored: `"Done!"` and `"done, thanks"` both match
/// `done`.
#[derive(Default, Clone)]
pub struct KeywordRouter {
    routes: Arc<Mutex<HashMap<String, Vec<KeywordCallback>>>>,
}

impl KeywordRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, keyword: &str, callback: KeywordCallback) {
        lock(&self.routes)
            .entry(keyword.trim().to_lowercase())
            .or_default()
            .push(callback);
    }

    pub fn keywords(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.routes).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Invoke the callbacks for the reply's keyword. Returns the keyword
    /// matched, if any.
    pub fn dispatch(&self, body: &str) -> Option<String> {
        let first = body
            .split_whitespace()
            .next()?
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();

        // Clone out so callbacks may register further keywords.
        let callbacks = lock(&self.routes).get(&first).cloned()?;
        debug!(keyword = %first, handlers = callbacks.len(), "reply keyword matched");
        for cb in callbacks {
            cb();
        }
        Some(first)
    }
}

// ---------------------------------------------------------------------------
// LogMessenger
// ---------------------------------------------------------------------------

/// Writes every outgoing message to the log instead of a mail server.
pub struct LogMessenger {
    from: String,
    router: KeywordRouter,
}

impl LogMessenger {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            router: KeywordRouter::new(),
        }
    }

    /// Feed an inbound reply through the keyword router.
    pub fn receive_reply(&self, body: &str) -> Option<String> {
        self.router.dispatch(body)
    }
}

impl Messenger for LogMessenger {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(from = %self.from, to, subject, body, "sending reminder");
        Ok(())
    }

    fn add_keyword(&self, keyword: &str, callback: KeywordCallback) {
        self.router.add(keyword, callback);
    }
}

// ---------------------------------------------------------------------------
// MemoryMessenger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records messages in memory. Cloning shares the outbox.
#[derive(Default, Clone)]
pub struct MemoryMessenger {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail_with: Arc<Mutex<Option<String>>>,
    router: KeywordRouter,
}

impl MemoryMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    /// Make every following `send` fail with `reason`; `None` restores it.
    pub fn fail_sends(&self, reason: Option<&str>) {
        *lock(&self.fail_with) = reason.map(str::to_string);
    }

    pub fn router(&self) -> &KeywordRouter {
        &self.router
    }

    pub fn receive_reply(&self, body: &str) -> Option<String> {
        self.router.dispatch(body)
    }
}

impl Messenger for MemoryMessenger {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if let Some(reason) = lock(&self.fail_with).clone() {
            return Err(ReminderError::Messaging(reason));
        }
        lock(&self.sent).push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    fn add_keyword(&self, keyword: &str, callback: KeywordCallback) {
        self.router.add(keyword, callback);
    }
}
