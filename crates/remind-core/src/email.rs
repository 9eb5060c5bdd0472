use std::sync::Arc;
use tracing::info;

use crate::goal::{callback, Callback};
use crate::messaging::{KeywordCallback, Messenger};

/// Reply keywords understood by the reminder mailbox.
pub const REPLY_KEYWORDS: [&str; 3] = ["done", "snooze", "cancel"];

/// Binds a messenger to the reminder recipient.
#[derive(Clone)]
pub struct EmailManager {
    to: String,
    messenger: Arc<dyn Messenger>,
}

impl EmailManager {
    /// Registers a logging handler for each of [`REPLY_KEYWORDS`].
    pub fn new(to: impl Into<String>, messenger: Arc<dyn Messenger>) -> Self {
        for keyword in REPLY_KEYWORDS {
            messenger.add_keyword(keyword, keyword_callback(keyword));
        }
        Self {
            to: to.into(),
            messenger,
        }
    }

    pub fn recipient(&self) -> &str {
        &self.to
    }

    /// Default goal callback: mail `Reminder: <name>` to the recipient.
    pub fn reminder_callback(&self, name: &str) -> Callback {
        let messenger = self.messenger.clone();
        let to = self.to.clone();
        let subject = format!("Reminder: {name}");
        let body = name.to_string();
        callback(move || {
            messenger.send(&to, &subject, &body)?;
            Ok(())
        })
    }
}

fn keyword_callback(keyword: &'static str) -> KeywordCallback {
    Arc::new(move || info!(keyword, "reply keyword received"))
}
