//! Fixed-interval job table.
//!
//! `Ticker` answers one question per poll: which registered jobs have come
//! due since they last ran. Jobs are plain values (usually a small enum) and
//! the caller dispatches them, so the ticker never borrows anything it runs.

use chrono::{DateTime, Duration, Utc};

/// How often a job repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Minute,
    Hour,
    Day,
    Every(Duration),
}

impl Interval {
    pub fn as_duration(self) -> Duration {
        match self {
            Self::Minute => Duration::minutes(1),
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Every(d) => d,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<J> {
    job: J,
    interval: Duration,
    next_run: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Ticker<J> {
    created_at: DateTime<Utc>,
    entries: Vec<Entry<J>>,
}

impl<J: Clone> Ticker<J> {
    /// Jobs registered later are first due one interval after `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            entries: Vec::new(),
        }
    }

    /// Register `job` to run every `interval`, first at creation + interval.
    pub fn every(&mut self, interval: Interval, job: J) -> &mut Self {
        let interval = interval.as_duration();
        self.entries.push(Entry {
            job,
            interval,
            next_run: self.created_at + interval,
        });
        self
    }

    /// Jobs due at `now`, in registration order. Each returned job is
    /// rescheduled to `now + interval`; a job that missed several intervals
    /// is returned once.
    pub fn run_pending(&mut self, now: DateTime<Utc>) -> Vec<J> {
        let mut due = Vec::new();
        for entry in &mut self.entries {
            if entry.next_run <= now {
                due.push(entry.job.clone());
                entry.next_run = now + entry.interval;
            }
        }
        due
    }

    /// Earliest upcoming run, if any job is registered.
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        self.entries.iter().map(|e| e.next_run).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
