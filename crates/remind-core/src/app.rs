//! The polling driver.
//!
//! `ReminderApp` glues the pieces together: a [`Ticker`] with a minute job
//! (fire ready reminders) and a daily job (create due occurrences), a
//! [`ScheduleManager`], and an [`EmailManager`] supplying the default
//! callback. [`ReminderApp::start`] spawns one tokio task that polls the
//! ticker every `poll_interval` until [`ReminderApp::stop`] is awaited.
//!
//! ```text
//! worker task ── every poll_interval ──▶ ticker.run_pending(now)
//!                                          ├─ minute ─▶ manager.run(now)
//!                                          └─ day    ─▶ manager.update_schedule(now)
//! ```

use chrono::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::email::EmailManager;
use crate::error::{ReminderError, Result};
use crate::goal::{Callback, Goal};
use crate::manager::{GoalStatus, RunReport, ScheduleManager};
use crate::messaging::Messenger;
use crate::ticker::{Interval, Ticker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickJob {
    RunSchedule,
    UpdateSchedule,
}

/// State touched by both the caller and the worker.
struct Core {
    manager: ScheduleManager,
    ticker: Ticker<TickJob>,
}

impl Core {
    fn poll(&mut self, now: chrono::DateTime<chrono::Utc>) -> RunReport {
        let mut report = RunReport::default();
        for job in self.ticker.run_pending(now) {
            match job {
                TickJob::RunSchedule => {
                    debug!("running schedule");
                    let r = self.manager.run(now);
                    report.fired.extend(r.fired);
                    report.failed.extend(r.failed);
                    report.missed.extend(r.missed);
                    report.retired += r.retired;
                }
                TickJob::UpdateSchedule => {
                    info!("updating schedule");
                    self.manager.update_schedule(now);
                }
            }
        }
        report
    }
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct ReminderApp {
    core: Arc<Mutex<Core>>,
    clock: Arc<dyn Clock>,
    email: EmailManager,
    poll_interval: std::time::Duration,
    polls: Arc<AtomicU64>,
    worker: Option<Worker>,
}

impl ReminderApp {
    /// Validate the email settings and wire up the ticker. Nothing is built
    /// if the config is incomplete.
    pub fn new(
        config: AppConfig,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.email.validate()?;
        info!(to = %config.email.to, "initializing reminder app");

        let mut ticker = Ticker::new(clock.now());
        ticker
            .every(Interval::Minute, TickJob::RunSchedule)
            .every(Interval::Day, TickJob::UpdateSchedule);

        Ok(Self {
            core: Arc::new(Mutex::new(Core {
                manager: ScheduleManager::new(config.schedule),
                ticker,
            })),
            clock,
            email: EmailManager::new(config.email.to, messenger),
            poll_interval: config.poll_interval,
            polls: Arc::new(AtomicU64::new(0)),
            worker: None,
        })
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn email(&self) -> &EmailManager {
        &self.email
    }

    /// Add a goal and schedule it right away. Without `callback` the goal
    /// mails a reminder to the configured recipient.
    pub fn add_goal(
        &self,
        name: &str,
        frequency: Duration,
        callback: Option<Callback>,
    ) -> Result<()> {
        let callback = callback.unwrap_or_else(|| self.email.reminder_callback(name));
        let goal = Goal::new(name, frequency, callback)?;
        info!(goal = %name, "adding goal");

        let now = self.clock.now();
        let mut core = self.core();
        core.manager.add_goal(goal)?;
        core.manager.update_schedule(now);
        Ok(())
    }

    pub fn remove_goal(&self, name: &str) -> Result<()> {
        self.core().manager.remove_goal(name)?;
        info!(goal = %name, "removed goal");
        Ok(())
    }

    /// One driver poll: run whichever ticker jobs are due.
    pub fn run_once(&self) -> RunReport {
        run_once(&self.core, self.clock.as_ref(), &self.polls)
    }

    pub fn goal_count(&self) -> usize {
        self.core().manager.goals().len()
    }

    pub fn action_count(&self) -> usize {
        self.core().manager.actions().len()
    }

    pub fn snapshot(&self) -> Vec<GoalStatus> {
        let now = self.clock.now();
        self.core().manager.snapshot(now)
    }

    /// Run `f` against the manager under the lock.
    pub fn with_manager<R>(&self, f: impl FnOnce(&ScheduleManager) -> R) -> R {
        f(&self.core().manager)
    }

    /// Number of polls performed so far.
    pub fn poll_count(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Spawn the polling task on the current tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(ReminderError::AlreadyRunning);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ReminderError::NoRuntime)?;

        let (tx, mut rx) = watch::channel(false);
        let core = self.core.clone();
        let clock = self.clock.clone();
        let polls = self.polls.clone();
        let poll_interval = self.poll_interval;

        let handle = runtime.spawn(async move {
            info!("starting run loop");
            loop {
                run_once(&core, clock.as_ref(), &polls);
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
            info!("exiting run loop");
        });

        self.worker = Some(Worker {
            shutdown: tx,
            handle,
        });
        Ok(())
    }

    /// Signal the polling task and wait for it to finish its current poll.
    pub async fn stop(&mut self) -> Result<()> {
        let worker = self.worker.take().ok_or(ReminderError::AlreadyStopped)?;
        info!("stopping run loop");
        let _ = worker.shutdown.send(true);
        if let Err(e) = worker.handle.await {
            warn!(error = %e, "run loop ended abnormally");
        }
        Ok(())
    }
}

impl Drop for ReminderApp {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.shutdown.send(true);
        }
    }
}

fn run_once(core: &Mutex<Core>, clock: &dyn Clock, polls: &AtomicU64) -> RunReport {
    polls.fetch_add(1, Ordering::SeqCst);
    let now = clock.now();
    core.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .poll(now)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
