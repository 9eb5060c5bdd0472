//! Reconciliation of goals against wall-clock time.
//!
//! `ScheduleManager` owns the registered goals and their live actions. Two
//! entry points drive it:
//!
//! - [`ScheduleManager::update_schedule`] (daily) creates an action for every
//!   goal whose due date has passed and which has no live action.
//! - [`ScheduleManager::run`] (every minute) fires ready actions once each and
//!   retires actions whose window has closed.
//!
//! A goal's due date is its last occurrence plus its frequency, so a goal
//! with a two-day frequency only gets a new action on every second daily
//! update even though `update_schedule` runs every day.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::action::{Action, ActionState};
use crate::config::ScheduleConfig;
use crate::error::{ReminderError, Result};
use crate::goal::{format_frequency, Goal};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What one `run` pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Goals whose callback ran and returned `Ok`.
    pub fired: Vec<String>,
    /// Goals whose callback returned `Err` or panicked. Still marked called.
    pub failed: Vec<String>,
    /// Goals whose window closed without the callback ever running.
    pub missed: Vec<String>,
    /// Number of actions removed from the live set.
    pub retired: usize,
}

impl RunReport {
    pub fn called(&self) -> usize {
        self.fired.len() + self.failed.len()
    }
}

/// Point-in-time view of one goal, for status output.
#[derive(Debug, Clone, Serialize)]
pub struct GoalStatus {
    pub name: String,
    pub frequency: String,
    /// Id of the live action, if any.
    pub action_id: Option<Uuid>,
    /// State of the live action, `None` when the goal is between occurrences.
    pub state: Option<ActionState>,
    pub ready_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_occurrence: Option<DateTime<Utc>>,
    /// When `update_schedule` will next create an action. `None` means as
    /// soon as it runs.
    pub next_due: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// ScheduleManager
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ScheduleManager {
    config: ScheduleConfig,
    goals: Vec<Goal>,
    actions: Vec<Action>,
    last_occurrence: HashMap<String, DateTime<Utc>>,
}

impl ScheduleManager {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn goal(&self, name: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.name() == name)
    }

    pub fn action_for(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.goal == name)
    }

    /// Register a goal. Does not create an action; call `update_schedule`.
    pub fn add_goal(&mut self, goal: Goal) -> Result<()> {
        if self.goal(goal.name()).is_some() {
            return Err(ReminderError::DuplicateGoal(goal.name().to_string()));
        }
        debug!(goal = %goal.name(), "goal added");
        self.goals.push(goal);
        Ok(())
    }

    /// Drop a goal together with its live action and occurrence history.
    pub fn remove_goal(&mut self, name: &str) -> Result<Goal> {
        let idx = self
            .goals
            .iter()
            .position(|g| g.name() == name)
            .ok_or_else(|| ReminderError::GoalNotFound(name.to_string()))?;
        let goal = self.goals.remove(idx);
        self.actions.retain(|a| a.goal != name);
        self.last_occurrence.remove(name);
        debug!(goal = %name, "goal removed");
        Ok(goal)
    }

    /// Last occurrence plus frequency. `None` if the goal has never had an
    /// action (due immediately) or is unknown.
    pub fn due_date(&self, name: &str) -> Option<DateTime<Utc>> {
        let goal = self.goal(name)?;
        self.last_occurrence
            .get(name)
            .map(|last| *last + goal.frequency())
    }

    /// Retire completed actions, then create one action for each goal that
    /// is due and has none. Returns how many actions were created.
    ///
    /// Calling this again at the same instant creates nothing.
    pub fn update_schedule(&mut self, now: DateTime<Utc>) -> usize {
        let mut report = RunReport::default();
        self.retire_completed(now, &mut report);

        let mut created = Vec::new();
        for goal in &self.goals {
            if self.action_for(goal.name()).is_some() {
                continue;
            }
            if self.due_date(goal.name()).is_some_and(|due| due > now) {
                continue;
            }
            let (delay, window) = self.config.window_for(goal.frequency());
            let action = Action::new(goal.name(), now, delay, window);
            info!(
                goal = %goal.name(),
                action = %action.id,
                ready_at = %action.due_at(),
                expires_at = %action.expires_at(),
                "scheduled reminder"
            );
            created.push(action);
        }

        for action in &created {
            self.last_occurrence
                .insert(action.goal.clone(), action.created_at);
        }
        let count = created.len();
        self.actions.extend(created);
        count
    }

    /// Fire every ready action once, then retire completed actions.
    ///
    /// A callback error or panic is logged and reported; the action is marked
    /// called regardless, so a reminder is never sent twice.
    pub fn run(&mut self, now: DateTime<Utc>) -> RunReport {
        let mut report = RunReport::default();

        for action in self.actions.iter_mut() {
            if !action.is_ready(now) {
                continue;
            }
            let Some(goal) = self.goals.iter().find(|g| g.name() == action.goal) else {
                continue;
            };

            match invoke(goal) {
                Ok(()) => {
                    info!(goal = %goal.name(), action = %action.id, "reminder fired");
                    report.fired.push(goal.name().to_string());
                }
                Err(e) => {
                    error!(
                        goal = %goal.name(),
                        action = %action.id,
                        error = %e,
                        "reminder callback failed"
                    );
                    report.failed.push(goal.name().to_string());
                }
            }

            if let Err(e) = action.mark_called(now) {
                warn!(goal = %goal.name(), error = %e, "could not mark action called");
            }
        }

        self.retire_completed(now, &mut report);
        report
    }

    /// Per-goal status in goal insertion order.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Vec<GoalStatus> {
        self.goals
            .iter()
            .map(|goal| {
                let action = self.action_for(goal.name());
                GoalStatus {
                    name: goal.name().to_string(),
                    frequency: format_frequency(goal.frequency()),
                    action_id: action.map(|a| a.id),
                    state: action.map(|a| a.state(now)),
                    ready_at: action.map(Action::due_at),
                    expires_at: action.map(Action::expires_at),
                    last_occurrence: self.last_occurrence.get(goal.name()).copied(),
                    next_due: self.due_date(goal.name()),
                }
            })
            .collect()
    }

    fn retire_completed(&mut self, now: DateTime<Utc>, report: &mut RunReport) {
        let before = self.actions.len();
        self.actions.retain(|a| {
            if !a.is_completed(now) {
                return true;
            }
            if a.is_called() {
                debug!(goal = %a.goal, action = %a.id, "occurrence completed");
            } else {
                warn!(
                    goal = %a.goal,
                    action = %a.id,
                    expired_at = %a.expires_at(),
                    "reminder window closed without firing"
                );
                report.missed.push(a.goal.clone());
            }
            false
        });
        report.retired += before - self.actions.len();
    }
}

fn invoke(goal: &Goal) -> anyhow::Result<()> {
    // A panicking callback must not take the poll loop down with it.
    match catch_unwind(AssertUnwindSafe(|| goal.invoke())) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow::anyhow!("callback panicked: {msg}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::{callback, Callback};
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, day, hour, min, 0).unwrap()
    }

    /// Monday 2020-01-06.
    fn monday(hour: u32, min: u32) -> DateTime<Utc> {
        at(6, hour, min)
    }

    fn counter() -> (Arc<AtomicUsize>, Callback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (
            count,
            callback(move || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
    }

    fn goal(name: &str, freq: Duration, cb: Callback) -> Goal {
        Goal::new(name, freq, cb).unwrap()
    }

    fn manager_with(goals: Vec<Goal>) -> ScheduleManager {
        let mut m = ScheduleManager::new(ScheduleConfig::default());
        for g in goals {
            m.add_goal(g).unwrap();
        }
        m
    }

    #[test]
    fn add_goal_does_not_create_action() {
        let (_, cb) = counter();
        let m = manager_with(vec![goal("g", Duration::days(2), cb)]);
        assert_eq!(m.goals().len(), 1);
        assert!(m.actions().is_empty());
    }

    #[test]
    fn duplicate_goal_rejected_and_state_unchanged() {
        let (_, cb) = counter();
        let mut m = manager_with(vec![goal("g", Duration::days(2), cb.clone())]);
        m.update_schedule(monday(0, 0));

        let err = m.add_goal(goal("g", Duration::days(5), cb)).unwrap_err();
        assert!(matches!(err, ReminderError::DuplicateGoal(ref n) if n == "g"));
        assert_eq!(m.goals().len(), 1);
        assert_eq!(m.goals()[0].frequency(), Duration::days(2));
        assert_eq!(m.actions().len(), 1);
    }

    #[test]
    fn update_schedule_is_idempotent() {
        let goals = (0..5)
            .map(|i| {
                let (_, cb) = counter();
                goal(&format!("goal {i}"), Duration::days(2), cb)
            })
            .collect();
        let mut m = manager_with(goals);

        assert_eq!(m.update_schedule(monday(0, 0)), 5);
        assert_eq!(m.update_schedule(monday(0, 0)), 0);
        assert_eq!(m.actions().len(), 5);
        assert!(m.actions().len() <= m.goals().len());
    }

    #[test]
    fn new_action_ready_one_tick_after_creation() {
        let (count, cb) = counter();
        let mut m = manager_with(vec![goal("g", Duration::days(2), cb)]);
        m.update_schedule(monday(0, 0));

        let action = m.action_for("g").unwrap();
        assert!(!action.is_ready(monday(0, 0)));
        assert!(action.is_ready(monday(0, 2)));

        assert_eq!(m.run(monday(0, 0)).called(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fires_at_most_once_per_occurrence() {
        let (count, cb) = counter();
        let mut m = manager_with(vec![goal("g", Duration::days(2), cb)]);
        m.update_schedule(monday(0, 0));

        let report = m.run(monday(0, 2));
        assert_eq!(report.fired, vec!["g".to_string()]);

        for minute in 3..60 {
            assert_eq!(m.run(monday(0, minute)).called(), 0);
        }
        for hour in 1..24 {
            m.run(monday(hour, 0));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let action = m.action_for("g").unwrap();
        assert!(action.is_called());
        assert!(!action.is_ready(monday(23, 0)));
    }

    #[test]
    fn two_day_goal_waits_for_its_frequency() {
        let (count, cb) = counter();
        let mut m = manager_with(vec![goal("g", Duration::days(2), cb)]);

        // Monday: create and fire.
        m.update_schedule(monday(0, 0));
        m.run(monday(0, 2));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Tuesday's daily update keeps the live action and creates nothing.
        let tuesday = at(7, 0, 0);
        m.run(tuesday);
        assert_eq!(m.update_schedule(tuesday), 0);
        assert_eq!(m.actions().len(), 1);

        // The called action is retired once its window closes.
        let report = m.run(at(7, 0, 2));
        assert_eq!(report.retired, 1);
        assert!(report.missed.is_empty());
        assert!(m.actions().is_empty());

        // Still not due later on Tuesday.
        assert_eq!(m.update_schedule(at(7, 12, 0)), 0);
        assert_eq!(m.due_date("g"), Some(at(8, 0, 0)));

        // Wednesday: due again.
        let wednesday = at(8, 0, 0);
        assert_eq!(m.update_schedule(wednesday), 1);
        let action = m.action_for("g").unwrap();
        assert!(!action.is_ready(wednesday));
        assert!(action.is_ready(at(8, 0, 2)));

        m.run(at(8, 0, 2));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn adding_n_goals_never_exceeds_n_actions() {
        for n in [0usize, 1, 5] {
            let goals = (0..n)
                .map(|i| {
                    let (_, cb) = counter();
                    goal(&format!("goal {i}"), Duration::days(2), cb)
                })
                .collect();
            let mut m = manager_with(goals);
            m.update_schedule(monday(0, 0));
            assert_eq!(m.goals().len(), n);
            assert!(m.actions().len() <= n);
        }
    }

    #[test]
    fn failing_callback_is_still_marked_called() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = attempts.clone();
        let failing = callback(move || {
            a.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("smtp unreachable")
        });
        let (ok_count, ok_cb) = counter();
        let mut m = manager_with(vec![
            goal("broken", Duration::days(1), failing),
            goal("fine", Duration::days(1), ok_cb),
        ]);
        m.update_schedule(monday(0, 0));

        let report = m.run(monday(0, 2));
        assert_eq!(report.failed, vec!["broken".to_string()]);
        assert_eq!(report.fired, vec!["fine".to_string()]);
        assert!(m.action_for("broken").unwrap().is_called());

        m.run(monday(0, 3));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(ok_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_callback_does_not_escape() {
        let panicking = callback(|| panic!("boom"));
        let mut m = manager_with(vec![goal("p", Duration::days(1), panicking)]);
        m.update_schedule(monday(0, 0));

        let report = m.run(monday(0, 2));
        assert_eq!(report.failed, vec!["p".to_string()]);
        assert!(m.action_for("p").unwrap().is_called());
    }

    #[test]
    fn daily_goal_is_renewed_at_each_daily_update() {
        let (count, cb) = counter();
        let mut m = manager_with(vec![goal("daily", Duration::days(1), cb)]);

        for day in 6..10 {
            assert_eq!(m.update_schedule(at(day, 0, 0)), 1, "day {day}");
            m.run(at(day, 0, 1));
        }
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn missed_occurrence_is_retired_and_not_fired_late() {
        let (count, cb) = counter();
        let mut m = manager_with(vec![goal("g", Duration::days(3), cb)]);
        m.update_schedule(monday(0, 0));

        // Nobody polls until long after the window closed.
        let report = m.run(at(8, 0, 0));
        assert_eq!(report.missed, vec!["g".to_string()]);
        assert_eq!(report.retired, 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Next occurrence still follows the frequency from the missed one.
        assert_eq!(m.update_schedule(at(8, 0, 0)), 0);
        assert_eq!(m.update_schedule(at(9, 0, 0)), 1);
    }

    #[test]
    fn short_frequency_caps_the_window() {
        let (count, cb) = counter();
        let mut m = manager_with(vec![goal("hourly", Duration::hours(1), cb)]);
        m.update_schedule(monday(0, 0));
        let action = m.action_for("hourly").unwrap();
        assert_eq!(action.expires_at(), monday(1, 0));

        m.run(monday(0, 1));
        m.run(monday(1, 1));
        assert!(m.actions().is_empty());
        assert_eq!(m.update_schedule(monday(1, 1)), 1);
        m.run(monday(1, 2));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_goal_drops_its_action() {
        let (_, cb1) = counter();
        let (_, cb2) = counter();
        let mut m = manager_with(vec![
            goal("a", Duration::days(1), cb1),
            goal("b", Duration::days(1), cb2),
        ]);
        m.update_schedule(monday(0, 0));

        let removed = m.remove_goal("a").unwrap();
        assert_eq!(removed.name(), "a");
        assert_eq!(m.goals().len(), 1);
        assert_eq!(m.actions().len(), 1);
        assert!(m.action_for("a").is_none());
        assert!(m.due_date("a").is_none());

        assert!(matches!(
            m.remove_goal("a"),
            Err(ReminderError::GoalNotFound(_))
        ));
    }

    #[test]
    fn snapshot_reports_state_per_goal() {
        let (_, cb1) = counter();
        let (_, cb2) = counter();
        let mut m = manager_with(vec![
            goal("a", Duration::weeks(1), cb1),
            goal("b", Duration::days(2), cb2),
        ]);
        m.update_schedule(monday(0, 0));
        m.run(monday(0, 2));

        let snap = m.snapshot(monday(0, 2));
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].name, "a");
        assert_eq!(snap[0].frequency, "1w");
        assert_eq!(snap[0].state, Some(ActionState::Called));
        assert_eq!(snap[0].action_id, m.action_for("a").map(|a| a.id));
        assert_ne!(snap[0].action_id, snap[1].action_id);
        assert_eq!(snap[1].next_due, Some(at(8, 0, 0)));

        m.remove_goal("a").unwrap();
        m.add_goal(goal("a", Duration::weeks(1), counter().1)).unwrap();
        assert_eq!(m.snapshot(monday(0, 3))[1].action_id, None);
    }

    #[test]
    fn lifecycle_flags_are_monotonic() {
        let (_, cb) = counter();
        let mut m = manager_with(vec![goal("g", Duration::days(2), cb)]);
        m.update_schedule(monday(0, 0));
        m.run(monday(0, 2));
        let action = m.action_for("g").unwrap().clone();

        let mut was_completed = false;
        for minutes in (2..=60 * 30).step_by(7) {
            let t = monday(0, 0) + Duration::minutes(minutes);
            assert!(action.is_called());
            let completed = action.is_completed(t);
            assert!(!was_completed || completed);
            was_completed = completed;
        }
        assert!(was_completed);
    }
}
