use crate::goals_source::{self, GoalsSource};
use crate::output::print_table;
use anyhow::{anyhow, Context};
use remind_core::{ActionState, AppConfig, EmailConfig, LogMessenger, ReminderApp, SystemClock};
use std::sync::Arc;
use std::time::Duration;

pub fn run(source: &GoalsSource, poll_secs: u64) -> anyhow::Result<()> {
    if poll_secs == 0 {
        return Err(anyhow!("--poll-secs must be at least 1"));
    }
    let email = EmailConfig::from_env().context("email configuration is incomplete")?;
    let goals = goals_source::load(source)?;

    let messenger = Arc::new(LogMessenger::new(email.sender_address.clone()));
    let config = AppConfig::new(email).with_poll_interval(Duration::from_secs(poll_secs));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let mut app = ReminderApp::new(config, messenger, Arc::new(SystemClock))
            .context("failed to initialize reminder app")?;
        for goal in &goals.goals {
            app.add_goal(&goal.name, goal.frequency, None)
                .with_context(|| format!("failed to add goal '{}'", goal.name))?;
        }

        print_schedule(&app);
        app.start()?;
        println!(
            "Tracking {} goal(s) from {}; Ctrl-C to stop.",
            app.goal_count(),
            source.describe()
        );

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        app.stop().await?;
        Ok(())
    })
}

fn print_schedule(app: &ReminderApp) {
    let rows: Vec<Vec<String>> = app
        .snapshot()
        .into_iter()
        .map(|s| {
            vec![
                s.name,
                s.frequency,
                s.state.map_or("idle", ActionState::as_str).to_string(),
                s.ready_at
                    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["GOAL", "EVERY", "STATE", "READY AT"], &rows);
}
