use std::time::Duration;

use chrono::Utc;
use clap::Subcommand;
use remindr_core::Event;

use super::{print_json, CliResult, Session};

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Deliver every callback that is due now and print the outcomes
    Tick,
    /// Keep delivering due callbacks until interrupted
    Watch {
        /// Seconds between checks (defaults to watch.tick_interval_secs)
        #[arg(long, value_name = "SECONDS")]
        interval: Option<u64>,
    },
    /// Re-arrange all callbacks after a restart or reboot
    Boot,
    /// Print registered callbacks
    Pending,
}

/// Take every due callback off the shared queue and run it.
fn fire_due(session: &Session) -> CliResult<Vec<Event>> {
    let mut events = Vec::new();
    for action in session.alarms.due(Utc::now())? {
        match session.manager.on_due_callback(action) {
            Ok(event) => events.push(event),
            Err(e) => tracing::error!(?action, error = %e, "due callback failed"),
        }
    }
    Ok(events)
}

pub fn run(action: AlarmAction) -> CliResult {
    let session = Session::open()?;

    match action {
        AlarmAction::Tick => {
            let events = fire_due(&session)?;
            print_json(&events)?;
        }
        AlarmAction::Watch { interval } => {
            let secs = interval
                .unwrap_or(session.config.watch.tick_interval_secs)
                .max(1);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(watch(session, Duration::from_secs(secs)))?;
        }
        AlarmAction::Boot => {
            let summary = session.manager.schedule_all_reminders()?;
            print_json(&summary)?;
        }
        AlarmAction::Pending => {
            print_json(&session.alarms.pending()?)?;
        }
    }
    Ok(())
}

async fn watch(session: Session, period: Duration) -> CliResult {
    if session.config.reminders.run_on_boot {
        let summary = session.manager.schedule_all_reminders()?;
        tracing::info!(?summary, "scheduled all reminders on start");
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tracing::info!(period_secs = period.as_secs(), "watching for due reminders");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for event in fire_due(&session)? {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping");
                return Ok(());
            }
        }
    }
}
