use chrono::Utc;
use clap::{Subcommand, ValueEnum};
use remindr_core::{NewReminder, ReminderId, ReminderStatus};

use super::{parse_due, print_json, CliResult, Session};

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Scheduled,
    Notified,
    Done,
}

impl From<StatusArg> for ReminderStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Scheduled => ReminderStatus::Scheduled,
            StatusArg::Notified => ReminderStatus::Notified,
            StatusArg::Done => ReminderStatus::Done,
        }
    }
}

#[derive(Subcommand)]
pub enum ReminderAction {
    /// Add a reminder
    Add {
        /// Reminder text
        text: String,
        /// Due time (RFC 3339, "YYYY-MM-DD HH:MM" or "HH:MM", local time)
        #[arg(long)]
        at: Option<String>,
        /// Due in this many minutes
        #[arg(long = "in", value_name = "MINUTES", allow_hyphen_values = true)]
        in_minutes: Option<i64>,
        /// Repeat every N minutes until dismissed (0 disables)
        #[arg(long, value_name = "MINUTES")]
        nag: Option<i64>,
    },
    /// List reminders ordered by due time
    List {
        /// Only reminders with this status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Print one reminder as JSON
    Show {
        id: ReminderId,
    },
    /// Edit a reminder. A new due time schedules it again.
    Edit {
        id: ReminderId,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        at: Option<String>,
        #[arg(long = "in", value_name = "MINUTES", allow_hyphen_values = true)]
        in_minutes: Option<i64>,
        /// Nagging interval in minutes (0 disables)
        #[arg(long, value_name = "MINUTES")]
        nag: Option<i64>,
    },
    /// Mark reminders done
    Done {
        #[arg(required = true)]
        ids: Vec<ReminderId>,
    },
    /// Delete reminders
    Rm {
        #[arg(required = true)]
        ids: Vec<ReminderId>,
    },
}

pub fn run(action: ReminderAction) -> CliResult {
    let session = Session::open()?;
    let now = Utc::now();

    match action {
        ReminderAction::Add {
            text,
            at,
            in_minutes,
            nag,
        } => {
            let due_at = parse_due(at.as_deref(), in_minutes, now)?
                .ok_or("a due time is required (--at or --in)")?;
            let nag = nag.unwrap_or_else(|| {
                i64::from(session.config.reminders.default_nagging_interval)
            });
            let new = NewReminder::new(text, due_at)?.nagging(nag);
            let reminder = session.manager.add_reminder(new)?;
            print_json(&reminder)?;
        }
        ReminderAction::List { status } => {
            let wanted = status.map(ReminderStatus::from);
            let reminders: Vec<_> = session
                .manager
                .list_reminders()?
                .into_iter()
                .filter(|r| wanted.map_or(true, |s| r.status == s))
                .collect();
            print_json(&reminders)?;
        }
        ReminderAction::Show { id } => {
            print_json(&session.manager.get_reminder(id)?)?;
        }
        ReminderAction::Edit {
            id,
            text,
            at,
            in_minutes,
            nag,
        } => {
            let mut reminder = session.manager.get_reminder(id)?;
            if let Some(text) = text {
                reminder.text = text;
            }
            if let Some(minutes) = nag {
                reminder.nagging_repeat_interval = u32::try_from(minutes).ok().filter(|m| *m > 0);
            }
            let due_at = parse_due(at.as_deref(), in_minutes, now)?;
            if let Some(due_at) = due_at {
                reminder.reschedule_to(due_at);
            }
            let reminder = session.manager.update_reminder(reminder, due_at.is_some())?;
            print_json(&reminder)?;
        }
        ReminderAction::Done { ids } => {
            let updated = session.manager.update_reminders_where(
                &ids,
                |r| r.status = ReminderStatus::Done,
                true,
            )?;
            print_json(&updated)?;
        }
        ReminderAction::Rm { ids } => {
            let removed = session.manager.remove_reminders(&ids)?;
            print_json(&removed)?;
        }
    }

    Ok(())
}
