//! Integration tests for the reminder lifecycle.
//!
//! Drives the manager through add, delivery, dismissal, edit and delete
//! with a manual clock and the in-process alarm queue.

mod common;

use chrono::Duration;
use common::{t0, Harness};
use remindr_core::{
    CallbackIdentity, Database, DueAction, Event, IgnoreReason, NewReminder, ReminderStatus,
    ReminderStore,
};

#[test]
fn test_buy_milk_scenario() {
    let h = Harness::new();
    let milk = h
        .manager
        .add_reminder(NewReminder::new("Buy milk", t0() + Duration::minutes(5)).unwrap())
        .unwrap();
    assert_eq!(milk.id, 0);
    assert_eq!(milk.status, ReminderStatus::Scheduled);

    // Nothing fires early.
    assert!(h.advance(Duration::minutes(4)).is_empty());

    let events = h.advance(Duration::minutes(1));
    assert!(matches!(events[..], [Event::ReminderNotified { id: 0, .. }]));
    assert_eq!(
        h.manager.get_reminder(0).unwrap().status,
        ReminderStatus::Notified
    );
    let shown = h.presenter.presented_for(0);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].text, "Buy milk");

    let mut done = h.manager.get_reminder(0).unwrap();
    done.status = ReminderStatus::Done;
    h.manager.update_reminder(done, true).unwrap();

    assert!(h.alarms.is_empty());
    assert!(h.advance(Duration::days(1)).is_empty());
    assert_eq!(h.manager.get_reminder(0).unwrap().status, ReminderStatus::Done);
}

#[test]
fn test_add_then_get_round_trip() {
    let h = Harness::new();
    let added = h
        .manager
        .add_reminder(
            NewReminder::new("Dentist", t0() + Duration::days(2))
                .unwrap()
                .nagging(30),
        )
        .unwrap();
    let fetched = h.manager.get_reminder(added.id).unwrap();
    assert_eq!(fetched, added);
    assert_eq!(fetched.nagging_repeat_interval, Some(30));
}

#[test]
fn test_due_in_past_is_delivered_immediately() {
    let h = Harness::new();
    let late = h
        .manager
        .add_reminder(NewReminder::new("Already late", t0() - Duration::hours(1)).unwrap())
        .unwrap();
    assert_eq!(late.status, ReminderStatus::Notified);
    assert_eq!(h.presenter.presented_for(late.id).len(), 1);
}

#[test]
fn test_dismissing_notification_marks_done() {
    let h = Harness::new();
    let r = h
        .manager
        .add_reminder(NewReminder::new("Water plants", t0() + Duration::minutes(1)).unwrap())
        .unwrap();
    h.advance(Duration::minutes(1));

    let request = h.presenter.presented_for(r.id).pop().unwrap();
    let event = h
        .manager
        .on_due_payload(&request.on_dismissed.to_payload())
        .unwrap();

    assert!(matches!(event, Event::ReminderDone { .. }));
    assert_eq!(h.manager.get_reminder(r.id).unwrap().status, ReminderStatus::Done);
    assert_eq!(h.presenter.withdrawn(), vec![r.id]);
}

#[test]
fn test_reschedule_after_notification() {
    let h = Harness::new();
    let r = h
        .manager
        .add_reminder(NewReminder::new("Call back", t0() + Duration::minutes(1)).unwrap())
        .unwrap();
    h.advance(Duration::minutes(1));

    let mut snoozed = h.manager.get_reminder(r.id).unwrap();
    snoozed.reschedule_to(t0() + Duration::minutes(31));
    let stored = h.manager.update_reminder(snoozed, true).unwrap();

    assert_eq!(stored.status, ReminderStatus::Scheduled);
    let pending = h.alarms.get(CallbackIdentity::Due(r.id)).unwrap();
    assert_eq!(pending.fires_at, t0() + Duration::minutes(31));

    let events = h.advance(Duration::minutes(30));
    assert_eq!(events.len(), 1);
    assert_eq!(h.presenter.presented_for(r.id).len(), 2);
}

#[test]
fn test_callback_for_removed_reminder_is_ignored() {
    let h = Harness::new();
    let r = h
        .manager
        .add_reminder(NewReminder::new("Changed my mind", t0() + Duration::minutes(10)).unwrap())
        .unwrap();
    let stale = h.alarms.get(CallbackIdentity::Due(r.id)).unwrap();

    h.manager.remove_reminders(&[r.id]).unwrap();
    assert!(h.alarms.is_empty());

    // The platform timer delivered anyway.
    let event = h.manager.on_due_callback(stale.action).unwrap();
    assert!(matches!(
        event,
        Event::CallbackIgnored {
            reason: IgnoreReason::Deleted,
            ..
        }
    ));
    assert!(h.manager.list_reminders().unwrap().is_empty());
}

#[test]
fn test_restore_keeps_original_id() {
    let h = Harness::new();
    let r = h
        .manager
        .add_reminder(NewReminder::new("Undo me", t0() + Duration::hours(1)).unwrap())
        .unwrap();
    let removed = h.manager.remove_reminders(&[r.id]).unwrap();

    let restored = h
        .manager
        .restore_reminder(removed.into_iter().next().unwrap())
        .unwrap();
    assert_eq!(restored.id, r.id);
    assert!(h.alarms.is_registered(CallbackIdentity::Due(r.id)));

    let err = h.manager.restore_reminder(restored).unwrap_err();
    assert!(matches!(err, remindr_core::CoreError::AlreadyExists(id) if id == r.id));
}

#[test]
fn test_list_is_ordered_by_due_time() {
    let h = Harness::new();
    for (text, minutes) in [("third", 30), ("first", 10), ("second", 20)] {
        h.manager
            .add_reminder(NewReminder::new(text, t0() + Duration::minutes(minutes)).unwrap())
            .unwrap();
    }
    let texts: Vec<_> = h
        .manager
        .list_reminders()
        .unwrap()
        .into_iter()
        .map(|r| r.text)
        .collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[test]
fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remindr.db");

    {
        let h = Harness::over(Database::open_at(&path).unwrap());
        h.manager
            .add_reminder(NewReminder::new("Persisted", t0() + Duration::minutes(5)).unwrap())
            .unwrap();
        h.manager
            .add_reminder(NewReminder::new("Delivered", t0() - Duration::minutes(5)).unwrap())
            .unwrap();
    }

    let h = Harness::over(Database::open_at(&path).unwrap());
    assert!(h.manager.store().is_dirty().unwrap());
    let reminders = h.manager.list_reminders().unwrap();
    assert_eq!(reminders.len(), 2);
    assert_eq!(reminders[0].status, ReminderStatus::Notified);
    assert_eq!(reminders[1].status, ReminderStatus::Scheduled);

    // A fresh process has no registrations until it schedules everything.
    let summary = h.manager.schedule_all_reminders().unwrap();
    assert_eq!(summary.registered, 1);
    assert_eq!(summary.reshown, 1);

    let next = h
        .manager
        .add_reminder(NewReminder::new("After reopen", t0() + Duration::hours(1)).unwrap())
        .unwrap();
    assert_eq!(next.id, 4);
}

#[test]
fn test_legacy_state_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remindr.db");
    {
        let db = Database::open_at(&path).unwrap();
        db.kv_set(
            "reminders",
            r#"[
                {"id":0,"date":1790000000000,"text":"old","naggingRepeatInterval":0,"status":"SCHEDULED"},
                {"id":2,"date":1790000000000,"text":"gone","status":"CANCELLED"}
            ]"#,
        )
        .unwrap();
        db.kv_set("nextid", "4").unwrap();
    }

    let store = ReminderStore::new(Database::open_at(&path).unwrap()).unwrap();
    let reminders = store.list().unwrap();
    assert_eq!(reminders[0].nagging_repeat_interval, None);
    assert_eq!(reminders[1].status, ReminderStatus::Done);
    assert_eq!(store.format_version().unwrap(), 1);
}

#[test]
fn test_done_reminders_ignore_late_notify() {
    let h = Harness::new();
    let r = h
        .manager
        .add_reminder(NewReminder::new("Early finish", t0() + Duration::minutes(2)).unwrap())
        .unwrap();
    let pending = h.alarms.get(CallbackIdentity::Due(r.id)).unwrap();
    h.manager
        .update_reminders_where(&[r.id], |r| r.status = ReminderStatus::Done, false)
        .unwrap();

    let event = h.manager.on_due_callback(DueAction::Notify(r.id)).unwrap();
    assert_eq!(pending.action, DueAction::Notify(r.id));
    assert!(matches!(
        event,
        Event::CallbackIgnored {
            reason: IgnoreReason::AlreadyDone,
            ..
        }
    ));
    assert!(h.presenter.presented().is_empty());
}

#[test]
fn test_change_events_follow_the_clock() {
    let h = Harness::new();
    let mut rx = h.manager.subscribe();
    h.clock.advance(Duration::minutes(3));
    h.manager
        .add_reminder(NewReminder::new("Timestamped", t0() + Duration::hours(1)).unwrap())
        .unwrap();
    assert_eq!(
        rx.try_recv().unwrap(),
        Event::RemindersChanged {
            at: t0() + Duration::minutes(3)
        }
    );
}
