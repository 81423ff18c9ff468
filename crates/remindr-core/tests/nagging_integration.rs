//! Integration tests for nagging reminders under a simulated clock.

mod common;

use chrono::Duration;
use common::{t0, Harness};
use remindr_core::{
    CallbackIdentity, DueAction, Event, NewReminder, PresentReason, ReminderStatus,
};

#[test]
fn test_nagging_repeats_until_dismissed() {
    let h = Harness::new();
    let r = h
        .manager
        .add_reminder(
            NewReminder::new("Take medication", t0() + Duration::minutes(10))
                .unwrap()
                .nagging(5),
        )
        .unwrap();

    h.advance(Duration::minutes(10));
    for round in 1..=3 {
        let events = h.advance(Duration::minutes(5));
        assert_eq!(events.len(), 1, "round {round}");
        assert!(matches!(events[0], Event::ReminderNagged { .. }));
        assert_eq!(
            h.manager.get_reminder(r.id).unwrap().status,
            ReminderStatus::Notified
        );
    }

    let shown = h.presenter.presented_for(r.id);
    assert_eq!(shown.len(), 4);
    assert_eq!(shown[0].reason, PresentReason::Due);
    assert!(shown[1..].iter().all(|n| n.reason == PresentReason::Nag));

    h.manager
        .on_due_callback(DueAction::MarkDone(r.id))
        .unwrap();
    assert!(h.advance(Duration::hours(1)).is_empty());
    assert_eq!(h.presenter.presented_for(r.id).len(), 4);
}

#[test]
fn test_late_delivery_does_not_replay_missed_nags() {
    let h = Harness::new();
    let r = h
        .manager
        .add_reminder(
            NewReminder::new("Check oven", t0() + Duration::minutes(1))
                .unwrap()
                .nagging(10),
        )
        .unwrap();
    h.advance(Duration::minutes(1));

    // The device slept through three nags.
    let events = h.advance(Duration::minutes(37));
    assert_eq!(events.len(), 1);
    match &events[0] {
        Event::ReminderNagged { next_nag_at, .. } => {
            assert_eq!(*next_nag_at, t0() + Duration::minutes(41));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(
        h.alarms.get(CallbackIdentity::Due(r.id)).unwrap().fires_at,
        t0() + Duration::minutes(41)
    );
}

#[test]
fn test_turning_off_nagging_stops_repeats() {
    let h = Harness::new();
    let r = h
        .manager
        .add_reminder(
            NewReminder::new("Email Sam", t0() + Duration::minutes(1))
                .unwrap()
                .nagging(2),
        )
        .unwrap();
    h.advance(Duration::minutes(1));

    h.manager
        .update_reminders_where(&[r.id], |r| r.nagging_repeat_interval = None, false)
        .unwrap();
    let events = h.advance(Duration::minutes(2));
    assert!(matches!(
        events[..],
        [Event::CallbackIgnored { .. }]
    ));
    assert!(h.alarms.is_empty());
}

#[test]
fn test_restart_rearms_nagging_silently() {
    let h = Harness::new();
    let r = h
        .manager
        .add_reminder(
            NewReminder::new("Stretch", t0() + Duration::minutes(1))
                .unwrap()
                .nagging(15),
        )
        .unwrap();
    h.advance(Duration::minutes(1));

    // Registrations are lost across a restart.
    h.alarms.due(t0() + Duration::days(365));
    h.clock.advance(Duration::minutes(20));
    let summary = h.manager.schedule_all_reminders().unwrap();
    assert_eq!(summary.reshown, 1);

    let recreated = h.presenter.presented_for(r.id).pop().unwrap();
    assert_eq!(recreated.reason, PresentReason::Recreate);
    assert!(recreated.silent);
    assert_eq!(
        h.alarms.get(CallbackIdentity::Due(r.id)).unwrap().fires_at,
        t0() + Duration::minutes(31)
    );
}
