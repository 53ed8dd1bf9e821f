mod helpers;

use helpers::{mins, t0, Harness};
use recollect::alarm::AlarmPayload;
use recollect::reminder::{alarm_id, NewReminder, ReconcileReport};

fn orphan(reminder_id: &str) -> AlarmPayload {
    AlarmPayload {
        reminder_id: reminder_id.into(),
        owner_id: "me".into(),
        message: "Ghost".into(),
        fire_at: t0() + mins(10),
    }
}

#[test]
fn orphaned_alarm_is_cancelled_and_nothing_fires() {
    let h = Harness::new();
    h.alarms.insert_armed(alarm_id("ghost"), &orphan("ghost"));

    let report = h.engine.reconcile_on_startup().unwrap();
    assert_eq!(
        report,
        ReconcileReport {
            orphans_removed: 1,
            ..Default::default()
        }
    );
    assert!(h.alarms.was_cancelled(alarm_id("ghost")));
    assert!(h.alarms.cached(alarm_id("ghost")).is_none());
    assert_eq!(h.alarms.armed_count(), 0);
    assert_eq!(h.notifier.shown_count(), 0);
}

#[test]
fn undecodable_cached_payload_is_removed() {
    let h = Harness::new();
    h.alarms.insert_cached(42, "{not json");

    let report = h.engine.reconcile_on_startup().unwrap();
    assert_eq!(report.orphans_removed, 1);
    assert_eq!(h.alarms.cache_len(), 0);
}

#[test]
fn payload_for_retired_reminder_is_an_orphan() {
    let h = Harness::new();
    let reminder = h.engine.create(NewReminder::after("me", "Call mom", 5)).unwrap();
    let payload = h.alarms.cached(reminder.alarm_id()).unwrap();
    h.clock.advance(mins(5));
    h.engine.on_fire(&reminder.id).unwrap();

    // a crash between retiring and clearing the cache leaves this behind
    h.alarms.insert_armed(reminder.alarm_id(), &payload);

    let report = h.restart().reconcile_on_startup().unwrap();
    assert_eq!(report.orphans_removed, 1);
    assert_eq!(h.notifier.shown_count(), 1);
}

#[test]
fn missed_one_time_reminder_expires_without_firing() {
    let h = Harness::new();
    let reminder = h.engine.create(NewReminder::after("me", "Call mom", 5)).unwrap();

    h.clock.advance(mins(60));
    let engine = h.restart();
    let report = engine.reconcile_on_startup().unwrap();
    assert_eq!(report.expired, 1);

    let stored = engine.get(&reminder.id).unwrap().unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.triggered_at, None);
    assert_eq!(h.notifier.shown_count(), 0);
    assert!(h.alarms.cached(reminder.alarm_id()).is_none());
}

#[test]
fn missed_recurring_reminder_moves_to_next_future_slot() {
    let h = Harness::new();
    let reminder = h
        .engine
        .create(NewReminder::recurring("me", "Drink water", 30))
        .unwrap();

    h.clock.advance(mins(100));
    let engine = h.restart();
    let report = engine.reconcile_on_startup().unwrap();
    assert_eq!(report.advanced, 1);

    let stored = engine.get(&reminder.id).unwrap().unwrap();
    assert!(stored.is_active);
    assert_eq!(stored.next_trigger, t0() + mins(120));
    assert_eq!(h.alarms.armed_at(reminder.alarm_id()), Some(t0() + mins(120)));
    assert_eq!(h.alarms.cached(reminder.alarm_id()).unwrap().fire_at, t0() + mins(120));
    assert_eq!(h.notifier.shown_count(), 0);
}

#[test]
fn future_reminders_are_rearmed_after_restart() {
    let h = Harness::new();
    let a = h.engine.create(NewReminder::after("me", "Call mom", 60)).unwrap();
    let b = h
        .engine
        .create(NewReminder::recurring("me", "Drink water", 30))
        .unwrap();

    let engine = h.restart();
    assert_eq!(h.alarms.armed_count(), 0);

    let report = engine.reconcile_on_startup().unwrap();
    assert_eq!(report.rearmed, 2);
    assert_eq!(h.alarms.armed_at(a.alarm_id()), Some(t0() + mins(60)));
    assert_eq!(h.alarms.armed_at(b.alarm_id()), Some(t0() + mins(30)));
}

#[test]
fn outdated_cached_payload_is_rewritten() {
    let h = Harness::new();
    let reminder = h.engine.create(NewReminder::after("me", "Call mom", 60)).unwrap();

    let mut outdated = h.alarms.cached(reminder.alarm_id()).unwrap();
    outdated.fire_at = t0() + mins(45);
    h.alarms.insert_armed(reminder.alarm_id(), &outdated);

    let report = h.engine.reconcile_on_startup().unwrap();
    assert_eq!(report.rearmed, 1);
    assert_eq!(report.orphans_removed, 0);
    assert_eq!(h.alarms.cached(reminder.alarm_id()).unwrap().fire_at, t0() + mins(60));
}

#[test]
fn consistent_state_is_left_alone() {
    let h = Harness::new();
    h.engine.create(NewReminder::after("me", "Call mom", 60)).unwrap();
    h.engine.create(NewReminder::recurring("me", "Drink water", 30)).unwrap();

    let report = h.engine.reconcile_on_startup().unwrap();
    assert!(report.is_noop(), "unexpected repairs: {report:?}");
}

#[test]
fn second_reconcile_changes_nothing() {
    let h = Harness::new();
    h.engine.create(NewReminder::after("me", "Call mom", 5)).unwrap();
    h.engine.create(NewReminder::after("me", "Check the oven", 90)).unwrap();
    h.engine.create(NewReminder::recurring("me", "Drink water", 30)).unwrap();
    h.alarms.insert_armed(alarm_id("ghost"), &orphan("ghost"));
    h.alarms.insert_cached(7, "garbage");

    h.clock.advance(mins(40));
    let engine = h.restart();

    let first = engine.reconcile_on_startup().unwrap();
    assert_eq!(first.expired, 1);
    assert_eq!(first.advanced, 1);
    assert_eq!(first.rearmed, 1);
    assert_eq!(first.orphans_removed, 2);

    let second = engine.reconcile_on_startup().unwrap();
    assert!(second.is_noop(), "second pass repaired: {second:?}");
    assert_eq!(h.notifier.shown_count(), 0);
}

#[test]
fn corrupt_reminder_row_is_removed() {
    let h = Harness::new();
    let good = h.engine.create(NewReminder::after("me", "Call mom", 60)).unwrap();
    {
        let conn = h.db.lock().unwrap();
        conn.execute(
            "INSERT INTO reminders (id, owner_id, message, kind, interval_minutes, scheduled_time,
                                    next_trigger, is_active, is_duration_based, created_at, triggered_at)
             VALUES ('bad', 'me', 'Broken', 'fortnightly', NULL, NULL, 'not-a-date', 1, 0, 'nope', NULL)",
            [],
        )
        .unwrap();
    }
    h.alarms.insert_armed(alarm_id("bad"), &orphan("bad"));

    let report = h.engine.reconcile_on_startup().unwrap();
    assert_eq!(report.corrupt_removed, 1);
    assert!(h.engine.get("bad").unwrap().is_none());
    assert!(h.alarms.cached(alarm_id("bad")).is_none());
    assert!(h.engine.get(&good.id).unwrap().unwrap().is_active);
}
