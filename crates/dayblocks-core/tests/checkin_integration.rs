//! Check-in governor behavior across chained autonomous advances.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use dayblocks_core::{
    BlockStatus, BlockStore, DayTracker, Event, Intent, MemoryStore, Origin, TimerState,
    TrackerSettings,
};

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

/// User starts block 27 at 09:00; three blocks then chain on their own.
fn chained_tracker() -> DayTracker<MemoryStore> {
    let mut tracker = DayTracker::new(MemoryStore::new(), TrackerSettings::default());
    tracker
        .dispatch(
            Intent::Start {
                category: Some("deep".into()),
                label: None,
            },
            Origin::User,
            at(9, 0, 0),
        )
        .unwrap();

    for (boundary_hour, boundary_min) in [(9, 20), (9, 40), (10, 0)] {
        tracker.tick(at(boundary_hour, boundary_min, 0));
        let events = tracker.tick(at(boundary_hour, boundary_min, 25));
        assert!(
            events.iter().any(|e| matches!(e, Event::TimerStarted { origin: Origin::Autonomous, .. })),
            "no autonomous start after {boundary_hour}:{boundary_min}"
        );
    }
    assert_eq!(tracker.governor().consecutive_autonomous(), 3);
    tracker
}

#[test]
fn test_third_autonomous_completion_requires_check_in() {
    let mut tracker = chained_tracker();

    let events = tracker.tick(at(10, 20, 0));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::CheckInRequired { consecutive_autonomous: 3, .. })));
    assert!(!events.iter().any(|e| matches!(e, Event::AutoContinueArmed { .. })));
    assert!(tracker.governor().in_grace());

    // The completed block is still credited.
    let block30 = tracker.store().fetch_block("local", date(), 30).unwrap().unwrap();
    assert_eq!(block30.status, BlockStatus::Done);
}

#[test]
fn test_grace_expiry_skips_untouched_block() {
    let mut tracker = chained_tracker();
    tracker.tick(at(10, 20, 0));

    assert!(tracker.tick(at(10, 20, 15)).iter().all(|e| !matches!(e, Event::CheckInExpired { .. })));

    let events = tracker.tick(at(10, 20, 31));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::BlockSkipped {
            block_index: 31,
            origin: Origin::Autonomous,
            ..
        }
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::CheckInExpired { block_index: 31, skipped: true, .. })));
    assert_eq!(tracker.governor().consecutive_autonomous(), 0);
    assert!(!tracker.governor().in_grace());

    let block31 = tracker.store().fetch_block("local", date(), 31).unwrap().unwrap();
    assert_eq!(block31.status, BlockStatus::Skipped);
    assert_eq!(tracker.engine().state(), TimerState::Skipped);
}

#[test]
fn test_user_action_during_grace_cancels_expiry() {
    let mut tracker = chained_tracker();
    tracker.tick(at(10, 20, 0));

    let events = tracker
        .dispatch(Intent::Continue, Origin::User, at(10, 20, 10))
        .unwrap();
    assert!(events.iter().any(|e| matches!(e, Event::TimerStarted { block_index: 31, .. })));
    assert!(!tracker.governor().in_grace());
    assert_eq!(tracker.governor().consecutive_autonomous(), 0);

    let events = tracker.tick(at(10, 21, 0));
    assert!(!events.iter().any(|e| matches!(e, Event::CheckInExpired { .. })));
    assert_eq!(tracker.engine().state(), TimerState::RunningWork);
}

#[test]
fn test_grace_expiry_after_late_wakeup_skips_nothing() {
    let mut tracker = chained_tracker();
    tracker.tick(at(10, 20, 0));
    assert!(tracker.governor().in_grace());

    // Host slept from inside the grace period until block 33.
    let events = tracker.tick(at(11, 5, 0));
    assert!(!events.iter().any(|e| matches!(e, Event::BlockSkipped { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::CheckInExpired { block_index: 31, skipped: false, .. })));
    assert!(!tracker.governor().in_grace());
    assert_eq!(tracker.governor().consecutive_autonomous(), 0);
    assert!(tracker.store().fetch_block("local", date(), 31).unwrap().is_none());
    assert!(tracker.store().fetch_block("local", date(), 33).unwrap().is_none());

    // The block the user woke up in is still theirs to start.
    let events = tracker
        .dispatch(
            Intent::Start {
                category: Some("deep".into()),
                label: None,
            },
            Origin::User,
            at(11, 5, 1),
        )
        .unwrap();
    assert!(events.iter().any(|e| matches!(e, Event::TimerStarted { block_index: 33, .. })));
    assert_eq!(tracker.engine().state(), TimerState::RunningWork);
}
