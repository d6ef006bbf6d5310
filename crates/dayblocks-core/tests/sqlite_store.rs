//! SQLite persistence across process lifetimes.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use dayblocks_core::{
    BlockStatus, BlockStore, CoreError, Database, DatabaseError, DayTracker, Intent, Origin,
    TimerState, TrackerSettings, TrackerState,
};

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

#[test]
fn test_tracker_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dayblocks.db");

    {
        let db = Database::open_at(&path).unwrap();
        let mut tracker = DayTracker::new(db, TrackerSettings::default());
        tracker
            .dispatch(
                Intent::Start {
                    category: Some("deep".into()),
                    label: Some("draft".into()),
                },
                Origin::User,
                at(9, 0, 0),
            )
            .unwrap();
        tracker.dispatch(Intent::Pause, Origin::User, at(9, 4, 0)).unwrap();
        let state = serde_json::to_string(&tracker.state()).unwrap();
        tracker.store().kv_set("tracker_state", &state).unwrap();
    }

    let db = Database::open_at(&path).unwrap();
    let json = db.kv_get("tracker_state").unwrap().unwrap();
    let state: TrackerState = serde_json::from_str(&json).unwrap();
    let mut tracker = DayTracker::with_state(db, TrackerSettings::default(), state);
    assert_eq!(tracker.engine().state(), TimerState::Paused);
    assert_eq!(tracker.engine().time_left_secs(at(9, 10, 0)), Some(960));

    tracker.dispatch(Intent::Resume, Origin::User, at(9, 10, 0)).unwrap();
    tracker
        .dispatch(Intent::Stop { mark_complete: true }, Origin::User, at(9, 12, 0))
        .unwrap();

    let block = tracker.store().fetch_block("local", date(), 27).unwrap().unwrap();
    assert_eq!(block.runs.len(), 2);
    assert_eq!(block.used_seconds, 240 + 120);
    assert_eq!(block.status, BlockStatus::Done);
    assert_eq!(block.segments[0].label.as_deref(), Some("draft"));
}

#[test]
fn test_corrupt_row_is_reported_with_its_key() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("dayblocks.db")).unwrap();
    db.conn()
        .execute(
            "INSERT INTO blocks (user_id, date, block_index, payload, updated_at)
             VALUES ('local', '2026-03-02', 5, '{not json', '2026-03-02T00:00:00Z')",
            [],
        )
        .unwrap();

    let err = db.fetch_day("local", date()).unwrap_err();
    match err {
        CoreError::Database(DatabaseError::CorruptPayload { key, .. }) => {
            assert_eq!(key, "local/2026-03-02/5");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_reset_day_clears_stored_progress() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("dayblocks.db")).unwrap();
    let mut tracker = DayTracker::new(db, TrackerSettings::default());
    tracker
        .dispatch(Intent::Start { category: None, label: None }, Origin::User, at(9, 0, 0))
        .unwrap();
    tracker
        .dispatch(Intent::Stop { mark_complete: true }, Origin::User, at(9, 5, 0))
        .unwrap();
    tracker
        .plan_block(date(), 40, Some("email".into()), None, at(9, 5, 0))
        .unwrap();

    tracker.reset_day(date(), at(9, 6, 0)).unwrap();

    let day = tracker.day(date()).unwrap();
    let worked = day.get(27).unwrap();
    assert_eq!(worked.used_seconds, 0);
    assert!(worked.runs.is_empty());
    assert_eq!(day.worked_seconds(), 0);
}
