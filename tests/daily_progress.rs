mod common;

use common::at;
use questkeeper::errors::{QuestError, ValidationError};
use questkeeper::quest::SharedAccount;

#[tokio::test]
async fn streak_survives_reload_across_days() {
    let (_tmp, store) = common::temp_store().await;
    store.register("iris", "pass1234").await.unwrap();

    let session = SharedAccount::new(store.authenticate("iris", "pass1234").await.unwrap());
    let run = session.add_quest("Run").unwrap();
    let read = session.add_quest("Read").unwrap();
    store.save_shared(&session).await.unwrap();

    // Days 1 and 2 fully completed, each in its own session
    for day in [1, 2] {
        let session = SharedAccount::new(store.authenticate("iris", "pass1234").await.unwrap());
        session.toggle_completion_at(&run.id, &at(2025, 4, day, 8, 0)).unwrap();
        session.toggle_completion_at(&read.id, &at(2025, 4, day, 21, 0)).unwrap();
        store.save_shared(&session).await.unwrap();
    }
    let account = store.load("iris").await.unwrap().unwrap();
    assert_eq!((account.current_streak, account.longest_streak), (2, 2));
    assert_eq!(account.experience, 40);

    // Day 3 skipped, day 4 completed: streak restarts
    let session = SharedAccount::from(account);
    session.toggle_completion_at(&run.id, &at(2025, 4, 4, 12, 0)).unwrap();
    session.toggle_completion_at(&read.id, &at(2025, 4, 4, 12, 5)).unwrap();
    store.save_shared(&session).await.unwrap();

    let account = store.load("iris").await.unwrap().unwrap();
    assert_eq!(account.current_streak, 1);
    assert_eq!(account.longest_streak, 2);
    assert_eq!(account.last_complete_day.as_deref(), Some("2025-04-04"));
}

#[test]
fn late_night_completion_counts_for_previous_day() {
    let mut account = questkeeper::quest::Account::new("jo".into(), "h".into());
    let q = account.add_quest("Journal").unwrap();

    let outcome = account
        .toggle_completion_at(&q.id, &at(2025, 4, 11, 3, 30))
        .unwrap();
    assert_eq!(outcome.day_key, "2025-04-10");

    // After 04:00 it is a new logical day with an open quest
    assert!(!account.completed_today_at(&q.id, &at(2025, 4, 11, 4, 0)));
    assert!(account.completed_today_at(&q.id, &at(2025, 4, 10, 23, 0)));
}

#[test]
fn reset_hour_change_applies_to_later_toggles() {
    let shared = SharedAccount::new(questkeeper::quest::Account::new("kim".into(), "h".into()));
    let q = shared.add_quest("Stretch").unwrap();
    shared.set_reset_hour(0).unwrap();

    let outcome = shared
        .toggle_completion_at(&q.id, &at(2025, 4, 11, 3, 30))
        .unwrap();
    assert_eq!(outcome.day_key, "2025-04-11");
}

#[test]
fn unknown_quest_toggle_is_rejected() {
    let shared = SharedAccount::new(questkeeper::quest::Account::new("lee".into(), "h".into()));
    shared.add_quest("Pushups").unwrap();
    let before = shared.snapshot();

    let err = shared
        .toggle_completion_at("q_missing", &at(2025, 4, 11, 12, 0))
        .unwrap_err();
    assert!(matches!(
        err,
        QuestError::Validation(ValidationError::UnknownQuest(_))
    ));
    assert_eq!(shared.snapshot(), before);
}

#[test]
fn uncheck_reverses_experience_and_level() {
    let mut account = questkeeper::quest::Account::new("max".into(), "h".into());
    let q = account.add_quest("Plank").unwrap();
    account.experience = 90;
    let stats_before = account.stats;
    let now = at(2025, 4, 12, 10, 0);

    let up = account.toggle_completion_at(&q.id, &now).unwrap();
    assert_eq!(up.new_levels, vec![2]);
    assert_eq!((account.level, account.experience), (2, 100));

    let down = account.toggle_completion_at(&q.id, &now).unwrap();
    assert!(!down.completed);
    assert_eq!((account.level, account.experience), (1, 90));
    // stats only change through allocation
    assert_eq!(account.stats, stats_before);
}
