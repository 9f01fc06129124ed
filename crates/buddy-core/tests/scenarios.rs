use std::sync::Arc;

use buddy_core::store::{ACTIVITIES_KEY, RATINGS_KEY};
use buddy_core::{
    project, ActivityDraft, ActivityService, ActivityStatus, BuddyError, ErrorKind, FeedFilter,
    FileStore, Identity, IdentityGate, KeyValueStore, RatingService, SessionStore, SharedStore,
};
use tempfile::tempdir;

fn who(gate: &IdentityGate, name: &str) -> Identity {
    gate.validate(&format!("{name}@ug.bilkent.edu.tr"))
        .expect("valid identity")
}

fn draft(title: &str, max: i64) -> ActivityDraft {
    ActivityDraft {
        title: title.to_string(),
        location: "Bilkent Library (2nd floor)".to_string(),
        time: "2025-12-24 15:00".to_string(),
        notes: String::new(),
        max_participants: Some(max),
    }
}

#[test]
fn capacity_two_admits_exactly_one_guest() {
    let dir = tempdir().expect("tempdir");
    let kv: SharedStore = Arc::new(FileStore::new(dir.path()));
    let gate = IdentityGate::default();
    let activities = ActivityService::new(kv);

    let host = who(&gate, "host");
    let act = activities.create(&host, &draft("Tea", 2)).expect("create");
    assert_eq!(act.participants.len(), 1);

    let joined = activities.join(&who(&gate, "guest"), &act.id).expect("join");
    assert_eq!(joined.participants.len(), 2);

    let err = activities.join(&who(&gate, "late"), &act.id).expect_err("full");
    assert_eq!(err.kind(), ErrorKind::CapacityFull);
    assert_eq!(activities.get(&act.id).expect("exists").participants.len(), 2);
}

#[test]
fn completion_freezes_activity_and_opens_ratings() {
    let dir = tempdir().expect("tempdir");
    let kv: SharedStore = Arc::new(FileStore::new(dir.path()));
    let gate = IdentityGate::default();
    let activities = ActivityService::new(kv.clone());
    let ratings = RatingService::new(kv);

    let a = who(&gate, "a");
    let b = who(&gate, "b");
    let act = activities.create(&a, &draft("Walk", 4)).expect("create");
    activities.join(&b, &act.id).expect("join");
    activities.complete(&a, &act.id).expect("complete");

    let err = activities
        .update(&a, &act.id, &draft("Walk again", 4))
        .expect_err("frozen");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(
        activities.join(&who(&gate, "c"), &act.id).expect_err("closed").kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        activities.leave(&b, &act.id).expect_err("closed").kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        activities.complete(&a, &act.id).expect_err("terminal"),
        BuddyError::AlreadyCompleted
    );

    ratings.rate(&a, &act.id, b.as_str(), Some(5)).expect("first rating");
    assert_eq!(
        ratings.rate(&a, &act.id, b.as_str(), Some(5)).expect_err("dup"),
        BuddyError::DuplicateRating
    );
    assert_eq!(
        ratings.rate(&a, &act.id, a.as_str(), Some(5)).expect_err("self"),
        BuddyError::SelfRating
    );

    let stats = ratings.stats_for(&b);
    assert_eq!(stats.count, 1);
    assert_eq!(stats.average, Some(5.0));

    activities.delete(&a, &act.id).expect("delete completed");
    assert!(activities.get(&act.id).is_none());
    // Ratings are not owned by the activity.
    assert_eq!(ratings.stats_for(&b).count, 1);
}

#[test]
fn non_creator_cannot_manage_activity() {
    let dir = tempdir().expect("tempdir");
    let kv: SharedStore = Arc::new(FileStore::new(dir.path()));
    let gate = IdentityGate::default();
    let activities = ActivityService::new(kv);

    let owner = who(&gate, "owner");
    let other = who(&gate, "other");
    let act = activities.create(&owner, &draft("Chess", 6)).expect("create");
    activities.join(&other, &act.id).expect("join");

    let results = [
        activities.update(&other, &act.id, &draft("Mine now", 6)).map(|_| ()),
        activities.delete(&other, &act.id).map(|_| ()),
        activities.complete(&other, &act.id).map(|_| ()),
    ];
    for result in results {
        assert_eq!(result.expect_err("forbidden").kind(), ErrorKind::Forbidden);
    }
    let stored = activities.get(&act.id).expect("still there");
    assert_eq!(stored.title, "Chess");
    assert_eq!(stored.status, ActivityStatus::Active);
}

#[test]
fn state_survives_reopening_the_store() {
    let dir = tempdir().expect("tempdir");
    let gate = IdentityGate::default();
    let me = who(&gate, "me");

    let created = {
        let kv: SharedStore = Arc::new(FileStore::new(dir.path()));
        SessionStore::new(kv.clone())
            .sign_in(&gate, "ME@ug.bilkent.edu.tr")
            .expect("sign in");
        ActivityService::new(kv)
            .create(&me, &draft("Board games", 5))
            .expect("create")
    };

    let kv: SharedStore = Arc::new(FileStore::new(dir.path()));
    assert_eq!(SessionStore::new(kv.clone()).current(&gate), Some(me.clone()));
    let list = ActivityService::new(kv).list();
    assert_eq!(list, vec![created]);
    let mine = project(&list, &me, FeedFilter::parse("mine"), "board");
    assert_eq!(mine.len(), 1);
}

#[test]
fn corrupt_files_are_read_as_empty_and_then_replaced() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join(format!("{ACTIVITIES_KEY}.json")), "{{{").expect("write");
    std::fs::write(dir.path().join(format!("{RATINGS_KEY}.json")), "\"text\"").expect("write");

    let kv: SharedStore = Arc::new(FileStore::new(dir.path()));
    let gate = IdentityGate::default();
    let activities = ActivityService::new(kv.clone());
    assert!(activities.list().is_empty());
    assert_eq!(RatingService::new(kv.clone()).stats_for(&who(&gate, "x")).count, 0);

    activities
        .create(&who(&gate, "x"), &draft("Fresh start", 3))
        .expect("create");
    let raw = kv.get(ACTIVITIES_KEY).expect("written");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(parsed.as_array().map(Vec::len), Some(1));
}

#[test]
fn failed_operations_do_not_write() {
    let dir = tempdir().expect("tempdir");
    let kv: SharedStore = Arc::new(FileStore::new(dir.path()));
    let gate = IdentityGate::default();
    let activities = ActivityService::new(kv.clone());

    let host = who(&gate, "host");
    let act = activities.create(&host, &draft("Run", 2)).expect("create");
    let before = kv.get(ACTIVITIES_KEY);

    let _ = activities.leave(&host, &act.id);
    let _ = activities.update(&host, &act.id, &draft("", 2));
    let _ = activities.join(&host, &act.id);
    assert_eq!(kv.get(ACTIVITIES_KEY), before);
}
