use serde::Serialize;
use tracing::debug;

use crate::identity::normalize;
use crate::store::{ActivityStore, RatingStore, SharedStore};
use crate::{now_millis, ActivityStatus, BuddyError, Field, Identity, Rating, Result, Stars};

/// Aggregate of every rating a person has received.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    /// Exact mean of received stars; `None` when nothing has been received yet.
    pub average: Option<f64>,
    pub count: usize,
}

impl RatingStats {
    /// Mean rounded to two decimals for display.
    pub fn display_average(&self) -> Option<String> {
        self.average.map(|avg| format!("{:.2}", avg))
    }
}

#[derive(Clone)]
pub struct RatingService {
    activities: ActivityStore,
    ratings: RatingStore,
}

impl RatingService {
    pub fn new(kv: SharedStore) -> Self {
        Self {
            activities: ActivityStore::activities(kv.clone()),
            ratings: RatingStore::ratings(kv),
        }
    }

    /// Record a one-time rating from `actor` to `target` for a completed activity.
    ///
    /// `stars` is `None` when the user input was not a number.
    pub fn rate(
        &self,
        actor: &Identity,
        activity_id: &str,
        target: &str,
        stars: Option<i64>,
    ) -> Result<Rating> {
        let target = normalize(target);
        if target.is_empty() {
            return Err(BuddyError::validation(
                Field::Target,
                "Please choose a user to rate.",
            ));
        }
        let Some(stars) = stars else {
            return Err(BuddyError::validation(Field::Stars, "Stars must be a number."));
        };
        let stars = Stars::try_from(stars)?;

        let activity = self
            .activities
            .load_all()
            .into_iter()
            .find(|a| a.id == activity_id)
            .ok_or(BuddyError::NotFound)?;

        if activity.status != ActivityStatus::Completed {
            return Err(BuddyError::InvalidState("You can rate only after completion."));
        }
        if !activity.is_participant(actor) {
            return Err(BuddyError::NotAParticipant);
        }
        let Some(target) = activity
            .participants
            .iter()
            .find(|p| p.as_str() == target)
            .cloned()
        else {
            return Err(BuddyError::TargetNotParticipant);
        };
        if target == *actor {
            return Err(BuddyError::SelfRating);
        }

        let mut ratings = self.ratings.load_all();
        let already = ratings
            .iter()
            .any(|r| r.activity_id == activity.id && r.from == *actor && r.to == target);
        if already {
            return Err(BuddyError::DuplicateRating);
        }

        let rating = Rating {
            id: self.ratings.generate_id(),
            activity_id: activity.id,
            from: actor.clone(),
            to: target,
            stars,
            created_at: now_millis(),
        };
        ratings.push(rating.clone());
        self.ratings.save_all(&ratings)?;

        debug!(
            rating_id = %rating.id,
            activity_id = %rating.activity_id,
            from = %rating.from,
            to = %rating.to,
            "rating submitted"
        );
        Ok(rating)
    }

    pub fn stats_for(&self, identity: &Identity) -> RatingStats {
        let received: Vec<u8> = self
            .ratings
            .load_all()
            .iter()
            .filter(|r| r.to == *identity)
            .map(|r| r.stars.get())
            .collect();

        if received.is_empty() {
            return RatingStats {
                average: None,
                count: 0,
            };
        }
        let sum: u64 = received.iter().map(|&s| u64::from(s)).sum();
        RatingStats {
            average: Some(sum as f64 / received.len() as f64),
            count: received.len(),
        }
    }

    /// Ratings `actor` has already given for one activity.
    pub fn given_by(&self, actor: &Identity, activity_id: &str) -> Vec<Rating> {
        self.ratings
            .load_all()
            .into_iter()
            .filter(|r| r.activity_id == activity_id && r.from == *actor)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::{ActivityDraft, ActivityService, ErrorKind, IdentityGate, KeyValueStore};
    use std::sync::Arc;

    struct Fixture {
        activities: ActivityService,
        ratings: RatingService,
        activity_id: String,
        alice: Identity,
        bob: Identity,
    }

    fn who(name: &str) -> Identity {
        IdentityGate::default()
            .validate(&format!("{name}@ug.bilkent.edu.tr"))
            .expect("valid identity")
    }

    fn fixture(complete: bool) -> Fixture {
        let kv: SharedStore = Arc::new(MemoryStore::new());
        let activities = ActivityService::new(kv.clone());
        let ratings = RatingService::new(kv);
        let alice = who("alice");
        let bob = who("bob");
        let draft = ActivityDraft {
            title: "Evening walk".into(),
            location: "Dorms path".into(),
            time: "2025-12-20 20:00".into(),
            notes: String::new(),
            max_participants: Some(3),
        };
        let act = activities.create(&alice, &draft).unwrap();
        activities.join(&bob, &act.id).unwrap();
        if complete {
            activities.complete(&alice, &act.id).unwrap();
        }
        Fixture {
            activities,
            ratings,
            activity_id: act.id,
            alice,
            bob,
        }
    }

    #[test]
    fn rate_once_then_duplicate() {
        let f = fixture(true);
        let rating = f
            .ratings
            .rate(&f.alice, &f.activity_id, f.bob.as_str(), Some(5))
            .unwrap();
        assert_eq!(rating.to, f.bob);
        assert_eq!(rating.stars.get(), 5);

        let err = f
            .ratings
            .rate(&f.alice, &f.activity_id, f.bob.as_str(), Some(3))
            .unwrap_err();
        assert_eq!(err, BuddyError::DuplicateRating);

        // The reverse direction is a different rating.
        f.ratings
            .rate(&f.bob, &f.activity_id, f.alice.as_str(), Some(4))
            .unwrap();
    }

    #[test]
    fn self_rating_is_refused() {
        let f = fixture(true);
        let err = f
            .ratings
            .rate(&f.alice, &f.activity_id, f.alice.as_str(), Some(5))
            .unwrap_err();
        assert_eq!(err, BuddyError::SelfRating);
    }

    #[test]
    fn target_is_normalized_before_matching() {
        let f = fixture(true);
        let rating = f
            .ratings
            .rate(&f.alice, &f.activity_id, "  BOB@ug.bilkent.edu.tr ", Some(2))
            .unwrap();
        assert_eq!(rating.to, f.bob);
    }

    #[test]
    fn input_validation_comes_first() {
        let f = fixture(false);
        let err = f.ratings.rate(&f.alice, "missing", " ", Some(5)).unwrap_err();
        assert_eq!(err.field(), Some(Field::Target));

        let err = f.ratings.rate(&f.alice, "missing", "x", None).unwrap_err();
        assert_eq!(err.to_string(), "Stars must be a number.");

        let err = f.ratings.rate(&f.alice, "missing", "x", Some(6)).unwrap_err();
        assert_eq!(err.field(), Some(Field::Stars));

        let err = f.ratings.rate(&f.alice, "missing", "x", Some(3)).unwrap_err();
        assert_eq!(err, BuddyError::NotFound);
    }

    #[test]
    fn eligibility_rules() {
        let f = fixture(false);
        let err = f
            .ratings
            .rate(&f.alice, &f.activity_id, f.bob.as_str(), Some(5))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        f.activities.complete(&f.alice, &f.activity_id).unwrap();

        let err = f
            .ratings
            .rate(&who("cem"), &f.activity_id, f.bob.as_str(), Some(5))
            .unwrap_err();
        assert_eq!(err, BuddyError::NotAParticipant);

        let err = f
            .ratings
            .rate(&f.alice, &f.activity_id, "cem@ug.bilkent.edu.tr", Some(5))
            .unwrap_err();
        assert_eq!(err, BuddyError::TargetNotParticipant);
    }

    #[test]
    fn stats_distinguish_none_from_zero() {
        let f = fixture(true);
        let empty = f.ratings.stats_for(&f.bob);
        assert_eq!(empty, RatingStats { average: None, count: 0 });
        assert_eq!(empty.display_average(), None);

        f.ratings
            .rate(&f.alice, &f.activity_id, f.bob.as_str(), Some(3))
            .unwrap();
        let stats = f.ratings.stats_for(&f.bob);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.average, Some(3.0));
    }

    #[test]
    fn stats_average_three_and_five_is_four() {
        let kv: SharedStore = Arc::new(MemoryStore::new());
        let ratings = RatingService::new(kv.clone());
        let target = who("bob");
        let raw = serde_json::json!([
            {"id": "rate-1", "activityId": "act-1", "from": "a@bilkent.edu.tr",
             "to": target.as_str(), "stars": 3, "createdAt": 1},
            {"id": "rate-2", "activityId": "act-2", "from": "c@bilkent.edu.tr",
             "to": target.as_str(), "stars": 5, "createdAt": 2},
            {"id": "rate-3", "activityId": "act-2", "from": "c@bilkent.edu.tr",
             "to": "someone@bilkent.edu.tr", "stars": 1, "createdAt": 3}
        ]);
        kv.set(crate::store::RATINGS_KEY, &raw.to_string()).unwrap();

        let stats = ratings.stats_for(&target);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.average, Some(4.0));
        assert_eq!(stats.display_average().as_deref(), Some("4.00"));
    }

    #[test]
    fn display_average_rounds_but_stored_mean_is_exact() {
        let stats = RatingStats {
            average: Some(11.0 / 3.0),
            count: 3,
        };
        assert_eq!(stats.display_average().as_deref(), Some("3.67"));
        assert_eq!(stats.average, Some(11.0 / 3.0));
    }

    #[test]
    fn given_by_lists_actor_ratings_for_activity() {
        let f = fixture(true);
        assert!(f.ratings.given_by(&f.alice, &f.activity_id).is_empty());
        f.ratings
            .rate(&f.alice, &f.activity_id, f.bob.as_str(), Some(4))
            .unwrap();
        let given = f.ratings.given_by(&f.alice, &f.activity_id);
        assert_eq!(given.len(), 1);
        assert_eq!(given[0].to, f.bob);
    }
}
