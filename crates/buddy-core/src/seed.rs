use tracing::info;

use crate::store::{ActivityStore, SharedStore, SEEDED_KEY};
use crate::{now_millis, Activity, ActivityStatus, Identity, MaxParticipants, Result};

struct SeedActivity {
    title: &'static str,
    location: &'static str,
    time: &'static str,
    notes: &'static str,
    max_participants: u8,
    /// `None` means the signed-in user hosts it.
    host: Option<&'static str>,
    actor_joined: bool,
    status: ActivityStatus,
    age_ms: i64,
}

const SEEDS: &[SeedActivity] = &[
    SeedActivity {
        title: "Reading books at MayFest",
        location: "MayFest area (Main Campus)",
        time: "2025-12-22 16:30",
        notes: "Bring a book; we can read quietly and chat later.",
        max_participants: 4,
        host: None,
        actor_joined: true,
        status: ActivityStatus::Active,
        age_ms: 0,
    },
    SeedActivity {
        title: "Lunch buddy at Bilkent Center",
        location: "Bilkent Center food court",
        time: "2025-12-23 12:30",
        notes: "Quick lunch + talk about courses and campus life.",
        max_participants: 3,
        host: Some("demo.user@ug.bilkent.edu.tr"),
        actor_joined: false,
        status: ActivityStatus::Active,
        age_ms: 120_000,
    },
    SeedActivity {
        title: "Study session (CTIS 261) in the library",
        location: "Bilkent Library (2nd floor)",
        time: "2025-12-24 15:00",
        notes: "Subnetting practice + short breaks.",
        max_participants: 5,
        host: Some("study.host@ug.bilkent.edu.tr"),
        actor_joined: false,
        status: ActivityStatus::Active,
        age_ms: 240_000,
    },
    SeedActivity {
        title: "Evening walk on campus",
        location: "Main Campus / Dorms path",
        time: "2025-12-20 20:00",
        notes: "Chill walk and talk. (Completed for rating demo.)",
        max_participants: 2,
        host: Some("walk.host@ug.bilkent.edu.tr"),
        actor_joined: true,
        status: ActivityStatus::Completed,
        age_ms: 999_999,
    },
];

/// Add the demo feed once per store. Returns `true` if seeding happened.
/// Activities already in the store are kept ahead of the demo records.
///
/// The seeded flag is separate from the collection, so deleting every
/// activity afterwards does not bring the demo data back.
pub fn seed_if_needed(kv: &SharedStore, actor: &Identity) -> Result<bool> {
    if kv.get(SEEDED_KEY).as_deref() == Some("yes") {
        return Ok(false);
    }

    let store = ActivityStore::activities(kv.clone());
    let mut activities = store.load_all();
    let kept = activities.len();
    // Demo records go after anything already stored and stay older than it.
    let now = now_millis();
    let base = activities
        .iter()
        .map(|a| a.created_at)
        .min()
        .map_or(now, |oldest| oldest.min(now) - 1);
    activities.reserve(SEEDS.len());
    for seed in SEEDS {
        let creator = match seed.host {
            Some(host) => Identity::new_unchecked(host),
            None => actor.clone(),
        };
        let mut participants = vec![creator.clone()];
        if seed.actor_joined && creator != *actor {
            participants.push(actor.clone());
        }
        activities.push(Activity {
            id: store.generate_id(),
            title: seed.title.to_string(),
            location: seed.location.to_string(),
            time: seed.time.to_string(),
            notes: seed.notes.to_string(),
            max_participants: MaxParticipants::try_from(i64::from(seed.max_participants))?,
            creator_email: creator,
            participants,
            status: seed.status,
            created_at: base - seed.age_ms,
        });
    }

    store.save_all(&activities)?;
    kv.set(SEEDED_KEY, "yes")?;
    info!(
        count = activities.len() - kept,
        kept,
        actor = %actor,
        "seeded demo activities"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::{ActivityDraft, ActivityService, IdentityGate, RatingService};
    use std::sync::Arc;

    #[test]
    fn seeds_once() {
        let kv: SharedStore = Arc::new(MemoryStore::new());
        let me = IdentityGate::default().validate("me@ug.bilkent.edu.tr").unwrap();

        assert!(seed_if_needed(&kv, &me).unwrap());
        let activities = ActivityService::new(kv.clone());
        assert_eq!(activities.list().len(), 4);

        let first = activities.list()[0].id.clone();
        activities.delete(&me, &first).unwrap();
        assert!(!seed_if_needed(&kv, &me).unwrap());
        assert_eq!(activities.list().len(), 3);
    }

    #[test]
    fn existing_activities_survive_seeding() {
        let kv: SharedStore = Arc::new(MemoryStore::new());
        let me = IdentityGate::default().validate("me@ug.bilkent.edu.tr").unwrap();
        let activities = ActivityService::new(kv.clone());
        let draft = ActivityDraft {
            title: "Mine".into(),
            location: "Dorms".into(),
            time: "2025-12-25 10:00".into(),
            notes: String::new(),
            max_participants: Some(3),
        };
        let mine = activities.create(&me, &draft).unwrap();

        assert!(seed_if_needed(&kv, &me).unwrap());
        let list = activities.list();
        assert_eq!(list.len(), 5);
        assert_eq!(list[0], mine);
        assert!(list[1..].iter().all(|a| a.created_at < mine.created_at));
    }

    #[test]
    fn seeded_feed_is_newest_first_and_rateable() {
        let kv: SharedStore = Arc::new(MemoryStore::new());
        let me = IdentityGate::default().validate("me@ug.bilkent.edu.tr").unwrap();
        seed_if_needed(&kv, &me).unwrap();

        let list = ActivityService::new(kv.clone()).list();
        assert!(list.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert!(list.iter().all(|a| a.participants.contains(&a.creator_email)));

        let walk = list
            .iter()
            .find(|a| a.status == ActivityStatus::Completed)
            .expect("completed demo activity");
        RatingService::new(kv)
            .rate(&me, &walk.id, walk.creator_email.as_str(), Some(5))
            .expect("demo rating");
    }
}
