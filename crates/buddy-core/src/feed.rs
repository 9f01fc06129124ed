//! Read-side projections over the activity collection. Nothing here mutates state.

use serde::Serialize;

use crate::{Activity, ActivityStatus, Identity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFilter {
    #[default]
    All,
    Active,
    Completed,
    Mine,
    Joined,
}

impl FeedFilter {
    /// Exact, case-sensitive match; anything else falls back to `All`.
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => FeedFilter::Active,
            "completed" => FeedFilter::Completed,
            "mine" => FeedFilter::Mine,
            "joined" => FeedFilter::Joined,
            _ => FeedFilter::All,
        }
    }

    fn matches(self, activity: &Activity, actor: &Identity) -> bool {
        match self {
            FeedFilter::All => true,
            FeedFilter::Active => activity.status == ActivityStatus::Active,
            FeedFilter::Completed => activity.status == ActivityStatus::Completed,
            FeedFilter::Mine => activity.is_creator(actor),
            FeedFilter::Joined => activity.is_participant(actor),
        }
    }
}

fn matches_search(activity: &Activity, needle: &str) -> bool {
    needle.is_empty()
        || activity.title.to_lowercase().contains(needle)
        || activity.location.to_lowercase().contains(needle)
}

/// Filter and search `activities` for `actor`, preserving input order.
pub fn project<'a>(
    activities: &'a [Activity],
    actor: &Identity,
    filter: FeedFilter,
    search_text: &str,
) -> Vec<&'a Activity> {
    let needle = search_text.trim().to_lowercase();
    activities
        .iter()
        .filter(|a| filter.matches(a, actor) && matches_search(a, &needle))
        .collect()
}

/// What the acting user may attempt on one activity. The services still decide;
/// this only drives which actions are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_join: bool,
    pub can_leave: bool,
    pub can_complete: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl Permissions {
    pub fn for_actor(activity: &Activity, actor: &Identity) -> Self {
        let active = activity.is_active();
        let joined = activity.is_participant(actor);
        let creator = activity.is_creator(actor);
        Self {
            can_join: active && !joined && !activity.is_full(),
            can_leave: active && joined && !creator,
            can_complete: active && creator,
            can_edit: active && creator,
            can_delete: creator,
        }
    }
}

/// People `actor` can rate for this activity: the other participants, once
/// the activity is completed and only if `actor` took part.
pub fn rateable_participants<'a>(activity: &'a Activity, actor: &Identity) -> Vec<&'a Identity> {
    if activity.status != ActivityStatus::Completed || !activity.is_participant(actor) {
        return Vec::new();
    }
    activity.participants.iter().filter(|p| *p != actor).collect()
}
