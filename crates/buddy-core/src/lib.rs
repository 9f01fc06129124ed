pub mod activity;
pub mod error;
pub mod feed;
pub mod identity;
pub mod rating;
pub mod seed;
pub mod session;
pub mod settings;
pub mod store;

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub use activity::ActivityService;
pub use error::{BuddyError, ErrorKind, Field, Outcome, Result};
pub use feed::{project, rateable_participants, FeedFilter, Permissions};
pub use identity::IdentityGate;
pub use rating::{RatingService, RatingStats};
pub use session::SessionStore;
pub use settings::Settings;
pub use store::{ActivityStore, FileStore, KeyValueStore, MemoryStore, RatingStore, SharedStore};

// --- Types ---

/// A normalized, gate-validated user identifier (an institutional email).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wraps an already-normalized value without checking suffixes.
    /// Used for records read back from storage and for seed data.
    pub(crate) fn new_unchecked(value: impl Into<String>) -> Self {
        Identity(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Active,
    Completed,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Active => "active",
            ActivityStatus::Completed => "completed",
        }
    }
}

/// Capacity of an activity, always within 2..=50.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct MaxParticipants(u8);

impl MaxParticipants {
    pub const MIN: i64 = 2;
    pub const MAX: i64 = 50;

    pub fn get(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<i64> for MaxParticipants {
    type Error = BuddyError;

    fn try_from(value: i64) -> Result<Self> {
        if value < Self::MIN {
            return Err(BuddyError::validation(
                Field::MaxParticipants,
                "Max participants must be at least 2.",
            ));
        }
        if value > Self::MAX {
            return Err(BuddyError::validation(
                Field::MaxParticipants,
                "Max participants cannot exceed 50.",
            ));
        }
        Ok(MaxParticipants(value as u8))
    }
}

impl From<MaxParticipants> for i64 {
    fn from(value: MaxParticipants) -> Self {
        i64::from(value.0)
    }
}

/// A star rating, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Stars(u8);

impl Stars {
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Stars {
    type Error = BuddyError;

    fn try_from(value: i64) -> Result<Self> {
        if !(1..=5).contains(&value) {
            return Err(BuddyError::validation(
                Field::Stars,
                "Stars must be between 1 and 5.",
            ));
        }
        Ok(Stars(value as u8))
    }
}

impl From<Stars> for i64 {
    fn from(value: Stars) -> Self {
        i64::from(value.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub location: String,
    pub time: String,
    #[serde(default)]
    pub notes: String,
    pub max_participants: MaxParticipants,
    pub creator_email: Identity,
    /// Join order is preserved; the creator is always first on creation.
    pub participants: Vec<Identity>,
    pub status: ActivityStatus,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Activity {
    pub fn is_creator(&self, who: &Identity) -> bool {
        self.creator_email == *who
    }

    pub fn is_participant(&self, who: &Identity) -> bool {
        self.participants.contains(who)
    }

    pub fn is_active(&self) -> bool {
        self.status == ActivityStatus::Active
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_participants.get()
    }

    /// One-way transition; returns false if the activity was already completed.
    pub(crate) fn mark_completed(&mut self) -> bool {
        match self.status {
            ActivityStatus::Active => {
                self.status = ActivityStatus::Completed;
                true
            }
            ActivityStatus::Completed => false,
        }
    }
}

/// User-supplied fields for creating or editing an activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDraft {
    /// Short title, e.g. "Lunch buddy at the food court"
    pub title: String,
    /// Where the group meets
    pub location: String,
    /// Free-text date and time, e.g. "2025-12-23 12:30"
    pub time: String,
    /// Optional notes shown on the activity card
    #[serde(default)]
    pub notes: String,
    /// Capacity including the creator, 2 to 50. Numeric strings are accepted.
    #[serde(default, deserialize_with = "loose_integer")]
    pub max_participants: Option<i64>,
}

/// Interpret free-form numeric input: integers, integral floats and numeric
/// strings. Anything else is `None`, which validation reports as "must be a number".
pub fn parse_integer(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `deserialize_with` adapter for [`parse_integer`]; never fails on the value's type.
pub fn loose_integer<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_integer))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub activity_id: String,
    pub from: Identity,
    pub to: Identity,
    pub stars: Stars,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
