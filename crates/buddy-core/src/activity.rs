use tracing::debug;

use crate::store::{ActivityStore, SharedStore};
use crate::{
    now_millis, Activity, ActivityDraft, ActivityStatus, BuddyError, Field, Identity,
    MaxParticipants, Result,
};

/// Enforces the activity lifecycle. Every call re-reads the whole collection,
/// mutates it in memory, and writes it back before returning.
#[derive(Clone)]
pub struct ActivityService {
    store: ActivityStore,
}

/// A draft whose fields passed validation, already trimmed.
struct ValidDraft {
    title: String,
    location: String,
    time: String,
    notes: String,
    max_participants: MaxParticipants,
}

fn validate(draft: &ActivityDraft) -> Result<ValidDraft> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(BuddyError::validation(Field::Title, "Activity title is required."));
    }
    let location = draft.location.trim();
    if location.is_empty() {
        return Err(BuddyError::validation(Field::Location, "Location is required."));
    }
    let time = draft.time.trim();
    if time.is_empty() {
        return Err(BuddyError::validation(Field::Time, "Date & time is required."));
    }
    let Some(max) = draft.max_participants else {
        return Err(BuddyError::validation(
            Field::MaxParticipants,
            "Max participants must be a number.",
        ));
    };
    let max_participants = MaxParticipants::try_from(max)?;

    Ok(ValidDraft {
        title: title.to_string(),
        location: location.to_string(),
        time: time.to_string(),
        notes: draft.notes.trim().to_string(),
        max_participants,
    })
}

fn find_index(list: &[Activity], id: &str) -> Result<usize> {
    list.iter()
        .position(|a| a.id == id)
        .ok_or(BuddyError::NotFound)
}

impl ActivityService {
    pub fn new(kv: SharedStore) -> Self {
        Self {
            store: ActivityStore::activities(kv),
        }
    }

    /// Read-only lookup; returns `None` when the id is unknown.
    pub fn get(&self, id: &str) -> Option<Activity> {
        self.store.load_all().into_iter().find(|a| a.id == id)
    }

    pub fn list(&self) -> Vec<Activity> {
        self.store.load_all()
    }

    pub fn create(&self, actor: &Identity, draft: &ActivityDraft) -> Result<Activity> {
        let valid = validate(draft)?;

        let mut list = self.store.load_all();
        let activity = Activity {
            id: self.store.generate_id(),
            title: valid.title,
            location: valid.location,
            time: valid.time,
            notes: valid.notes,
            max_participants: valid.max_participants,
            creator_email: actor.clone(),
            participants: vec![actor.clone()],
            status: ActivityStatus::Active,
            created_at: now_millis(),
        };
        // Newest first.
        list.insert(0, activity.clone());
        self.store.save_all(&list)?;

        debug!(activity_id = %activity.id, actor = %actor, "activity created");
        Ok(activity)
    }

    pub fn update(&self, actor: &Identity, id: &str, draft: &ActivityDraft) -> Result<Activity> {
        let valid = validate(draft)?;

        let mut list = self.store.load_all();
        let idx = find_index(&list, id)?;
        let activity = &mut list[idx];

        if !activity.is_creator(actor) {
            return Err(BuddyError::Forbidden("Only the creator can update this activity."));
        }
        if activity.status == ActivityStatus::Completed {
            return Err(BuddyError::InvalidState("Completed activities cannot be edited."));
        }
        if valid.max_participants.get() < activity.participants.len() {
            return Err(BuddyError::CapacityViolation);
        }

        activity.title = valid.title;
        activity.location = valid.location;
        activity.time = valid.time;
        activity.notes = valid.notes;
        activity.max_participants = valid.max_participants;

        let updated = activity.clone();
        self.store.save_all(&list)?;

        debug!(activity_id = %updated.id, actor = %actor, "activity updated");
        Ok(updated)
    }

    /// Removes the activity and returns the removed record. Allowed in any status.
    pub fn delete(&self, actor: &Identity, id: &str) -> Result<Activity> {
        let mut list = self.store.load_all();
        let idx = find_index(&list, id)?;

        if !list[idx].is_creator(actor) {
            return Err(BuddyError::Forbidden("Only the creator can delete this activity."));
        }

        let removed = list.remove(idx);
        self.store.save_all(&list)?;

        debug!(activity_id = %removed.id, actor = %actor, "activity deleted");
        Ok(removed)
    }

    pub fn join(&self, actor: &Identity, id: &str) -> Result<Activity> {
        let mut list = self.store.load_all();
        let idx = find_index(&list, id)?;
        let activity = &mut list[idx];

        if !activity.is_active() {
            return Err(BuddyError::InvalidState("You can only join active activities."));
        }
        if activity.is_participant(actor) {
            return Err(BuddyError::AlreadyJoined);
        }
        if activity.is_full() {
            return Err(BuddyError::CapacityFull);
        }

        activity.participants.push(actor.clone());
        let updated = activity.clone();
        self.store.save_all(&list)?;

        debug!(
            activity_id = %updated.id,
            actor = %actor,
            participants = updated.participants.len(),
            "joined activity"
        );
        Ok(updated)
    }

    pub fn leave(&self, actor: &Identity, id: &str) -> Result<Activity> {
        let mut list = self.store.load_all();
        let idx = find_index(&list, id)?;
        let activity = &mut list[idx];

        if activity.is_creator(actor) {
            return Err(BuddyError::CreatorCannotLeave);
        }
        // Participants of a completed activity are fixed.
        if !activity.is_active() {
            return Err(BuddyError::InvalidState("You can only leave active activities."));
        }
        let Some(pos) = activity.participants.iter().position(|p| p == actor) else {
            return Err(BuddyError::NotAParticipant);
        };

        activity.participants.remove(pos);
        let updated = activity.clone();
        self.store.save_all(&list)?;

        debug!(activity_id = %updated.id, actor = %actor, "left activity");
        Ok(updated)
    }

    pub fn complete(&self, actor: &Identity, id: &str) -> Result<Activity> {
        let mut list = self.store.load_all();
        let idx = find_index(&list, id)?;
        let activity = &mut list[idx];

        if !activity.is_creator(actor) {
            return Err(BuddyError::Forbidden("Only the creator can mark as completed."));
        }
        if !activity.mark_completed() {
            return Err(BuddyError::AlreadyCompleted);
        }

        let updated = activity.clone();
        self.store.save_all(&list)?;

        debug!(activity_id = %updated.id, actor = %actor, "activity completed");
        Ok(updated)
    }
}
