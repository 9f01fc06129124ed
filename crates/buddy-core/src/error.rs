use serde::Serialize;
use thiserror::Error;

/// Machine-checkable kind of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ValidationError,
    InvalidIdentity,
    NotFound,
    Forbidden,
    InvalidState,
    CapacityViolation,
    CapacityFull,
    AlreadyJoined,
    NotAParticipant,
    TargetNotParticipant,
    SelfRating,
    DuplicateRating,
    AlreadyCompleted,
    CreatorCannotLeave,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::InvalidIdentity => "InvalidIdentity",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::CapacityViolation => "CapacityViolation",
            ErrorKind::CapacityFull => "CapacityFull",
            ErrorKind::AlreadyJoined => "AlreadyJoined",
            ErrorKind::NotAParticipant => "NotAParticipant",
            ErrorKind::TargetNotParticipant => "TargetNotParticipant",
            ErrorKind::SelfRating => "SelfRating",
            ErrorKind::DuplicateRating => "DuplicateRating",
            ErrorKind::AlreadyCompleted => "AlreadyCompleted",
            ErrorKind::CreatorCannotLeave => "CreatorCannotLeave",
            ErrorKind::Storage => "Storage",
        }
    }
}

/// Field of an activity draft or rating request that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Title,
    Location,
    Time,
    MaxParticipants,
    Target,
    Stars,
}

/// Every way a domain operation can be refused. All of them leave state untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuddyError {
    #[error("{message}")]
    Validation { field: Field, message: &'static str },

    #[error("Invalid email. Please use an accepted institutional address.")]
    InvalidIdentity,

    #[error("Activity not found.")]
    NotFound,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidState(&'static str),

    #[error("Max participants cannot be less than current participant count.")]
    CapacityViolation,

    #[error("This activity is full.")]
    CapacityFull,

    #[error("You already joined.")]
    AlreadyJoined,

    #[error("You are not a participant.")]
    NotAParticipant,

    #[error("Selected user is not a participant.")]
    TargetNotParticipant,

    #[error("You cannot rate yourself.")]
    SelfRating,

    #[error("You already rated this user for this activity.")]
    DuplicateRating,

    #[error("Already completed.")]
    AlreadyCompleted,

    #[error("Creator cannot leave their own activity.")]
    CreatorCannotLeave,

    #[error("storage write failed: {0}")]
    Storage(String),
}

impl BuddyError {
    pub(crate) fn validation(field: Field, message: &'static str) -> Self {
        BuddyError::Validation { field, message }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BuddyError::Validation { .. } => ErrorKind::ValidationError,
            BuddyError::InvalidIdentity => ErrorKind::InvalidIdentity,
            BuddyError::NotFound => ErrorKind::NotFound,
            BuddyError::Forbidden(_) => ErrorKind::Forbidden,
            BuddyError::InvalidState(_) => ErrorKind::InvalidState,
            BuddyError::CapacityViolation => ErrorKind::CapacityViolation,
            BuddyError::CapacityFull => ErrorKind::CapacityFull,
            BuddyError::AlreadyJoined => ErrorKind::AlreadyJoined,
            BuddyError::NotAParticipant => ErrorKind::NotAParticipant,
            BuddyError::TargetNotParticipant => ErrorKind::TargetNotParticipant,
            BuddyError::SelfRating => ErrorKind::SelfRating,
            BuddyError::DuplicateRating => ErrorKind::DuplicateRating,
            BuddyError::AlreadyCompleted => ErrorKind::AlreadyCompleted,
            BuddyError::CreatorCannotLeave => ErrorKind::CreatorCannotLeave,
            BuddyError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// The field named by a validation failure, if this is one.
    pub fn field(&self) -> Option<Field> {
        match self {
            BuddyError::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

pub type Result<T, E = BuddyError> = std::result::Result<T, E>;

/// The `{ok, message}` shape shown to a user after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            kind: None,
            message: message.into(),
        }
    }

    pub fn failure(err: &BuddyError) -> Self {
        Self {
            ok: false,
            kind: Some(err.kind()),
            message: err.to_string(),
        }
    }

    pub fn from_result<T>(result: &Result<T>, success: &str) -> Self {
        match result {
            Ok(_) => Outcome::success(success),
            Err(e) => Outcome::failure(e),
        }
    }
}
