use crate::{BuddyError, Identity, Result};

/// Accepted suffixes used when no settings file overrides them.
pub const DEFAULT_ACCEPTED_SUFFIXES: &[&str] = &["@ug.bilkent.edu.tr", "@bilkent.edu.tr"];

/// Validates raw user input into an [`Identity`].
///
/// Input is trimmed and lowercased, then accepted only if it ends with one of
/// the configured suffixes. Suffixes are compared case-insensitively.
#[derive(Debug, Clone)]
pub struct IdentityGate {
    accepted_suffixes: Vec<String>,
}

impl Default for IdentityGate {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPTED_SUFFIXES.iter().copied())
    }
}

impl IdentityGate {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let accepted_suffixes = suffixes
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { accepted_suffixes }
    }

    pub fn accepted_suffixes(&self) -> &[String] {
        &self.accepted_suffixes
    }

    pub fn validate(&self, raw: &str) -> Result<Identity> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(BuddyError::InvalidIdentity);
        }
        if self
            .accepted_suffixes
            .iter()
            .any(|suffix| normalized.ends_with(suffix.as_str()))
        {
            Ok(Identity::new_unchecked(normalized))
        } else {
            Err(BuddyError::InvalidIdentity)
        }
    }

    /// Resolve a stored session value. Absent, blank or invalid values all mean
    /// "no session"; the caller should send the user to the login entry point.
    pub fn require_session(&self, stored: Option<&str>) -> Option<Identity> {
        let stored = stored?;
        if stored.trim().is_empty() {
            return None;
        }
        self.validate(stored).ok()
    }
}

/// Trim and lowercase without any suffix check.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_default_domains() {
        let gate = IdentityGate::default();
        assert_eq!(
            gate.validate("  Ayse.Yilmaz@UG.Bilkent.edu.tr ").unwrap().as_str(),
            "ayse.yilmaz@ug.bilkent.edu.tr"
        );
        assert!(gate.validate("prof@bilkent.edu.tr").is_ok());
    }

    #[test]
    fn rejects_foreign_and_empty_input() {
        let gate = IdentityGate::default();
        assert_eq!(gate.validate("someone@gmail.com"), Err(BuddyError::InvalidIdentity));
        assert_eq!(gate.validate("   "), Err(BuddyError::InvalidIdentity));
        assert_eq!(gate.validate("bilkent.edu.tr"), Err(BuddyError::InvalidIdentity));
    }

    #[test]
    fn suffixes_are_configuration() {
        let gate = IdentityGate::new(["@Example.ORG", "  "]);
        assert_eq!(gate.accepted_suffixes(), ["@example.org".to_string()]);
        assert!(gate.validate("x@example.org").is_ok());
        assert!(gate.validate("x@bilkent.edu.tr").is_err());
    }

    #[test]
    fn require_session_never_fails_loudly() {
        let gate = IdentityGate::default();
        assert_eq!(gate.require_session(None), None);
        assert_eq!(gate.require_session(Some("")), None);
        assert_eq!(gate.require_session(Some("  ")), None);
        assert_eq!(gate.require_session(Some("x@gmail.com")), None);
        assert_eq!(
            gate.require_session(Some("x@bilkent.edu.tr")).map(|i| i.to_string()),
            Some("x@bilkent.edu.tr".to_string())
        );
    }
}
