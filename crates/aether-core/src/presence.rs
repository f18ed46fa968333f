use aether_store::StatusDescriptor;
use tracing::{info, warn};

use crate::session::{PlatformError, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Playing,
    Listening,
    Watching,
    Competing,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Listening => "listening",
            Self::Watching => "watching",
            Self::Competing => "competing",
        }
    }

    /// Exact, lower-case match only.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "playing" => Some(Self::Playing),
            "listening" => Some(Self::Listening),
            "watching" => Some(Self::Watching),
            "competing" => Some(Self::Competing),
            _ => None,
        }
    }

    pub fn all() -> &'static [ActivityKind] {
        &[
            Self::Playing,
            Self::Listening,
            Self::Watching,
            Self::Competing,
        ]
    }
}

/// Pushes persisted status descriptors onto the live session.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceManager;

impl PresenceManager {
    pub fn new() -> Self {
        Self
    }

    /// Unknown kinds map to `Playing`. The file is left alone; the operator gets a warning.
    pub fn activity_for(&self, status: &StatusDescriptor) -> ActivityKind {
        match ActivityKind::parse(&status.kind) {
            Some(kind) => kind,
            None => {
                warn!(
                    kind = %status.kind,
                    "unrecognized status kind; falling back to playing"
                );
                ActivityKind::Playing
            }
        }
    }

    pub async fn apply(
        &self,
        session: &dyn Session,
        status: &StatusDescriptor,
    ) -> Result<ActivityKind, PlatformError> {
        let kind = self.activity_for(status);
        session.set_activity(kind, &status.text).await?;
        info!(kind = kind.as_str(), text = %status.text, "presence applied");
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_roundtrips_through_its_name() {
        for kind in ActivityKind::all() {
            assert_eq!(ActivityKind::parse(kind.as_str()), Some(*kind));
        }
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!(ActivityKind::parse("Listening"), None);
        assert_eq!(ActivityKind::parse("dancing"), None);
    }

    #[test]
    fn unknown_kind_falls_back_to_playing() {
        let presence = PresenceManager::new();
        let status = StatusDescriptor::new("streaming", "live");
        assert_eq!(presence.activity_for(&status), ActivityKind::Playing);
        let status = StatusDescriptor::new("watching", "you");
        assert_eq!(presence.activity_for(&status), ActivityKind::Watching);
    }
}
