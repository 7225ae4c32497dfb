//! Queue item status definitions
//!
//! A queue item moves through `pending → downloading → {ready | error}` while
//! it is fetched, and `ready → playing → played` once handed to the player.
//! `error` is terminal. A `played` item may be started again (`played → playing`).

use serde::{Deserialize, Serialize};

/// Lifecycle status of one requested track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Downloading,
    Ready,
    Playing,
    Played,
    Error,
}

impl ItemStatus {
    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Downloading, Ready)
                | (Downloading, Error)
                | (Ready, Playing)
                | (Playing, Played)
                | (Played, Playing)
        )
    }

    /// Item has a local file and can be handed to the player.
    pub fn is_playable(self) -> bool {
        matches!(self, ItemStatus::Ready | ItemStatus::Playing | ItemStatus::Played)
    }

    /// Item is still waiting on the fetch pipeline.
    pub fn is_in_flight(self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Downloading)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Downloading => "downloading",
            ItemStatus::Ready => "ready",
            ItemStatus::Playing => "playing",
            ItemStatus::Played => "played",
            ItemStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ItemStatus::*;

    const ALL: [ItemStatus; 6] = [Pending, Downloading, Ready, Playing, Played, Error];

    #[test]
    fn test_fetch_transitions() {
        assert!(Pending.can_transition_to(Downloading));
        assert!(Downloading.can_transition_to(Ready));
        assert!(Downloading.can_transition_to(Error));

        assert!(!Pending.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Downloading));
    }

    #[test]
    fn test_playback_transitions() {
        assert!(Ready.can_transition_to(Playing));
        assert!(Playing.can_transition_to(Played));
        assert!(Played.can_transition_to(Playing));

        assert!(!Pending.can_transition_to(Playing));
        assert!(!Played.can_transition_to(Ready));
    }

    #[test]
    fn test_error_is_terminal() {
        for next in ALL {
            assert!(!Error.can_transition_to(next), "error -> {} must be rejected", next);
        }
    }

    #[test]
    fn test_serialized_form_is_lowercase() {
        assert_eq!(serde_json::to_string(&Downloading).unwrap(), "\"downloading\"");
        let parsed: ItemStatus = serde_json::from_str("\"played\"").unwrap();
        assert_eq!(parsed, Played);
        assert_eq!(Ready.to_string(), "ready");
    }
}
