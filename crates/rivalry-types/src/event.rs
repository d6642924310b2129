//! Live-update events broadcast on a per-match channel.

use serde::{Deserialize, Serialize};

use crate::{MatchId, MatchStatus};

/// An event pushed to everyone watching a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchEvent {
    /// Someone joined; `count` is the new participant count.
    ParticipantUpdate { match_id: MatchId, count: usize },
    StatusUpdate { match_id: MatchId, status: MatchStatus },
}

impl MatchEvent {
    #[must_use]
    pub fn match_id(&self) -> MatchId {
        match self {
            Self::ParticipantUpdate { match_id, .. } | Self::StatusUpdate { match_id, .. } => {
                *match_id
            }
        }
    }
}
