//! Match model and status state machine.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐ start time passed ┌─────────┐ creator submits ┌─────────────────────────┐ mediator approves ┌───────────┐
//!   │ OPEN ├──────────────────▶│ ONGOING ├────────────────▶│ PENDING_MEDIATOR_REVIEW ├──────────────────▶│ COMPLETED │
//!   └──────┘                   └─────────┘                 └─────────────────────────┘                   └───────────┘
//! ```
//!
//! Transitions are **monotonic**: status never moves backwards. A result
//! submitted before the start time was observed skips ONGOING.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Caller, MatchId, RivalryError, Result, RoomCode, UserId};

/// Game format. Determines the default capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    /// Clash squad: small fixed teams.
    #[serde(rename = "CS")]
    Cs,
    /// Battle royale.
    #[serde(rename = "BR")]
    Br,
}

/// Lifecycle status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Open,
    Ongoing,
    PendingMediatorReview,
    Completed,
}

impl MatchStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Ongoing => 1,
            Self::PendingMediatorReview => 2,
            Self::Completed => 3,
        }
    }

    /// Whether moving to `target` goes strictly forward.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        target.rank() > self.rank()
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Ongoing => write!(f, "ONGOING"),
            Self::PendingMediatorReview => write!(f, "PENDING_MEDIATOR_REVIEW"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// A user who joined a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub team_no: Option<u32>,
    pub joined_at: DateTime<Utc>,
}

/// The creator's submitted outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub submitted_by: UserId,
    pub kills: Option<u32>,
    pub damage: Option<u32>,
    pub screenshot_urls: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

/// WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// # Errors
    /// Returns `Validation` for out-of-range or non-finite coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(RivalryError::validation(format!("Invalid latitude {latitude}")));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(RivalryError::validation(format!("Invalid longitude {longitude}")));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// House rules shown to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Restrictions {
    pub no_grenades: bool,
    pub sniper_only: bool,
    pub no_vehicles: bool,
    pub skills_off: bool,
    pub disqualified_on_hack: bool,
    pub non_refundable: bool,
}

impl Default for Restrictions {
    fn default() -> Self {
        Self {
            no_grenades: true,
            sniper_only: false,
            no_vehicles: true,
            skills_off: false,
            disqualified_on_hack: true,
            non_refundable: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorDetails {
    pub sponsor_name: Option<String>,
    pub sponsor_logo: Option<String>,
    pub sponsor_website: Option<String>,
    pub sponsor_description: Option<String>,
}

/// How a match is promoted. Sponsored and premium matches are "featured".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Promotion {
    #[default]
    Standard,
    Sponsored(SponsorDetails),
    Premium,
}

impl Promotion {
    #[must_use]
    pub fn is_featured(&self) -> bool {
        !matches!(self, Self::Standard)
    }
}

/// A joinable tournament instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub room_id: RoomCode,
    pub room_password: Option<String>,
    pub created_by: UserId,
    pub title: String,
    pub banner_url: Option<String>,
    pub game_type: GameType,
    pub mode: Option<String>,
    pub map: String,
    pub max_players: u32,
    pub entry_fee: Decimal,
    pub prize_pool: Decimal,
    /// Display date, e.g. `"17 Jan 2026"`.
    pub match_date: String,
    /// Display time, e.g. `"14:30"`.
    pub match_time: String,
    pub mediator_email: Option<String>,
    pub mediator_user_id: Option<UserId>,
    pub participants: Vec<Participant>,
    pub status: MatchStatus,
    pub is_published: bool,
    pub location: Option<GeoPoint>,
    pub restrictions: Restrictions,
    pub additional_rules: Option<String>,
    pub promotion: Promotion,
    pub results: Option<MatchResult>,
    /// Bumped by the store on every successful write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_players as usize
    }

    #[must_use]
    pub fn has_participant(&self, user_id: UserId) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    #[must_use]
    pub fn is_creator(&self, user_id: UserId) -> bool {
        self.created_by == user_id
    }

    /// The resolved mediator, or a caller whose email matches the declared one.
    #[must_use]
    pub fn is_mediator(&self, caller: &Caller) -> bool {
        self.mediator_user_id == Some(caller.user_id)
            || self
                .mediator_email
                .as_deref()
                .is_some_and(|email| email.eq_ignore_ascii_case(&caller.email))
    }

    /// Whether a new participant could be admitted right now.
    ///
    /// # Errors
    /// - `InvalidState` if unpublished or not OPEN
    /// - `MatchFull` at capacity
    /// - `AlreadyJoined` for a repeat join
    pub fn check_joinable(&self, user_id: UserId) -> Result<()> {
        if !self.is_published {
            return Err(RivalryError::invalid_state("Match is not published"));
        }
        if self.status != MatchStatus::Open {
            return Err(RivalryError::invalid_state(format!(
                "Match is {}, not OPEN",
                self.status
            )));
        }
        if self.is_full() {
            return Err(RivalryError::MatchFull {
                max_players: self.max_players,
            });
        }
        if self.has_participant(user_id) {
            return Err(RivalryError::AlreadyJoined(user_id));
        }
        Ok(())
    }

    /// Append a participant after re-checking every join invariant.
    ///
    /// # Errors
    /// Same as [`Match::check_joinable`].
    pub fn add_participant(&mut self, user_id: UserId, team_no: Option<u32>) -> Result<()> {
        self.check_joinable(user_id)?;
        self.participants.push(Participant {
            user_id,
            team_no,
            joined_at: Utc::now(),
        });
        Ok(())
    }

    /// Move the status forward.
    ///
    /// # Errors
    /// Returns `IllegalTransition` for anything but a forward move.
    pub fn advance_to(&mut self, target: MatchStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(RivalryError::IllegalTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Match {
    /// A published OPEN CS match starting far in the future.
    #[must_use]
    pub fn dummy(created_by: UserId, max_players: u32, entry_fee: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: MatchId::new(),
            room_id: RoomCode::parse(&format!("R{}", &MatchId::new().0.simple().to_string()[24..]))
                .unwrap_or_else(|_| unreachable!("hex suffix is alphanumeric")),
            room_password: None,
            created_by,
            title: "Dummy Cup".to_string(),
            banner_url: None,
            game_type: GameType::Cs,
            mode: Some("1v1".to_string()),
            map: "Bermuda".to_string(),
            max_players,
            entry_fee,
            prize_pool: entry_fee * Decimal::from(max_players),
            match_date: "01 Jan 2099".to_string(),
            match_time: "12:00".to_string(),
            mediator_email: None,
            mediator_user_id: None,
            participants: Vec::new(),
            status: MatchStatus::Open,
            is_published: true,
            location: None,
            restrictions: Restrictions::default(),
            additional_rules: None,
            promotion: Promotion::Standard,
            results: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
