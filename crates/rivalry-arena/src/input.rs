//! Typed request bodies for the match engine.
//!
//! Each operation takes one explicit struct instead of a loose map; unknown
//! keys are rejected at deserialization time.

use rivalry_types::{
    constants, GameType, GeoPoint, Match, MatchId, MatchStatus, Promotion, Restrictions, Result,
    RivalryError, RoomCode, UserId,
};
use rust_decimal::Decimal;
use serde::Deserialize;

// =============================================================================
// Creation
// =============================================================================

/// Input for creating a match or featured event.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMatch {
    pub title: String,
    #[serde(default)]
    pub banner_url: Option<String>,
    pub game_type: GameType,
    #[serde(default)]
    pub mode: Option<String>,
    /// Defaults by game type when absent.
    #[serde(default)]
    pub max_players: Option<u32>,
    pub map: String,
    /// Caller-chosen room code; generated when absent.
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub room_password: Option<String>,
    #[serde(default)]
    pub entry_fee: Decimal,
    #[serde(default)]
    pub prize_pool: Decimal,
    pub match_date: String,
    pub match_time: String,
    #[serde(default)]
    pub mediator_email: Option<String>,
    #[serde(default)]
    pub restrictions: Option<Restrictions>,
    #[serde(default)]
    pub additional_rules: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    /// Defaults to published.
    #[serde(default)]
    pub is_published: Option<bool>,
}

impl CreateMatch {
    /// # Errors
    /// `Validation` for a blank title or map, a negative fee or prize, zero
    /// capacity, a malformed room code or out-of-range coordinates.
    pub fn validate(&self) -> Result<Option<RoomCode>> {
        if self.title.trim().is_empty() {
            return Err(RivalryError::validation("Title is required"));
        }
        if self.map.trim().is_empty() {
            return Err(RivalryError::validation("Map is required"));
        }
        validate_money(self.entry_fee, self.prize_pool)?;
        if self.max_players == Some(0) {
            return Err(RivalryError::validation("max_players must be at least 1"));
        }
        if let Some(loc) = self.location {
            GeoPoint::new(loc.latitude, loc.longitude)?;
        }
        self.room_id.as_deref().map(RoomCode::parse).transpose()
    }

    /// Build the stored row. `room_id` must already be decided.
    pub(crate) fn into_match(
        self,
        created_by: UserId,
        room_id: RoomCode,
        max_players: u32,
        mediator_user_id: Option<UserId>,
        promotion: Promotion,
    ) -> Match {
        let now = chrono::Utc::now();
        Match {
            id: MatchId::new(),
            room_id,
            room_password: self.room_password,
            created_by,
            title: self.title.trim().to_string(),
            banner_url: self.banner_url,
            game_type: self.game_type,
            mode: self.mode,
            map: self.map,
            max_players,
            entry_fee: self.entry_fee,
            prize_pool: self.prize_pool,
            match_date: self.match_date,
            match_time: self.match_time,
            mediator_email: self.mediator_email.map(|e| e.trim().to_lowercase()),
            mediator_user_id,
            participants: Vec::new(),
            status: MatchStatus::Open,
            is_published: self.is_published.unwrap_or(true),
            location: self.location,
            restrictions: self.restrictions.unwrap_or_default(),
            additional_rules: self.additional_rules,
            promotion,
            results: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

fn validate_money(entry_fee: Decimal, prize_pool: Decimal) -> Result<()> {
    if entry_fee < Decimal::ZERO {
        return Err(RivalryError::validation("Entry fee cannot be negative"));
    }
    if prize_pool < Decimal::ZERO {
        return Err(RivalryError::validation("Prize pool cannot be negative"));
    }
    Ok(())
}

// =============================================================================
// Editing
// =============================================================================

/// A partial edit. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateMatch {
    pub title: Option<String>,
    pub banner_url: Option<String>,
    pub mode: Option<String>,
    pub max_players: Option<u32>,
    pub map: Option<String>,
    pub room_id: Option<String>,
    pub room_password: Option<String>,
    pub entry_fee: Option<Decimal>,
    pub prize_pool: Option<Decimal>,
    pub match_date: Option<String>,
    pub match_time: Option<String>,
    pub mediator_email: Option<String>,
    pub restrictions: Option<Restrictions>,
    pub additional_rules: Option<String>,
    pub location: Option<GeoPoint>,
    pub is_published: Option<bool>,
    /// Permit editing an already published match.
    pub force: bool,
}

impl UpdateMatch {
    /// Apply the edit to `m`.
    ///
    /// Returns whether the mediator email changed, so the caller can
    /// re-resolve it.
    ///
    /// # Errors
    /// `Validation` for the same reasons as [`CreateMatch::validate`], or a
    /// capacity below the current participant count.
    pub fn apply_to(&self, m: &mut Match) -> Result<bool> {
        validate_money(
            self.entry_fee.unwrap_or(m.entry_fee),
            self.prize_pool.unwrap_or(m.prize_pool),
        )?;
        if let Some(max) = self.max_players {
            if max == 0 || (max as usize) < m.participants.len() {
                return Err(RivalryError::validation(format!(
                    "max_players must be at least {}",
                    m.participants.len().max(1)
                )));
            }
            m.max_players = max;
        }
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(RivalryError::validation("Title is required"));
            }
            m.title = title.trim().to_string();
        }
        if let Some(map) = &self.map {
            if map.trim().is_empty() {
                return Err(RivalryError::validation("Map is required"));
            }
            m.map.clone_from(map);
        }
        if let Some(loc) = self.location {
            m.location = Some(GeoPoint::new(loc.latitude, loc.longitude)?);
        }
        if let Some(raw) = &self.room_id {
            m.room_id = RoomCode::parse(raw)?;
        }
        set(&mut m.banner_url, &self.banner_url);
        set(&mut m.mode, &self.mode);
        set(&mut m.room_password, &self.room_password);
        set(&mut m.additional_rules, &self.additional_rules);
        if let Some(fee) = self.entry_fee {
            m.entry_fee = fee;
        }
        if let Some(prize) = self.prize_pool {
            m.prize_pool = prize;
        }
        if let Some(date) = &self.match_date {
            m.match_date.clone_from(date);
        }
        if let Some(time) = &self.match_time {
            m.match_time.clone_from(time);
        }
        if let Some(r) = self.restrictions {
            m.restrictions = r;
        }
        if let Some(published) = self.is_published {
            m.is_published = published;
        }
        let mediator_changed = match &self.mediator_email {
            Some(email) => {
                let email = email.trim().to_lowercase();
                let changed = m.mediator_email.as_deref() != Some(email.as_str());
                m.mediator_email = Some(email);
                changed
            }
            None => false,
        };
        Ok(mediator_changed)
    }
}

fn set(slot: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

// =============================================================================
// Results and discovery
// =============================================================================

/// The creator's reported outcome.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResultSubmission {
    pub kills: Option<u32>,
    pub damage: Option<u32>,
    pub screenshot_urls: Vec<String>,
}

/// Filters for the discovery listing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryQuery {
    /// Restrict to matches within the configured radius of this point.
    pub near: Option<GeoPoint>,
    /// Only sponsored or premium matches.
    pub featured: bool,
}

/// A freshly generated room code.
pub(crate) fn random_room_code() -> Result<RoomCode> {
    use rand::Rng;
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let code: String = (0..constants::ROOM_CODE_LEN)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect();
    RoomCode::parse(&code)
}
