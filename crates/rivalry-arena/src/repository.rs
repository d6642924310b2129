//! Match persistence.
//!
//! Like the wallet store, match rows carry a `version` and
//! [`MatchRepository::update`] is a compare-and-swap on it. Room codes are
//! unique across all matches.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use rivalry_types::{GeoPoint, Match, MatchId, MatchStatus, Result, RivalryError, RoomCode, UserId};

use crate::geo;

/// Row selection for [`MatchRepository::find`].
#[derive(Debug, Clone, PartialEq)]
pub enum MatchFilter {
    All,
    /// OPEN, published matches, optionally near a point and/or featured.
    Discoverable {
        near: Option<GeoPoint>,
        radius_km: f64,
        featured_only: bool,
    },
    JoinedBy(UserId),
    CreatedBy(UserId),
    /// Resolved mediator id or declared mediator email (case-insensitive).
    MediatedBy { user_id: UserId, email: String },
}

impl MatchFilter {
    #[must_use]
    pub fn matches(&self, m: &Match) -> bool {
        match self {
            Self::All => true,
            Self::Discoverable {
                near,
                radius_km,
                featured_only,
            } => {
                let in_range = match near {
                    None => true,
                    Some(centre) => m
                        .location
                        .is_some_and(|loc| geo::within_km(*centre, loc, *radius_km)),
                };
                m.status == MatchStatus::Open
                    && m.is_published
                    && in_range
                    && (!featured_only || m.promotion.is_featured())
            }
            Self::JoinedBy(user_id) => m.has_participant(*user_id),
            Self::CreatedBy(user_id) => m.created_by == *user_id,
            Self::MediatedBy { user_id, email } => {
                m.mediator_user_id == Some(*user_id)
                    || m
                        .mediator_email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(email))
            }
        }
    }
}

pub trait MatchRepository: Send + Sync {
    /// Store a new match at version 1.
    ///
    /// # Errors
    /// `DuplicateRoomCode` if the room code is taken.
    fn insert(&self, m: Match) -> Result<Match>;

    fn get(&self, id: MatchId) -> Result<Option<Match>>;

    fn by_room(&self, room_id: &RoomCode) -> Result<Option<Match>>;

    /// Replace a row if it is still at `m.version`; returns it with the
    /// version bumped.
    ///
    /// # Errors
    /// `MatchNotFound`, `VersionConflict` or `DuplicateRoomCode`.
    fn update(&self, m: Match) -> Result<Match>;

    /// Remove a row if it is still at `expected_version`.
    fn delete(&self, id: MatchId, expected_version: u64) -> Result<()>;

    /// Rows matching `filter`, newest first.
    fn find(&self, filter: &MatchFilter) -> Result<Vec<Match>>;
}

#[derive(Debug, Default)]
struct Tables {
    matches: HashMap<MatchId, Match>,
    by_room: HashMap<RoomCode, MatchId>,
}

/// In-memory [`MatchRepository`].
#[derive(Debug, Default)]
pub struct MemoryMatchStore {
    tables: RwLock<Tables>,
}

impl MemoryMatchStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| RivalryError::Storage("match tables lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| RivalryError::Storage("match tables lock poisoned".into()))
    }
}

impl MatchRepository for MemoryMatchStore {
    fn insert(&self, mut m: Match) -> Result<Match> {
        let mut t = self.write()?;
        if t.by_room.contains_key(&m.room_id) {
            return Err(RivalryError::DuplicateRoomCode(m.room_id));
        }
        m.version = 1;
        t.by_room.insert(m.room_id.clone(), m.id);
        t.matches.insert(m.id, m.clone());
        Ok(m)
    }

    fn get(&self, id: MatchId) -> Result<Option<Match>> {
        Ok(self.read()?.matches.get(&id).cloned())
    }

    fn by_room(&self, room_id: &RoomCode) -> Result<Option<Match>> {
        let t = self.read()?;
        Ok(t.by_room.get(room_id).and_then(|id| t.matches.get(id)).cloned())
    }

    fn update(&self, mut m: Match) -> Result<Match> {
        let mut t = self.write()?;
        let stored = t.matches.get(&m.id).ok_or(RivalryError::MatchNotFound(m.id))?;
        if stored.version != m.version {
            return Err(RivalryError::VersionConflict {
                entity: m.id.to_string(),
            });
        }
        let old_room = stored.room_id.clone();
        if old_room != m.room_id {
            if t.by_room.contains_key(&m.room_id) {
                return Err(RivalryError::DuplicateRoomCode(m.room_id));
            }
            t.by_room.remove(&old_room);
            t.by_room.insert(m.room_id.clone(), m.id);
        }
        m.version += 1;
        m.updated_at = Utc::now();
        t.matches.insert(m.id, m.clone());
        Ok(m)
    }

    fn delete(&self, id: MatchId, expected_version: u64) -> Result<()> {
        let mut t = self.write()?;
        let stored = t.matches.get(&id).ok_or(RivalryError::MatchNotFound(id))?;
        if stored.version != expected_version {
            return Err(RivalryError::VersionConflict {
                entity: id.to_string(),
            });
        }
        let room = stored.room_id.clone();
        t.by_room.remove(&room);
        t.matches.remove(&id);
        Ok(())
    }

    fn find(&self, filter: &MatchFilter) -> Result<Vec<Match>> {
        let t = self.read()?;
        let mut rows: Vec<Match> = t.matches.values().filter(|m| filter.matches(m)).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use rivalry_types::{Promotion, Role};
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn room_codes_are_unique() {
        let store = MemoryMatchStore::new();
        let a = Match::dummy(UserId::new(), 2, Decimal::ZERO);
        let mut b = Match::dummy(UserId::new(), 2, Decimal::ZERO);
        b.room_id = a.room_id.clone();
        store.insert(a).unwrap();
        assert!(matches!(
            store.insert(b).unwrap_err(),
            RivalryError::DuplicateRoomCode(_)
        ));
    }

    #[test]
    fn update_is_compare_and_swap() {
        let store = MemoryMatchStore::new();
        let m = store.insert(Match::dummy(UserId::new(), 2, Decimal::ZERO)).unwrap();

        let mut first = m.clone();
        first.title = "First".into();
        let saved = store.update(first).unwrap();
        assert_eq!(saved.version, 2);

        let mut stale = m;
        stale.title = "Stale".into();
        assert!(matches!(
            store.update(stale).unwrap_err(),
            RivalryError::VersionConflict { .. }
        ));
        assert_eq!(store.get(saved.id).unwrap().unwrap().title, "First");
    }

    #[test]
    fn renaming_room_moves_index() {
        let store = MemoryMatchStore::new();
        let m = store.insert(Match::dummy(UserId::new(), 2, Decimal::ZERO)).unwrap();
        let old = m.room_id.clone();
        let mut renamed = m;
        renamed.room_id = RoomCode::parse("NEWROOM").unwrap();
        store.update(renamed).unwrap();
        assert!(store.by_room(&old).unwrap().is_none());
        assert!(store.by_room(&RoomCode::parse("newroom").unwrap()).unwrap().is_some());
    }

    #[test]
    fn discoverable_filter() {
        let near = GeoPoint::new(12.9716, 77.5946).unwrap();
        let mut open = Match::dummy(UserId::new(), 2, Decimal::ZERO);
        open.location = Some(GeoPoint::new(13.0, 77.6).unwrap());
        let filter = MatchFilter::Discoverable {
            near: Some(near),
            radius_km: 50.0,
            featured_only: false,
        };
        assert!(filter.matches(&open));

        let mut far = open.clone();
        far.location = Some(GeoPoint::new(28.6, 77.2).unwrap());
        assert!(!filter.matches(&far));

        let mut unplaced = open.clone();
        unplaced.location = None;
        assert!(!filter.matches(&unplaced));

        let mut draft = open.clone();
        draft.is_published = false;
        assert!(!filter.matches(&draft));

        let featured = MatchFilter::Discoverable {
            near: None,
            radius_km: 50.0,
            featured_only: true,
        };
        assert!(!featured.matches(&open));
        open.promotion = Promotion::Premium;
        assert!(featured.matches(&open));
    }

    #[test]
    fn mediated_by_email_or_id() {
        let mut m = Match::dummy(UserId::new(), 2, Decimal::ZERO);
        m.mediator_email = Some("Ref@Example.com".into());
        let caller = rivalry_types::Caller::new(UserId::new(), "ref@example.com", Role::User);
        let filter = MatchFilter::MediatedBy {
            user_id: caller.user_id,
            email: caller.email.clone(),
        };
        assert!(filter.matches(&m));
    }

    #[test]
    fn delete_checks_version() {
        let store = MemoryMatchStore::new();
        let m = store.insert(Match::dummy(UserId::new(), 2, Decimal::ZERO)).unwrap();
        assert!(store.delete(m.id, 0).is_err());
        store.delete(m.id, m.version).unwrap();
        assert!(store.get(m.id).unwrap().is_none());
        assert!(store.by_room(&m.room_id).unwrap().is_none());
    }
}
