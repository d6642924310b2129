//! Match lifecycle engine.
//!
//! Orchestrates every cross-entity transition between the match store and
//! the wallet ledger:
//!
//! ```text
//!   join ─────► lock_funds ──► add participant ──► CAS update
//!                  ▲                                  │ conflict: re-read, re-check
//!                  └──── unlock_funds ◄── any failure ┘
//!
//!   approve ──► CAS status=COMPLETED ──► award_prize ──► deduct_entry_fee (each participant)
//!                       ▲                    │ failure
//!                       └── restore snapshot ┘
//! ```
//!
//! There is no scheduler. Every read path calls
//! [`MatchEngine::check_match_status`], which moves an OPEN match to ONGOING
//! once its start time has passed, so status may read OPEN until the next
//! access after the deadline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rivalry_ledger::Ledger;
use rivalry_types::constants::ROOM_CODE_ATTEMPTS;
use rivalry_types::{
    ArenaConfig, Audience, Caller, Email, Match, MatchEvent, MatchId, MatchResult, MatchStatus,
    Notification, Promotion, Result, RivalryError, RoomCode, UserId,
};
use rust_decimal::Decimal;

use crate::hooks::Hooks;
use crate::input::{random_room_code, CreateMatch, DiscoveryQuery, ResultSubmission, UpdateMatch};
use crate::repository::{MatchFilter, MatchRepository};
use crate::schedule;

/// Who is allowed through an edit or delete.
#[derive(Clone, Copy)]
enum Actor<'a> {
    /// The creator; published matches need `force`.
    Creator(&'a Caller, bool),
    /// An admin; published matches are never editable.
    Admin,
}

pub struct MatchEngine {
    store: Arc<dyn MatchRepository>,
    ledger: Arc<Ledger>,
    config: ArenaConfig,
    hooks: Hooks,
}

impl std::fmt::Debug for MatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MatchEngine {
    pub fn new(
        store: Arc<dyn MatchRepository>,
        ledger: Arc<Ledger>,
        config: ArenaConfig,
        hooks: Hooks,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
            hooks,
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    // =================================================================
    // Creation
    // =================================================================

    /// Create a standard match owned by the caller.
    ///
    /// # Errors
    /// - `Validation` for malformed input
    /// - `DuplicateRoomCode` if a supplied room code is taken
    pub fn create_match(&self, caller: &Caller, input: CreateMatch) -> Result<Match> {
        self.create(caller, input, Promotion::Standard)
    }

    /// Create a sponsored or premium event. Admin only.
    ///
    /// # Errors
    /// `Unauthorized` for non-admins, `Validation` for a standard promotion,
    /// otherwise as [`MatchEngine::create_match`].
    pub fn create_featured_event(
        &self,
        caller: &Caller,
        input: CreateMatch,
        promotion: Promotion,
    ) -> Result<Match> {
        caller.require_admin()?;
        if !promotion.is_featured() {
            return Err(RivalryError::validation(
                "Featured events must be sponsored or premium",
            ));
        }
        self.create(caller, input, promotion)
    }

    fn create(&self, caller: &Caller, input: CreateMatch, promotion: Promotion) -> Result<Match> {
        let supplied = input.validate()?;
        let max_players = input
            .max_players
            .unwrap_or_else(|| self.config.default_max_players(input.game_type));
        let mediator_user_id = input
            .mediator_email
            .as_deref()
            .and_then(|email| self.resolve_mediator(email));

        let generated = supplied.is_none();
        let room_id = match supplied {
            Some(code) => code,
            None => random_room_code()?,
        };
        let mut draft = input.into_match(caller.user_id, room_id, max_players, mediator_user_id, promotion);

        let mut created = None;
        for _ in 0..ROOM_CODE_ATTEMPTS {
            match self.store.insert(draft.clone()) {
                Ok(m) => {
                    created = Some(m);
                    break;
                }
                Err(RivalryError::DuplicateRoomCode(code)) if generated => {
                    tracing::debug!(room = %code, "Generated room code taken; drawing another");
                    draft.room_id = random_room_code()?;
                }
                Err(e) => return Err(e),
            }
        }
        let m = created.ok_or_else(|| {
            RivalryError::Internal(format!("no free room code after {ROOM_CODE_ATTEMPTS} attempts"))
        })?;

        tracing::info!(
            match_id = %m.id,
            room = %m.room_id,
            creator = %caller.user_id,
            max_players = m.max_players,
            entry_fee = %m.entry_fee,
            published = m.is_published,
            featured = m.promotion.is_featured(),
            "Match created"
        );
        if m.is_published {
            self.announce(&m);
        }
        Ok(m)
    }

    // =================================================================
    // Editing and deletion
    // =================================================================

    /// Edit a match as its creator. Published matches need `edit.force`.
    ///
    /// # Errors
    /// - `MatchNotFound`
    /// - `Unauthorized` unless the caller created the match
    /// - `InvalidState` for a published match without `force`, a match
    ///   whose result is submitted, or an edit that would strand
    ///   participants' locked fees
    /// - `Validation` for malformed fields
    pub fn update_match(&self, caller: &Caller, match_id: MatchId, edit: &UpdateMatch) -> Result<Match> {
        self.edit(match_id, edit, Actor::Creator(caller, edit.force))
    }

    /// Edit an unpublished match as an admin.
    ///
    /// # Errors
    /// `Unauthorized` for non-admins, `InvalidState` once published.
    pub fn admin_update_match(&self, caller: &Caller, match_id: MatchId, edit: &UpdateMatch) -> Result<Match> {
        caller.require_admin()?;
        self.edit(match_id, edit, Actor::Admin)
    }

    fn edit(&self, match_id: MatchId, edit: &UpdateMatch, actor: Actor<'_>) -> Result<Match> {
        let resolved = edit
            .mediator_email
            .as_deref()
            .and_then(|email| self.resolve_mediator(email));

        let mut was_published = false;
        let saved = self.mutate(match_id, |m| {
            authorize_change(m, actor, "edit")?;
            if matches!(m.status, MatchStatus::PendingMediatorReview | MatchStatus::Completed) {
                return Err(RivalryError::invalid_state(format!(
                    "Cannot edit a match that is {}",
                    m.status
                )));
            }
            was_published = m.is_published;
            let fee = m.entry_fee;
            if edit.apply_to(m)? {
                m.mediator_user_id = resolved;
            }
            if !m.participants.is_empty() {
                if m.entry_fee != fee {
                    return Err(RivalryError::invalid_state(
                        "Cannot change the entry fee after players have joined",
                    ));
                }
                if was_published && !m.is_published {
                    return Err(RivalryError::invalid_state(
                        "Cannot unpublish a match that players have joined",
                    ));
                }
            }
            Ok(())
        })?;

        tracing::info!(match_id = %saved.id, version = saved.version, "Match updated");
        if !was_published && saved.is_published {
            self.announce(&saved);
        }
        Ok(saved)
    }

    /// Delete a match as its creator. Deleting a published match needs
    /// `force` and returns every participant's locked entry fee.
    ///
    /// # Errors
    /// `MatchNotFound`, `Unauthorized`, or `InvalidState` for a published
    /// match without `force`.
    pub fn delete_match(&self, caller: &Caller, match_id: MatchId, force: bool) -> Result<()> {
        self.remove(match_id, Actor::Creator(caller, force))
    }

    /// Delete an unpublished match as an admin.
    ///
    /// # Errors
    /// `Unauthorized` for non-admins, `InvalidState` once published.
    pub fn admin_delete_match(&self, caller: &Caller, match_id: MatchId) -> Result<()> {
        caller.require_admin()?;
        self.remove(match_id, Actor::Admin)
    }

    fn remove(&self, match_id: MatchId, actor: Actor<'_>) -> Result<()> {
        let attempts = self.config.max_write_retries;
        for attempt in 1..=attempts {
            let m = self.load(match_id)?;
            authorize_change(&m, actor, "delete")?;
            match self.store.delete(match_id, m.version) {
                Ok(()) => {
                    tracing::info!(%match_id, participants = m.participants.len(), "Match deleted");
                    if m.status != MatchStatus::Completed {
                        for p in &m.participants {
                            self.release(p.user_id, m.entry_fee, match_id, "Match deleted");
                        }
                    }
                    return Ok(());
                }
                Err(RivalryError::VersionConflict { .. }) => {
                    tracing::debug!(%match_id, attempt, "Match changed during delete; retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(contention(match_id, attempts))
    }

    // =================================================================
    // Joining
    // =================================================================

    /// Join a match by room code, reserving its entry fee.
    ///
    /// Funds are locked before the participant is written. If the write
    /// cannot complete, the reservation is returned with `unlock_funds`.
    ///
    /// # Errors
    /// - `Validation` for a malformed room code
    /// - `RoomNotFound`
    /// - `InvalidState` if unpublished or not OPEN
    /// - `MatchFull`, `AlreadyJoined`
    /// - `WalletNotFound`, `InsufficientFunds` from the ledger
    pub fn join_match(&self, caller: &Caller, room: &str, team_no: Option<u32>) -> Result<Match> {
        let code = RoomCode::parse(room)?;
        let user_id = caller.user_id;
        let attempts = self.config.max_write_retries;

        let mut reserved: Option<(MatchId, Decimal)> = None;
        let mut outcome = None;
        for attempt in 1..=attempts {
            match self.try_join(&code, user_id, team_no, &mut reserved) {
                Err(RivalryError::VersionConflict { .. }) => {
                    tracing::debug!(room = %code, user = %user_id, attempt, "Match changed during join; retrying");
                }
                other => {
                    outcome = Some(other);
                    break;
                }
            }
        }
        let outcome = outcome.unwrap_or_else(|| {
            Err(RivalryError::Contention {
                entity: format!("room {code}"),
                attempts,
            })
        });

        match outcome {
            Ok(m) => {
                tracing::info!(
                    match_id = %m.id,
                    user = %user_id,
                    participants = m.participants.len(),
                    max_players = m.max_players,
                    "Player joined match"
                );
                self.hooks.events.publish(&MatchEvent::ParticipantUpdate {
                    match_id: m.id,
                    count: m.participants.len(),
                });
                Ok(m)
            }
            Err(e) => {
                if let Some((match_id, fee)) = reserved {
                    self.release(user_id, fee, match_id, "Join failed");
                }
                Err(e)
            }
        }
    }

    fn try_join(
        &self,
        code: &RoomCode,
        user_id: UserId,
        team_no: Option<u32>,
        reserved: &mut Option<(MatchId, Decimal)>,
    ) -> Result<Match> {
        let m = self
            .store
            .by_room(code)?
            .ok_or_else(|| RivalryError::RoomNotFound(code.clone()))?;
        let mut m = self.refresh(m, Utc::now())?;
        m.check_joinable(user_id)?;

        // The fee or the match behind the code can change between attempts.
        if *reserved != Some((m.id, m.entry_fee)) {
            if let Some((old_match, old_fee)) = reserved.take() {
                self.release(user_id, old_fee, old_match, "Entry fee changed during join");
            }
            self.ledger.lock_funds(user_id, m.entry_fee, Some(m.id))?;
            *reserved = Some((m.id, m.entry_fee));
        }

        m.add_participant(user_id, team_no)?;
        self.store.update(m)
    }

    // =================================================================
    // Status
    // =================================================================

    /// Move an OPEN match to ONGOING if its start time has passed.
    ///
    /// # Errors
    /// Storage failures, or `Contention` if the row keeps changing.
    pub fn check_match_status(&self, m: Match) -> Result<Match> {
        self.refresh(m, Utc::now())
    }

    fn refresh(&self, mut m: Match, now: DateTime<Utc>) -> Result<Match> {
        let attempts = self.config.max_write_retries;
        for _ in 0..attempts {
            if m.status != MatchStatus::Open
                || !schedule::has_started(
                    &m.match_date,
                    &m.match_time,
                    self.config.schedule_utc_offset_minutes,
                    now,
                )
            {
                return Ok(m);
            }
            let mut next = m.clone();
            next.advance_to(MatchStatus::Ongoing)?;
            match self.store.update(next) {
                Ok(saved) => {
                    tracing::info!(match_id = %saved.id, "Start time passed; match is ONGOING");
                    self.publish_status(&saved);
                    return Ok(saved);
                }
                Err(RivalryError::VersionConflict { .. }) => m = self.load(m.id)?,
                Err(e) => return Err(e),
            }
        }
        Err(contention(m.id, attempts))
    }

    // =================================================================
    // Results
    // =================================================================

    /// Record the creator's result and hand the match to the mediator.
    /// A second submission before approval replaces the first.
    ///
    /// # Errors
    /// - `MatchNotFound`
    /// - `Unauthorized` unless the caller created the match
    /// - `InvalidState` once COMPLETED
    pub fn submit_result(&self, caller: &Caller, match_id: MatchId, result: ResultSubmission) -> Result<Match> {
        let saved = self.mutate(match_id, |m| {
            if !m.is_creator(caller.user_id) {
                return Err(RivalryError::unauthorized("Only the creator can submit results"));
            }
            if m.status != MatchStatus::PendingMediatorReview {
                m.advance_to(MatchStatus::PendingMediatorReview).map_err(|_| {
                    RivalryError::invalid_state(format!("Cannot submit results for a {} match", m.status))
                })?;
            }
            m.results = Some(MatchResult {
                submitted_by: caller.user_id,
                kills: result.kills,
                damage: result.damage,
                screenshot_urls: result.screenshot_urls.clone(),
                submitted_at: Utc::now(),
            });
            Ok(())
        })?;

        tracing::info!(
            match_id = %saved.id,
            submitted_by = %caller.user_id,
            screenshots = result.screenshot_urls.len(),
            "Result submitted for mediator review"
        );
        self.publish_status(&saved);
        Ok(saved)
    }

    /// Approve a pending result: complete the match, pay the prize pool to
    /// the submitter and consume every participant's locked entry fee.
    ///
    /// If the prize cannot be credited the match is put back as it was.
    ///
    /// # Errors
    /// - `MatchNotFound`
    /// - `Unauthorized` unless the caller is the mediator or an admin
    /// - `InvalidState` unless the match is PENDING_MEDIATOR_REVIEW
    /// - ledger errors from the prize credit
    pub fn approve_result(&self, caller: &Caller, match_id: MatchId) -> Result<Match> {
        let mut snapshot = None;
        let completed = self.mutate(match_id, |m| {
            if !m.is_mediator(caller) && !caller.is_admin() {
                return Err(RivalryError::unauthorized("Only the mediator can approve results"));
            }
            if m.status != MatchStatus::PendingMediatorReview {
                return Err(RivalryError::invalid_state(format!(
                    "Match is {}, not pending review",
                    m.status
                )));
            }
            if m.results.is_none() {
                return Err(RivalryError::Internal(format!("{} is pending review without results", m.id)));
            }
            snapshot = Some(m.clone());
            m.advance_to(MatchStatus::Completed)
        })?;

        let winner = completed
            .results
            .as_ref()
            .map(|r| r.submitted_by)
            .ok_or_else(|| RivalryError::Internal(format!("{} completed without results", completed.id)))?;

        if let Err(e) = self.ledger.award_prize(winner, completed.prize_pool, completed.id) {
            tracing::error!(%match_id, winner = %winner, error = %e, "Prize credit failed; reverting approval");
            if let Some(mut before) = snapshot {
                before.version = completed.version;
                if let Err(restore) = self.store.update(before) {
                    tracing::error!(%match_id, error = %restore, "Could not revert approval");
                }
            }
            return Err(e);
        }

        for p in &completed.participants {
            if let Err(e) = self.ledger.deduct_entry_fee(p.user_id, completed.entry_fee, completed.id) {
                tracing::warn!(%match_id, user = %p.user_id, error = %e, "Entry fee could not be consumed");
            }
        }

        tracing::info!(
            %match_id,
            mediator = %caller.user_id,
            winner = %winner,
            prize = %completed.prize_pool,
            "Result approved; match completed"
        );
        self.publish_status(&completed);
        Ok(completed)
    }

    // =================================================================
    // Reads
    // =================================================================

    /// One match as seen by `viewer`.
    ///
    /// # Errors
    /// `MatchNotFound`.
    pub fn get_match(&self, match_id: MatchId, viewer: &Caller) -> Result<Match> {
        let m = self.refresh(self.load(match_id)?, Utc::now())?;
        Ok(redact_for(m, viewer))
    }

    /// Joinable matches: published, OPEN, optionally near a point or
    /// featured. Rows that turn ONGOING on this read are left out.
    pub fn get_all_matches(&self, query: DiscoveryQuery) -> Result<Vec<Match>> {
        let filter = MatchFilter::Discoverable {
            near: query.near,
            radius_km: self.config.discovery_radius_km,
            featured_only: query.featured,
        };
        let now = Utc::now();
        let mut open = Vec::new();
        for m in self.store.find(&filter)? {
            let m = self.refresh(m, now)?;
            if m.status == MatchStatus::Open {
                open.push(m);
            }
        }
        Ok(open)
    }

    /// Matches the caller has joined.
    pub fn joined_matches(&self, caller: &Caller) -> Result<Vec<Match>> {
        Ok(self
            .listing(&MatchFilter::JoinedBy(caller.user_id))?
            .into_iter()
            .map(|m| redact_for(m, caller))
            .collect())
    }

    /// Matches the caller created.
    pub fn created_matches(&self, caller: &Caller) -> Result<Vec<Match>> {
        self.listing(&MatchFilter::CreatedBy(caller.user_id))
    }

    /// Matches the caller mediates, by resolved id or declared email.
    pub fn mediator_matches(&self, caller: &Caller) -> Result<Vec<Match>> {
        self.listing(&mediated_by(caller))
    }

    /// Whether the caller mediates any match.
    pub fn is_mediator(&self, caller: &Caller) -> Result<bool> {
        Ok(!self.store.find(&mediated_by(caller))?.is_empty())
    }

    /// Every match. Admin only.
    ///
    /// # Errors
    /// `Unauthorized` for non-admins.
    pub fn all_matches(&self, caller: &Caller) -> Result<Vec<Match>> {
        caller.require_admin()?;
        self.listing(&MatchFilter::All)
    }

    fn listing(&self, filter: &MatchFilter) -> Result<Vec<Match>> {
        let now = Utc::now();
        self.store
            .find(filter)?
            .into_iter()
            .map(|m| self.refresh(m, now))
            .collect()
    }

    // =================================================================
    // Internals
    // =================================================================

    fn load(&self, match_id: MatchId) -> Result<Match> {
        self.store
            .get(match_id)?
            .ok_or(RivalryError::MatchNotFound(match_id))
    }

    /// Read, refresh, edit and compare-and-swap one match row. `edit` runs
    /// again on every retry.
    fn mutate<F>(&self, match_id: MatchId, mut edit: F) -> Result<Match>
    where
        F: FnMut(&mut Match) -> Result<()>,
    {
        let attempts = self.config.max_write_retries;
        for attempt in 1..=attempts {
            let mut m = self.refresh(self.load(match_id)?, Utc::now())?;
            edit(&mut m)?;
            match self.store.update(m) {
                Ok(saved) => return Ok(saved),
                Err(RivalryError::VersionConflict { .. }) => {
                    tracing::debug!(%match_id, attempt, "Match version moved; retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(contention(match_id, attempts))
    }

    /// Return a reservation. Failures are logged; the caller's operation
    /// has already been decided.
    fn release(&self, user_id: UserId, amount: Decimal, match_id: MatchId, reason: &str) {
        match self.ledger.unlock_funds(user_id, amount, Some(match_id), reason) {
            Ok(_) => tracing::info!(%match_id, user = %user_id, %amount, reason, "Entry fee released"),
            Err(e) => tracing::error!(
                %match_id,
                user = %user_id,
                %amount,
                error = %e,
                "Entry fee could not be released"
            ),
        }
    }

    fn resolve_mediator(&self, email: &str) -> Option<UserId> {
        match self.hooks.directory.find_by_email(email) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "Mediator lookup failed; keeping email only");
                None
            }
        }
    }

    fn publish_status(&self, m: &Match) {
        self.hooks.events.publish(&MatchEvent::StatusUpdate {
            match_id: m.id,
            status: m.status,
        });
    }

    /// Tell the creator the match is live and invite the mediator.
    fn announce(&self, m: &Match) {
        let notice = Notification {
            audience: Audience::User(m.created_by),
            title: "Event Published".to_string(),
            body: format!(
                "Your event \"{}\" has been successfully created and published.",
                m.title
            ),
            data: serde_json::json!({ "matchId": m.id }),
        };
        if let Err(e) = self.hooks.notifier.notify(&notice) {
            tracing::warn!(match_id = %m.id, error = %e, "Publish notification not delivered");
        }

        let Some(to) = m.mediator_email.clone() else {
            return;
        };
        let email = Email {
            to,
            subject: format!("You have been selected as a mediator for {}", m.title),
            text: format!(
                "You have been selected as a mediator for the match \"{}\" (Room ID: {}). \
                 Please log in to the app to review results when the match concludes.",
                m.title, m.room_id
            ),
            html: format!(
                "<p>You have been selected as a mediator for the match <strong>{}</strong> \
                 (Room ID: {}).</p><p>Please log in to the app to review results when the \
                 match concludes.</p>",
                m.title, m.room_id
            ),
        };
        if let Err(e) = self.hooks.mailer.send(&email) {
            tracing::warn!(match_id = %m.id, error = %e, "Mediator email not delivered");
        }
    }
}

fn authorize_change(m: &Match, actor: Actor<'_>, verb: &str) -> Result<()> {
    match actor {
        Actor::Creator(caller, force) => {
            if !m.is_creator(caller.user_id) {
                return Err(RivalryError::unauthorized(format!("Only the creator can {verb} this match")));
            }
            if m.is_published && !force {
                return Err(RivalryError::invalid_state(format!("Cannot {verb} a published match")));
            }
        }
        Actor::Admin => {
            if m.is_published {
                return Err(RivalryError::invalid_state(format!("Cannot {verb} a published match")));
            }
        }
    }
    Ok(())
}

fn mediated_by(caller: &Caller) -> MatchFilter {
    MatchFilter::MediatedBy {
        user_id: caller.user_id,
        email: caller.email.clone(),
    }
}

/// Screenshots are only shown to the creator and the mediator.
fn redact_for(mut m: Match, viewer: &Caller) -> Match {
    if !m.is_creator(viewer.user_id) && !m.is_mediator(viewer) {
        if let Some(results) = m.results.as_mut() {
            results.screenshot_urls.clear();
        }
    }
    m
}

fn contention(match_id: MatchId, attempts: u32) -> RivalryError {
    RivalryError::Contention {
        entity: match_id.to_string(),
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use rivalry_ledger::{FieldCipher, MemoryLedgerStore};
    use rivalry_types::{Config, GameType, Role};

    use super::*;
    use crate::repository::MemoryMatchStore;

    fn engine() -> MatchEngine {
        let cfg = Config::for_tests();
        let ledger = Ledger::new(
            Arc::new(MemoryLedgerStore::new()),
            FieldCipher::new(&cfg.encryption_key).unwrap(),
            cfg.ledger,
        )
        .unwrap();
        MatchEngine::new(Arc::new(MemoryMatchStore::new()), Arc::new(ledger), cfg.arena, Hooks::inert())
    }

    fn input(game_type: GameType) -> CreateMatch {
        CreateMatch {
            title: "Night Cup".into(),
            banner_url: None,
            game_type,
            mode: None,
            max_players: None,
            map: "Bermuda".into(),
            room_id: None,
            room_password: None,
            entry_fee: Decimal::TEN,
            prize_pool: Decimal::new(20, 0),
            match_date: "01 Jan 2099".into(),
            match_time: "12:00".into(),
            mediator_email: None,
            restrictions: None,
            additional_rules: None,
            location: None,
            is_published: None,
        }
    }

    #[test]
    fn capacity_defaults_by_game_type() {
        let e = engine();
        let owner = Caller::dummy_user();
        assert_eq!(e.create_match(&owner, input(GameType::Cs)).unwrap().max_players, 2);
        assert_eq!(e.create_match(&owner, input(GameType::Br)).unwrap().max_players, 52);
    }

    #[test]
    fn supplied_room_code_conflicts() {
        let e = engine();
        let owner = Caller::dummy_user();
        let mut first = input(GameType::Cs);
        first.room_id = Some("ROOM1".into());
        e.create_match(&owner, first.clone()).unwrap();
        assert!(matches!(
            e.create_match(&owner, first).unwrap_err(),
            RivalryError::DuplicateRoomCode(_)
        ));
    }

    #[test]
    fn featured_events_are_admin_only() {
        let e = engine();
        let user = Caller::dummy_user();
        assert!(matches!(
            e.create_featured_event(&user, input(GameType::Br), Promotion::Premium).unwrap_err(),
            RivalryError::Unauthorized { .. }
        ));
        let admin = Caller::dummy_admin();
        assert!(e
            .create_featured_event(&admin, input(GameType::Br), Promotion::Standard)
            .is_err());
        let m = e.create_featured_event(&admin, input(GameType::Br), Promotion::Premium).unwrap();
        assert!(m.promotion.is_featured());
    }

    #[test]
    fn published_match_needs_force_to_edit() {
        let e = engine();
        let owner = Caller::dummy_user();
        let m = e.create_match(&owner, input(GameType::Cs)).unwrap();
        let mut edit = UpdateMatch {
            title: Some("Renamed".into()),
            ..UpdateMatch::default()
        };
        assert!(matches!(
            e.update_match(&owner, m.id, &edit).unwrap_err(),
            RivalryError::InvalidState { .. }
        ));
        edit.force = true;
        assert_eq!(e.update_match(&owner, m.id, &edit).unwrap().title, "Renamed");

        let stranger = Caller::dummy_user();
        assert!(matches!(
            e.update_match(&stranger, m.id, &edit).unwrap_err(),
            RivalryError::Unauthorized { .. }
        ));
    }

    #[test]
    fn admin_cannot_touch_published_matches() {
        let e = engine();
        let owner = Caller::dummy_user();
        let admin = Caller::new(UserId::new(), "ops@example.com", Role::Admin);
        let m = e.create_match(&owner, input(GameType::Cs)).unwrap();
        assert!(e.admin_update_match(&admin, m.id, &UpdateMatch::default()).is_err());
        assert!(e.admin_delete_match(&admin, m.id).is_err());

        let mut draft = input(GameType::Cs);
        draft.is_published = Some(false);
        let d = e.create_match(&owner, draft).unwrap();
        e.admin_delete_match(&admin, d.id).unwrap();
        assert!(matches!(e.get_match(d.id, &owner).unwrap_err(), RivalryError::MatchNotFound(_)));
    }

    #[test]
    fn past_start_flips_to_ongoing_on_read() {
        let e = engine();
        let owner = Caller::dummy_user();
        let mut past = input(GameType::Cs);
        past.match_date = "01 Jan 2020".into();
        let m = e.create_match(&owner, past).unwrap();
        assert_eq!(m.status, MatchStatus::Open);
        let read = e.get_match(m.id, &owner).unwrap();
        assert_eq!(read.status, MatchStatus::Ongoing);
        assert_eq!(read.version, m.version + 1);
    }

    #[test]
    fn unparseable_schedule_stays_open() {
        let e = engine();
        let owner = Caller::dummy_user();
        let mut odd = input(GameType::Cs);
        odd.match_date = "someday".into();
        let m = e.create_match(&owner, odd).unwrap();
        assert_eq!(e.get_match(m.id, &owner).unwrap().status, MatchStatus::Open);
    }

    #[test]
    fn join_with_malformed_or_unknown_room() {
        let e = engine();
        let user = Caller::dummy_user();
        assert!(matches!(
            e.join_match(&user, "no such room!", None).unwrap_err(),
            RivalryError::Validation { .. }
        ));
        assert!(matches!(
            e.join_match(&user, "ZZZZZZ", None).unwrap_err(),
            RivalryError::RoomNotFound(_)
        ));
    }
}
