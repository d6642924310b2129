//! End-to-end match flows: join, submit, approve, with the ledger behind them.

mod common;

use common::{cup, Arena};
use rivalry_arena::{DiscoveryQuery, ResultSubmission, UpdateMatch};
use rivalry_types::hooks::recording::{RecordingMailer, RecordingNotifier};
use rivalry_types::*;
use rust_decimal::Decimal;

#[test]
fn two_join_third_is_turned_away() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let m = arena.engine.create_match(&owner, cup(2, 10, 20)).unwrap();

    let a = arena.player(100);
    let b = arena.player(100);
    let late = arena.player(100);
    arena.engine.join_match(&a, m.room_id.as_str(), Some(1)).unwrap();
    let joined = arena.engine.join_match(&b, m.room_id.as_str(), Some(2)).unwrap();
    assert_eq!(joined.participants.len(), 2);

    let err = arena.engine.join_match(&late, m.room_id.as_str(), None).unwrap_err();
    assert!(matches!(err, RivalryError::MatchFull { max_players: 2 }));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let stored = arena.engine.get_match(m.id, &owner).unwrap();
    assert_eq!(stored.participants.len(), 2);

    // The rejected player was never charged.
    let w = arena.ledger.balance(late.user_id).unwrap();
    assert_eq!(w.available(), Decimal::from(100));
    assert_eq!(w.locked(), Decimal::ZERO);
    assert!(arena
        .ledger
        .transactions(late.user_id)
        .unwrap()
        .iter()
        .all(|tx| tx.tx_type == TransactionType::Deposit));

    let w = arena.ledger.balance(a.user_id).unwrap();
    assert_eq!(w.available(), Decimal::from(90));
    assert_eq!(w.locked(), Decimal::TEN);
}

#[test]
fn room_code_lookup_ignores_case() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let mut input = cup(4, 0, 0);
    input.room_id = Some("Lobby7".into());
    let m = arena.engine.create_match(&owner, input).unwrap();
    assert_eq!(m.room_id.as_str(), "LOBBY7");

    let player = arena.player(0);
    arena.engine.join_match(&player, "lobby7", None).unwrap();
}

#[test]
fn repeat_join_is_a_conflict_and_charges_once() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let m = arena.engine.create_match(&owner, cup(4, 10, 0)).unwrap();
    let p = arena.player(50);

    arena.engine.join_match(&p, m.room_id.as_str(), None).unwrap();
    let err = arena.engine.join_match(&p, m.room_id.as_str(), None).unwrap_err();
    assert!(matches!(err, RivalryError::AlreadyJoined(u) if u == p.user_id));

    let w = arena.ledger.balance(p.user_id).unwrap();
    assert_eq!(w.available(), Decimal::from(40));
    assert_eq!(w.locked(), Decimal::TEN);
}

#[test]
fn insufficient_funds_adds_no_participant() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let m = arena.engine.create_match(&owner, cup(4, 25, 0)).unwrap();
    let poor = arena.player(10);

    let err = arena.engine.join_match(&poor, m.room_id.as_str(), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert!(arena.engine.get_match(m.id, &owner).unwrap().participants.is_empty());

    let no_wallet = Caller::dummy_user();
    let err = arena.engine.join_match(&no_wallet, m.room_id.as_str(), None).unwrap_err();
    assert!(matches!(err, RivalryError::WalletNotFound(_)));
    assert!(arena.engine.get_match(m.id, &owner).unwrap().participants.is_empty());
}

#[test]
fn unpublished_match_is_hidden_and_unjoinable() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let mut draft = cup(2, 5, 10);
    draft.is_published = Some(false);
    let m = arena.engine.create_match(&owner, draft).unwrap();

    let listed = arena.engine.get_all_matches(DiscoveryQuery::default()).unwrap();
    assert!(listed.iter().all(|x| x.id != m.id));

    let p = arena.player(100);
    let err = arena.engine.join_match(&p, m.room_id.as_str(), None).unwrap_err();
    assert!(matches!(err, RivalryError::InvalidState { .. }));
    assert_eq!(arena.ledger.balance(p.user_id).unwrap().available(), Decimal::from(100));

    // Drafts are freely editable and deletable by their owner.
    let edit = UpdateMatch {
        title: Some("Draft Cup".into()),
        ..UpdateMatch::default()
    };
    assert_eq!(arena.engine.update_match(&owner, m.id, &edit).unwrap().title, "Draft Cup");
    arena.engine.delete_match(&owner, m.id, false).unwrap();
}

#[test]
fn discovery_skips_matches_that_have_started() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let upcoming = arena.engine.create_match(&owner, cup(2, 0, 0)).unwrap();
    let mut started = cup(2, 0, 0);
    started.match_date = "01 Jan 2020".into();
    let started = arena.engine.create_match(&owner, started).unwrap();

    let listed: Vec<_> = arena
        .engine
        .get_all_matches(DiscoveryQuery::default())
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(listed, vec![upcoming.id]);

    // The read moved it forward and it cannot be joined any more.
    let created = arena.engine.created_matches(&owner).unwrap();
    let flipped = created.iter().find(|m| m.id == started.id).unwrap();
    assert_eq!(flipped.status, MatchStatus::Ongoing);
    let p = arena.player(0);
    assert!(matches!(
        arena.engine.join_match(&p, started.room_id.as_str(), None).unwrap_err(),
        RivalryError::InvalidState { .. }
    ));
}

#[test]
fn discovery_by_distance_and_promotion() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let admin = Caller::dummy_admin();

    let mut nearby = cup(2, 0, 0);
    nearby.location = Some(GeoPoint::new(12.9716, 77.5946).unwrap());
    let nearby = arena.engine.create_match(&owner, nearby).unwrap();

    let mut far = cup(2, 0, 0);
    far.location = Some(GeoPoint::new(19.0760, 72.8777).unwrap());
    arena.engine.create_match(&owner, far).unwrap();

    let mut sponsored = cup(2, 0, 0);
    sponsored.location = Some(GeoPoint::new(12.99, 77.60).unwrap());
    let sponsored = arena
        .engine
        .create_featured_event(
            &admin,
            sponsored,
            Promotion::Sponsored(SponsorDetails {
                sponsor_name: Some("Acme".into()),
                ..SponsorDetails::default()
            }),
        )
        .unwrap();

    let near = DiscoveryQuery {
        near: Some(GeoPoint::new(12.97, 77.59).unwrap()),
        featured: false,
    };
    let mut ids: Vec<_> = arena.engine.get_all_matches(near).unwrap().into_iter().map(|m| m.id).collect();
    ids.sort();
    let mut expected = vec![nearby.id, sponsored.id];
    expected.sort();
    assert_eq!(ids, expected);

    let featured = DiscoveryQuery {
        near: None,
        featured: true,
    };
    let ids: Vec<_> = arena.engine.get_all_matches(featured).unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![sponsored.id]);
}

#[test]
fn only_creator_submits_results() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let m = arena.engine.create_match(&owner, cup(2, 0, 50)).unwrap();
    let outsider = arena.player(0);

    let err = arena
        .engine
        .submit_result(&outsider, m.id, ResultSubmission::default())
        .unwrap_err();
    assert!(matches!(err, RivalryError::Unauthorized { .. }));
    assert_eq!(arena.engine.get_match(m.id, &owner).unwrap().status, MatchStatus::Open);

    let submitted = arena
        .engine
        .submit_result(
            &owner,
            m.id,
            ResultSubmission {
                kills: Some(12),
                damage: Some(2400),
                screenshot_urls: vec!["https://cdn.test/a.png".into()],
            },
        )
        .unwrap();
    assert_eq!(submitted.status, MatchStatus::PendingMediatorReview);
    let results = submitted.results.unwrap();
    assert_eq!(results.submitted_by, owner.user_id);
    assert_eq!(results.kills, Some(12));
}

#[test]
fn approval_pays_submitter_and_consumes_fees() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let mediator = arena.player(0);
    let mut input = cup(2, 10, 20);
    input.mediator_email = Some(mediator.email.to_uppercase());
    let m = arena.engine.create_match(&owner, input).unwrap();

    let a = arena.player(30);
    let b = arena.player(30);
    arena.engine.join_match(&a, m.room_id.as_str(), None).unwrap();
    arena.engine.join_match(&b, m.room_id.as_str(), None).unwrap();

    // Not yet pending review.
    let err = arena.engine.approve_result(&mediator, m.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    arena
        .engine
        .submit_result(&owner, m.id, ResultSubmission::default())
        .unwrap();

    let bystander = arena.player(0);
    assert!(matches!(
        arena.engine.approve_result(&bystander, m.id).unwrap_err(),
        RivalryError::Unauthorized { .. }
    ));

    let done = arena.engine.approve_result(&mediator, m.id).unwrap();
    assert_eq!(done.status, MatchStatus::Completed);

    let prize = arena.ledger.balance(owner.user_id).unwrap();
    assert_eq!(prize.available(), Decimal::from(20));
    assert_eq!(prize.withdrawable(), Decimal::from(20));

    for p in [&a, &b] {
        let w = arena.ledger.balance(p.user_id).unwrap();
        assert_eq!(w.available(), Decimal::from(20));
        assert_eq!(w.locked(), Decimal::ZERO);
        assert!(arena
            .ledger
            .transactions(p.user_id)
            .unwrap()
            .iter()
            .any(|tx| tx.tx_type == TransactionType::EntryFee && tx.match_id == Some(m.id)));
    }

    // Terminal: neither a second approval nor a resubmission is accepted.
    assert_eq!(
        arena.engine.approve_result(&mediator, m.id).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        arena
            .engine
            .submit_result(&owner, m.id, ResultSubmission::default())
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidState
    );
}

#[test]
fn failed_prize_credit_reverts_approval() {
    let arena = Arena::new();
    // The creator has no wallet, so the prize cannot be credited.
    let owner = Caller::dummy_user();
    let m = arena.engine.create_match(&owner, cup(2, 0, 20)).unwrap();
    arena
        .engine
        .submit_result(&owner, m.id, ResultSubmission::default())
        .unwrap();

    let admin = Caller::dummy_admin();
    let err = arena.engine.approve_result(&admin, m.id).unwrap_err();
    assert!(matches!(err, RivalryError::WalletNotFound(_)));
    assert_eq!(
        arena.engine.get_match(m.id, &owner).unwrap().status,
        MatchStatus::PendingMediatorReview
    );

    arena.ledger.create_wallet(owner.user_id, "123456").unwrap();
    assert_eq!(
        arena.engine.approve_result(&admin, m.id).unwrap().status,
        MatchStatus::Completed
    );
}

#[test]
fn screenshots_visible_to_creator_and_mediator_only() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let mediator = arena.player(0);
    let mut input = cup(2, 0, 0);
    input.mediator_email = Some(mediator.email.clone());
    let m = arena.engine.create_match(&owner, input).unwrap();
    let player = arena.player(0);
    arena.engine.join_match(&player, m.room_id.as_str(), None).unwrap();
    arena
        .engine
        .submit_result(
            &owner,
            m.id,
            ResultSubmission {
                kills: None,
                damage: None,
                screenshot_urls: vec!["https://cdn.test/proof.png".into()],
            },
        )
        .unwrap();

    let shots = |viewer: &Caller| {
        arena
            .engine
            .get_match(m.id, viewer)
            .unwrap()
            .results
            .unwrap()
            .screenshot_urls
    };
    assert_eq!(shots(&owner).len(), 1);
    assert_eq!(shots(&mediator).len(), 1);
    assert!(shots(&player).is_empty());

    let joined = arena.engine.joined_matches(&player).unwrap();
    assert!(joined[0].results.as_ref().unwrap().screenshot_urls.is_empty());

    // Storage is untouched by the projection.
    assert_eq!(shots(&owner).len(), 1);
}

#[test]
fn mediator_is_resolved_and_listed() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let judge = arena.player(0);
    arena.directory.register(&judge.email, judge.user_id).unwrap();

    let mut input = cup(2, 0, 0);
    input.mediator_email = Some(judge.email.to_uppercase());
    let m = arena.engine.create_match(&owner, input).unwrap();
    assert_eq!(m.mediator_user_id, Some(judge.user_id));
    assert_eq!(m.mediator_email.as_deref(), Some(judge.email.as_str()));

    assert!(arena.engine.is_mediator(&judge).unwrap());
    assert!(!arena.engine.is_mediator(&owner).unwrap());
    let listed = arena.engine.mediator_matches(&judge).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, m.id);

    // Unknown mediators are kept by email only.
    let mut input = cup(2, 0, 0);
    input.mediator_email = Some("guest@outside.test".into());
    let m = arena.engine.create_match(&owner, input).unwrap();
    assert_eq!(m.mediator_user_id, None);
}

#[test]
fn publishing_announces_once() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let mut draft = cup(2, 0, 0);
    draft.is_published = Some(false);
    draft.mediator_email = Some("ref@league.test".into());
    let m = arena.engine.create_match(&owner, draft).unwrap();
    assert!(arena.notifier.sent().is_empty());
    assert!(arena.mailer.sent().is_empty());

    let publish = UpdateMatch {
        is_published: Some(true),
        ..UpdateMatch::default()
    };
    arena.engine.update_match(&owner, m.id, &publish).unwrap();

    let notes = arena.notifier.sent();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Event Published");
    assert_eq!(notes[0].audience, Audience::User(owner.user_id));
    let mails = arena.mailer.sent();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "ref@league.test");
    assert_eq!(mails[0].subject, "You have been selected as a mediator for Weekend Cup");
    assert!(mails[0].text.contains(m.room_id.as_str()));

    // A forced edit of a live match does not announce again.
    let retitle = UpdateMatch {
        title: Some("Weekend Cup II".into()),
        force: true,
        ..UpdateMatch::default()
    };
    arena.engine.update_match(&owner, m.id, &retitle).unwrap();
    assert_eq!(arena.notifier.sent().len(), 1);
    assert_eq!(arena.mailer.sent().len(), 1);
}

#[test]
fn failed_dispatch_does_not_fail_creation() {
    let arena = Arena::with(RecordingNotifier::failing(), RecordingMailer::failing(), 8);
    let owner = arena.player(0);
    let mut input = cup(2, 0, 0);
    input.mediator_email = Some("ref@league.test".into());
    let m = arena.engine.create_match(&owner, input).unwrap();
    assert!(m.is_published);
    assert_eq!(arena.notifier.sent().len(), 1);
    assert_eq!(arena.mailer.sent().len(), 1);
    assert!(arena.engine.get_match(m.id, &owner).is_ok());
}

#[test]
fn forced_delete_returns_locked_fees() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let m = arena.engine.create_match(&owner, cup(4, 15, 0)).unwrap();
    let p = arena.player(40);
    arena.engine.join_match(&p, m.room_id.as_str(), None).unwrap();

    assert!(matches!(
        arena.engine.delete_match(&owner, m.id, false).unwrap_err(),
        RivalryError::InvalidState { .. }
    ));
    arena.engine.delete_match(&owner, m.id, true).unwrap();

    let w = arena.ledger.balance(p.user_id).unwrap();
    assert_eq!(w.available(), Decimal::from(40));
    assert_eq!(w.locked(), Decimal::ZERO);
    let last = &arena.ledger.transactions(p.user_id).unwrap()[0];
    assert_eq!(last.tx_type, TransactionType::Unlock);
    assert_eq!(last.match_id, Some(m.id));
}

#[test]
fn entry_fee_is_frozen_once_players_join() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let m = arena.engine.create_match(&owner, cup(4, 10, 0)).unwrap();
    let p = arena.player(40);
    arena.engine.join_match(&p, m.room_id.as_str(), None).unwrap();

    let raise = UpdateMatch {
        entry_fee: Some(Decimal::from(20)),
        force: true,
        ..UpdateMatch::default()
    };
    assert!(matches!(
        arena.engine.update_match(&owner, m.id, &raise).unwrap_err(),
        RivalryError::InvalidState { .. }
    ));
    assert_eq!(arena.engine.get_match(m.id, &owner).unwrap().entry_fee, Decimal::TEN);
}

#[test]
fn results_freeze_the_match_against_edits() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let m = arena.engine.create_match(&owner, cup(2, 0, 20)).unwrap();
    arena
        .engine
        .submit_result(&owner, m.id, ResultSubmission::default())
        .unwrap();

    let bump = UpdateMatch {
        prize_pool: Some(Decimal::from(500)),
        force: true,
        ..UpdateMatch::default()
    };
    assert!(matches!(
        arena.engine.update_match(&owner, m.id, &bump).unwrap_err(),
        RivalryError::InvalidState { .. }
    ));

    let done = arena.engine.approve_result(&Caller::dummy_admin(), m.id).unwrap();
    assert_eq!(done.status, MatchStatus::Completed);
    assert!(matches!(
        arena.engine.update_match(&owner, m.id, &bump).unwrap_err(),
        RivalryError::InvalidState { .. }
    ));

    let stored = arena.engine.get_match(m.id, &owner).unwrap();
    assert_eq!(stored.prize_pool, Decimal::from(20));
    assert_eq!(stored.version, done.version);
    assert_eq!(arena.ledger.balance(owner.user_id).unwrap().available(), Decimal::from(20));
}

#[test]
fn live_listeners_see_joins_and_status_changes() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let m = arena.engine.create_match(&owner, cup(2, 0, 0)).unwrap();
    let mut sub = arena.live.subscribe(m.id);

    let p = arena.player(0);
    arena.engine.join_match(&p, m.room_id.as_str(), None).unwrap();
    assert_eq!(
        sub.try_recv(),
        Some(MatchEvent::ParticipantUpdate {
            match_id: m.id,
            count: 1
        })
    );

    arena
        .engine
        .submit_result(&owner, m.id, ResultSubmission::default())
        .unwrap();
    assert_eq!(
        sub.try_recv(),
        Some(MatchEvent::StatusUpdate {
            match_id: m.id,
            status: MatchStatus::PendingMediatorReview
        })
    );
    assert_eq!(sub.try_recv(), None);

    drop(sub);
    assert_eq!(arena.live.listener_count(m.id), 0);
}

#[test]
fn lazy_start_emits_status_update() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let mut input = cup(2, 0, 0);
    input.match_date = "01 Jan 2020".into();
    input.match_time = "9:15 AM".into();
    let m = arena.engine.create_match(&owner, input).unwrap();
    let mut sub = arena.live.subscribe(m.id);

    let checked = arena.engine.check_match_status(m).unwrap();
    assert_eq!(checked.status, MatchStatus::Ongoing);
    assert_eq!(
        sub.try_recv(),
        Some(MatchEvent::StatusUpdate {
            match_id: checked.id,
            status: MatchStatus::Ongoing
        })
    );

    // Already ONGOING: nothing more to do.
    let again = arena.engine.check_match_status(checked.clone()).unwrap();
    assert_eq!(again.version, checked.version);
    assert_eq!(sub.try_recv(), None);
}

#[test]
fn admin_sees_every_match() {
    let arena = Arena::new();
    let owner = arena.player(0);
    let mut draft = cup(2, 0, 0);
    draft.is_published = Some(false);
    arena.engine.create_match(&owner, draft).unwrap();
    arena.engine.create_match(&owner, cup(2, 0, 0)).unwrap();

    assert!(arena.engine.all_matches(&owner).is_err());
    assert_eq!(arena.engine.all_matches(&Caller::dummy_admin()).unwrap().len(), 2);
}
