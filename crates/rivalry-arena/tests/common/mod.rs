//! Shared fixture: an engine wired to recording hooks and a live registry.

#![allow(dead_code)]

use std::sync::Arc;

use rivalry_arena::{CreateMatch, Hooks, LiveUpdates, MatchEngine, MemoryDirectory, MemoryMatchStore};
use rivalry_ledger::{FieldCipher, Ledger, MemoryLedgerStore};
use rivalry_types::hooks::recording::{RecordingMailer, RecordingNotifier};
use rivalry_types::*;
use rust_decimal::Decimal;

pub struct Arena {
    pub engine: MatchEngine,
    pub ledger: Arc<Ledger>,
    pub live: Arc<LiveUpdates>,
    pub notifier: Arc<RecordingNotifier>,
    pub mailer: Arc<RecordingMailer>,
    pub directory: Arc<MemoryDirectory>,
}

impl Arena {
    pub fn new() -> Self {
        Self::with(RecordingNotifier::new(), RecordingMailer::new(), 8)
    }

    pub fn with(notifier: RecordingNotifier, mailer: RecordingMailer, max_write_retries: u32) -> Self {
        let mut cfg = Config::for_tests();
        cfg.ledger.max_write_retries = max_write_retries;
        cfg.arena.max_write_retries = max_write_retries;

        let ledger = Arc::new(
            Ledger::new(
                Arc::new(MemoryLedgerStore::new()),
                FieldCipher::new(&cfg.encryption_key).unwrap(),
                cfg.ledger,
            )
            .unwrap(),
        );
        let live = LiveUpdates::new();
        let notifier = Arc::new(notifier);
        let mailer = Arc::new(mailer);
        let directory = Arc::new(MemoryDirectory::new());
        let hooks = Hooks {
            notifier: notifier.clone(),
            mailer: mailer.clone(),
            directory: directory.clone(),
            events: live.clone(),
        };
        let engine = MatchEngine::new(Arc::new(MemoryMatchStore::new()), ledger.clone(), cfg.arena, hooks);
        Self {
            engine,
            ledger,
            live,
            notifier,
            mailer,
            directory,
        }
    }

    /// A registered user with a funded wallet.
    pub fn player(&self, funds: i64) -> Caller {
        let caller = Caller::dummy_user();
        self.ledger.create_wallet(caller.user_id, "123456").unwrap();
        if funds > 0 {
            self.ledger.deposit(caller.user_id, Decimal::from(funds)).unwrap();
        }
        caller
    }
}

/// A published CS match far in the future.
pub fn cup(max_players: u32, entry_fee: i64, prize_pool: i64) -> CreateMatch {
    CreateMatch {
        title: "Weekend Cup".into(),
        banner_url: None,
        game_type: GameType::Cs,
        mode: Some("Squad".into()),
        max_players: Some(max_players),
        map: "Kalahari".into(),
        room_id: None,
        room_password: Some("secret".into()),
        entry_fee: Decimal::from(entry_fee),
        prize_pool: Decimal::from(prize_pool),
        match_date: "01 Jan 2099".into(),
        match_time: "18:00".into(),
        mediator_email: None,
        restrictions: None,
        additional_rules: None,
        location: None,
        is_published: None,
    }
}
