//! Bootstrapping a node over existing stores.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rivalry_arena::{CreateMatch, MemoryDirectory, MemoryMatchStore};
use rivalry_ledger::{
    FieldCipher, Ledger, LedgerRepository, MemoryLedgerStore, OrderRef, OrderRequest, PaymentGateway,
    Verification,
};
use rivalry_node::{Collaborators, Node, Stores};
use rivalry_types::hooks::recording::{RecordingMailer, RecordingNotifier};
use rivalry_types::*;
use rust_decimal::Decimal;

#[derive(Default)]
struct PaidGateway {
    customers: Mutex<HashMap<String, UserId>>,
}

impl PaymentGateway for PaidGateway {
    fn create_order(&self, request: &OrderRequest) -> Result<OrderRef> {
        let order_id = format!("order-{}", request.user_id.0.simple());
        self.customers
            .lock()
            .unwrap()
            .insert(order_id.clone(), request.user_id);
        Ok(OrderRef {
            order_id,
            payment_session_id: None,
        })
    }

    fn verify_order(&self, order_id: &str) -> Result<Verification> {
        let customer_id = *self
            .customers
            .lock()
            .unwrap()
            .get(order_id)
            .ok_or_else(|| RivalryError::validation("unknown order"))?;
        Ok(Verification {
            paid: true,
            amount: Decimal::from(75),
            customer_id,
            payment_id: Some("pay_0001".into()),
        })
    }
}

fn collaborators(mailer: Arc<RecordingMailer>) -> Collaborators {
    Collaborators {
        notifier: Arc::new(RecordingNotifier::new()),
        mailer,
        directory: Arc::new(MemoryDirectory::new()),
        gateway: Arc::new(PaidGateway::default()),
    }
}

#[test]
fn bootstrap_backfills_legacy_account_hashes() {
    let config = Config::for_tests();
    let ledger_store = Arc::new(MemoryLedgerStore::new());

    // A wallet written before account hashes existed.
    let user = UserId::new();
    let seed = Ledger::new(
        ledger_store.clone(),
        FieldCipher::new(&config.encryption_key).unwrap(),
        config.ledger.clone(),
    )
    .unwrap();
    let account = seed.create_wallet(user, "123456").unwrap().account_number;
    let mut row = ledger_store.wallet_by_user(user).unwrap().unwrap();
    row.account_number_hash = None;
    ledger_store.put_raw(row).unwrap();
    assert_eq!(seed.wallet_owner(&account).unwrap(), None);

    let stores = Stores {
        ledger: ledger_store,
        matches: Arc::new(MemoryMatchStore::new()),
    };
    let node = Node::bootstrap(&config, stores, collaborators(Arc::new(RecordingMailer::new()))).unwrap();

    let report = node.migration();
    assert_eq!((report.scanned, report.updated, report.failed), (1, 1, 0));
    assert_eq!(node.ledger.wallet_owner(&account).unwrap(), Some(user));
}

#[test]
fn wired_services_share_one_ledger() {
    let config = Config::for_tests();
    let mailer = Arc::new(RecordingMailer::new());
    let node = Node::bootstrap(&config, Stores::in_memory(), collaborators(mailer.clone())).unwrap();
    assert_eq!(node.migration(), rivalry_ledger::MigrationReport::default());

    let player = Caller::dummy_user();
    node.ledger.create_wallet(player.user_id, "123456").unwrap();

    // Top-up through the gateway lands in the ledger the engine uses.
    let order = node.top_up.initiate(&player, Decimal::from(75), None).unwrap();
    node.top_up.verify(&player, &order.order_id).unwrap();

    let owner = Caller::dummy_user();
    let m = node
        .engine
        .create_match(
            &owner,
            CreateMatch {
                title: "Bootstrap Cup".into(),
                banner_url: None,
                game_type: GameType::Br,
                mode: None,
                max_players: None,
                map: "Purgatory".into(),
                room_id: None,
                room_password: None,
                entry_fee: Decimal::from(25),
                prize_pool: Decimal::ZERO,
                match_date: "01 Jan 2099".into(),
                match_time: "10:00".into(),
                mediator_email: None,
                restrictions: None,
                additional_rules: None,
                location: None,
                is_published: None,
            },
        )
        .unwrap();
    let mut sub = node.live.subscribe(m.id);
    node.engine.join_match(&player, m.room_id.as_str(), None).unwrap();
    assert!(matches!(sub.try_recv(), Some(MatchEvent::ParticipantUpdate { count: 1, .. })));

    let w = node.ledger.balance(player.user_id).unwrap();
    assert_eq!(w.available(), Decimal::from(50));
    assert_eq!(w.locked(), Decimal::from(25));

    // PIN reset mails through the shared mailer.
    node.pin_reset.request_pin_reset(&player).unwrap();
    assert_eq!(mailer.sent().len(), 1);
    assert_eq!(mailer.sent()[0].to, player.email);
}

#[test]
fn bad_pin_hash_parameters_fail_startup() {
    let mut config = Config::for_tests();
    config.ledger.pin_hash.memory_kib = 0;
    let err = Node::bootstrap(
        &config,
        Stores::in_memory(),
        collaborators(Arc::new(RecordingMailer::new())),
    )
    .unwrap_err();
    assert!(matches!(err, RivalryError::Configuration(_)));
}
