//! Wiring of stores, ledger, engine and side-effect collaborators.

use std::sync::Arc;

use rivalry_arena::{Hooks, LiveUpdates, MatchEngine, MatchRepository, MemoryMatchStore, UserDirectory};
use rivalry_ledger::{
    migrate_account_hashes, FieldCipher, Ledger, LedgerRepository, MemoryLedgerStore, MigrationReport,
    PinReset, PaymentGateway, TopUp,
};
use rivalry_types::{constants, Config, Mailer, Notifier, Result};

/// Persistence backends.
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn LedgerRepository>,
    pub matches: Arc<dyn MatchRepository>,
}

impl Stores {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            ledger: Arc::new(MemoryLedgerStore::new()),
            matches: Arc::new(MemoryMatchStore::new()),
        }
    }
}

/// External services the node calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub mailer: Arc<dyn Mailer>,
    pub directory: Arc<dyn UserDirectory>,
    pub gateway: Arc<dyn PaymentGateway>,
}

/// A fully wired backend.
pub struct Node {
    pub ledger: Arc<Ledger>,
    pub engine: MatchEngine,
    pub live: Arc<LiveUpdates>,
    pub pin_reset: PinReset,
    pub top_up: TopUp,
    migration: MigrationReport,
}

impl Node {
    /// Build every service and run the account-hash backfill.
    ///
    /// # Errors
    /// `Configuration` for bad key or hashing parameters, or a storage
    /// failure while scanning for the backfill.
    pub fn bootstrap(config: &Config, stores: Stores, collaborators: Collaborators) -> Result<Self> {
        let cipher = FieldCipher::new(&config.encryption_key)?;

        let migration = migrate_account_hashes(stores.ledger.as_ref(), &cipher)?;
        if migration.failed > 0 {
            tracing::warn!(
                scanned = migration.scanned,
                failed = migration.failed,
                "Some wallets still lack an account hash"
            );
        }

        let ledger = Arc::new(Ledger::new(stores.ledger, cipher, config.ledger.clone())?);
        let live = LiveUpdates::new();
        let hooks = Hooks {
            notifier: collaborators.notifier,
            mailer: collaborators.mailer.clone(),
            directory: collaborators.directory,
            events: live.clone(),
        };
        let engine = MatchEngine::new(stores.matches, ledger.clone(), config.arena.clone(), hooks);
        let pin_reset = PinReset::new(ledger.clone(), collaborators.mailer);
        let top_up = TopUp::new(ledger.clone(), collaborators.gateway);

        tracing::info!(
            version = constants::VERSION,
            migrated = migration.updated,
            discovery_radius_km = config.arena.discovery_radius_km,
            "Rivalry node ready"
        );
        Ok(Self {
            ledger,
            engine,
            live,
            pin_reset,
            top_up,
            migration,
        })
    }

    /// Load configuration from the environment, install tracing and
    /// bootstrap over in-memory stores.
    ///
    /// # Errors
    /// As [`Config::from_env`], [`crate::telemetry::init`] and
    /// [`Node::bootstrap`].
    pub fn from_env(collaborators: Collaborators) -> Result<Self> {
        let config = Config::from_env()?;
        crate::telemetry::init(&config.log)?;
        Self::bootstrap(&config, Stores::in_memory(), collaborators)
    }

    /// What the startup backfill did.
    #[must_use]
    pub fn migration(&self) -> MigrationReport {
        self.migration
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("engine", &self.engine)
            .field("migration", &self.migration)
            .finish_non_exhaustive()
    }
}
