//! Collaborators the engine calls but does not own.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rivalry_types::{Discard, Mailer, Notifier, Result, RivalryError, UserId};

use crate::live::EventSink;

/// Resolves registered users by email, for mediator assignment.
pub trait UserDirectory: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<UserId>>;
}

/// In-memory [`UserDirectory`]; emails are matched case-insensitively.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<String, UserId>>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, email: &str, user_id: UserId) -> Result<()> {
        self.users
            .write()
            .map_err(|_| RivalryError::Storage("user directory lock poisoned".into()))?
            .insert(email.trim().to_lowercase(), user_id);
        Ok(())
    }
}

impl UserDirectory for MemoryDirectory {
    fn find_by_email(&self, email: &str) -> Result<Option<UserId>> {
        Ok(self
            .users
            .read()
            .map_err(|_| RivalryError::Storage("user directory lock poisoned".into()))?
            .get(&email.trim().to_lowercase())
            .copied())
    }
}

/// The side-effect collaborators of a [`crate::MatchEngine`].
#[derive(Clone)]
pub struct Hooks {
    pub notifier: Arc<dyn Notifier>,
    pub mailer: Arc<dyn Mailer>,
    pub directory: Arc<dyn UserDirectory>,
    pub events: Arc<dyn EventSink>,
}

impl Hooks {
    /// Hooks that deliver nothing and know no users.
    #[must_use]
    pub fn inert() -> Self {
        Self {
            notifier: Arc::new(Discard),
            mailer: Arc::new(Discard),
            directory: Arc::new(MemoryDirectory::new()),
            events: Arc::new(NoEvents),
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

struct NoEvents;

impl EventSink for NoEvents {
    fn publish(&self, _event: &rivalry_types::MatchEvent) {}
}
