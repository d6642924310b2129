//! Authenticated caller identity.
//!
//! Credentials are verified upstream; every core operation receives an
//! already-authenticated [`Caller`].

use serde::{Deserialize, Serialize};

use crate::{RivalryError, Result, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: UserId, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            email: email.into(),
            role,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// # Errors
    /// Returns `Unauthorized` unless the caller is an admin.
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(RivalryError::unauthorized("Admin privileges required"))
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Caller {
    /// A regular user with a generated email.
    #[must_use]
    pub fn dummy_user() -> Self {
        let user_id = UserId::new();
        Self::new(user_id, format!("{}@players.test", user_id.0.simple()), Role::User)
    }

    /// An admin with a generated email.
    #[must_use]
    pub fn dummy_admin() -> Self {
        let user_id = UserId::new();
        Self::new(user_id, format!("{}@staff.test", user_id.0.simple()), Role::Admin)
    }
}
