//! Side-effect collaborators: email and user notifications.
//!
//! Both are fire-and-forget. Callers log a [`DispatchError`] and carry on;
//! a failed dispatch never rolls back the operation that triggered it.

use serde::{Deserialize, Serialize};

use crate::{DispatchError, UserId};

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: &Email) -> Result<(), DispatchError>;
}

/// Who receives a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    User(UserId),
    /// Broadcast to every user.
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub audience: Audience,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), DispatchError>;
}

/// Drops everything. Used when no delivery channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Mailer for Discard {
    fn send(&self, _email: &Email) -> Result<(), DispatchError> {
        Ok(())
    }
}

impl Notifier for Discard {
    fn notify(&self, _notification: &Notification) -> Result<(), DispatchError> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub mod recording {
    //! In-memory hooks that remember what they were asked to deliver.

    use std::sync::Mutex;

    use super::{Email, Mailer, Notification, Notifier};
    use crate::DispatchError;

    #[derive(Debug, Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
        fail: bool,
    }

    impl RecordingMailer {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// A mailer whose every send fails (after recording the attempt).
        #[must_use]
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        #[must_use]
        pub fn sent(&self) -> Vec<Email> {
            self.sent.lock().map(|g| g.clone()).unwrap_or_default()
        }
    }

    impl Mailer for RecordingMailer {
        fn send(&self, email: &Email) -> Result<(), DispatchError> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(email.clone());
            }
            if self.fail {
                return Err(DispatchError::new("email", "smtp unavailable"));
            }
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    impl RecordingNotifier {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        #[must_use]
        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().map(|g| g.clone()).unwrap_or_default()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) -> Result<(), DispatchError> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(notification.clone());
            }
            if self.fail {
                return Err(DispatchError::new("push", "push gateway unavailable"));
            }
            Ok(())
        }
    }
}
