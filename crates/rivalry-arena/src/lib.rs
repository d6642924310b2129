//! # rivalry-arena
//!
//! Match lifecycle for the **Rivalry** backend.
//!
//! ```text
//!   MatchEngine ──► MatchRepository (matches, room-code index)
//!        │
//!        ├────────► Ledger (lock / unlock / entry fee / prize)
//!        │
//!        └────────► Hooks: Notifier, Mailer, UserDirectory, EventSink
//!                                                    │
//!                                                    ▼
//!                                          LiveUpdates ──► Subscription
//! ```
//!
//! - [`schedule`]: display date/time strings to instants
//! - [`geo`]: haversine distance for discovery
//! - [`repository`]: match storage with optimistic versioning
//! - [`live`]: per-match publish/subscribe
//! - [`input`]: typed request bodies
//! - [`engine`]: the lifecycle operations

pub mod engine;
pub mod geo;
pub mod hooks;
pub mod input;
pub mod live;
pub mod repository;
pub mod schedule;

pub use engine::MatchEngine;
pub use hooks::{Hooks, MemoryDirectory, UserDirectory};
pub use input::{CreateMatch, DiscoveryQuery, ResultSubmission, UpdateMatch};
pub use live::{EventSink, LiveUpdates, Subscription};
pub use repository::{MatchFilter, MatchRepository, MemoryMatchStore};
