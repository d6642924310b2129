//! # rivalry-node
//!
//! Composition root for the **Rivalry** backend: reads [`Config`], installs
//! tracing, builds the ledger and match engine over the chosen stores and
//! runs the deploy-time account-hash backfill before serving.
//!
//! [`Config`]: rivalry_types::Config

pub mod node;
pub mod telemetry;

pub use node::{Collaborators, Node, Stores};
