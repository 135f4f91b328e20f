//! Contribution tracker service.
//!
//! Records confirmed on-chain contributions and serves per-sender history
//! and global totals over HTTP. Persistence sits behind
//! [`store::ContributionStore`], with a PostgreSQL implementation for
//! deployments and an in-memory one for development and tests.

pub mod api;
pub mod error;
pub mod store;

pub use api::{router, AppState};
