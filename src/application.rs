//! Application layer
//!
//! Orchestrates a collection run on top of the domain types and the
//! infrastructure collaborators.

pub mod collection_session;
pub mod pacing;
pub mod readiness;

pub use collection_session::{CollectionSession, SessionOptions};
pub use pacing::Pacer;
pub use readiness::{PageReadinessGate, ReadinessVerdict};
