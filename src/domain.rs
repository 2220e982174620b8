//! Domain module - listing records, selectors and collaborator interfaces
//!
//! Pure data types and traits; no parsing, I/O or scheduling lives here.

pub mod errors;
pub mod record;
pub mod selector;
pub mod services;
pub mod session_state;

pub use errors::{CollectionError, CollectionResult, PersistError};
pub use record::{CandidateRecord, FieldValue, Rejection, RejectionReason, ValidRecord};
pub use selector::{FieldSelector, PageType, ScopeKey, SelectorSet, BASE_CONTAINER_FIELD};
pub use services::{
    PageDiagnostics, PageHandle, PageRenderer, PersistOutcome, PersistenceMode, RecordSink,
};
pub use session_state::{CollectionState, PageOutcome, PageTarget, SessionSummary, StopReason};
