//! Infrastructure layer for storage, rendering, parsing and configuration
//!
//! Everything that touches the outside world (SQLite, HTTP, files, the
//! tracing subscriber) or parses HTML lives here.

pub mod config;
pub mod database_connection;
pub mod logging;
pub mod parsing;
pub mod record_repository;
pub mod rendering;
pub mod selector_registry;

pub use config::{AppConfig, ConfigManager, PacingConfig, PageTypeConfig, ReadinessConfig};
pub use database_connection::DatabaseConnection;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use parsing::{PageExtraction, PageExtractor, PageProfile, ParseContext, ParsingError};
pub use record_repository::{
    CollectionRunRepository, MemoryRecordSink, PageUrlRepository, SqliteRecordSink, TeeSink,
};
pub use rendering::{HttpPageRenderer, StaticPage};
pub use selector_registry::{SelectorEntry, SelectorRegistry};
