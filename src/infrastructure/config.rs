//! Configuration infrastructure
//!
//! One JSON file describes logging, storage, the renderer, the session to run
//! and the per page-type profiles. Retailer markup is never baked into the
//! defaults; selectors and profiles always come from the file or the database.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::domain::{CollectionError, CollectionResult, PageTarget, PersistenceMode};
use crate::infrastructure::parsing::PageProfile;
use crate::infrastructure::selector_registry::SelectorEntry;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub renderer: RendererConfig,
    pub session: SessionConfig,
    /// Profiles for every page type the crawler knows about
    pub page_types: Vec<PageTypeConfig>,
    /// Selector entries; merged with active rows from `field_selectors`
    pub selectors: Vec<SelectorEntry>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Directory for log files; defaults to `./logs`
    pub log_dir: Option<PathBuf>,

    pub file_name: String,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    /// Merge active rows of `field_selectors` into the registry
    pub load_selectors_from_db: bool,
    /// Take the page list from `page_urls` instead of `session.pages`
    pub load_pages_from_db: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            load_selectors_from_db: false,
            load_pages_from_db: false,
        }
    }
}

/// Settings for the bundled HTTP renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

/// The run to perform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub retailer: String,
    pub page_type: String,
    pub record_cap: u32,
    pub persistence_mode: PersistenceMode,
    /// Also append every inserted record to the history table
    pub mirror_to_history: bool,
    pub pages: Vec<PageTarget>,
    pub pacing: PacingConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retailer: String::new(),
            page_type: String::new(),
            record_cap: defaults::RECORD_CAP,
            persistence_mode: PersistenceMode::default(),
            mirror_to_history: false,
            pages: Vec::new(),
            pacing: PacingConfig::default(),
        }
    }
}

/// Jittered delay between pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: defaults::MIN_PAGE_DELAY_MS,
            max_delay_ms: defaults::MAX_PAGE_DELAY_MS,
        }
    }
}

/// Readiness thresholds for one page type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Minimum rendered content height (pixels, or bytes for static pages)
    pub min_content_height: u64,
    /// At least one of these must be present
    pub marker_selectors: Vec<String>,
    pub marker_attempts: u32,
    pub poll_interval_ms: u64,
    pub max_scroll_attempts: u32,
    pub settle_delay_ms: u64,
    /// Skeleton/loader markers that must disappear before extraction
    pub pending_markers: Vec<String>,
    pub pending_attempts: u32,
    /// Where page snapshots are written when a page is not ready
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            min_content_height: 0,
            marker_selectors: Vec::new(),
            marker_attempts: 10,
            poll_interval_ms: 500,
            max_scroll_attempts: 5,
            settle_delay_ms: 1000,
            pending_markers: Vec::new(),
            pending_attempts: 10,
            snapshot_dir: None,
        }
    }
}

/// Extraction profile plus session policy for one page type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageTypeConfig {
    #[serde(flatten)]
    pub profile: PageProfile,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    /// Stop the session on the first page failure
    #[serde(default)]
    pub fail_fast: bool,
}

impl AppConfig {
    pub fn page_type(&self, retailer: &str, page_type: &str) -> Option<&PageTypeConfig> {
        self.page_types
            .iter()
            .find(|p| p.profile.retailer == retailer && p.profile.page_type == page_type)
    }

    /// Checks that do not need the database
    pub fn validate(&self) -> CollectionResult<()> {
        let session = &self.session;
        if session.retailer.is_empty() || session.page_type.is_empty() {
            return Err(CollectionError::configuration(
                "session",
                "retailer and page_type must be set",
            ));
        }
        if session.record_cap == 0 {
            return Err(CollectionError::configuration("record_cap", "record cap must be greater than zero"));
        }
        if session.pacing.min_delay_ms > session.pacing.max_delay_ms {
            return Err(CollectionError::configuration(
                "pacing",
                "min_delay_ms must not exceed max_delay_ms",
            ));
        }
        if session.mirror_to_history && session.persistence_mode == PersistenceMode::AppendOnly {
            return Err(CollectionError::configuration(
                "mirror_to_history",
                "append_only sessions already write to the history table",
            ));
        }
        if self.page_type(&session.retailer, &session.page_type).is_none() {
            return Err(CollectionError::configuration(
                "page_types",
                format!("no profile for {}/{}", session.retailer, session.page_type),
            ));
        }
        if !self.database.load_pages_from_db && session.pages.is_empty() {
            return Err(CollectionError::configuration("pages", "page list is empty"));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub async fn load_config(&self) -> Result<AppConfig> {
        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read configuration file {:?}", self.config_path))?;

        let config: AppConfig =
            serde_json::from_str(&content).context("Failed to parse configuration file")?;

        info!("Loaded configuration from: {:?}", self.config_path);
        Ok(config)
    }

    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await.context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

pub mod defaults {
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "shelfwatch.log";
    pub const CONFIG_FILE: &str = "shelfwatch.json";
    pub const DATABASE_URL: &str = "sqlite:data/shelfwatch.db";
    pub const USER_AGENT: &str = "shelfwatch/0.1";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_RETRIES: u32 = 3;
    pub const RECORD_CAP: u32 = 100;
    pub const MIN_PAGE_DELAY_MS: u64 = 2000;
    pub const MAX_PAGE_DELAY_MS: u64 = 5000;
}
