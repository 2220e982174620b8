// Database connection and pool management
// This module handles SQLite database connections using sqlx

use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use tracing::info;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS field_selectors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        retailer TEXT NOT NULL,
        page_type TEXT NOT NULL,
        field_name TEXT NOT NULL,
        primary_selector TEXT NOT NULL,
        fallback_selectors TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        UNIQUE (retailer, page_type, field_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS page_urls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        retailer TEXT NOT NULL,
        page_type TEXT NOT NULL,
        page_number INTEGER NOT NULL,
        url TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS listing_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        retailer TEXT NOT NULL,
        page_type TEXT NOT NULL,
        record_key TEXT NOT NULL,
        page_number INTEGER NOT NULL,
        position INTEGER NOT NULL,
        rank INTEGER,
        fields TEXT NOT NULL,
        collected_at DATETIME NOT NULL,
        UNIQUE (retailer, page_type, record_key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS listing_records_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        retailer TEXT NOT NULL,
        page_type TEXT NOT NULL,
        record_key TEXT NOT NULL,
        page_number INTEGER NOT NULL,
        position INTEGER NOT NULL,
        rank INTEGER,
        fields TEXT NOT NULL,
        collected_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS collection_runs (
        session_id TEXT PRIMARY KEY,
        retailer TEXT NOT NULL,
        page_type TEXT NOT NULL,
        total_collected INTEGER NOT NULL,
        record_cap INTEGER NOT NULL,
        stop_reason TEXT NOT NULL,
        summary TEXT NOT NULL,
        started_at DATETIME NOT NULL,
        finished_at DATETIME NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_page_urls_scope ON page_urls (retailer, page_type, page_number)",
    "CREATE INDEX IF NOT EXISTS idx_history_scope ON listing_records_history (retailer, page_type, collected_at)",
];

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            let db_path = database_url
                .strip_prefix("sqlite://")
                .or_else(|| database_url.strip_prefix("sqlite:"))
                .unwrap_or(database_url);

            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            // Ensure the database file exists by creating it if necessary
            if !Path::new(db_path).exists() {
                tokio::fs::File::create(db_path).await?;
            }
        }

        // Every in-memory connection is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }
}
