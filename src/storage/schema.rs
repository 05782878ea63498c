//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

const SCHEMA_VERSION: i64 = 2;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS crowd_data (
            id INTEGER PRIMARY KEY,
            location_name TEXT,
            density REAL,
            latitude REAL,
            longitude REAL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS threat_alerts (
            id TEXT PRIMARY KEY,
            location_name TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            threat_type TEXT NOT NULL,
            threat_level TEXT NOT NULL,
            details TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS social_media_feeds (
            id INTEGER PRIMARY KEY,
            location_name TEXT,
            latitude REAL,
            longitude REAL,
            text_content TEXT,
            processed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sentiment_data (
            id INTEGER PRIMARY KEY,
            location_name TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            text_content TEXT NOT NULL,
            sentiment TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS city_insights (
            id INTEGER PRIMARY KEY,
            summary TEXT NOT NULL,
            generated_by_agent TEXT NOT NULL,
            model_used TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS camera_feeds (
            id TEXT PRIMARY KEY,
            image_url TEXT NOT NULL,
            location_name TEXT NOT NULL,
            alert_level TEXT NOT NULL,
            details TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_crowd_data_created ON crowd_data(created_at);
        CREATE INDEX IF NOT EXISTS idx_threat_alerts_created ON threat_alerts(created_at);
        CREATE INDEX IF NOT EXISTS idx_threat_alerts_level ON threat_alerts(threat_level, created_at);
        CREATE INDEX IF NOT EXISTS idx_social_processed ON social_media_feeds(processed, id);
        CREATE INDEX IF NOT EXISTS idx_sentiment_created ON sentiment_data(created_at);
        CREATE INDEX IF NOT EXISTS idx_insights_created ON city_insights(created_at);",
    )?;

    // Migration: posts gained a raw sentiment label in v2
    let has_sentiment_raw: i32 = conn
        .query_row(
            "SELECT count(*) FROM pragma_table_info('social_media_feeds') WHERE name='sentiment_raw'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if has_sentiment_raw == 0 {
        conn.execute(
            "ALTER TABLE social_media_feeds ADD COLUMN sentiment_raw TEXT",
            [],
        )?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}
