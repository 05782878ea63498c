//! SQLite storage layer -- schema, typed collections, queries.
//!
//! Every collection the agents share lives in its own table. Rows are
//! translated into typed records in [`records`]; nothing outside this module
//! touches raw column values.

pub mod records;
pub mod schema;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::warn;

use crate::detect::{AlertId, ThreatLevel, ThreatStore};
use self::records::{
    Alert, AlertRow, CameraFeed, CameraFeedRow, CityInsight, InsightRow, NewAlert, NewInsight,
    NewPost, NewSample, Sample, SampleRow, Sentiment, SentimentRecord, SentimentRow, SocialPost,
    SocialPostRow,
};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Fixed document id of the camera feed the dashboard listens to.
pub const CAMERA_FEED_DOC_ID: &str = "main_alert_camera_feed";

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {}", parent.display()))?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Format a timestamp the way every table stores it.
///
/// Fixed-width microsecond RFC 3339 in UTC, so lexical order is time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Typed access to the shared document store.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Open the database at `path` and wrap it.
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self::new(open_pool(path)?))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Run `f` against the store on tokio's blocking pool.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .context("store task panicked")?
    }

    // -- crowd_data --------------------------------------------------------

    pub fn append_sample(&self, sample: &NewSample) -> Result<i64> {
        self.append_sample_at(sample, Utc::now())
    }

    /// Append a density sample with an explicit timestamp.
    pub fn append_sample_at(&self, sample: &NewSample, ts: DateTime<Utc>) -> Result<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO crowd_data (location_name, density, latitude, longitude, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sample.location_name,
                sample.density,
                sample.latitude,
                sample.longitude,
                format_timestamp(ts)
            ],
        )
        .context("failed to insert crowd sample")?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent samples first, at most `limit` of them.
    pub fn recent_samples(&self, limit: usize) -> Result<Vec<Sample>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, location_name, density, latitude, longitude, created_at
             FROM crowd_data ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SampleRow {
                id: row.get(0)?,
                location_name: row.get(1)?,
                density: row.get(2)?,
                latitude: row.get(3)?,
                longitude: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;

        let mut samples = Vec::new();
        for r in rows {
            if let Some(sample) = r?.into_sample() {
                samples.push(sample);
            }
        }
        Ok(samples)
    }

    // -- threat_alerts -----------------------------------------------------

    /// Append an alert; the timestamp is assigned here, not by the caller.
    pub fn append_alert(&self, alert: &NewAlert) -> Result<AlertId> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::new_v4();
        conn.execute(
            "INSERT INTO threat_alerts
                (id, location_name, latitude, longitude, threat_type, threat_level, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.to_string(),
                alert.location_name,
                alert.latitude,
                alert.longitude,
                alert.threat_type,
                alert.threat_level.as_str(),
                alert.details,
                format_timestamp(Utc::now())
            ],
        )
        .context("failed to insert threat alert")?;
        Ok(id)
    }

    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>> {
        self.query_alerts(
            "SELECT id, location_name, latitude, longitude, threat_type, threat_level, details, created_at
             FROM threat_alerts ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            params![limit as i64],
        )
    }

    /// The newest alert at exactly `level`, if any.
    pub fn latest_alert_at_level(&self, level: ThreatLevel) -> Result<Option<Alert>> {
        let alerts = self.query_alerts(
            "SELECT id, location_name, latitude, longitude, threat_type, threat_level, details, created_at
             FROM threat_alerts WHERE threat_level = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            params![level.as_str()],
        )?;
        Ok(alerts.into_iter().next())
    }

    fn query_alerts(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Alert>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| {
            Ok(AlertRow {
                id: row.get(0)?,
                location_name: row.get(1)?,
                latitude: row.get(2)?,
                longitude: row.get(3)?,
                threat_type: row.get(4)?,
                threat_level: row.get(5)?,
                details: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;

        let mut alerts = Vec::new();
        for r in rows {
            let row = r?;
            let id = row.id.clone();
            match row.into_alert() {
                Some(alert) => alerts.push(alert),
                None => warn!(alert_id = %id, "Skipping malformed threat alert row"),
            }
        }
        Ok(alerts)
    }

    // -- social_media_feeds ------------------------------------------------

    pub fn append_post(&self, post: &NewPost) -> Result<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO social_media_feeds
                (location_name, latitude, longitude, text_content, processed, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                post.location_name,
                post.latitude,
                post.longitude,
                post.text_content,
                format_timestamp(Utc::now())
            ],
        )
        .context("failed to insert social post")?;
        Ok(conn.last_insert_rowid())
    }

    /// Posts still waiting for sentiment analysis, oldest first.
    pub fn unprocessed_posts(&self, limit: usize) -> Result<Vec<SocialPost>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, location_name, latitude, longitude, text_content, processed, sentiment_raw, created_at
             FROM social_media_feeds WHERE processed = 0 ORDER BY id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SocialPostRow {
                id: row.get(0)?,
                location_name: row.get(1)?,
                latitude: row.get(2)?,
                longitude: row.get(3)?,
                text_content: row.get(4)?,
                processed: row.get(5)?,
                sentiment_raw: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;

        let mut posts = Vec::new();
        for r in rows {
            posts.push(r?.into_post());
        }
        Ok(posts)
    }

    /// Flag a post as processed, storing the raw label when there is one.
    pub fn mark_post_processed(&self, id: i64, sentiment: Option<Sentiment>) -> Result<()> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE social_media_feeds SET processed = 1, sentiment_raw = ?2 WHERE id = ?1",
            params![id, sentiment.map(|s| s.as_str())],
        )?;
        if changed == 0 {
            anyhow::bail!("social post {} not found", id);
        }
        Ok(())
    }

    // -- sentiment_data ----------------------------------------------------

    pub fn append_sentiment(&self, record: &SentimentRecord) -> Result<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO sentiment_data
                (location_name, latitude, longitude, text_content, sentiment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.location_name,
                record.latitude,
                record.longitude,
                record.text_content,
                record.sentiment.as_str(),
                format_timestamp(record.timestamp)
            ],
        )
        .context("failed to insert sentiment record")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn recent_sentiment(&self, limit: usize) -> Result<Vec<SentimentRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT location_name, latitude, longitude, text_content, sentiment, created_at
             FROM sentiment_data ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SentimentRow {
                location_name: row.get(0)?,
                latitude: row.get(1)?,
                longitude: row.get(2)?,
                text_content: row.get(3)?,
                sentiment: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for r in rows {
            if let Some(record) = r?.into_record() {
                records.push(record);
            }
        }
        Ok(records)
    }

    // -- city_insights -----------------------------------------------------

    pub fn append_insight(&self, insight: &NewInsight) -> Result<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO city_insights (summary, generated_by_agent, model_used, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                insight.summary,
                insight.generated_by_agent,
                insight.model_used,
                format_timestamp(Utc::now())
            ],
        )
        .context("failed to insert city insight")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn latest_insight(&self) -> Result<Option<CityInsight>> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                "SELECT id, summary, generated_by_agent, model_used, created_at
                 FROM city_insights ORDER BY created_at DESC, id DESC LIMIT 1",
                [],
                |row| {
                    Ok(InsightRow {
                        id: row.get(0)?,
                        summary: row.get(1)?,
                        generated_by_agent: row.get(2)?,
                        model_used: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row.and_then(InsightRow::into_insight))
    }

    // -- camera_feeds ------------------------------------------------------

    /// Replace the fixed camera feed document.
    pub fn upsert_camera_feed(&self, feed: &CameraFeed) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO camera_feeds (id, image_url, location_name, alert_level, details, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                image_url = excluded.image_url,
                location_name = excluded.location_name,
                alert_level = excluded.alert_level,
                details = excluded.details,
                updated_at = excluded.updated_at",
            params![
                CAMERA_FEED_DOC_ID,
                feed.image_url,
                feed.location_name,
                feed.alert_level.as_str(),
                feed.details,
                format_timestamp(feed.timestamp)
            ],
        )
        .context("failed to upsert camera feed")?;
        Ok(())
    }

    pub fn camera_feed(&self) -> Result<Option<CameraFeed>> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                "SELECT image_url, location_name, alert_level, details, updated_at
                 FROM camera_feeds WHERE id = ?1",
                params![CAMERA_FEED_DOC_ID],
                |row| {
                    Ok(CameraFeedRow {
                        image_url: row.get(0)?,
                        location_name: row.get(1)?,
                        alert_level: row.get(2)?,
                        details: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row.and_then(CameraFeedRow::into_feed))
    }
}

impl ThreatStore for Store {
    fn recent_samples(&self, limit: usize) -> Result<Vec<Sample>> {
        Store::recent_samples(self, limit)
    }

    fn append_alert(&self, alert: &NewAlert) -> Result<AlertId> {
        Store::append_alert(self, alert)
    }
}
