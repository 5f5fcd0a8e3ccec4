//! SQLite persistence for the autograph catalog. Owns the signers,
//! autographs, and scrape_runs tables.
//!
//! Every public operation is one atomic unit: it acquires the single pooled
//! connection, commits before returning, and never leaves a partial write
//! visible. Storage errors propagate; a catalog that cannot be written is
//! fatal to the run.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use autograph_common::Listing;

pub struct CatalogStore {
    pool: SqlitePool,
}

/// What `upsert_listing` did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New row written.
    Inserted,
    /// URL already cataloged; only last_seen and run_id were touched.
    Updated,
    /// Unattributed record, rejected at the storage boundary.
    Skipped,
}

/// A row from the autographs table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredListing {
    pub id: i64,
    pub title: String,
    pub price: String,
    pub img_url: String,
    pub listing_url: String,
    pub category: String,
    pub signer_id: i64,
    pub confidence: f64,
    pub last_seen: DateTime<Utc>,
    pub run_id: i64,
}

impl CatalogStore {
    /// Open (creating if needed) the file-backed catalog.
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        // One connection: operations serialize instead of contending for
        // the SQLite write lock.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open catalog at {path}"))?;

        info!(path, "Catalog store opened");
        Ok(Self { pool })
    }

    /// In-memory catalog. Used by tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory catalog")?;
        Ok(Self { pool })
    }

    /// Idempotent schema creation. Never destructive: existing tables and
    /// their data are left untouched.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signers (
                id INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL,
                category TEXT NOT NULL,
                birth_year INTEGER,
                active_years TEXT,
                nationality TEXT,
                notable_works TEXT,
                deceased BOOLEAN,
                UNIQUE(full_name, category)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS autographs (
                id INTEGER PRIMARY KEY,
                title TEXT,
                price TEXT,
                img_url TEXT,
                listing_url TEXT UNIQUE,
                category TEXT,
                signer_id INTEGER,
                confidence REAL,
                last_seen TIMESTAMP,
                run_id INTEGER,
                FOREIGN KEY (signer_id) REFERENCES signers(id),
                FOREIGN KEY (run_id) REFERENCES scrape_runs(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scrape_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                notes TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Open a new scrape run and return its id. Run rows are immutable
    /// provenance tags; listings reference the run that last saw them.
    pub async fn create_run(&self, note: &str) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO scrape_runs (notes) VALUES (?1) RETURNING id",
        )
        .bind(note)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create scrape run")?;

        Ok(id)
    }

    /// Lookup-or-insert by (full_name, category). A uniqueness race with a
    /// concurrent equivalent insert resolves to the existing row.
    pub async fn get_or_create_signer(&self, name: &str, category: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = Self::signer_id(&mut *tx, name, category).await?;
        tx.commit().await?;
        Ok(id)
    }

    async fn signer_id(
        conn: &mut SqliteConnection,
        name: &str,
        category: &str,
    ) -> Result<i64> {
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM signers WHERE full_name = ?1 AND category = ?2",
        )
        .bind(name)
        .bind(category)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(id) = existing {
            return Ok(id);
        }

        sqlx::query(
            "INSERT INTO signers (full_name, category) VALUES (?1, ?2)
             ON CONFLICT(full_name, category) DO NOTHING",
        )
        .bind(name)
        .bind(category)
        .execute(&mut *conn)
        .await?;

        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM signers WHERE full_name = ?1 AND category = ?2",
        )
        .bind(name)
        .bind(category)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    /// Idempotent listing write keyed by listing_url. A resighted URL gets
    /// its last_seen and run_id refreshed; everything else on the row is
    /// left as first recorded. Unattributed records never reach a row.
    pub async fn upsert_listing(&self, listing: &Listing, run_id: i64) -> Result<UpsertOutcome> {
        if listing.is_unknown() {
            debug!(listing_url = listing.listing_url.as_str(), "Skipping unattributed listing");
            return Ok(UpsertOutcome::Skipped);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let signer_id = Self::signer_id(&mut *tx, &listing.signer, &listing.category).await?;

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM autographs WHERE listing_url = ?1",
        )
        .bind(&listing.listing_url)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some(_) => {
                sqlx::query(
                    "UPDATE autographs SET last_seen = ?1, run_id = ?2 WHERE listing_url = ?3",
                )
                .bind(now)
                .bind(run_id)
                .bind(&listing.listing_url)
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Updated
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO autographs
                        (title, price, img_url, listing_url,
                         category, signer_id, confidence, last_seen, run_id)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                )
                .bind(&listing.title)
                .bind(&listing.price)
                .bind(&listing.img_url)
                .bind(&listing.listing_url)
                .bind(&listing.category)
                .bind(signer_id)
                .bind(listing.confidence)
                .bind(now)
                .bind(run_id)
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Dedup gate: true iff every candidate URL is already cataloged. A
    /// fully-known page contributes nothing and can be skipped wholesale;
    /// a partially-known page is not skipped.
    pub async fn already_fully_known(&self, urls: &[String]) -> Result<bool> {
        if urls.is_empty() {
            return Ok(true);
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT listing_url FROM autographs WHERE listing_url IN (");
        let mut separated = qb.separated(", ");
        for url in urls {
            separated.push_bind(url);
        }
        qb.push(")");

        let found: Vec<String> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .context("Dedup gate query failed")?;

        let found: HashSet<&str> = found.iter().map(|s| s.as_str()).collect();
        Ok(urls.iter().all(|u| found.contains(u.as_str())))
    }

    /// Fetch one cataloged listing by URL. Used by tests and spot checks.
    pub async fn find_listing(&self, listing_url: &str) -> Result<Option<StoredListing>> {
        let row = sqlx::query_as::<_, StoredListing>(
            "SELECT * FROM autographs WHERE listing_url = ?1",
        )
        .bind(listing_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn listing_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM autographs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
