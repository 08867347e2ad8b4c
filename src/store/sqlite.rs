use crate::models::{Profile, ReportDocument};
use crate::store::ReportStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteReportStore {
    pool: Arc<SqlitePool>,
}

impl SqliteReportStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

/// Raw row shape; JSON columns are parsed into the document type.
#[derive(sqlx::FromRow)]
struct ReportRow {
    user_id: String,
    daily: String,
    links: String,
    sub_ids: String,
    traffic_sources: String,
    updated_at: i64,
    version: i64,
}

impl ReportRow {
    fn into_document(self) -> Result<ReportDocument> {
        Ok(ReportDocument {
            user_id: self.user_id,
            daily: serde_json::from_str(&self.daily).context("malformed daily column")?,
            links: serde_json::from_str(&self.links).context("malformed links column")?,
            sub_ids: serde_json::from_str(&self.sub_ids).context("malformed sub_ids column")?,
            traffic_sources: serde_json::from_str(&self.traffic_sources)
                .context("malformed traffic_sources column")?,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

fn epoch_secs() -> Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64)
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS report_documents (
                user_id TEXT PRIMARY KEY,
                daily TEXT NOT NULL,
                links TEXT NOT NULL,
                sub_ids TEXT NOT NULL,
                traffic_sources TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                version INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                email TEXT,
                referral_code TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn fetch_report(&self, user_id: &str) -> Result<Option<ReportDocument>> {
        let row = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT user_id, daily, links, sub_ids, traffic_sources, updated_at, version
            FROM report_documents
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(ReportRow::into_document).transpose()
    }

    async fn put_report(&self, doc: &ReportDocument) -> Result<bool> {
        let daily = serde_json::to_string(&doc.daily)?;
        let links = serde_json::to_string(&doc.links)?;
        let sub_ids = serde_json::to_string(&doc.sub_ids)?;
        let traffic_sources = serde_json::to_string(&doc.traffic_sources)?;

        let result = if doc.version == 0 {
            // Fresh document: only wins if no concurrent writer created
            // the row first
            sqlx::query(
                r#"
                INSERT INTO report_documents (user_id, daily, links, sub_ids, traffic_sources, updated_at, version)
                VALUES (?, ?, ?, ?, ?, ?, 1)
                ON CONFLICT(user_id) DO NOTHING
                "#,
            )
            .bind(&doc.user_id)
            .bind(daily)
            .bind(links)
            .bind(sub_ids)
            .bind(traffic_sources)
            .bind(doc.updated_at)
            .execute(self.pool.as_ref())
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE report_documents
                SET daily = ?, links = ?, sub_ids = ?, traffic_sources = ?,
                    updated_at = ?, version = version + 1
                WHERE user_id = ? AND version = ?
                "#,
            )
            .bind(daily)
            .bind(links)
            .bind(sub_ids)
            .bind(traffic_sources)
            .bind(doc.updated_at)
            .bind(&doc.user_id)
            .bind(doc.version)
            .execute(self.pool.as_ref())
            .await?
        };

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT user_id, email, referral_code, created_at
            FROM profiles
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(profile)
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        email: Option<&str>,
        referral_code: &str,
    ) -> Result<Profile> {
        let created_at = epoch_secs()?;

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, email, referral_code, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(referral_code)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?;

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT user_id, email, referral_code, created_at
            FROM profiles
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(profile)
    }

    async fn list_user_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT user_id FROM profiles ORDER BY user_id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ids)
    }
}
