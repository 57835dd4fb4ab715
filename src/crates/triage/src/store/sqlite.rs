//! Sqlite-backed report store.
//!
//! List-valued report fields are stored as JSON array strings and the
//! environment as a JSON object string; timestamps are RFC 3339 text.

use crate::report::{Environment, QueueStatus, Report};
use crate::store::ReportStore;
use crate::{Result, TriageError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

/// Report store backed by a sqlite connection pool.
#[derive(Clone)]
pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    /// Connect to the database and run migrations.
    ///
    /// # Arguments
    /// * `database_url` - sqlite connection string (e.g. "sqlite:triage.db"
    ///   or "sqlite::memory:")
    pub async fn connect(database_url: &str) -> Result<Self> {
        // An in-memory database is private to its connection; a larger
        // pool would hand out empty databases.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| TriageError::Config(format!("migration failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Migrations are the caller's concern.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Perform a health check by running a simple query.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

/// Raw row shape; converted to [`Report`] after fetching.
#[derive(FromRow)]
struct ReportRow {
    id: i64,
    category: String,
    title: String,
    description: String,
    steps_to_reproduce: Option<String>,
    page: Option<String>,
    mood: Option<String>,
    submitter_classification: String,
    attachments: Option<String>,
    environment: Option<String>,
    console_errors: Option<String>,
    trust_score: f64,
    tracking_issue_number: Option<i64>,
    tracking_issue_url: Option<String>,
    queue_status: String,
    submitter_id: Option<String>,
    created_at: String,
    updated_at: String,
}

fn decode_list(column: Option<String>) -> Result<Vec<String>> {
    match column {
        Some(raw) if !raw.is_empty() => Ok(serde_json::from_str(&raw)?),
        _ => Ok(Vec::new()),
    }
}

impl ReportRow {
    fn into_report(self) -> Result<Report> {
        let environment = match self.environment {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
            _ => Environment::default(),
        };

        Ok(Report {
            id: self.id,
            category: self.category,
            title: self.title,
            description: self.description,
            steps_to_reproduce: decode_list(self.steps_to_reproduce)?,
            page: self.page,
            mood: self.mood,
            submitter_classification: self.submitter_classification,
            attachments: decode_list(self.attachments)?,
            environment,
            console_errors: decode_list(self.console_errors)?,
            trust_score: self.trust_score,
            tracking_issue_number: self.tracking_issue_number,
            tracking_issue_url: self.tracking_issue_url,
            queue_status: self.queue_status.parse()?,
            submitter_id: self.submitter_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn create(&self, report: Report) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let steps = serde_json::to_string(&report.steps_to_reproduce)?;
        let attachments = serde_json::to_string(&report.attachments)?;
        let console_errors = serde_json::to_string(&report.console_errors)?;
        let environment = serde_json::to_string(&report.environment)?;

        let row: (i64,) = sqlx::query_as(
            "INSERT INTO reports (category, title, description, steps_to_reproduce, page, mood, \
             submitter_classification, attachments, environment, console_errors, trust_score, \
             queue_status, submitter_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&report.category)
        .bind(&report.title)
        .bind(&report.description)
        .bind(&steps)
        .bind(&report.page)
        .bind(&report.mood)
        .bind(&report.submitter_classification)
        .bind(&attachments)
        .bind(&environment)
        .bind(&console_errors)
        .bind(report.trust_score)
        .bind(report.queue_status.to_string())
        .bind(&report.submitter_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn get(&self, id: i64) -> Result<Option<Report>> {
        let row: Option<ReportRow> = sqlx::query_as("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ReportRow::into_report).transpose()
    }

    async fn set_issue_reference(&self, id: i64, issue_number: i64, issue_url: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE reports SET tracking_issue_number = ?, tracking_issue_url = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(issue_number)
        .bind(issue_url)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TriageError::ReportNotFound(id));
        }
        Ok(())
    }

    async fn set_queue_status(&self, id: i64, status: QueueStatus) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        // Terminal statuses are sticky: the guard lives in the query so
        // concurrent workers cannot race a terminal report back out.
        let result = sqlx::query(
            "UPDATE reports SET queue_status = ?, updated_at = ? \
             WHERE id = ? AND queue_status NOT IN ('COMPLETED', 'FAILED')",
        )
        .bind(status.to_string())
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get(id).await?.ok_or(TriageError::ReportNotFound(id))?;
            return Err(TriageError::InvalidStateTransition {
                from: current.queue_status.to_string(),
                to: status.to_string(),
            });
        }
        Ok(())
    }
}
