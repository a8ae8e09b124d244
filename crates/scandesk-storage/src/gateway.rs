//! Persistence gateway for sessions and scans.
//!
//! The coordinator hands every session transition and accepted scan to a
//! [`PersistenceGateway`]. Writes are append-only from the coordinator's
//! point of view; it never reads them back.

use crate::error::{StorageError, StorageResult};
use crate::models::{StoredScan, StoredSession};
use chrono::{DateTime, Utc};
use scandesk_core::{ScanRecord, Session, SessionId};
use sqlx::SqlitePool;
use std::future::Future;
use tracing::trace;

/// Write side of durable storage.
///
/// Implementations report backend outages as errors for which
/// [`StorageError::is_transient`] is `true`; the caller decides whether to
/// retry.
pub trait PersistenceGateway: Send + Sync + 'static {
    /// Record a newly started session.
    fn append_session(&self, session: &Session) -> impl Future<Output = StorageResult<()>> + Send;

    /// Record the end of a session.
    fn close_session(
        &self,
        session_id: SessionId,
        ended_at: DateTime<Utc>,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Record an accepted scan.
    fn append_scan(&self, record: &ScanRecord) -> impl Future<Output = StorageResult<()>> + Send;
}

/// SQLite implementation of [`PersistenceGateway`]
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Create a new SQLite session store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a session by ID
    pub async fn find_session(&self, session_id: SessionId) -> StorageResult<Option<StoredSession>> {
        let session = sqlx::query_as::<_, StoredSession>(
            r#"
            SELECT id, user_id, started_at, ended_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Sessions still open in storage, oldest first.
    pub async fn open_sessions(&self) -> StorageResult<Vec<StoredSession>> {
        let sessions = sqlx::query_as::<_, StoredSession>(
            r#"
            SELECT id, user_id, started_at, ended_at
            FROM sessions
            WHERE ended_at IS NULL
            ORDER BY started_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Scans recorded for a session, in capture order
    pub async fn scans_for_session(&self, session_id: SessionId) -> StorageResult<Vec<StoredScan>> {
        let scans = sqlx::query_as::<_, StoredScan>(
            r#"
            SELECT id, session_id, raw_payload, payload_format, parsed_fields,
                   captured_at, source_id
            FROM scans
            WHERE session_id = ?
            ORDER BY captured_at, id
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(scans)
    }
}

impl PersistenceGateway for SqliteSessionStore {
    async fn append_session(&self, session: &Session) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, started_at, ended_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.user_id.as_i64())
        .bind(session.started_at)
        .bind(session.ended_at)
        .execute(&self.pool)
        .await?;

        trace!(session_id = %session.id, "session row inserted");
        Ok(())
    }

    async fn close_session(&self, session_id: SessionId, ended_at: DateTime<Utc>) -> StorageResult<()> {
        let result = sqlx::query("UPDATE sessions SET ended_at = ? WHERE id = ?")
            .bind(ended_at)
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Session", "id", session_id));
        }

        trace!(session_id = %session_id, "session row closed");
        Ok(())
    }

    async fn append_scan(&self, record: &ScanRecord) -> StorageResult<()> {
        let fields = record
            .parsed
            .fields_json()
            .map(|value| serde_json::to_string(&value))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO scans (
                session_id, raw_payload, payload_format, parsed_fields,
                captured_at, source_id
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.session_id.to_string())
        .bind(&record.raw_payload)
        .bind(record.parsed.format_name())
        .bind(fields)
        .bind(record.captured_at)
        .bind(i64::from(record.source_id.index()))
        .execute(&self.pool)
        .await?;

        trace!(session_id = %record.session_id, "scan row inserted");
        Ok(())
    }
}
