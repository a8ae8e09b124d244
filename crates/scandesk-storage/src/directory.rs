//! Badge directory: maps RFID tags to users.

use crate::error::{StorageError, StorageResult};
use crate::models::DirectoryUser;
use scandesk_core::{TagId, UserProfile};
use sqlx::SqlitePool;
use std::future::Future;
use tracing::info;

/// Resolves a normalized tag to the user it belongs to.
pub trait TagResolver: Send + Sync + 'static {
    /// Returns `Ok(None)` when no active user holds `tag`.
    fn resolve(&self, tag: &TagId) -> impl Future<Output = StorageResult<Option<UserProfile>>> + Send;
}

/// SQLite-backed badge directory
#[derive(Debug, Clone)]
pub struct SqliteTagDirectory {
    pool: SqlitePool,
}

impl SqliteTagDirectory {
    /// Create a new SQLite tag directory
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a user holding `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] if the display name is blank or
    /// the tag is already registered.
    pub async fn add_user(&self, display_name: &str, tag: &TagId) -> StorageResult<UserProfile> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(StorageError::Validation(
                "display name must not be empty".to_string(),
            ));
        }

        let result = sqlx::query("INSERT INTO users (display_name, tag_id) VALUES (?, ?)")
            .bind(display_name)
            .bind(tag.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_unique_violation() => {
                    StorageError::Validation(format!("tag {tag} is already registered"))
                }
                _ => StorageError::Database(e),
            })?;

        let user = DirectoryUser {
            id: result.last_insert_rowid(),
            display_name: display_name.to_string(),
            tag_id: tag.to_string(),
            active: true,
        };
        info!(user_id = user.id, tag = %tag, "user registered");
        Ok(user.into())
    }

    /// Find a user by tag, active or not
    pub async fn find_by_tag(&self, tag: &TagId) -> StorageResult<Option<DirectoryUser>> {
        let user = sqlx::query_as::<_, DirectoryUser>(
            r#"
            SELECT id, display_name, tag_id, active
            FROM users
            WHERE tag_id = ?
            "#,
        )
        .bind(tag.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Enable or disable a tag without deleting the user.
    pub async fn set_active(&self, tag: &TagId, active: bool) -> StorageResult<()> {
        let result = sqlx::query("UPDATE users SET active = ? WHERE tag_id = ?")
            .bind(active)
            .bind(tag.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("User", "tag_id", tag));
        }
        Ok(())
    }
}

impl TagResolver for SqliteTagDirectory {
    async fn resolve(&self, tag: &TagId) -> StorageResult<Option<UserProfile>> {
        let user = self.find_by_tag(tag).await?;
        Ok(user.filter(|u| u.active).map(UserProfile::from))
    }
}
