//! SQLite connection pool for the scan station.
//!
//! The pool is small on purpose: the coordinator issues one write at a time
//! and the operator tools only run short queries. Writers that cannot get a
//! connection within `acquire_timeout` fail with a transient error and are
//! retried by the coordinator, so scanning never blocks on the database.

use crate::error::{StorageError, StorageResult};
use scandesk_core::config::PersistenceConfig;
use scandesk_core::constants::DEFAULT_DATABASE_PATH;
use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// How to open the scan database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite file; parent directories are created on open.
    pub database_path: String,
    pub max_connections: u32,
    /// Wait for a free pooled connection before the write counts as failed.
    pub acquire_timeout: Duration,
    /// Wait on a locked database file before the statement fails.
    pub busy_timeout: Duration,
    pub create_if_missing: bool,
    /// Apply `migrations/` on open.
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(2),
            busy_timeout: Duration::from_secs(1),
            create_if_missing: true,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn auto_migrate(mut self, migrate: bool) -> Self {
        self.auto_migrate = migrate;
        self
    }

    fn connect_options(&self) -> StorageResult<SqliteConnectOptions> {
        let url = format!("sqlite://{}", self.database_path);
        let options = SqliteConnectOptions::from_str(&url).map_err(|e| {
            StorageError::Configuration(format!("invalid database path {}: {e}", self.database_path))
        })?;

        // WAL lets operator queries read while the coordinator writes.
        Ok(options
            .create_if_missing(self.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .disable_statement_logging())
    }
}

impl From<&PersistenceConfig> for DatabaseConfig {
    fn from(config: &PersistenceConfig) -> Self {
        Self::new(config.database_path.clone())
    }
}

/// Handle to the scan database. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (and by default migrate) the database file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use scandesk_storage::connection::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::new(DatabaseConfig::new("/var/lib/scandesk/desk.db")).await?;
    /// db.health_check().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// - [`StorageError::Configuration`] if the path is unusable.
    /// - [`StorageError::Database`] if SQLite cannot open the file.
    /// - [`StorageError::Migration`] if the schema cannot be applied.
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        ensure_parent_dir(Path::new(&config.database_path))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(config.connect_options()?)
            .await?;
        info!(
            path = %config.database_path,
            max_connections = config.max_connections,
            "scan database opened"
        );

        let db = Self { pool };
        if config.auto_migrate {
            db.migrate().await?;
        }
        Ok(db)
    }

    /// Migrated private database living in memory, for tests.
    pub async fn in_memory() -> StorageResult<Self> {
        // Every connection to `:memory:` is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply the embedded `migrations/` set. Already applied steps are skipped.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        debug!("scan database schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for checked-out connections to come back, then close them.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Configuration(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let config = DatabaseConfig::new("desk.db")
            .max_connections(0)
            .acquire_timeout(Duration::from_millis(250))
            .create_if_missing(false)
            .auto_migrate(false);

        assert_eq!(config.database_path, "desk.db");
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_millis(250));
        assert!(!config.create_if_missing);
        assert!(!config.auto_migrate);
    }

    #[test]
    fn test_defaults_favor_short_waits() {
        let config = DatabaseConfig::default();

        assert_eq!(config.database_path, "scandesk.db");
        assert!(config.acquire_timeout <= Duration::from_secs(2));
        assert!(config.busy_timeout <= config.acquire_timeout);
        assert!(config.create_if_missing);
        assert!(config.auto_migrate);
    }

    #[test]
    fn test_from_persistence_config() {
        let persistence = PersistenceConfig {
            database_path: "/var/lib/scandesk/desk.db".to_string(),
            ..PersistenceConfig::default()
        };
        let config = DatabaseConfig::from(&persistence);
        assert_eq!(config.database_path, "/var/lib/scandesk/desk.db");
    }

    #[test]
    fn test_parent_dir_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/desk.db");
        ensure_parent_dir(&path).unwrap();
        assert!(dir.path().join("nested/deeper").is_dir());
        ensure_parent_dir(Path::new("desk.db")).unwrap();
    }
}
