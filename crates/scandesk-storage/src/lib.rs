//! Storage layer for ScanDesk.
//!
//! SQLite-backed persistence for sessions and scans, plus the badge
//! directory used to resolve RFID tags to users.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool manager with automatic migrations
//! - [`PersistenceGateway`] / [`SqliteSessionStore`] - append-only session and scan log
//! - [`TagResolver`] / [`SqliteTagDirectory`] - tag to user lookup
//!
//! The coordinator depends only on the two traits, so tests can substitute
//! in-memory or failing implementations.
//!
//! # Examples
//!
//! ```no_run
//! use scandesk_core::TagId;
//! use scandesk_storage::{Database, DatabaseConfig, SqliteTagDirectory, TagResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("scandesk.db")).await?;
//! let directory = SqliteTagDirectory::new(db.pool().clone());
//!
//! let tag = TagId::parse("04ab12cd")?;
//! directory.add_user("Ada", &tag).await?;
//!
//! if let Some(user) = directory.resolve(&tag).await? {
//!     println!("{} is user {}", user.display_name, user.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod models;

pub use connection::{Database, DatabaseConfig};
pub use directory::{SqliteTagDirectory, TagResolver};
pub use error::{StorageError, StorageResult};
pub use gateway::{PersistenceGateway, SqliteSessionStore};
pub use models::{DirectoryUser, StoredScan, StoredSession};
