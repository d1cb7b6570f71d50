//! Postgres connection pool, versioned migrations, and the pgvector
//! conversion used by every store that persists an [`Embedding`].

pub mod migrator;
pub mod pool;
pub mod vector;

pub use migrator::{MigrationAction, MigrationError, MigrationStatus, Migrator};
pub use pool::{connect_pool, DbError};
