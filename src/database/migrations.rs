//! # Database Migrations
//!
//! The pipeline schema ships as timestamped SQL files under `migrations/`
//! (`YYYYMMDDHHMMSS_description.sql`), embedded at compile time. sqlx records
//! applied versions in `_sqlx_migrations` and takes an advisory lock while
//! migrating, so concurrent starts are safe.

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::debug;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply every outstanding migration
    pub async fn run_all(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        debug!(
            migrations = MIGRATOR.iter().count(),
            "Applying pipeline schema migrations"
        );
        MIGRATOR.run(pool).await
    }
}
