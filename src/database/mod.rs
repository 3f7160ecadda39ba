//! # Database Operations
//!
//! PostgreSQL connection management and schema migrations for the pipeline
//! tracking tables.
//!
//! - [`connection`] - pool construction from configuration and health checks
//! - [`migrations`] - embedded schema migrations
//!
//! ```rust,no_run
//! use provider_pipeline::config::DatabaseConfig;
//! use provider_pipeline::database::DatabaseConnection;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseConnection::from_config(&DatabaseConfig::default()).await?;
//! assert!(db.health_check().await?);
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod migrations;

pub use connection::DatabaseConnection;
pub use migrations::{DatabaseMigrations, MIGRATOR};
