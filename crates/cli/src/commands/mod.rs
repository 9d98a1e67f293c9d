//! Command implementations.

pub mod catalog;
pub mod migrate;
pub mod session;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by the database-backed commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Rows file could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Rows file is not a JSON array of rows.
    #[error("Invalid rows file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Output could not be encoded.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Catalog write rejected.
    #[error(transparent)]
    Catalog(#[from] shopfront_server::catalog::CatalogError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] shopfront_server::db::RepositoryError),
}

/// Connect using `SERVER_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("SERVER_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("SERVER_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(shopfront_server::db::create_pool(&SecretString::from(database_url)).await?)
}
