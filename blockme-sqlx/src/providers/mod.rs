pub mod ledger;

use sqlx::{
    migrate::MigrateDatabase,
    postgres::{PgPool, PgPoolOptions},
    Error as SqlxError, Postgres,
};
use tracing::info;

const MAX_CONNECTIONS: u32 = 5;

/// SQLSTATE codes that mean the store itself is not usable as expected.
const UNDEFINED_TABLE: &str = "42P01";
const UNDEFINED_COLUMN: &str = "42703";
const INVALID_SCHEMA_NAME: &str = "3F000";

/// A context for SQLx database.
#[derive(Debug, Clone)]
pub struct SqlxCtx {
    pub pool: PgPool,
}

impl SqlxCtx {
    pub async fn new(db_url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            pool: PgPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect(db_url)
                .await?,
        })
    }

    /// Connects to the database, creating it first if it doesn't exist.
    pub async fn create_if_missing(db_url: &str) -> Result<Self, StoreError> {
        info!("Checking if database exists...");
        if !Postgres::database_exists(db_url).await? {
            info!("The database doesn't exist, creating it...");
            Postgres::create_database(db_url).await?;
            info!("Database created.");
        } else {
            info!("Database exists.");
        }

        Self::new(db_url).await
    }
}

/// Errors surfaced by the ledger store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Data value error: {0}")]
    DataValue(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<SqlxError> for StoreError {
    fn from(e: SqlxError) -> Self {
        match &e {
            SqlxError::Database(db) => {
                if db.is_unique_violation() {
                    StoreError::DuplicateKey(db.message().to_string())
                } else if db.is_foreign_key_violation() {
                    StoreError::Schema(format!("referential integrity: {}", db.message()))
                } else {
                    match db.code().as_deref() {
                        Some(UNDEFINED_TABLE) | Some(UNDEFINED_COLUMN)
                        | Some(INVALID_SCHEMA_NAME) => StoreError::Schema(db.message().to_string()),
                        _ => StoreError::Database(e.to_string()),
                    }
                }
            }
            SqlxError::Io(_)
            | SqlxError::Tls(_)
            | SqlxError::PoolTimedOut
            | SqlxError::PoolClosed => StoreError::Connection(e.to_string()),
            _ => StoreError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    /// A server-side failure carrying only a SQLSTATE code.
    #[derive(Debug)]
    struct ServerError {
        code: &'static str,
    }

    impl fmt::Display for ServerError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "server error {}", self.code)
        }
    }

    impl StdError for ServerError {}

    impl DatabaseError for ServerError {
        fn message(&self) -> &str {
            "server error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.code {
                "23505" => ErrorKind::UniqueViolation,
                "23503" => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn server_error(code: &'static str) -> StoreError {
        StoreError::from(SqlxError::Database(Box::new(ServerError { code })))
    }

    #[test]
    fn unique_violations_are_duplicate_keys() {
        assert!(matches!(server_error("23505"), StoreError::DuplicateKey(_)));
    }

    #[test]
    fn foreign_key_violations_are_schema_errors() {
        match server_error("23503") {
            StoreError::Schema(message) => assert!(message.starts_with("referential integrity")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_relations_are_schema_errors() {
        for code in [UNDEFINED_TABLE, UNDEFINED_COLUMN, INVALID_SCHEMA_NAME] {
            assert!(matches!(server_error(code), StoreError::Schema(_)), "{code}");
        }
    }

    #[test]
    fn other_server_errors_are_database_errors() {
        // invalid_text_representation
        assert!(matches!(server_error("22P02"), StoreError::Database(_)));
    }

    #[test]
    fn pool_failures_are_connection_errors() {
        assert!(matches!(
            StoreError::from(SqlxError::PoolTimedOut),
            StoreError::Connection(_)
        ));
        assert!(matches!(
            StoreError::from(SqlxError::PoolClosed),
            StoreError::Connection(_)
        ));
    }

    #[test]
    fn io_failures_are_connection_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            StoreError::from(SqlxError::Io(io)),
            StoreError::Connection(_)
        ));
    }

    #[test]
    fn other_failures_are_database_errors() {
        assert!(matches!(
            StoreError::from(SqlxError::RowNotFound),
            StoreError::Database(_)
        ));
    }
}
