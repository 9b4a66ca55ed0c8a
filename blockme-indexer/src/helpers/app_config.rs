use std::time::Duration;

use blockme_sqlx::providers::ledger::schema::validate_schema_name;
use serde::Deserialize;

use crate::helpers::config::{
    default_chunk_size, default_insertion_error_file, default_log_filter, default_pg_database_name,
    default_pg_host, default_pg_port, default_pg_username, default_request_delay_micros,
    default_request_timeout_secs, default_rpc_host, default_rpc_port, default_schema,
    default_workers,
};
use crate::interfaces::error::IngestError;

pub const ENV_PREFIX: &str = "BLOCKME_";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_rpc_host")]
    pub rpc_host: String,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    /// Pause before every request to the node.
    #[serde(default = "default_request_delay_micros")]
    pub request_delay_micros: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_workers")]
    pub workers: u64,
    /// Takes precedence over the `pg_*` settings.
    pub database_url: Option<String>,
    #[serde(default = "default_pg_username")]
    pub pg_username: String,
    #[serde(default)]
    pub pg_password: String,
    #[serde(default = "default_pg_host")]
    pub pg_host: String,
    #[serde(default = "default_pg_port")]
    pub pg_port: u16,
    #[serde(default = "default_pg_database_name")]
    pub pg_database_name: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    pub log_file: Option<String>,
    #[serde(default = "default_insertion_error_file")]
    pub insertion_error_file: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl AppConfig {
    pub fn load_from_env() -> Result<Self, IngestError> {
        let config = envy::prefixed(ENV_PREFIX)
            .from_env::<AppConfig>()
            .map_err(|e| IngestError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_iter<I>(vars: I) -> Result<Self, IngestError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::prefixed(ENV_PREFIX)
            .from_iter::<_, AppConfig>(vars)
            .map_err(|e| IngestError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::Config("chunk_size must be positive".to_string()));
        }
        if self.workers == 0 {
            return Err(IngestError::Config("workers must be positive".to_string()));
        }
        validate_schema_name(&self.schema).map_err(|e| IngestError::Config(e.to_string()))
    }

    pub fn rpc_url(&self) -> String {
        format!("{}:{}", self.rpc_host, self.rpc_port)
    }

    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.pg_username, self.pg_password, self.pg_host, self.pg_port, self.pg_database_name
            ),
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_micros(self.request_delay_micros)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = AppConfig::load_from_iter(vars(&[("BLOCKME_PG_USERNAME", "alice")])).unwrap();
        assert_eq!(config.rpc_url(), "http://127.0.0.1:8545");
        assert_eq!(config.chunk_size, 10_000);
        assert_eq!(config.workers, 1);
        assert_eq!(config.schema, "ethereum");
        assert_eq!(config.request_delay(), Duration::from_micros(100));
        assert_eq!(config.insertion_error_file, "insertion_errors.log");
        assert!(config.log_file.is_none());
        assert_eq!(
            config.database_url(),
            "postgresql://alice:@127.0.0.1:5432/devdb"
        );
    }

    #[test]
    fn prefixed_variables_override_defaults() {
        let config = AppConfig::load_from_iter(vars(&[
            ("BLOCKME_RPC_HOST", "http://geth"),
            ("BLOCKME_RPC_PORT", "8645"),
            ("BLOCKME_CHUNK_SIZE", "500"),
            ("BLOCKME_REQUEST_DELAY_MICROS", "2500"),
            ("BLOCKME_DATABASE_URL", "postgres://u:p@db/mirror"),
            ("BLOCKME_LOG_FILE", "/var/log/blockme.log"),
            ("UNRELATED", "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.rpc_url(), "http://geth:8645");
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.request_delay(), Duration::from_micros(2500));
        assert_eq!(config.database_url(), "postgres://u:p@db/mirror");
        assert_eq!(config.log_file.as_deref(), Some("/var/log/blockme.log"));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = AppConfig::load_from_iter(vars(&[("BLOCKME_CHUNK_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[test]
    fn quoted_schema_is_rejected() {
        let err = AppConfig::load_from_iter(vars(&[("BLOCKME_SCHEMA", "eth; drop")])).unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[test]
    fn malformed_number_is_a_config_error() {
        let err = AppConfig::load_from_iter(vars(&[("BLOCKME_RPC_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }
}
