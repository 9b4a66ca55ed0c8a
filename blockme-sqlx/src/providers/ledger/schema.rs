use crate::providers::StoreError;

pub const BLOCK_TABLE: &str = "block";
pub const TRANSACTION_TABLE: &str = "transaction";

/// Schema names are spliced into DDL, so only plain identifiers are accepted.
pub fn validate_schema_name(schema: &str) -> Result<(), StoreError> {
    let mut chars = schema.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_start && valid_rest && schema.len() <= 63 {
        Ok(())
    } else {
        Err(StoreError::Schema(format!(
            "invalid schema name `{schema}`: expected a lowercase SQL identifier"
        )))
    }
}

pub fn qualified(schema: &str, table: &str) -> String {
    format!("\"{schema}\".\"{table}\"")
}

/// Statements creating the namespace, both tables and their indexes.
pub fn create_statements(schema: &str) -> Vec<String> {
    let block = qualified(schema, BLOCK_TABLE);
    let transaction = qualified(schema, TRANSACTION_TABLE);

    vec![
        format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {block} (
                number BIGINT PRIMARY KEY,
                hash VARCHAR(256) NOT NULL UNIQUE,
                parent_hash VARCHAR(256) NOT NULL,
                nonce VARCHAR(256) NOT NULL,
                transactions_root VARCHAR(256) NOT NULL,
                state_root VARCHAR(256) NOT NULL,
                receipt_root VARCHAR(256) NOT NULL,
                miner VARCHAR(256) NOT NULL,
                difficulty VARCHAR(256) NOT NULL,
                total_difficulty VARCHAR(256) NOT NULL,
                size BIGINT NOT NULL,
                gas_limit BIGINT NOT NULL,
                gas_used BIGINT NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#
        ),
        format!("CREATE INDEX IF NOT EXISTS block_timestamp_idx ON {block} (timestamp)"),
        format!(
            r#"CREATE TABLE IF NOT EXISTS {transaction} (
                id BIGSERIAL PRIMARY KEY,
                hash VARCHAR(256) NOT NULL UNIQUE,
                block_number BIGINT NOT NULL REFERENCES {block} (number),
                block_hash VARCHAR(256) NOT NULL REFERENCES {block} (hash),
                nonce BIGINT NOT NULL,
                transaction_index BIGINT NOT NULL,
                sender VARCHAR(256) NOT NULL,
                recipient VARCHAR(256),
                value NUMERIC(30, 10) NOT NULL,
                gas BIGINT NOT NULL,
                gas_price BIGINT NOT NULL,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS transaction_block_number_idx ON {transaction} (block_number)"
        ),
        format!("CREATE INDEX IF NOT EXISTS transaction_sender_idx ON {transaction} (sender)"),
        format!("CREATE INDEX IF NOT EXISTS transaction_recipient_idx ON {transaction} (recipient)"),
    ]
}
