// DEFINE THE DEFAULT CONFIGURATION WHEN NO ENV VARIABLE IS SET
const RPC_HOST: &str = "http://127.0.0.1";
const RPC_PORT: u16 = 8545;
const REQUEST_DELAY_MICROS: u64 = 100;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CHUNK_SIZE: u64 = 10_000;
const WORKERS: u64 = 1;

const PG_USERNAME: &str = "postgres";
const PG_HOST: &str = "127.0.0.1";
const PG_PORT: u16 = 5432;
const PG_DATABASE_NAME: &str = "devdb";
const SCHEMA: &str = "ethereum";

const INSERTION_ERROR_FILE: &str = "insertion_errors.log";
const LOG_FILTER: &str = "info";

pub fn default_rpc_host() -> String {
    RPC_HOST.to_owned()
}

pub fn default_rpc_port() -> u16 {
    RPC_PORT
}

pub fn default_request_delay_micros() -> u64 {
    REQUEST_DELAY_MICROS
}

pub fn default_request_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}

pub fn default_chunk_size() -> u64 {
    CHUNK_SIZE
}

pub fn default_workers() -> u64 {
    WORKERS
}

pub fn default_pg_username() -> String {
    std::env::var("USER").unwrap_or_else(|_| PG_USERNAME.to_owned())
}

pub fn default_pg_host() -> String {
    PG_HOST.to_owned()
}

pub fn default_pg_port() -> u16 {
    PG_PORT
}

pub fn default_pg_database_name() -> String {
    PG_DATABASE_NAME.to_owned()
}

pub fn default_schema() -> String {
    SCHEMA.to_owned()
}

pub fn default_insertion_error_file() -> String {
    INSERTION_ERROR_FILE.to_owned()
}

pub fn default_log_filter() -> String {
    LOG_FILTER.to_owned()
}
