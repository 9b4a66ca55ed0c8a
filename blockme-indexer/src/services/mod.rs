pub mod chain;
pub mod decode;
pub mod gaps;
pub mod ingestion;
