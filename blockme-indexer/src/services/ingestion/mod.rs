pub mod engine;
pub mod error_log;
pub mod report;

pub use engine::{EngineConfig, EngineState, IngestionEngine};
pub use error_log::InsertionErrorLog;
pub use report::RunReport;
