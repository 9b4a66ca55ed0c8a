//! Keeps a relational mirror of a chain's blocks and transactions in step
//! with a JSON-RPC node.
pub mod helpers;
pub mod interfaces;
pub mod services;
