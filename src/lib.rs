//! Terminal compliance chat: sends questions to a webhook and enforces a
//! per-day query quota persisted in a local key-value file.

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod quota;
pub mod repl;
pub mod session;
pub mod storage;
pub mod types;
pub mod view;
