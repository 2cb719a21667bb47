//! Fundwise: bookkeeping for a small community fund.
//!
//! Fiscal years carry an opening balance and a list of collection and
//! expense entries. The server in [`server`] exposes them over HTTP, and
//! [`client`] talks to it while keeping an optimistic local copy.

pub mod client;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, ApiResult, LedgerError};
pub use services::state::AppState;
