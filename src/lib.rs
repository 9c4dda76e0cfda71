//! Rate-limited AI chat gateway for a portfolio site.
//!
//! `handlers` serves the proxy endpoint in front of the Gemini API, guarded by
//! the per-identity limiter in `rate_limit`. `client` is the other end: a
//! caller with its own persistent limiter, used by the `chat` loop and the CLI.

pub mod backend;
pub mod chat;
pub mod client;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod prompt;
pub mod rate_limit;
pub mod retry;
pub mod state;
