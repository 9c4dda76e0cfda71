//! Client side of the chat gateway: the local limiter, its durable history
//! and the caller that talks to the proxy.

pub mod caller;
pub mod limiter;
pub mod store;

#[cfg(test)]
pub mod test_helpers;

pub use caller::{AiCaller, CallerConfig};
pub use limiter::ClientRateLimiter;
pub use store::{FileHistoryStore, HistoryStore};
