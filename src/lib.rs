pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod observability;
pub mod resolve;
pub mod retry;
pub mod server;
pub mod service;
pub mod sorting;
pub mod types;
pub mod upstream;
pub mod warmup;

#[cfg(test)]
mod test_support;

pub use auth::TokenService;
pub use cache::{CacheBackend, CacheClient, CachePayload, MemoryBackend, RedisBackend};
pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use resolve::{resolve_fields, NameLookup, NameResolver};
pub use retry::{RetryConfig, RetryExecutor};
pub use server::GatewayServer;
pub use service::ResourceService;
pub use sorting::sort_records;
pub use types::*;
pub use upstream::{HttpUpstream, Upstream};
pub use warmup::WarmupOrchestrator;
