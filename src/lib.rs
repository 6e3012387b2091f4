//! # EsoxSolutions.ResourcePool
//!
//! Thread-safe resource pool manager with usage-limited reuse, plus a
//! failure-threshold circuit breaker. The two are independent and are often
//! used together, e.g. guarding calls made through a pooled connection.
//!
//! ## Features
//!
//! - Resources built lazily by a pluggable [`ResourceFactory`], up to a hard capacity
//! - Per-resource usage limit: a resource is retired and torn down after N acquisitions
//! - Automatic release of acquired resources via RAII (Drop trait)
//! - Context-aware acquisition with cancellation, deadlines and retry/backoff
//! - Detach and bulk cleanup for shutdown
//! - Metrics and Prometheus export
//! - Circuit breaker with half-open recovery probing, sync and async
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{Context, ResourcePoolManager};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let pool = ResourcePoolManager::new(2, 10, || String::from("connection"));
//! let ctx = Context::new();
//! {
//!     let conn = pool.acquire_resource(&ctx, true).await.unwrap();
//!     println!("Got: {}", *conn);
//!     // Resource automatically released when `conn` goes out of scope
//! }
//! assert_eq!(pool.idle_count(), 1);
//! # }
//! ```

mod breaker_config;
mod circuit_breaker;
mod config;
mod context;
mod errors;
mod factory;
mod metrics;
mod pool;

pub use breaker_config::Configuration;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState};
pub use config::{DEFAULT_RETRY_ON_RESOURCE_DELAY, PoolConfiguration, UNBOUNDED_POOL_SIZE, UNLIMITED_USAGE};
pub use context::Context;
pub use errors::{CircuitBreakerError, ConfigurationError, ContextError, PoolError, PoolResult};
pub use factory::ResourceFactory;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{PooledResource, ResourceId, ResourcePoolManager};
