// EsoxSolutions.ResourcePool
// Usage-limited resource pool and circuit breaker

// This is just a binary wrapper - the actual library is in lib.rs
// Run with: cargo run --features logging
// Run examples with: cargo run --example basic
// Set RUST_LOG=esox_resourcepool=trace to watch the pool at work

use esox_resourcepool::{CircuitBreaker, Context, PoolResult, ResourcePoolManager};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("esox_resourcepool=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .ok(); // Ignore error if already initialized
}

#[tokio::main]
async fn main() -> PoolResult<()> {
    init_logging();

    println!("=== EsoxSolutions.ResourcePool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    println!("Quick Demo:");
    let pool = ResourcePoolManager::new(2, 3, || String::from("connection"));
    let breaker = CircuitBreaker::with_settings(2, Duration::from_secs(5));
    let ctx = Context::with_timeout(Duration::from_secs(5));

    for round in 0..4 {
        let conn = pool.acquire_resource(&ctx, true).await?;
        let outcome = breaker.proceed(|| Ok::<_, String>(format!("{} #{}", *conn, conn.usage_count())));
        match outcome {
            Ok(reply) => println!("  round {}: used {} ({})", round, reply, conn.id()),
            Err(e) => println!("  round {}: {}", round, e),
        }
    }

    println!("  Managed after rounds: {}", pool.pool_size());
    pool.clean_up_managed_resources(&ctx)?;
    println!("  Managed after cleanup: {}", pool.pool_size());

    Ok(())
}
