//! Basic usage examples for ResourcePoolManager

use esox_resourcepool::{PoolConfiguration, ResourceFactory, ResourcePoolManager};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A pretend connection that knows how often it was opened and closed.
struct Connection {
    serial: usize,
    queries: usize,
}

#[derive(Default)]
struct ConnectionFactory {
    opened: AtomicUsize,
}

impl ResourceFactory<Connection> for ConnectionFactory {
    fn construct(&self) -> Connection {
        let serial = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        println!("   Opening connection #{}", serial);
        Connection { serial, queries: 0 }
    }

    fn deconstruct(&self, connection: Connection) {
        println!(
            "   Closing connection #{} after {} queries",
            connection.serial, connection.queries
        );
    }
}

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Closure factory
    simple_pool();

    // Example 2: Usage limit and teardown
    usage_limited_pool();

    // Example 3: Detach
    detach_resource();

    // Example 4: Metrics
    metrics();
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = ResourcePoolManager::new(3, 0, || 42);

    {
        let obj = pool.try_acquire_resource().unwrap();
        println!("   Got resource {}: {}", obj.id(), *obj);
        // Resource automatically released when dropped
    }

    println!("   Idle after release: {}\n", pool.idle_count());
}

fn usage_limited_pool() {
    println!("2. Usage Limited Pool:");

    let config = PoolConfiguration::new()
        .with_max_pool_size(1)
        .with_resource_usage_limit(2);
    let pool = ResourcePoolManager::with_configuration(config, ConnectionFactory::default());

    for _ in 0..3 {
        let mut conn = pool.try_acquire_resource().unwrap();
        conn.queries += 1;
        println!("   Using connection #{} (use {})", conn.serial, conn.usage_count());
    }

    println!();
}

fn detach_resource() {
    println!("3. Detach:");
    let pool = ResourcePoolManager::new(1, 0, || String::from("session"));

    let session = pool.try_acquire_resource().unwrap();
    let owned: String = session.detach();
    println!("   Detached '{}', pool now manages {}", owned, pool.pool_size());
    println!();
}

fn metrics() {
    println!("4. Metrics:");
    let pool = ResourcePoolManager::new(1, 0, || 0_u64);

    let held = pool.try_acquire_resource().unwrap();
    if let Err(e) = pool.try_acquire_resource() {
        println!("   Second acquire failed: {}", e);
    }
    drop(held);

    let mut metrics: Vec<_> = pool.export_metrics().into_iter().collect();
    metrics.sort();
    for (key, value) in metrics {
        println!("   {}: {}", key, value);
    }
}
