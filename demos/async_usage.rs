//! Async usage examples

use esox_resourcepool::{Context, PoolConfiguration, PoolError, ResourcePoolManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ResourcePool - Async Examples ===\n");

    // Example 1: Async acquire
    async_acquire().await;

    // Example 2: Retry until deadline
    acquire_with_deadline().await;

    // Example 3: Acquire and release around an action
    acquire_and_release().await;

    // Example 4: Concurrent access
    concurrent_access().await;
}

async fn async_acquire() {
    println!("1. Async Acquire:");
    let pool = ResourcePoolManager::new(1, 0, || 1);

    {
        let obj = pool.acquire_resource(&Context::new(), false).await.unwrap();
        println!("   Got resource asynchronously: {}", *obj);
    }

    println!();
}

async fn acquire_with_deadline() {
    println!("2. Retry with Deadline:");

    let config = PoolConfiguration::new()
        .with_max_pool_size(1)
        .with_retry_on_resource_delay(Duration::from_millis(20));
    let pool = ResourcePoolManager::with_configuration(config, || 42);

    // Take the only resource
    let _obj = pool.try_acquire_resource().unwrap();

    // Try to get another (should hit the deadline)
    let ctx = Context::with_timeout(Duration::from_millis(100));
    match pool.acquire_resource(&ctx, true).await {
        Ok(_) => println!("   Got resource"),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn acquire_and_release() {
    println!("3. Acquire and Release:");
    let pool = ResourcePoolManager::new(1, 0, Vec::<String>::new);

    let outcome: Result<usize, PoolError> = pool
        .acquire_and_release_resource(&Context::new(), |log| {
            log.push("first entry".to_string());
            Ok(log.len())
        })
        .await;
    println!("   Entries after action: {:?}", outcome);
    println!();
}

async fn concurrent_access() {
    println!("4. Concurrent Access:");

    let config = PoolConfiguration::new()
        .with_max_pool_size(3)
        .with_resource_usage_limit(4)
        .with_retry_on_resource_delay(Duration::from_millis(5));
    let pool = Arc::new(ResourcePoolManager::with_configuration(config, || 0_u32));
    let ctx = Context::with_timeout(Duration::from_secs(5));

    let mut handles = vec![];

    for i in 0..10 {
        let pool_clone = Arc::clone(&pool);
        let ctx = ctx.clone();
        let handle = tokio::spawn(async move {
            match pool_clone.acquire_resource(&ctx, true).await {
                Ok(mut obj) => {
                    *obj += 1;
                    println!("   Task {} got {} (use {})", i, obj.id(), obj.usage_count());
                    sleep(Duration::from_millis(20)).await;
                }
                Err(e) => println!("   Task {} couldn't get resource: {}", i, e),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final managed: {}", pool.pool_size());
}
