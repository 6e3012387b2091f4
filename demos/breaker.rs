//! Circuit breaker examples

use esox_resourcepool::{CircuitBreaker, CircuitBreakerError, Configuration};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Unavailable;

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("service unavailable")
    }
}

impl std::error::Error for Unavailable {}

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Circuit Breaker ===\n");

    let failures = Arc::new(AtomicUsize::new(0));
    let breaker = CircuitBreaker::new(&Configuration::new("2", "1"))
        .expect("valid configuration")
        .with_on_failure({
            let failures = Arc::clone(&failures);
            move || {
                failures.fetch_add(1, Ordering::Relaxed);
            }
        });

    for attempt in 0..5 {
        match breaker.proceed(|| Err::<(), _>(Unavailable)) {
            Err(CircuitBreakerError::Open) => println!("   Attempt {}: rejected, breaker open", attempt),
            Err(e) => println!("   Attempt {}: failed with '{}'", attempt, e),
            Ok(()) => println!("   Attempt {}: ok", attempt),
        }
    }
    println!("   State: {}, recorded failures: {}", breaker.state(), failures.load(Ordering::Relaxed));

    println!("   Waiting for reset timeout...");
    std::thread::sleep(Duration::from_millis(1100));

    let probe = breaker.proceed(|| Ok::<_, Unavailable>("pong"));
    println!("   Probe: {:?}, state: {}", probe.ok(), breaker.state());

    breaker.reset();
    println!("   After reset: {}", breaker.state());
}
