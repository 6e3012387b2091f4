//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::ResourcePoolManager;
///
/// let pool = ResourcePoolManager::new(2, 0, || 7_u32);
///
/// let held = pool.try_acquire_resource().unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_constructed, 1);
/// assert_eq!(metrics.acquired_resources, 1);
/// drop(held);
///
/// assert_eq!(pool.get_metrics().idle_resources, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Resources built by the factory
    pub total_constructed: usize,

    /// Successful acquisitions
    pub total_acquired: usize,

    /// Releases that put a resource back to idle
    pub total_released: usize,

    /// Resources torn down after reaching their usage limit
    pub total_retired: usize,

    /// Resources handed over to the caller
    pub total_detached: usize,

    /// Resources torn down by a cleanup
    pub total_destroyed: usize,

    /// Acquisition attempts that found the pool at capacity
    pub pool_limit_events: usize,

    /// Resources currently managed
    pub managed_resources: usize,

    /// Managed resources currently held by callers
    pub acquired_resources: usize,

    /// Managed resources ready for reuse
    pub idle_resources: usize,

    /// Held resources over capacity (0.0 to 1.0), 0.0 when unbounded
    pub utilization: f64,

    /// Pool capacity, `None` when unbounded
    pub max_capacity: Option<usize>,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_constructed".to_string(), self.total_constructed.to_string());
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_retired".to_string(), self.total_retired.to_string());
        metrics.insert("total_detached".to_string(), self.total_detached.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("pool_limit_events".to_string(), self.pool_limit_events.to_string());
        metrics.insert("managed_resources".to_string(), self.managed_resources.to_string());
        metrics.insert("acquired_resources".to_string(), self.acquired_resources.to_string());
        metrics.insert("idle_resources".to_string(), self.idle_resources.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert(
            "max_capacity".to_string(),
            self.max_capacity
                .map_or_else(|| "unbounded".to_string(), |capacity| capacity.to_string()),
        );
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::ResourcePoolManager;
    /// use std::collections::HashMap;
    ///
    /// let pool = ResourcePoolManager::new(3, 0, || 0_u8);
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("conn_pool", Some(&tags));
    /// assert!(output.contains("resourcepool_resources_acquired"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        let gauges: [(&str, &str, String); 4] = [
            ("resourcepool_resources_managed", "Resources currently managed", metrics.managed_resources.to_string()),
            ("resourcepool_resources_acquired", "Resources currently held by callers", metrics.acquired_resources.to_string()),
            ("resourcepool_resources_idle", "Resources ready for reuse", metrics.idle_resources.to_string()),
            ("resourcepool_utilization", "Pool utilization ratio", format!("{:.2}", metrics.utilization)),
        ];
        for (name, help, value) in gauges {
            Self::push_metric(&mut output, name, help, "gauge", &labels, &value);
        }

        let counters: [(&str, &str, usize); 7] = [
            ("resourcepool_constructed_total", "Resources constructed", metrics.total_constructed),
            ("resourcepool_acquired_total", "Successful acquisitions", metrics.total_acquired),
            ("resourcepool_released_total", "Releases back to idle", metrics.total_released),
            ("resourcepool_retired_total", "Resources retired at their usage limit", metrics.total_retired),
            ("resourcepool_detached_total", "Resources detached from the pool", metrics.total_detached),
            ("resourcepool_destroyed_total", "Resources destroyed by cleanup", metrics.total_destroyed),
            ("resourcepool_limit_events_total", "Pool limit reached events", metrics.pool_limit_events),
        ];
        for (name, help, value) in counters {
            Self::push_metric(&mut output, name, help, "counter", &labels, &value.to_string());
        }

        output
    }

    fn push_metric(output: &mut String, name: &str, help: &str, kind: &str, labels: &str, value: &str) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_constructed: AtomicUsize,
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_retired: AtomicUsize,
    pub total_detached: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub pool_limit_events: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, managed: usize, acquired: usize, capacity: Option<usize>) -> PoolMetrics {
        let utilization = match capacity {
            Some(capacity) if capacity > 0 => acquired as f64 / capacity as f64,
            _ => 0.0,
        };

        PoolMetrics {
            total_constructed: self.total_constructed.load(Ordering::Relaxed),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_retired: self.total_retired.load(Ordering::Relaxed),
            total_detached: self.total_detached.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            pool_limit_events: self.pool_limit_events.load(Ordering::Relaxed),
            managed_resources: managed,
            acquired_resources: acquired,
            idle_resources: managed.saturating_sub(acquired),
            utilization,
            max_capacity: capacity,
        }
    }
}
