//! Resource pool manager: bounded, usage-limited reuse of factory-built resources

use crate::config::PoolConfiguration;
use crate::context::Context;
use crate::errors::{PoolError, PoolResult};
use crate::factory::ResourceFactory;
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Identity of a resource within the pool that constructed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource-{}", self.0)
    }
}

/// Acquisition state of one managed resource. The value itself lives here
/// while idle and inside a [`PooledResource`] while acquired.
struct SlotState<T> {
    resource: Option<T>,
    is_acquired: bool,
    usage_count: u64,
    /// Set once the entry has left the map; stale snapshots must skip it.
    retired: bool,
}

impl<T> SlotState<T> {
    fn claim(&mut self, config: &PoolConfiguration) -> Option<(T, u64)> {
        if self.is_acquired || self.retired || !config.allows_usage(self.usage_count) {
            return None;
        }
        let resource = self.resource.take()?;
        self.is_acquired = true;
        self.usage_count = self.usage_count.saturating_add(1);
        Some((resource, self.usage_count))
    }
}

struct ManagedResource<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> ManagedResource<T> {
    /// Entry for a freshly constructed resource that goes straight to its first holder.
    fn first_use() -> Self {
        Self {
            state: Mutex::new(SlotState {
                resource: None,
                is_acquired: true,
                usage_count: 1,
                retired: false,
            }),
        }
    }
}

/// A capacity slot held while a resource is under construction. Unless
/// committed, dropping it (including during a factory panic) frees the slot.
struct SlotReservation<'a> {
    size: &'a AtomicUsize,
    committed: bool,
}

impl SlotReservation<'_> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

struct PoolShared<T: Send + 'static> {
    factory: Box<dyn ResourceFactory<T>>,
    pool: DashMap<ResourceId, Arc<ManagedResource<T>>>,
    /// Entries in `pool` plus slots reserved for resources under construction.
    size: AtomicUsize,
    next_id: AtomicU64,
    config: PoolConfiguration,
    retry_on_resource_delay: RwLock<Duration>,
    metrics: MetricsTracker,
}

impl<T: Send + 'static> PoolShared<T> {
    fn snapshot(&self) -> Vec<(ResourceId, Arc<ManagedResource<T>>)> {
        self.pool
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    /// One acquisition attempt: reuse an idle resource or build a new one.
    fn obtain(self: &Arc<Self>) -> PoolResult<PooledResource<T>> {
        if let Some((id, resource, usage_count)) = self.claim_idle() {
            MetricsTracker::increment(&self.metrics.total_acquired);
            trace!(resource_id = %id, usage_count, "reusing idle resource");
            return Ok(self.lease(id, resource, usage_count));
        }

        let Some(reservation) = self.reserve_slot() else {
            MetricsTracker::increment(&self.metrics.pool_limit_events);
            trace!(max_pool_size = self.config.max_pool_size, "resource pool limit reached");
            return Err(PoolError::PoolLimitReached);
        };

        let resource = self.factory.construct();
        let id = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pool.insert(id, Arc::new(ManagedResource::first_use()));
        reservation.commit();

        MetricsTracker::increment(&self.metrics.total_constructed);
        MetricsTracker::increment(&self.metrics.total_acquired);
        debug!(
            resource_id = %id,
            pool_size = self.size.load(Ordering::Acquire),
            max_pool_size = self.config.max_pool_size,
            "constructed new resource"
        );

        Ok(self.lease(id, resource, 1))
    }

    /// Two callers may look at the same idle entry; the entry lock lets only
    /// one of them flip it to acquired.
    fn claim_idle(&self) -> Option<(ResourceId, T, u64)> {
        for (id, managed) in self.snapshot() {
            let claimed = managed.state.lock().claim(&self.config);
            if let Some((resource, usage_count)) = claimed {
                return Some((id, resource, usage_count));
            }
        }
        None
    }

    fn reserve_slot(&self) -> Option<SlotReservation<'_>> {
        let reserved = match self.config.capacity() {
            None => {
                self.size.fetch_add(1, Ordering::AcqRel);
                true
            }
            Some(capacity) => self
                .size
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |size| {
                    (size < capacity).then_some(size + 1)
                })
                .is_ok(),
        };
        reserved.then_some(SlotReservation {
            size: &self.size,
            committed: false,
        })
    }

    fn lease(self: &Arc<Self>, id: ResourceId, resource: T, usage_count: u64) -> PooledResource<T> {
        PooledResource {
            resource: Some(resource),
            id,
            usage_count,
            pool: Arc::downgrade(self),
        }
    }

    fn remove_entry(&self, id: ResourceId) -> Option<Arc<ManagedResource<T>>> {
        let (_, managed) = self.pool.remove(&id)?;
        self.size.fetch_sub(1, Ordering::AcqRel);
        Some(managed)
    }

    fn release(&self, id: ResourceId, resource: T) {
        let managed = self.pool.get(&id).map(|entry| Arc::clone(entry.value()));
        let Some(managed) = managed else {
            trace!(resource_id = %id, "released resource is no longer managed, tearing it down");
            self.factory.deconstruct(resource);
            return;
        };

        let mut state = managed.state.lock();
        if state.retired {
            drop(state);
            trace!(resource_id = %id, "released resource was destroyed while held, tearing it down");
            self.factory.deconstruct(resource);
            return;
        }

        if self.config.allows_usage(state.usage_count) {
            state.is_acquired = false;
            state.resource = Some(resource);
            drop(state);
            MetricsTracker::increment(&self.metrics.total_released);
            trace!(resource_id = %id, "resource released to idle");
            return;
        }

        state.retired = true;
        let usage_count = state.usage_count;
        drop(state);

        self.remove_entry(id);
        MetricsTracker::increment(&self.metrics.total_retired);
        debug!(resource_id = %id, usage_count, "retiring resource after reaching its usage limit");
        self.factory.deconstruct(resource);
    }

    fn detach(&self, id: ResourceId) {
        if let Some(managed) = self.remove_entry(id) {
            managed.state.lock().retired = true;
            MetricsTracker::increment(&self.metrics.total_detached);
            debug!(resource_id = %id, "resource detached from pool");
        }
    }

    /// Drop an entry during cleanup. An idle value is torn down now; a held
    /// one is torn down when its holder releases it.
    fn destroy(&self, id: ResourceId) -> bool {
        let Some(managed) = self.remove_entry(id) else {
            return false;
        };

        let idle = {
            let mut state = managed.state.lock();
            state.retired = true;
            state.resource.take()
        };
        if let Some(resource) = idle {
            self.factory.deconstruct(resource);
        }

        MetricsTracker::increment(&self.metrics.total_destroyed);
        true
    }
}

/// A resource acquired from a [`ResourcePoolManager`].
///
/// Dereferences to the resource. Dropping the handle releases the resource,
/// which is the same as passing it to
/// [`release_resource`](ResourcePoolManager::release_resource).
pub struct PooledResource<T: Send + 'static> {
    resource: Option<T>,
    id: ResourceId,
    usage_count: u64,
    pool: Weak<PoolShared<T>>,
}

impl<T: Send + 'static> PooledResource<T> {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// How many times the resource has been acquired, this acquisition included.
    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }

    /// Give the resource back to its pool.
    pub fn release(self) {
        drop(self);
    }

    /// Take the resource out of pool management. No teardown is run; the
    /// caller owns the value from now on.
    pub fn detach(mut self) -> T {
        let resource = self.resource.take().expect("Value already taken");
        if let Some(pool) = self.pool.upgrade() {
            pool.detach(self.id);
        }
        resource
    }

    fn belongs_to(&self, shared: &Arc<PoolShared<T>>) -> bool {
        std::ptr::eq(self.pool.as_ptr(), Arc::as_ptr(shared))
    }
}

impl<T: Send + 'static> Deref for PooledResource<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("Value already taken")
    }
}

impl<T: Send + 'static> DerefMut for PooledResource<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("Value already taken")
    }
}

impl<T: Send + 'static> Drop for PooledResource<T> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            match self.pool.upgrade() {
                Some(pool) => pool.release(self.id, resource),
                None => drop(resource),
            }
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for PooledResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledResource")
            .field("id", &self.id)
            .field("usage_count", &self.usage_count)
            .field("resource", &self.resource)
            .finish()
    }
}

/// Thread-safe pool of lazily constructed resources, each reusable up to a
/// configured number of acquisitions before it is retired and rebuilt.
///
/// The pool never holds a pool-wide lock while handing out resources: the
/// resource map is a `DashMap` and every entry carries its own lock. Capacity
/// is a strict bound, enforced by reserving a slot before construction.
///
/// Blocked acquisitions poll: they sleep for the retry delay and check
/// again. Waiters are not served in any particular order, so under steady
/// contention an unlucky caller can keep losing; bound the wait with a
/// [`Context`] deadline.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::ResourcePoolManager;
///
/// let pool = ResourcePoolManager::new(1, 2, || Vec::<u8>::new());
///
/// let mut first = pool.try_acquire_resource().unwrap();
/// first.push(1);
/// let id = first.id();
/// pool.release_resource(first);
///
/// // Second use of the same resource, after which it is retired.
/// let second = pool.try_acquire_resource().unwrap();
/// assert_eq!(second.id(), id);
/// assert_eq!(*second, vec![1]);
/// drop(second);
///
/// let third = pool.try_acquire_resource().unwrap();
/// assert_ne!(third.id(), id);
/// assert!(third.is_empty());
/// ```
pub struct ResourcePoolManager<T: Send + 'static> {
    shared: Arc<PoolShared<T>>,
}

impl<T: Send + 'static> Clone for ResourcePoolManager<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for ResourcePoolManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePoolManager")
            .field("max_pool_size", &self.shared.config.max_pool_size)
            .field("resource_usage_limit", &self.shared.config.resource_usage_limit)
            .field("pool_size", &self.pool_size())
            .field("retry_on_resource_delay", &self.retry_on_resource_delay())
            .finish()
    }
}

impl<T: Send + 'static> ResourcePoolManager<T> {
    /// Create a pool holding at most `pool_size` resources, each usable
    /// `resource_usage_limit` times (`0` for unlimited).
    ///
    /// A `pool_size` of `0` gives a pool that can never hand anything out;
    /// use [`UNBOUNDED_POOL_SIZE`](crate::UNBOUNDED_POOL_SIZE) for no limit.
    pub fn new<F>(pool_size: u8, resource_usage_limit: u8, factory: F) -> Self
    where
        F: ResourceFactory<T> + 'static,
    {
        let config = PoolConfiguration::new()
            .with_max_pool_size(pool_size)
            .with_resource_usage_limit(resource_usage_limit);
        Self::with_configuration(config, factory)
    }

    /// Create a pool from a full configuration
    pub fn with_configuration<F>(config: PoolConfiguration, factory: F) -> Self
    where
        F: ResourceFactory<T> + 'static,
    {
        let retry_on_resource_delay = RwLock::new(config.retry_on_resource_delay);
        Self {
            shared: Arc::new(PoolShared {
                factory: Box::new(factory),
                pool: DashMap::new(),
                size: AtomicUsize::new(0),
                next_id: AtomicU64::new(0),
                config,
                retry_on_resource_delay,
                metrics: MetricsTracker::new(),
            }),
        }
    }

    /// Acquire a resource, reusing an idle one or constructing a new one
    /// while capacity remains.
    ///
    /// Fails straight away with the context error if `ctx` has already
    /// ended. When the pool is exhausted, fails with
    /// [`PoolError::PoolLimitReached`] unless `retry_if_unavailable` is set,
    /// in which case it keeps trying every retry delay until a resource frees
    /// up or `ctx` ends.
    pub async fn acquire_resource(
        &self,
        ctx: &Context,
        retry_if_unavailable: bool,
    ) -> PoolResult<PooledResource<T>> {
        loop {
            if let Some(err) = ctx.err() {
                return Err(err.into());
            }

            match self.shared.obtain() {
                Ok(resource) => return Ok(resource),
                Err(PoolError::PoolLimitReached) if retry_if_unavailable => {}
                Err(err) => return Err(err),
            }

            let delay = self.retry_on_resource_delay();
            tokio::select! {
                err = ctx.done() => return Err(err.into()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Single non-blocking acquisition attempt
    pub fn try_acquire_resource(&self) -> PoolResult<PooledResource<T>> {
        self.shared.obtain()
    }

    /// Give a resource back. It becomes idle again, or is retired and torn
    /// down if it has used up its usage limit.
    ///
    /// A resource acquired from another pool is left alone here; dropping it
    /// returns it to the pool it came from.
    pub fn release_resource(&self, resource: PooledResource<T>) {
        if !resource.belongs_to(&self.shared) {
            trace!(resource_id = %resource.id, "ignoring release of a resource from another pool");
        }
        drop(resource);
    }

    /// Take a resource out of this pool's management without tearing it down.
    ///
    /// Returns the handle untouched in `Err` when it belongs to another pool.
    pub fn detach_resource(&self, resource: PooledResource<T>) -> Result<T, PooledResource<T>> {
        if resource.belongs_to(&self.shared) {
            Ok(resource.detach())
        } else {
            Err(resource)
        }
    }

    /// Acquire a resource (waiting for one if needed), run `action` on it and
    /// release it again whatever the action returned.
    pub async fn acquire_and_release_resource<F, R, E>(&self, ctx: &Context, action: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
        E: From<PoolError>,
    {
        let mut resource = self.acquire_resource(ctx, true).await?;
        let outcome = action(&mut resource);
        self.release_resource(resource);
        outcome
    }

    /// Tear down every managed resource, e.g. on shutdown.
    ///
    /// Idle resources are deconstructed immediately. Resources held at the
    /// time are dropped from the pool and deconstructed when released.
    pub fn clean_up_managed_resources(&self, ctx: &Context) -> PoolResult<()> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }

        let ids: Vec<ResourceId> = self.shared.pool.iter().map(|entry| *entry.key()).collect();
        let destroyed = ids.into_iter().filter(|id| self.shared.destroy(*id)).count();
        debug!(destroyed, "cleaned up managed resources");

        Ok(())
    }

    pub fn retry_on_resource_delay(&self) -> Duration {
        *self.shared.retry_on_resource_delay.read()
    }

    pub fn set_retry_on_resource_delay(&self, delay: Duration) {
        *self.shared.retry_on_resource_delay.write() = delay;
    }

    pub fn max_pool_size(&self) -> u8 {
        self.shared.config.max_pool_size
    }

    pub fn resource_usage_limit(&self) -> u8 {
        self.shared.config.resource_usage_limit
    }

    /// Number of resources currently managed
    pub fn pool_size(&self) -> usize {
        self.shared.pool.len()
    }

    /// Number of managed resources currently held by callers
    pub fn acquired_count(&self) -> usize {
        self.shared
            .snapshot()
            .into_iter()
            .filter(|(_, managed)| managed.state.lock().is_acquired)
            .count()
    }

    /// Number of managed resources ready for reuse
    pub fn idle_count(&self) -> usize {
        self.shared
            .snapshot()
            .into_iter()
            .filter(|(_, managed)| !managed.state.lock().is_acquired)
            .count()
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        let snapshot = self.shared.snapshot();
        let acquired = snapshot
            .iter()
            .filter(|(_, managed)| managed.state.lock().is_acquired)
            .count();
        self.shared
            .metrics
            .get_metrics(snapshot.len(), acquired, self.shared.config.capacity())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ContextError;
    use crate::UNBOUNDED_POOL_SIZE;
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    struct StubResource {
        serial: usize,
        some_work: bool,
        some_value: String,
    }

    #[derive(Default)]
    struct FactoryStats {
        constructed: AtomicUsize,
        deconstructed: AtomicUsize,
    }

    #[derive(Clone, Default)]
    struct StubFactory {
        stats: Arc<FactoryStats>,
    }

    impl StubFactory {
        fn constructed(&self) -> usize {
            self.stats.constructed.load(Ordering::SeqCst)
        }

        fn deconstructed(&self) -> usize {
            self.stats.deconstructed.load(Ordering::SeqCst)
        }
    }

    impl ResourceFactory<StubResource> for StubFactory {
        fn construct(&self) -> StubResource {
            let serial = self.stats.constructed.fetch_add(1, Ordering::SeqCst) + 1;
            StubResource {
                serial,
                some_work: false,
                some_value: "NewOne".to_string(),
            }
        }

        fn deconstruct(&self, _resource: StubResource) {
            self.stats.deconstructed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager(pool_size: u8, usage_limit: u8) -> (ResourcePoolManager<StubResource>, StubFactory) {
        let factory = StubFactory::default();
        (ResourcePoolManager::new(pool_size, usage_limit, factory.clone()), factory)
    }

    #[tokio::test]
    async fn test_create_and_manipulate_resources() {
        let (pool, factory) = manager(1, 2);
        let ctx = Context::new();

        let mut first = pool.acquire_resource(&ctx, false).await.unwrap();
        assert_eq!(first.some_value, "NewOne");
        assert_eq!(first.usage_count(), 1);
        assert_eq!(pool.acquired_count(), 1);

        let second = pool.acquire_resource(&ctx, false).await;
        assert_eq!(second.unwrap_err(), PoolError::PoolLimitReached);

        first.some_work = true;
        first.some_value = "Mutated".to_string();
        let first_id = first.id();
        pool.release_resource(first);

        let reused = pool.acquire_resource(&ctx, false).await.unwrap();
        assert_eq!(reused.id(), first_id);
        assert_eq!(reused.some_value, "Mutated");
        assert_eq!(reused.usage_count(), 2);
        pool.release_resource(reused);

        assert_eq!(pool.pool_size(), 0);
        assert_eq!(factory.deconstructed(), 1);

        let fresh = pool.acquire_resource(&ctx, false).await.unwrap();
        assert_ne!(fresh.id(), first_id);
        assert_eq!(fresh.some_value, "NewOne");
        assert_eq!(fresh.usage_count(), 1);
        assert_eq!(factory.constructed(), 2);
    }

    #[test]
    fn test_unlimited_usage_never_retires() {
        let (pool, factory) = manager(1, 0);

        let mut initial = pool.try_acquire_resource().unwrap();
        initial.some_value = "old".to_string();
        drop(initial);

        for _ in 0..1000 {
            let resource = pool.try_acquire_resource().unwrap();
            assert_eq!(resource.some_value, "old");
        }

        assert_eq!(factory.constructed(), 1);
        assert_eq!(factory.deconstructed(), 0);
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let (pool, _) = manager(1, 0);
        let ctx = Context::new();

        let outcome: Result<&str, PoolError> = pool
            .acquire_and_release_resource(&ctx, |resource| {
                resource.some_work = true;
                resource.some_value = "unit_test".to_string();
                Ok("done")
            })
            .await;
        assert_eq!(outcome.unwrap(), "done");

        let updated = pool.acquire_resource(&ctx, false).await.unwrap();
        assert!(updated.some_work);
        assert_eq!(updated.some_value, "unit_test");
    }

    #[derive(Debug, PartialEq)]
    enum ActionError {
        Pool(PoolError),
        Failed,
    }

    impl From<PoolError> for ActionError {
        fn from(err: PoolError) -> Self {
            ActionError::Pool(err)
        }
    }

    #[tokio::test]
    async fn test_acquire_and_release_returns_action_error_and_releases() {
        let (pool, _) = manager(1, 0);
        let ctx = Context::new();

        let outcome: Result<(), ActionError> = pool
            .acquire_and_release_resource(&ctx, |_| Err(ActionError::Failed))
            .await;
        assert_eq!(outcome, Err(ActionError::Failed));
        assert_eq!(pool.idle_count(), 1);

        ctx.cancel();
        let cancelled: Result<(), ActionError> = pool.acquire_and_release_resource(&ctx, |_| Ok(())).await;
        assert_eq!(cancelled, Err(ActionError::Pool(PoolError::Context(ContextError::Canceled))));
    }

    #[test]
    fn test_release_resource_from_other_pool_is_ignored() {
        let (pool, _) = manager(1, 0);
        let (other, _) = manager(1, 0);

        let foreign = other.try_acquire_resource().unwrap();
        pool.release_resource(foreign);

        assert_eq!(pool.pool_size(), 0);
        assert_eq!(other.idle_count(), 1);
    }

    #[test]
    fn test_zero_sized_pool_is_exhausted() {
        let (pool, factory) = manager(0, 0);
        assert_eq!(pool.try_acquire_resource().unwrap_err(), PoolError::PoolLimitReached);
        assert_eq!(factory.constructed(), 0);
    }

    #[test]
    fn test_unbounded_pool() {
        let (pool, _) = manager(UNBOUNDED_POOL_SIZE, 0);
        let held: Vec<_> = (0..300).map(|_| pool.try_acquire_resource().unwrap()).collect();
        assert_eq!(pool.pool_size(), 300);
        assert_eq!(pool.get_metrics().max_capacity, None);
        drop(held);
        assert_eq!(pool.idle_count(), 300);
    }

    #[tokio::test]
    async fn test_acquire_with_canceled_context() {
        let (pool, factory) = manager(1, 0);
        let ctx = Context::new();
        ctx.cancel();

        let err = pool.acquire_resource(&ctx, false).await.unwrap_err();
        assert_eq!(err, PoolError::Context(ContextError::Canceled));
        assert!(err.is_context());
        assert_eq!(factory.constructed(), 0);

        let resource = pool.acquire_resource(&Context::new(), false).await;
        assert!(resource.is_ok());
    }

    #[tokio::test]
    async fn test_released_resource_reused_after_canceled_context() {
        let (pool, _) = manager(1, 0);
        let ctx = Context::new();

        let first = pool.acquire_resource(&ctx, false).await.unwrap();
        let first_id = first.id();
        pool.release_resource(first);

        ctx.cancel();
        assert!(pool.acquire_resource(&ctx, false).await.is_err());

        let again = pool.acquire_resource(&Context::new(), false).await.unwrap();
        assert_eq!(again.id(), first_id);
    }

    #[tokio::test]
    async fn test_retry_waits_for_release() {
        let (pool, _) = manager(1, 0);
        pool.set_retry_on_resource_delay(Duration::from_millis(5));
        let ctx = Context::new();

        let first = pool.acquire_resource(&ctx, true).await.unwrap();
        let first_id = first.id();
        let started = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(first);
        });

        let second = pool.acquire_resource(&ctx, true).await.unwrap();
        assert_eq!(second.id(), first_id);
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_retry_stops_on_cancellation() {
        let (pool, _) = manager(1, 0);
        pool.set_retry_on_resource_delay(Duration::from_millis(1));
        let ctx = Context::new();

        let _held = pool.acquire_resource(&ctx, true).await.unwrap();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = pool.acquire_resource(&ctx, true).await.unwrap_err();
        assert_eq!(err, PoolError::Context(ContextError::Canceled));
    }

    #[tokio::test]
    async fn test_retry_stops_at_deadline() {
        let (pool, _) = manager(1, 1);
        pool.set_retry_on_resource_delay(Duration::from_secs(60));

        let _held = pool.acquire_resource(&Context::new(), true).await.unwrap();

        let ctx = Context::with_timeout(Duration::from_millis(10));
        let err = pool.acquire_resource(&ctx, true).await.unwrap_err();
        assert_eq!(err, PoolError::Context(ContextError::DeadlineExceeded));
    }

    #[test]
    fn test_modify_retry_delay() {
        let (pool, _) = manager(1, 0);
        assert_eq!(pool.retry_on_resource_delay(), Duration::from_secs(1));

        pool.set_retry_on_resource_delay(Duration::from_nanos(1));
        assert_eq!(pool.retry_on_resource_delay(), Duration::from_nanos(1));
    }

    #[test]
    fn test_detach_resource() {
        let (pool, factory) = manager(1, 0);

        let mut initial = pool.try_acquire_resource().unwrap();
        initial.some_value = "Initial resource".to_string();
        let detached = pool.detach_resource(initial).unwrap();
        assert_eq!(detached.some_value, "Initial resource");
        assert_eq!(pool.pool_size(), 0);
        assert_eq!(factory.deconstructed(), 0);

        let fresh = pool.try_acquire_resource().unwrap();
        assert_ne!(fresh.serial, detached.serial);
        assert_eq!(fresh.some_value, "NewOne");
    }

    #[test]
    fn test_detach_foreign_resource_is_returned() {
        let (pool, _) = manager(1, 0);
        let (other, _) = manager(1, 0);

        let foreign = other.try_acquire_resource().unwrap();
        let handed_back = pool.detach_resource(foreign).unwrap_err();
        assert_eq!(other.pool_size(), 1);
        drop(handed_back);
        assert_eq!(other.idle_count(), 1);
    }

    #[test]
    fn test_retired_resource_is_deconstructed() {
        let (pool, factory) = manager(1, 1);

        let initial = pool.try_acquire_resource().unwrap();
        let initial_serial = initial.serial;
        pool.release_resource(initial);
        assert_eq!(factory.deconstructed(), 1);
        assert_eq!(pool.pool_size(), 0);

        let fresh = pool.try_acquire_resource().unwrap();
        assert_ne!(fresh.serial, initial_serial);
        assert_eq!(pool.get_metrics().total_retired, 1);
    }

    #[test]
    fn test_clean_up_managed_resources() {
        let (pool, factory) = manager(3, 0);

        let held = pool.try_acquire_resource().unwrap();
        let idle_a = pool.try_acquire_resource().unwrap();
        let idle_b = pool.try_acquire_resource().unwrap();
        drop(idle_a);
        drop(idle_b);

        pool.clean_up_managed_resources(&Context::new()).unwrap();
        assert_eq!(pool.pool_size(), 0);
        assert_eq!(factory.deconstructed(), 2);

        drop(held);
        assert_eq!(factory.deconstructed(), 3);
        assert_eq!(pool.pool_size(), 0);
        assert_eq!(pool.get_metrics().total_destroyed, 3);
    }

    #[test]
    fn test_clean_up_with_canceled_context() {
        let (pool, factory) = manager(1, 0);
        drop(pool.try_acquire_resource().unwrap());

        let ctx = Context::new();
        ctx.cancel();
        assert_eq!(
            pool.clean_up_managed_resources(&ctx).unwrap_err(),
            PoolError::Context(ContextError::Canceled)
        );
        assert_eq!(pool.pool_size(), 1);
        assert_eq!(factory.deconstructed(), 0);
    }

    #[test]
    fn test_handle_outliving_pool_is_dropped() {
        let (pool, factory) = manager(1, 0);
        let held = pool.try_acquire_resource().unwrap();
        drop(pool);
        drop(held);
        assert_eq!(factory.deconstructed(), 0);
    }

    #[test]
    fn test_metrics_counts() {
        let (pool, _) = manager(1, 0);
        let held = pool.try_acquire_resource().unwrap();
        assert!(pool.try_acquire_resource().is_err());
        drop(held);

        let metrics = pool.export_metrics();
        assert_eq!(metrics["total_constructed"], "1");
        assert_eq!(metrics["total_released"], "1");
        assert_eq!(metrics["pool_limit_events"], "1");
        assert_eq!(metrics["idle_resources"], "1");
    }

    #[test]
    fn test_panicking_factory_frees_its_slot() {
        use std::panic::{self, AssertUnwindSafe};
        use std::sync::atomic::AtomicBool;

        let panicked = Arc::new(AtomicBool::new(false));
        let pool = ResourcePoolManager::new(1, 0, {
            let panicked = Arc::clone(&panicked);
            move || {
                if !panicked.swap(true, Ordering::SeqCst) {
                    panic!("construction failed");
                }
                String::from("connection")
            }
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| pool.try_acquire_resource()));
        assert!(outcome.is_err());
        assert_eq!(pool.pool_size(), 0);

        let held = pool.try_acquire_resource().unwrap();
        assert_eq!(*held, "connection");
        assert_eq!(pool.pool_size(), 1);
    }
}
