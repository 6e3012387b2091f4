//! Construction and teardown of pooled resources

/// Builds new resources for a [`ResourcePoolManager`](crate::ResourcePoolManager)
/// and tears down the ones it retires.
///
/// Ownership of a constructed resource passes to the pool. `construct` runs
/// on the acquiring task and is not interrupted by cancellation, so it should
/// be quick or enforce its own timeout.
///
/// Any `Fn() -> T` closure is a factory whose teardown just drops the value:
///
/// ```
/// use esox_resourcepool::ResourceFactory;
///
/// let factory = || String::from("connection");
/// assert_eq!(factory.construct(), "connection");
/// ```
pub trait ResourceFactory<T>: Send + Sync {
    /// Create a fresh resource.
    fn construct(&self) -> T;

    /// Tear down a resource that left the pool for good.
    fn deconstruct(&self, resource: T) {
        drop(resource);
    }
}

impl<T, F> ResourceFactory<T> for F
where
    F: Fn() -> T + Send + Sync,
{
    fn construct(&self) -> T {
        self()
    }
}
