//! Service capabilities and type-erased service handles.

use std::{any::Any, fmt, sync::Arc};

use crate::key::ServiceKey;

/// Registrable capability: anything stored in a [`ServiceDirectory`] implements this.
///
/// Capability interfaces extend it as a supertrait, so `dyn MyApi` is itself a
/// `Service` and can be used as the registration key:
///
/// ```ignore
/// trait Clock: Service {
///     fn now_ms(&self) -> u64;
/// }
///
/// directory.register::<dyn Clock>(Arc::new(SystemClock))?;
/// ```
///
/// [`ServiceDirectory`]: crate::ServiceDirectory
pub trait Service: Send + Sync + 'static {
    /// Human-readable description used in logs, events and close failures.
    fn description(&self) -> &str;

    /// Closable capability. Services owning resources return `Some(self)`; the
    /// directory calls [`Closable::close`] once when it shuts down.
    fn as_closable(&self) -> Option<&dyn Closable> {
        None
    }
}

/// Closable capability, invoked by the directory during `close()`.
pub trait Closable: Send + Sync {
    /// Release the resources held by the service.
    ///
    /// # Errors
    /// Any error is collected by the directory and reported from `close()`;
    /// remaining services are still closed.
    fn close(&self) -> anyhow::Result<()>;
}

/// Object-safe view over a registered `Arc<T>`.
trait ErasedService: Send + Sync {
    fn description(&self) -> &str;
    fn closable(&self) -> Option<&dyn Closable>;
    /// The stored `Arc<T>`, for downcasting.
    fn instance(&self) -> &(dyn Any + Send + Sync);
    fn addr(&self) -> *const ();
}

struct Slot<T: ?Sized>(Arc<T>);

impl<T: ?Sized + Service> ErasedService for Slot<T> {
    fn description(&self) -> &str {
        self.0.description()
    }

    fn closable(&self) -> Option<&dyn Closable> {
        self.0.as_closable()
    }

    fn instance(&self) -> &(dyn Any + Send + Sync) {
        &self.0
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast::<()>()
    }
}

/// Type-erased handle to a registered service instance.
///
/// Cloning is cheap. Two handles compare equal when they were registered under
/// the same key and point at the same allocation.
#[derive(Clone)]
pub struct ServiceRef {
    key: ServiceKey,
    inner: Arc<dyn ErasedService>,
}

impl ServiceRef {
    pub(crate) fn new<T: ?Sized + Service>(instance: Arc<T>) -> Self {
        Self {
            key: ServiceKey::of::<T>(),
            inner: Arc::new(Slot(instance)),
        }
    }

    /// Key the instance was registered under.
    #[must_use]
    pub fn key(&self) -> ServiceKey {
        self.key
    }

    #[must_use]
    pub fn description(&self) -> &str {
        self.inner.description()
    }

    /// Recover the typed instance. Returns `None` unless `T` is the exact
    /// interface type used at registration.
    #[must_use]
    pub fn downcast<T: ?Sized + Service>(&self) -> Option<Arc<T>> {
        self.inner.instance().downcast_ref::<Arc<T>>().cloned()
    }

    /// `true` if this handle points at the same allocation as `instance`.
    #[must_use]
    pub fn is<T: ?Sized + Service>(&self, instance: &Arc<T>) -> bool {
        std::ptr::eq(self.inner.addr(), Arc::as_ptr(instance).cast::<()>())
    }

    pub(crate) fn closable(&self) -> Option<&dyn Closable> {
        self.inner.closable()
    }

    /// Same allocation, regardless of the key it was registered under.
    pub(crate) fn same_instance(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner.addr(), other.inner.addr())
    }
}

impl PartialEq for ServiceRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.same_instance(other)
    }
}

impl Eq for ServiceRef {}

impl fmt::Debug for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRef")
            .field("key", &self.key)
            .field("description", &self.description())
            .finish()
    }
}
