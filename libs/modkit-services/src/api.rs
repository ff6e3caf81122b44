//! Read-only and read/write views of a directory.
//!
//! Consumers that only resolve services can take `&impl ServiceLookup`;
//! owners that wire the application take `&impl ServiceRegistry`.

use std::sync::Arc;

use crate::{
    directory::ServiceDirectory,
    error::{CloseError, DirectoryError},
    events::EventSubscription,
    service::{Service, ServiceRef},
};

/// Lookups and event subscription.
pub trait ServiceLookup {
    /// First instance registered under `T`, if any.
    fn optional_service<T: ?Sized + Service>(&self) -> Option<Arc<T>>;

    /// First instance registered under `T`.
    ///
    /// # Errors
    /// `DirectoryError::ServiceNotFound` if nothing is registered under `T`.
    fn require_service<T: ?Sized + Service>(&self) -> Result<Arc<T>, DirectoryError>;

    /// All instances registered under `T`, in registration order.
    fn optional_services<T: ?Sized + Service>(&self) -> Vec<Arc<T>>;

    /// Every registered instance.
    fn services(&self) -> Vec<ServiceRef>;

    /// Subscribe to events emitted from now on.
    fn events(&self) -> EventSubscription;
}

/// Mutations and shutdown.
pub trait ServiceRegistry: ServiceLookup {
    /// # Errors
    /// `DirectoryError::Closed` once the directory is shutting down.
    fn register<T: ?Sized + Service>(&self, service: Arc<T>) -> Result<(), DirectoryError>;

    /// # Errors
    /// `DirectoryError::Closed` once the directory is shutting down.
    fn deregister<T: ?Sized + Service>(&self, service: &Arc<T>) -> Result<(), DirectoryError>;

    /// # Errors
    /// `DirectoryError::Closed` once the directory is shutting down.
    fn deregister_all<T: ?Sized + Service>(&self) -> Result<(), DirectoryError>;

    /// # Errors
    /// `CloseError` if at least one service failed to close.
    fn close(&self) -> Result<(), CloseError>;
}

impl ServiceLookup for ServiceDirectory {
    fn optional_service<T: ?Sized + Service>(&self) -> Option<Arc<T>> {
        Self::optional_service::<T>(self)
    }

    fn require_service<T: ?Sized + Service>(&self) -> Result<Arc<T>, DirectoryError> {
        Self::require_service::<T>(self)
    }

    fn optional_services<T: ?Sized + Service>(&self) -> Vec<Arc<T>> {
        Self::optional_services::<T>(self)
    }

    fn services(&self) -> Vec<ServiceRef> {
        Self::services(self)
    }

    fn events(&self) -> EventSubscription {
        Self::events(self)
    }
}

impl ServiceRegistry for ServiceDirectory {
    fn register<T: ?Sized + Service>(&self, service: Arc<T>) -> Result<(), DirectoryError> {
        Self::register::<T>(self, service)
    }

    fn deregister<T: ?Sized + Service>(&self, service: &Arc<T>) -> Result<(), DirectoryError> {
        Self::deregister::<T>(self, service)
    }

    fn deregister_all<T: ?Sized + Service>(&self) -> Result<(), DirectoryError> {
        Self::deregister_all::<T>(self)
    }

    fn close(&self) -> Result<(), CloseError> {
        Self::close(self)
    }
}

impl<D: ServiceLookup> ServiceLookup for Arc<D> {
    fn optional_service<T: ?Sized + Service>(&self) -> Option<Arc<T>> {
        (**self).optional_service::<T>()
    }

    fn require_service<T: ?Sized + Service>(&self) -> Result<Arc<T>, DirectoryError> {
        (**self).require_service::<T>()
    }

    fn optional_services<T: ?Sized + Service>(&self) -> Vec<Arc<T>> {
        (**self).optional_services::<T>()
    }

    fn services(&self) -> Vec<ServiceRef> {
        (**self).services()
    }

    fn events(&self) -> EventSubscription {
        (**self).events()
    }
}
