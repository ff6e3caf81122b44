//! Typed, multi-instance service directory.
//!
//! Design goals:
//! - Providers register implementations explicitly, keyed by *interface type*
//!   (usually a trait object such as `dyn my_module::contract::MyApi`).
//! - Several implementations may live under one key; insertion order is kept
//!   and lookups return the first one unless asked for all of them.
//! - Every mutation and lifecycle step is published on an event stream.
//! - Shutdown closes every closable service once, isolating failures.
//!
//! Implementation details:
//! - Key = [`ServiceKey`] (`TypeId` of the interface, type name for display).
//! - Value = `Vec<ServiceRef>`; each `ServiceRef` stores the original `Arc<T>`
//!   and is downcast on read. A key is removed as soon as its bucket empties.
//! - Table, lifecycle state and event subscribers sit behind one `RwLock`.
//!   Events are enqueued under the write lock right after the table change, so
//!   every subscriber observes mutations in the order they happened.
//!
//! Lookups keep working after `close()` and report whatever is still
//! registered; only mutations are rejected.

use std::{
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{
    config::{ConfigError, DirectoryConfig},
    error::{CloseError, CloseFailure, DirectoryError},
    events::{EventBus, EventSubscription, ServiceEvent},
    key::ServiceKey,
    service::{Closable, Service, ServiceRef},
};

/// Lifecycle of a directory. Transitions only go forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryState {
    Open,
    Closing,
    Closed,
}

impl fmt::Display for DirectoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        })
    }
}

type ServiceTable = HashMap<ServiceKey, Vec<ServiceRef>>;

struct Inner {
    state: DirectoryState,
    table: ServiceTable,
    events: EventBus,
}

impl Inner {
    fn ensure_open(&self) -> Result<(), DirectoryError> {
        if self.state == DirectoryState::Open {
            Ok(())
        } else {
            Err(DirectoryError::Closed)
        }
    }

    fn all(&self) -> Vec<ServiceRef> {
        self.table.values().flatten().cloned().collect()
    }
}

/// In-process registry of services keyed by interface type.
///
/// Construct one per application (or per test) and share it by reference or
/// `Arc`; there is no global instance.
pub struct ServiceDirectory {
    name: String,
    inner: RwLock<Inner>,
}

impl ServiceDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::from_valid_config(DirectoryConfig::default())
    }

    /// # Errors
    /// Returns `ConfigError` if `config` fails validation.
    pub fn with_config(config: DirectoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: DirectoryConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: DirectoryState::Open,
                table: HashMap::new(),
                events: EventBus::new(config.name.clone(), config.subscriber_buffer),
            }),
            name: config.name,
        }
    }

    /// Label used in log records.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> DirectoryState {
        self.inner.read().state
    }
}

impl Default for ServiceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceDirectory {
    /// Append `service` to the instances registered under interface type `T`.
    ///
    /// Registering the same `Arc` twice yields two entries.
    ///
    /// # Errors
    /// `DirectoryError::Closed` once `close()` has started.
    pub fn register<T>(&self, service: Arc<T>) -> Result<(), DirectoryError>
    where
        T: ?Sized + Service,
    {
        let entry = ServiceRef::new(service);
        let key = entry.key();

        let mut w = self.inner.write();
        w.ensure_open()?;
        tracing::debug!(
            directory = %self.name,
            key = %key,
            service = entry.description(),
            "register"
        );
        w.table.entry(key).or_default().push(entry.clone());
        w.events.publish(&ServiceEvent::Registered {
            key,
            service: entry,
        });
        Ok(())
    }

    /// Remove the first entry under `T` that is the same allocation as `service`.
    /// Does nothing (and emits nothing) if there is no such entry.
    ///
    /// # Errors
    /// `DirectoryError::Closed` once `close()` has started.
    pub fn deregister<T>(&self, service: &Arc<T>) -> Result<(), DirectoryError>
    where
        T: ?Sized + Service,
    {
        let key = ServiceKey::of::<T>();

        let mut w = self.inner.write();
        let inner = &mut *w;
        inner.ensure_open()?;

        let Some(bucket) = inner.table.get_mut(&key) else {
            return Ok(());
        };
        let Some(pos) = bucket.iter().position(|entry| entry.is(service)) else {
            return Ok(());
        };
        let removed = bucket.remove(pos);
        if bucket.is_empty() {
            inner.table.remove(&key);
        }

        tracing::debug!(
            directory = %self.name,
            key = %key,
            service = removed.description(),
            "deregister"
        );
        inner.events.publish(&ServiceEvent::Deregistered {
            key,
            service: removed,
        });
        Ok(())
    }

    /// Remove every instance registered under `T`, emitting one
    /// `Deregistered` event per instance in registration order.
    ///
    /// # Errors
    /// `DirectoryError::Closed` once `close()` has started.
    pub fn deregister_all<T>(&self) -> Result<(), DirectoryError>
    where
        T: ?Sized + Service,
    {
        let key = ServiceKey::of::<T>();

        let mut w = self.inner.write();
        let inner = &mut *w;
        inner.ensure_open()?;

        let Some(removed) = inner.table.remove(&key) else {
            return Ok(());
        };
        tracing::debug!(
            directory = %self.name,
            key = %key,
            count = removed.len(),
            "deregister all"
        );
        for service in removed {
            inner
                .events
                .publish(&ServiceEvent::Deregistered { key, service });
        }
        Ok(())
    }

    /// First instance registered under `T`, if any.
    #[must_use]
    pub fn optional_service<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Service,
    {
        let key = ServiceKey::of::<T>();
        let r = self.inner.read();
        r.table
            .get(&key)
            .and_then(|bucket| bucket.first())
            .and_then(ServiceRef::downcast::<T>)
    }

    /// First instance registered under `T`.
    ///
    /// # Errors
    /// `DirectoryError::ServiceNotFound` if nothing is registered under `T`.
    pub fn require_service<T>(&self) -> Result<Arc<T>, DirectoryError>
    where
        T: ?Sized + Service,
    {
        self.optional_service::<T>()
            .ok_or(DirectoryError::ServiceNotFound {
                key: ServiceKey::of::<T>(),
            })
    }

    /// All instances registered under `T`, in registration order.
    #[must_use]
    pub fn optional_services<T>(&self) -> Vec<Arc<T>>
    where
        T: ?Sized + Service,
    {
        let key = ServiceKey::of::<T>();
        let r = self.inner.read();
        r.table
            .get(&key)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(ServiceRef::downcast::<T>)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every registered instance. Order across keys is unspecified; order
    /// within one key is registration order.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceRef> {
        self.inner.read().all()
    }

    /// Subscribe to directory events emitted from now on.
    ///
    /// After `close()` the subscription is already terminated.
    #[must_use]
    pub fn events(&self) -> EventSubscription {
        self.inner.write().events.subscribe()
    }

    /// `true` if at least one instance is registered under `T`.
    #[must_use]
    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + Service,
    {
        self.inner.read().table.contains_key(&ServiceKey::of::<T>())
    }

    /// Total number of registered instances across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().table.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().table.is_empty()
    }

    /// Shut the directory down.
    ///
    /// Only the first call does anything: the state moves to `Closing`,
    /// `DirectoryClosing` is emitted, every closable instance still registered is
    /// closed once even if it sits under several entries (failures, panics
    /// included, don't stop the rest), the state moves to `Closed`,
    /// `DirectoryClosed` is emitted and the event stream ends. Registered
    /// entries stay visible to lookups.
    ///
    /// # Errors
    /// `CloseError` if at least one service failed to close. The directory is
    /// `Closed` regardless.
    pub fn close(&self) -> Result<(), CloseError> {
        let services = {
            let mut w = self.inner.write();
            if w.state != DirectoryState::Open {
                tracing::debug!(directory = %self.name, state = %w.state, "close: already requested");
                return Ok(());
            }
            w.state = DirectoryState::Closing;
            tracing::info!(directory = %self.name, "Closing service directory");
            w.events.publish(&ServiceEvent::DirectoryClosing);
            w.all()
        };

        // Closers run without the lock so they may call back into lookups.
        let mut failures = Vec::new();
        for service in closables(services) {
            let Some(closable) = service.closable() else {
                continue;
            };
            tracing::debug!(
                directory = %self.name,
                key = %service.key(),
                service = service.description(),
                "close"
            );
            if let Err(err) = close_one(closable) {
                tracing::warn!(
                    directory = %self.name,
                    key = %service.key(),
                    service = service.description(),
                    error = %format!("{err:#}"),
                    "Failed to close service"
                );
                failures.push(CloseFailure::new(&service, err));
            }
        }

        {
            let mut w = self.inner.write();
            w.state = DirectoryState::Closed;
            w.events.publish(&ServiceEvent::DirectoryClosed);
            w.events.close();
        }
        tracing::info!(
            directory = %self.name,
            failures = failures.len(),
            "Service directory closed"
        );

        CloseError::from_failures(failures).map_or(Ok(()), Err)
    }
}

/// Closable entries of `services`, each allocation once, in table order.
fn closables(services: Vec<ServiceRef>) -> Vec<ServiceRef> {
    let mut unique: Vec<ServiceRef> = Vec::with_capacity(services.len());
    for service in services {
        if service.closable().is_some() && !unique.iter().any(|seen| seen.same_instance(&service)) {
            unique.push(service);
        }
    }
    unique
}

/// Run one closer; a panic is reported as a failure so shutdown still completes.
fn close_one(closable: &dyn Closable) -> anyhow::Result<()> {
    panic::catch_unwind(AssertUnwindSafe(|| closable.close())).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Err(anyhow::anyhow!("close panicked: {message}"))
    })
}

impl fmt::Debug for ServiceDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.inner.read();
        let keys: Vec<&'static str> = r.table.keys().map(ServiceKey::name).collect();
        f.debug_struct("ServiceDirectory")
            .field("name", &self.name)
            .field("state", &r.state)
            .field("keys", &keys)
            .field("subscribers", &r.events.subscriber_count())
            .finish()
    }
}
