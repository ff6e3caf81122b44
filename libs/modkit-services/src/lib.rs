#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Service Directory Library
//!
//! An in-process, typed registry where parts of an application publish
//! implementations of capability interfaces and other parts resolve them by
//! interface type. It provides:
//! - explicit registration and deregistration, several instances per interface
//! - first-instance and all-instances lookups
//! - an event stream of registrations, deregistrations and shutdown
//! - shutdown that closes every closable service once, aggregating failures
//!
//! There is no auto-wiring and no global instance: the owner constructs a
//! [`ServiceDirectory`] and hands it to whoever needs it.
//!
//! ```
//! use std::sync::Arc;
//! use modkit_services::{Service, ServiceDirectory, ServiceEvent};
//!
//! trait Clock: Service {
//!     fn now_ms(&self) -> u64;
//! }
//!
//! struct FixedClock;
//!
//! impl Service for FixedClock {
//!     fn description(&self) -> &str {
//!         "Fixed clock"
//!     }
//! }
//!
//! impl Clock for FixedClock {
//!     fn now_ms(&self) -> u64 {
//!         42
//!     }
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let directory = ServiceDirectory::new();
//! let mut events = directory.events();
//!
//! directory.register::<dyn Clock>(Arc::new(FixedClock))?;
//! assert_eq!(directory.require_service::<dyn Clock>()?.now_ms(), 42);
//!
//! directory.close()?;
//! assert!(matches!(events.try_recv(), Ok(ServiceEvent::Registered { .. })));
//! assert_eq!(events.try_recv().ok(), Some(ServiceEvent::DirectoryClosing));
//! assert_eq!(events.try_recv().ok(), Some(ServiceEvent::DirectoryClosed));
//! # Ok(())
//! # }
//! ```

mod api;
mod directory;
mod events;
mod key;
mod service;

pub mod config;
pub mod error;

pub use api::{ServiceLookup, ServiceRegistry};
pub use config::{ConfigError, DirectoryConfig};
pub use directory::{DirectoryState, ServiceDirectory};
pub use error::{CloseError, CloseFailure, DirectoryError};
pub use events::{EventSubscription, ServiceEvent, TryRecvError};
pub use key::ServiceKey;
pub use service::{Closable, Service, ServiceRef};
