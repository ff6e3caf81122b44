//! Error types for the service directory.

use thiserror::Error;

use crate::{key::ServiceKey, service::ServiceRef};

/// Errors returned by lookups and mutations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// `require_service` found no implementation for the key.
    #[error("No implementations available of type {key}")]
    ServiceNotFound { key: ServiceKey },

    /// A mutation was attempted after `close()` started.
    #[error("service directory is closed")]
    Closed,
}

impl DirectoryError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// One service that failed to close.
#[derive(Debug, Error)]
#[error("failed to close service '{description}' ({key}): {source:#}")]
pub struct CloseFailure {
    pub key: ServiceKey,
    pub description: String,
    #[source]
    pub source: anyhow::Error,
}

impl CloseFailure {
    pub(crate) fn new(service: &ServiceRef, source: anyhow::Error) -> Self {
        Self {
            key: service.key(),
            description: service.description().to_owned(),
            source,
        }
    }
}

/// Aggregate error from `close()`.
///
/// The directory is `Closed` even when this is returned. `first` is the first
/// failure in closing order; later failures are kept in `suppressed`.
#[derive(Debug, Error)]
#[error("{first}{}", suppressed_note(.suppressed.len()))]
pub struct CloseError {
    #[source]
    pub first: CloseFailure,
    pub suppressed: Vec<CloseFailure>,
}

impl CloseError {
    /// `None` when nothing failed.
    pub(crate) fn from_failures(failures: Vec<CloseFailure>) -> Option<Self> {
        let mut failures = failures.into_iter();
        let first = failures.next()?;
        Some(Self {
            first,
            suppressed: failures.collect(),
        })
    }

    /// All failures, first one included, in closing order.
    pub fn failures(&self) -> impl Iterator<Item = &CloseFailure> {
        std::iter::once(&self.first).chain(self.suppressed.iter())
    }
}

fn suppressed_note(count: usize) -> String {
    match count {
        0 => String::new(),
        1 => " (1 more failure suppressed)".to_owned(),
        n => format!(" ({n} more failures suppressed)"),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::service::Service;
    use std::sync::Arc;

    struct Disk;

    impl Service for Disk {
        fn description(&self) -> &str {
            "Disk"
        }
    }

    fn failure(msg: &'static str) -> CloseFailure {
        CloseFailure::new(&ServiceRef::new(Arc::new(Disk)), anyhow::anyhow!(msg))
    }

    #[test]
    fn not_found_names_the_key() {
        let err = DirectoryError::ServiceNotFound {
            key: ServiceKey::of::<Disk>(),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("No implementations available of type"));
        assert!(err.to_string().contains("Disk"));
    }

    #[test]
    fn closed_error_display() {
        let err = DirectoryError::Closed;
        assert!(err.is_closed());
        assert_eq!(err.to_string(), "service directory is closed");
    }

    #[test]
    fn no_failures_no_error() {
        assert!(CloseError::from_failures(Vec::new()).is_none());
    }

    #[test]
    fn single_failure_message() {
        let err = CloseError::from_failures(vec![failure("Cannot close!")]).unwrap();
        let msg = err.to_string();
        assert!(msg.contains("Cannot close!"));
        assert!(msg.contains("'Disk'"));
        assert!(!msg.contains("suppressed"));
        assert!(err.suppressed.is_empty());
    }

    #[test]
    fn later_failures_are_suppressed() {
        let err = CloseError::from_failures(vec![
            failure("first"),
            failure("second"),
            failure("third"),
        ])
        .unwrap();

        assert!(err.to_string().contains("first"));
        assert!(err.to_string().ends_with("(2 more failures suppressed)"));
        let messages: Vec<String> = err.failures().map(|f| f.source.to_string()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn source_chain_points_at_first_failure() {
        use std::error::Error as _;

        let err = CloseError::from_failures(vec![failure("boom")]).unwrap();
        let source = err.source().unwrap();
        assert!(source.to_string().contains("boom"));
    }
}
