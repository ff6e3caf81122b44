#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Common test services for service directory integration tests

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use modkit_services::{Closable, Service, ServiceEvent};
use parking_lot::Mutex;

#[derive(Debug)]
pub struct FakeService;

impl Service for FakeService {
    fn description(&self) -> &str {
        "Fake service"
    }
}

#[derive(Debug)]
pub struct CrashClosedService;

impl Service for CrashClosedService {
    fn description(&self) -> &str {
        "Crash closed service"
    }

    fn as_closable(&self) -> Option<&dyn Closable> {
        Some(self)
    }
}

impl Closable for CrashClosedService {
    fn close(&self) -> anyhow::Result<()> {
        anyhow::bail!("Cannot close!")
    }
}

/// Closable service that records the order in which services were closed.
#[derive(Debug)]
pub struct TrackedService {
    pub name: &'static str,
    pub journal: Arc<Mutex<Vec<&'static str>>>,
    pub closes: AtomicUsize,
}

impl TrackedService {
    pub fn new(name: &'static str, journal: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            journal: journal.clone(),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Service for TrackedService {
    fn description(&self) -> &str {
        self.name
    }

    fn as_closable(&self) -> Option<&dyn Closable> {
        Some(self)
    }
}

impl Closable for TrackedService {
    fn close(&self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().push(self.name);
        Ok(())
    }
}

#[derive(Debug)]
pub struct PanicClosedService;

impl Service for PanicClosedService {
    fn description(&self) -> &str {
        "Panic closed service"
    }

    fn as_closable(&self) -> Option<&dyn Closable> {
        Some(self)
    }
}

impl Closable for PanicClosedService {
    fn close(&self) -> anyhow::Result<()> {
        panic!("Cannot close, panicking!")
    }
}

/// Event variant names, for compact order assertions.
pub fn kinds(events: &[ServiceEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|e| match e {
            ServiceEvent::Registered { .. } => "registered",
            ServiceEvent::Deregistered { .. } => "deregistered",
            ServiceEvent::DirectoryClosing => "closing",
            ServiceEvent::DirectoryClosed => "closed",
        })
        .collect()
}
