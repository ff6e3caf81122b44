#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Registration, deregistration and lookup behaviour of `ServiceDirectory`.

mod common;

use std::sync::Arc;

use common::{FakeService, kinds};
use modkit_services::{
    DirectoryError, Service, ServiceDirectory, ServiceEvent, ServiceKey, ServiceRef,
};

trait Greeter: Service {
    fn greet(&self) -> String;
}

struct English;

impl Service for English {
    fn description(&self) -> &str {
        "English greeter"
    }
}

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_owned()
    }
}

struct French;

impl Service for French {
    fn description(&self) -> &str {
        "French greeter"
    }
}

impl Greeter for French {
    fn greet(&self) -> String {
        "bonjour".to_owned()
    }
}

fn registered_service(event: &ServiceEvent) -> &ServiceRef {
    match event {
        ServiceEvent::Registered { service, .. } => service,
        other => panic!("expected Registered, got {other:?}"),
    }
}

fn deregistered_service(event: &ServiceEvent) -> &ServiceRef {
    match event {
        ServiceEvent::Deregistered { service, .. } => service,
        other => panic!("expected Deregistered, got {other:?}"),
    }
}

#[test]
fn missing_service_is_reported() {
    let dir = ServiceDirectory::new();

    assert!(dir.optional_service::<FakeService>().is_none());
    assert!(dir.optional_services::<FakeService>().is_empty());
    assert!(dir.services().is_empty());

    let err = dir.require_service::<FakeService>().unwrap_err();
    assert!(err.is_not_found());
    match &err {
        DirectoryError::ServiceNotFound { key } => {
            assert_eq!(*key, ServiceKey::of::<FakeService>());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().starts_with("No implementations available of type"));
    assert!(err.to_string().contains("FakeService"));
}

#[test]
fn register_then_deregister_emits_both_events() {
    let dir = ServiceDirectory::new();
    let mut events = dir.events();

    let f0 = Arc::new(FakeService);
    dir.register(f0.clone()).unwrap();
    assert!(Arc::ptr_eq(&dir.require_service::<FakeService>().unwrap(), &f0));

    dir.deregister(&f0).unwrap();
    assert!(dir.optional_service::<FakeService>().is_none());

    let got = events.drain();
    assert_eq!(kinds(&got), ["registered", "deregistered"]);
    assert!(registered_service(&got[0]).is(&f0));
    assert!(deregistered_service(&got[1]).is(&f0));
    assert_eq!(got[0].key(), Some(ServiceKey::of::<FakeService>()));
    assert_eq!(got[1].key(), Some(ServiceKey::of::<FakeService>()));
}

#[test]
fn several_instances_keep_registration_order() {
    let dir = ServiceDirectory::new();
    let mut events = dir.events();

    let f0 = Arc::new(FakeService);
    let f1 = Arc::new(FakeService);
    let f2 = Arc::new(FakeService);
    for f in [&f0, &f1, &f2] {
        dir.register(f.clone()).unwrap();
    }

    let all = dir.optional_services::<FakeService>();
    assert_eq!(all.len(), 3);
    assert!(Arc::ptr_eq(&all[0], &f0));
    assert!(Arc::ptr_eq(&all[1], &f1));
    assert!(Arc::ptr_eq(&all[2], &f2));
    assert!(Arc::ptr_eq(&dir.require_service::<FakeService>().unwrap(), &f0));

    dir.deregister(&f1).unwrap();
    let rest = dir.optional_services::<FakeService>();
    assert_eq!(rest.len(), 2);
    assert!(Arc::ptr_eq(&rest[0], &f0));
    assert!(Arc::ptr_eq(&rest[1], &f2));

    dir.deregister(&f0).unwrap();
    dir.deregister(&f2).unwrap();
    assert!(dir.optional_services::<FakeService>().is_empty());
    assert!(!dir.contains::<FakeService>());

    let got = events.drain();
    assert_eq!(
        kinds(&got),
        [
            "registered",
            "registered",
            "registered",
            "deregistered",
            "deregistered",
            "deregistered"
        ]
    );
    assert!(deregistered_service(&got[3]).is(&f1));
    assert!(deregistered_service(&got[4]).is(&f0));
    assert!(deregistered_service(&got[5]).is(&f2));
}

#[test]
fn deregister_all_emits_one_event_per_instance() {
    let dir = ServiceDirectory::new();
    let f0 = Arc::new(FakeService);
    let f1 = Arc::new(FakeService);
    let f2 = Arc::new(FakeService);
    for f in [&f0, &f1, &f2] {
        dir.register(f.clone()).unwrap();
    }

    let mut events = dir.events();
    dir.deregister_all::<FakeService>().unwrap();

    assert!(dir.optional_services::<FakeService>().is_empty());
    assert!(dir.require_service::<FakeService>().unwrap_err().is_not_found());

    let got = events.drain();
    assert_eq!(kinds(&got), ["deregistered", "deregistered", "deregistered"]);
    assert!(deregistered_service(&got[0]).is(&f0));
    assert!(deregistered_service(&got[1]).is(&f1));
    assert!(deregistered_service(&got[2]).is(&f2));
}

#[test]
fn removing_what_is_not_there_is_silent() {
    let dir = ServiceDirectory::new();
    let mut events = dir.events();

    dir.deregister(&Arc::new(FakeService)).unwrap();
    dir.deregister_all::<FakeService>().unwrap();

    let registered = Arc::new(FakeService);
    dir.register(registered.clone()).unwrap();
    dir.deregister(&Arc::new(FakeService)).unwrap();

    assert_eq!(dir.len(), 1);
    assert_eq!(kinds(&events.drain()), ["registered"]);
}

#[test]
fn trait_object_keys_resolve_implementations() {
    let dir = ServiceDirectory::new();
    dir.register::<dyn Greeter>(Arc::new(English)).unwrap();
    dir.register::<dyn Greeter>(Arc::new(French)).unwrap();

    assert_eq!(dir.require_service::<dyn Greeter>().unwrap().greet(), "hello");
    let greetings: Vec<String> = dir
        .optional_services::<dyn Greeter>()
        .iter()
        .map(|g| g.greet())
        .collect();
    assert_eq!(greetings, ["hello", "bonjour"]);

    // The concrete type is a different key.
    assert!(dir.optional_service::<English>().is_none());
}

#[test]
fn services_lists_every_key() {
    let dir = ServiceDirectory::new();
    dir.register::<dyn Greeter>(Arc::new(English)).unwrap();
    dir.register(Arc::new(FakeService)).unwrap();
    dir.register(Arc::new(FakeService)).unwrap();

    let all = dir.services();
    assert_eq!(all.len(), 3);

    let mut descriptions: Vec<&str> = all.iter().map(ServiceRef::description).collect();
    descriptions.sort_unstable();
    assert_eq!(descriptions, ["English greeter", "Fake service", "Fake service"]);

    let greeter = all
        .iter()
        .find(|s| s.key() == ServiceKey::of::<dyn Greeter>())
        .unwrap();
    assert_eq!(greeter.downcast::<dyn Greeter>().unwrap().greet(), "hello");
    assert!(greeter.downcast::<FakeService>().is_none());
}

#[test]
fn event_display_names_key_and_description() {
    let dir = ServiceDirectory::new();
    let mut events = dir.events();
    let f0 = Arc::new(FakeService);
    dir.register(f0.clone()).unwrap();
    dir.deregister(&f0).unwrap();

    let got = events.drain();
    let key = ServiceKey::of::<FakeService>();
    assert_eq!(got[0].to_string(), format!("[ServiceRegistered {key} Fake service]"));
    assert_eq!(got[1].to_string(), format!("[ServiceDeregistered {key} Fake service]"));
}
