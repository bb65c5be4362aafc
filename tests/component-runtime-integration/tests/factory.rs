//! 工厂配置组件集成测试
mod common;

use common::*;
use component_runtime::{ComponentMetadata, ImplementationCatalog};
use config_abstractions::RuntimeSettings;
use scr_common::{ComponentState, RuntimeError, ValidationError};
use serde_json::json;

fn worker() -> ComponentMetadata {
    ComponentMetadata::new("worker", "worker")
        .as_factory()
        .with_provides("worker.Service")
        .with_property("size", json!(1))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_one_manager_per_factory_configuration() {
    let log = new_log();
    let harness = Harness::new(ImplementationCatalog::new().with(recorder("worker", &log).build()));
    harness.runtime.register_descriptor(worker()).unwrap();
    harness.settle().await;
    assert!(harness.runtime.describe("worker").unwrap().is_empty());

    let small = harness
        .store
        .create_factory_configuration("worker", properties(&[("size", json!(2))]));
    let large = harness
        .store
        .create_factory_configuration("worker", properties(&[("size", json!(8))]));
    harness.settle().await;

    let snapshots = harness.runtime.describe("worker").unwrap();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots.iter().all(|s| s.state == ComponentState::Active));
    assert_ne!(snapshots[0].id, snapshots[1].id);
    for configuration in [&small, &large] {
        let snapshot = snapshots
            .iter()
            .find(|s| s.configuration_pid.as_deref() == Some(configuration.pid.as_str()))
            .unwrap();
        assert_eq!(snapshot.properties.get("service.pid"), Some(&json!(configuration.pid)));
        assert_eq!(
            snapshot.properties.get("service.factoryPid"),
            Some(&json!("worker"))
        );
        assert_eq!(
            snapshot.properties.get("size"),
            configuration.properties.get("size")
        );
    }
    assert_eq!(harness.published("worker.Service").len(), 2);

    harness.store.delete(&small.pid).unwrap();
    harness.settle().await;

    let snapshots = harness.runtime.describe("worker").unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].configuration_pid.as_deref(), Some(large.pid.as_str()));
    let published = harness.published("worker.Service");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].properties().get("size"), Some(&json!(8)));
    assert!(events(&log).contains(&"deactivate:ConfigurationDeleted".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_existing_factory_configurations_are_picked_up() {
    let log = new_log();
    let harness = Harness::new(ImplementationCatalog::new().with(recorder("worker", &log).build()));
    harness
        .store
        .create_factory_configuration("worker", properties(&[("size", json!(3))]));

    harness.runtime.register_descriptor(worker()).unwrap();
    harness.settle().await;

    let snapshots = harness.runtime.describe("worker").unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].state, ComponentState::Active);
    assert_eq!(snapshots[0].properties.get("size"), Some(&json!(3)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_factory_support_can_be_switched_off() {
    let log = new_log();
    let harness = Harness::with_settings(
        ImplementationCatalog::new().with(recorder("worker", &log).build()),
        RuntimeSettings::default().with_factory_enabled(false),
    );
    harness.runtime.register_descriptor(worker()).unwrap();
    harness
        .store
        .create_factory_configuration("worker", properties(&[("size", json!(2))]));
    harness.settle().await;

    assert_eq!(harness.runtime.component_names(), vec!["worker".to_string()]);
    assert!(harness.runtime.describe("worker").unwrap().is_empty());
    assert!(events(&log).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disabling_factory_component_deactivates_every_instance() {
    let log = new_log();
    let harness = Harness::new(ImplementationCatalog::new().with(recorder("worker", &log).build()));
    harness.runtime.register_descriptor(worker()).unwrap();
    for size in [1, 2, 3] {
        harness
            .store
            .create_factory_configuration("worker", properties(&[("size", json!(size))]));
    }
    harness.settle().await;
    assert_eq!(harness.published("worker.Service").len(), 3);

    harness.runtime.disable("worker").unwrap();
    harness.settle().await;
    let snapshots = harness.runtime.describe("worker").unwrap();
    assert_eq!(snapshots.len(), 3);
    assert!(snapshots.iter().all(|s| s.state == ComponentState::Disabled));
    assert!(harness.published("worker.Service").is_empty());
    assert_eq!(
        events(&log)
            .iter()
            .filter(|e| e.as_str() == "deactivate:Disabled")
            .count(),
        3
    );
}

#[tokio::test]
async fn test_factory_cannot_ignore_configuration() {
    let harness = Harness::new(
        ImplementationCatalog::new().with(recorder("worker", &new_log()).build()),
    );
    let result = harness
        .runtime
        .register_descriptor(worker().with_configuration_policy("ignore"));
    assert!(matches!(
        result,
        Err(RuntimeError::Validation {
            source: ValidationError::FactoryIgnoresConfiguration { .. }
        })
    ));
}
