//! 配置投递集成测试
mod common;

use common::*;
use component_runtime::{ComponentMetadata, ImplementationCatalog, ReferenceMetadata};
use config_abstractions::{Configuration, ConfigurationEvent};
use scr_common::{ComponentState, DeactivationReason};
use serde_json::json;

fn catalog(log: &EventLog) -> ImplementationCatalog {
    let implementation = recorder("service", log)
        .modified("modified", |r: &Recorder, context| {
            let limit = context.property("limit").unwrap_or_default();
            r.log.lock().push(format!("modified:{limit}"));
            Ok(())
        })
        .build();
    ImplementationCatalog::new().with(implementation)
}

fn service() -> ComponentMetadata {
    ComponentMetadata::new("service", "service")
        .with_configuration_policy("require")
        .with_provides("service.Api")
        .with_property("limit", json!(1))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_required_configuration_gates_activation() {
    let log = new_log();
    let harness = Harness::new(catalog(&log));
    harness.runtime.register_descriptor(service()).unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("service", ComponentState::UnsatisfiedConfiguration, WAIT)
            .await
    );
    harness.settle().await;
    assert!(events(&log).is_empty());

    harness
        .store
        .update("service", properties(&[("limit", json!(5)), (".secret", json!("x"))]));
    assert!(
        harness
            .runtime
            .wait_for_state("service", ComponentState::Active, WAIT)
            .await
    );

    let snapshot = harness.snapshot("service");
    assert_eq!(snapshot.properties.get("limit"), Some(&json!(5)));
    assert_eq!(snapshot.properties.get("service.pid"), Some(&json!("service")));
    assert_eq!(snapshot.properties.get("component.name"), Some(&json!("service")));

    let published = harness.published("service.Api");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].properties().get("limit"), Some(&json!(5)));
    assert!(published[0].properties().get(".secret").is_none());

    harness.store.delete("service").unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("service", ComponentState::UnsatisfiedConfiguration, WAIT)
            .await
    );
    harness.settle().await;
    assert_eq!(
        harness.snapshot("service").last_deactivation,
        Some(DeactivationReason::ConfigurationDeleted)
    );
    assert!(harness.published("service.Api").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_redelivery_and_stale_configuration_are_ignored() {
    let log = new_log();
    let harness = Harness::new(catalog(&log));
    harness.runtime.register_descriptor(service()).unwrap();
    let current = harness
        .store
        .update("service", properties(&[("limit", json!(5))]));
    let current = harness
        .store
        .update(&current.pid, properties(&[("limit", json!(6))]));
    harness.settle().await;
    let settled = harness.snapshot("service");
    assert_eq!(settled.state, ComponentState::Active);
    let before = events(&log);

    harness.store.redeliver("service").unwrap();
    harness.store.redeliver("service").unwrap();
    harness
        .runtime
        .deliver_configuration(&ConfigurationEvent::Updated(Configuration::new(
            "service",
            None,
            properties(&[("limit", json!(99))]),
            current.change_count - 1,
        )));
    harness.settle().await;

    assert_eq!(events(&log), before);
    let snapshot = harness.snapshot("service");
    assert_eq!(snapshot.properties.get("limit"), Some(&json!(6)));
    assert_eq!(snapshot.activation_count, settled.activation_count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_modified_callback_updates_in_place() {
    let log = new_log();
    let harness = Harness::new(catalog(&log));
    harness
        .runtime
        .register_descriptor(service().with_modified("modified"))
        .unwrap();
    harness
        .store
        .update("service", properties(&[("limit", json!(5))]));
    assert!(
        harness
            .runtime
            .wait_for_state("service", ComponentState::Active, WAIT)
            .await
    );

    harness
        .store
        .update("service", properties(&[("limit", json!(7))]));
    harness.settle().await;

    assert_eq!(events(&log), ["activate", "modified:7"]);
    let snapshot = harness.snapshot("service");
    assert_eq!(snapshot.activation_count, 1);
    assert_eq!(snapshot.properties.get("limit"), Some(&json!(7)));
    let published = harness.published("service.Api");
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].properties().get("limit"), Some(&json!(7)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_change_without_modified_reactivates() {
    let log = new_log();
    let harness = Harness::new(catalog(&log));
    harness.runtime.register_descriptor(service()).unwrap();
    harness
        .store
        .update("service", properties(&[("limit", json!(5))]));
    assert!(
        harness
            .runtime
            .wait_for_state("service", ComponentState::Active, WAIT)
            .await
    );

    harness
        .store
        .update("service", properties(&[("limit", json!(7))]));
    harness.settle().await;

    assert_eq!(
        events(&log),
        ["activate", "deactivate:ConfigurationModified", "activate"]
    );
    let snapshot = harness.snapshot("service");
    assert_eq!(snapshot.state, ComponentState::Active);
    assert_eq!(snapshot.activation_count, 2);
    assert_eq!(
        snapshot.last_deactivation,
        Some(DeactivationReason::ConfigurationModified)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_configuration_overrides_reference_target_and_minimum() {
    let log = new_log();
    let harness = Harness::new(catalog(&log));
    harness
        .runtime
        .register_descriptor(
            ComponentMetadata::new("service", "service").with_reference(
                ReferenceMetadata::new("backend", "backend.Service")
                    .with_cardinality("1..n")
                    .with_bind("bind")
                    .with_unbind("unbind"),
            ),
        )
        .unwrap();
    let primary = harness.publish("backend.Service", "primary", 10);
    let replica = harness.publish("backend.Service", "replica", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("service", ComponentState::Active, WAIT)
            .await
    );
    harness.settle().await;
    assert_eq!(
        harness.snapshot("service").bound("backend"),
        vec![primary.id(), replica.id()]
    );

    harness.store.update(
        "service",
        properties(&[("backend.target", json!({ "name": "replica" }))]),
    );
    harness.settle().await;
    let snapshot = harness.snapshot("service");
    assert_eq!(snapshot.state, ComponentState::Active);
    assert_eq!(snapshot.bound("backend"), vec![replica.id()]);

    harness.store.update(
        "service",
        properties(&[("backend.cardinality.minimum", json!(3))]),
    );
    harness.settle().await;
    assert_eq!(
        harness.snapshot("service").state,
        ComponentState::UnsatisfiedReference
    );

    harness.publish("backend.Service", "spare", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("service", ComponentState::Active, WAIT)
            .await
    );
    assert_eq!(harness.snapshot("service").bound("backend").len(), 3);
}
