//! 停用顺序集成测试
mod common;

use common::*;
use component_runtime::{ComponentMetadata, ImplementationCatalog, ReferenceMetadata};
use registry_abstractions::{CapabilityEvent, CapabilityEventKind, CapabilityRegistry};
use scr_common::{ComponentState, TargetFilter};
use std::sync::Arc;

fn reference(name: &str, capability_type: &str) -> ReferenceMetadata {
    ReferenceMetadata::new(name, capability_type)
        .with_bind("bind")
        .with_unbind("unbind")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deactivation_unpublishes_then_unbinds_in_reverse() {
    let log = new_log();
    let harness = Harness::new(ImplementationCatalog::new().with(recorder("consumer", &log).build()));
    harness.publish("a.Api", "A", 0);
    harness.publish("b.Api", "B", 0);
    harness.publish("c.Api", "C", 0);

    let watcher = log.clone();
    let _subscription = harness.registry.subscribe(
        "consumer.Api",
        TargetFilter::any(),
        Arc::new(move |event: &CapabilityEvent| {
            if event.kind == CapabilityEventKind::Removing {
                watcher.lock().push("removing".to_string());
            }
        }),
    );

    harness
        .runtime
        .register_descriptor(
            ComponentMetadata::new("consumer", "consumer")
                .with_provides("consumer.Api")
                .with_reference(reference("a", "a.Api"))
                .with_reference(reference("b", "b.Api"))
                .with_reference(reference("c", "c.Api")),
        )
        .unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("consumer", ComponentState::Active, WAIT)
            .await
    );
    harness.settle().await;
    assert_eq!(events(&log), ["bind:A", "bind:B", "bind:C", "activate"]);
    log.lock().clear();

    harness.runtime.disable("consumer").unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("consumer", ComponentState::Disabled, WAIT)
            .await
    );
    harness.settle().await;

    assert_eq!(
        events(&log),
        ["removing", "deactivate:Disabled", "unbind:C", "unbind:B", "unbind:A"]
    );
    assert!(harness.published("consumer.Api").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_multiple_reference_unbinds_in_reverse_bind_order() {
    let log = new_log();
    let harness = Harness::new(ImplementationCatalog::new().with(recorder("collector", &log).build()));
    harness.publish("item.Api", "low", 10);
    harness.publish("item.Api", "high", 30);
    harness.publish("item.Api", "middle", 20);

    harness
        .runtime
        .register_descriptor(
            ComponentMetadata::new("collector", "collector").with_reference(
                reference("items", "item.Api")
                    .with_cardinality("0..n")
                    .with_policy("dynamic"),
            ),
        )
        .unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("collector", ComponentState::Active, WAIT)
            .await
    );
    harness.settle().await;
    assert_eq!(
        events(&log),
        ["bind:high", "bind:middle", "bind:low", "activate"]
    );
    log.lock().clear();

    harness.runtime.disable("collector").unwrap();
    harness.settle().await;
    assert_eq!(
        events(&log),
        ["deactivate:Disabled", "unbind:low", "unbind:middle", "unbind:high"]
    );
}
