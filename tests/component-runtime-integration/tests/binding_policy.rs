//! 引用绑定策略集成测试
mod common;

use common::*;
use component_runtime::{
    ComponentImplementation, ComponentMetadata, FieldValue, ImplementationCatalog,
    ReferenceMetadata,
};
use parking_lot::Mutex;
use registry_abstractions::CapabilityRegistry;
use scr_common::{ComponentState, RuntimeError, TargetFilter, ValidationError};
use serde_json::json;

fn unary(policy: &str, option: &str) -> ReferenceMetadata {
    ReferenceMetadata::new("store", "store.Service")
        .with_policy(policy)
        .with_policy_option(option)
        .with_bind("bind")
        .with_unbind("unbind")
        .with_updated("updated")
}

async fn start(reference: ReferenceMetadata) -> (Harness, EventLog) {
    let log = new_log();
    let harness = Harness::new(ImplementationCatalog::new().with(recorder("client", &log).build()));
    harness
        .runtime
        .register_descriptor(ComponentMetadata::new("client", "client").with_reference(reference))
        .unwrap();
    (harness, log)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_static_reluctant_keeps_current_binding() {
    let (harness, log) = start(unary("static", "reluctant")).await;
    let first = harness.publish("store.Service", "first", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("client", ComponentState::Active, WAIT)
            .await
    );

    harness.publish("store.Service", "better", 10);
    harness.settle().await;

    let snapshot = harness.snapshot("client");
    assert_eq!(snapshot.bound("store"), vec![first.id()]);
    assert_eq!(snapshot.activation_count, 1);
    assert_eq!(events(&log), ["bind:first", "activate"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_static_reference_rebinds_through_reactivation() {
    let (harness, log) = start(unary("static", "reluctant")).await;
    let first = harness.publish("store.Service", "first", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("client", ComponentState::Active, WAIT)
            .await
    );
    let second = harness.publish("store.Service", "second", 0);
    harness.unpublish(&first);
    harness.settle().await;

    let snapshot = harness.snapshot("client");
    assert_eq!(snapshot.state, ComponentState::Active);
    assert_eq!(snapshot.bound("store"), vec![second.id()]);
    assert_eq!(snapshot.activation_count, 2);
    assert_eq!(
        events(&log),
        [
            "bind:first",
            "activate",
            "deactivate:ReferenceUnsatisfied",
            "unbind:first",
            "bind:second",
            "activate"
        ]
    );
}

#[tokio::test]
async fn test_static_greedy_is_rejected() {
    let harness = Harness::new(
        ImplementationCatalog::new().with(recorder("client", &new_log()).build()),
    );
    let result = harness.runtime.register_descriptor(
        ComponentMetadata::new("client", "client").with_reference(unary("static", "greedy")),
    );
    assert!(matches!(
        result,
        Err(RuntimeError::Validation {
            source: ValidationError::StaticGreedyReference { .. }
        })
    ));
    assert!(harness.runtime.component_names().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dynamic_greedy_switches_without_reactivation() {
    let (harness, log) = start(unary("dynamic", "greedy")).await;
    harness.publish("store.Service", "first", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("client", ComponentState::Active, WAIT)
            .await
    );

    let better = harness.publish("store.Service", "better", 10);
    harness.settle().await;

    let snapshot = harness.snapshot("client");
    assert_eq!(snapshot.bound("store"), vec![better.id()]);
    assert_eq!(snapshot.activation_count, 1);
    assert_eq!(
        events(&log),
        ["bind:first", "activate", "bind:better", "unbind:first"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dynamic_reluctant_ignores_better_candidate() {
    let (harness, log) = start(unary("dynamic", "reluctant")).await;
    let first = harness.publish("store.Service", "first", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("client", ComponentState::Active, WAIT)
            .await
    );
    let better = harness.publish("store.Service", "better", 10);
    harness.settle().await;
    assert_eq!(harness.snapshot("client").bound("store"), vec![first.id()]);

    harness.unpublish(&first);
    harness.settle().await;
    let snapshot = harness.snapshot("client");
    assert_eq!(snapshot.bound("store"), vec![better.id()]);
    assert_eq!(snapshot.activation_count, 1);
    assert_eq!(
        events(&log),
        ["bind:first", "activate", "bind:better", "unbind:first"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dynamic_multiple_tracks_every_candidate() {
    let (harness, log) = start(
        ReferenceMetadata::new("store", "store.Service")
            .with_cardinality("0..n")
            .with_policy("dynamic")
            .with_bind("bind")
            .with_unbind("unbind"),
    )
    .await;
    assert!(
        harness
            .runtime
            .wait_for_state("client", ComponentState::Active, WAIT)
            .await
    );

    let a = harness.publish("store.Service", "a", 0);
    let b = harness.publish("store.Service", "b", 0);
    harness.settle().await;
    assert_eq!(harness.snapshot("client").bound("store"), vec![a.id(), b.id()]);

    harness.unpublish(&a);
    harness.settle().await;
    assert_eq!(harness.snapshot("client").bound("store"), vec![b.id()]);
    assert_eq!(
        events(&log),
        ["activate", "bind:a", "bind:b", "unbind:a"]
    );
    assert_eq!(harness.snapshot("client").activation_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_updated_callback_on_bound_property_change() {
    let (harness, log) = start(unary("dynamic", "reluctant")).await;
    let first = harness.publish("store.Service", "first", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("client", ComponentState::Active, WAIT)
            .await
    );

    harness
        .registry
        .update_properties(first.id(), properties(&[("name", json!("renamed"))]))
        .unwrap();
    harness.settle().await;

    assert_eq!(events(&log), ["bind:first", "activate", "updated:renamed"]);
    assert_eq!(harness.snapshot("client").activation_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_target_filter_selects_candidates() {
    let (harness, log) = start(
        unary("static", "reluctant").with_target(TargetFilter::any().with("name", json!("wanted"))),
    )
    .await;
    harness.publish("store.Service", "other", 10);
    harness.settle().await;
    assert_eq!(
        harness.snapshot("client").state,
        ComponentState::UnsatisfiedReference
    );

    let wanted = harness.publish("store.Service", "wanted", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("client", ComponentState::Active, WAIT)
            .await
    );
    assert_eq!(harness.snapshot("client").bound("store"), vec![wanted.id()]);
    assert_eq!(events(&log), ["bind:wanted", "activate"]);
}

struct Pool {
    members: Mutex<Vec<String>>,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_field_injection_follows_binding() {
    let members = std::sync::Arc::new(Mutex::new(Vec::<String>::new()));
    let observed = members.clone();
    let implementation = ComponentImplementation::builder("pool", |_| {
        Ok(Pool {
            members: Mutex::new(Vec::new()),
        })
    })
    .field("members", move |pool: &Pool, value| {
        if let FieldValue::Multiple(values) = value {
            let names: Vec<String> = values
                .iter()
                .filter_map(|v| v.reference().map(name_of))
                .collect();
            *pool.members.lock() = names.clone();
            *observed.lock() = names;
        }
        Ok(())
    })
    .build();

    let harness = Harness::new(ImplementationCatalog::new().with(implementation));
    harness
        .runtime
        .register_descriptor(
            ComponentMetadata::new("pool", "pool").with_reference(
                ReferenceMetadata::new("members", "member.Service")
                    .with_cardinality("0..n")
                    .with_policy("dynamic")
                    .with_field("members")
                    .with_field_collection_type("reference"),
            ),
        )
        .unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("pool", ComponentState::Active, WAIT)
            .await
    );

    harness.publish("member.Service", "low", 0);
    harness.publish("member.Service", "high", 5);
    harness.settle().await;
    assert_eq!(members.lock().as_slice(), ["low", "high"]);

    let candidates = harness.published("member.Service");
    harness.unpublish(&candidates[1]);
    harness.settle().await;
    assert_eq!(members.lock().as_slice(), ["high"]);
}
