//! 组件生命周期集成测试
mod common;

use common::*;
use component_runtime::{
    ComponentImplementation, ComponentMetadata, ImplementationCatalog, ReferenceMetadata,
};
use scr_common::{ComponentState, DeactivationReason};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mandatory_reference_gates_activation() {
    let log = new_log();
    let harness =
        Harness::new(ImplementationCatalog::new().with(recorder("consumer", &log).build()));
    harness
        .runtime
        .register_descriptor(
            ComponentMetadata::new("consumer", "consumer").with_reference(
                ReferenceMetadata::new("log", "log.Service")
                    .with_bind("bind")
                    .with_unbind("unbind"),
            ),
        )
        .unwrap();

    assert!(
        harness
            .runtime
            .wait_for_state("consumer", ComponentState::UnsatisfiedReference, WAIT)
            .await
    );
    harness.settle().await;
    assert!(events(&log).is_empty());
    assert_eq!(harness.snapshot("consumer").unsatisfied_references(), vec!["log"]);

    let primary = harness.publish("log.Service", "primary", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("consumer", ComponentState::Active, WAIT)
            .await
    );
    assert_eq!(events(&log), ["bind:primary", "activate"]);
    assert_eq!(harness.snapshot("consumer").bound("log"), vec![primary.id()]);

    harness.unpublish(&primary);
    assert!(
        harness
            .runtime
            .wait_for_state("consumer", ComponentState::UnsatisfiedReference, WAIT)
            .await
    );
    harness.settle().await;
    assert_eq!(
        events(&log),
        [
            "bind:primary",
            "activate",
            "deactivate:ReferenceUnsatisfied",
            "unbind:primary"
        ]
    );
    let snapshot = harness.snapshot("consumer");
    assert_eq!(
        snapshot.last_deactivation,
        Some(DeactivationReason::ReferenceUnsatisfied)
    );
    assert!(snapshot.activated_at.is_none());
}

struct Tracked {
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_at_most_one_instance_under_event_storm() {
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let constructed = Arc::new(AtomicUsize::new(0));

    let implementation = {
        let live = live.clone();
        let peak = peak.clone();
        let constructed = constructed.clone();
        ComponentImplementation::builder("tracked", move |_| {
            constructed.fetch_add(1, Ordering::SeqCst);
            Ok(Tracked {
                live: live.clone(),
                peak: peak.clone(),
            })
        })
        .activate("activate", |t: &Tracked, _| {
            let now = t.live.fetch_add(1, Ordering::SeqCst) + 1;
            t.peak.fetch_max(now, Ordering::SeqCst);
            Ok(())
        })
        .deactivate("deactivate", |t: &Tracked, _, _| {
            t.live.fetch_sub(1, Ordering::SeqCst);
        })
        .build()
    };

    let harness = Arc::new(Harness::new(ImplementationCatalog::new().with(implementation)));
    harness
        .runtime
        .register_descriptor(
            ComponentMetadata::new("tracked", "tracked").with_reference(
                ReferenceMetadata::new("source", "source.Service").with_cardinality("1..n"),
            ),
        )
        .unwrap();

    let mut workers = Vec::new();
    for worker in 0..4 {
        let harness = harness.clone();
        workers.push(tokio::task::spawn_blocking(move || {
            for round in 0..25 {
                let capability =
                    harness.publish("source.Service", &format!("s{worker}-{round}"), round);
                if round % 3 != 0 {
                    harness.unpublish(&capability);
                }
            }
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    harness.settle().await;
    assert!(
        harness
            .runtime
            .wait_for_state("tracked", ComponentState::Active, WAIT)
            .await
    );
    assert_eq!(harness.runtime.describe("tracked").unwrap().len(), 1);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(live.load(Ordering::SeqCst), 1);
    assert_eq!(
        constructed.load(Ordering::SeqCst) as u64,
        harness.snapshot("tracked").activation_count
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_activation_is_all_or_nothing() {
    let log = new_log();
    let implementation = recorder("picky", &log)
        .method("bind_strict", |r: &Recorder, capability| {
            let name = name_of(capability);
            if name == "bad" {
                return Err("拒绝绑定".into());
            }
            r.log.lock().push(format!("bind:{name}"));
            Ok(())
        })
        .build();
    let harness = Harness::new(ImplementationCatalog::new().with(implementation));

    let first = harness.publish("first.Service", "first", 0);
    let bad = harness.publish("second.Service", "bad", 0);
    harness
        .runtime
        .register_descriptor(
            ComponentMetadata::new("picky", "picky")
                .with_reference(
                    ReferenceMetadata::new("first", "first.Service")
                        .with_bind("bind")
                        .with_unbind("unbind"),
                )
                .with_reference(
                    ReferenceMetadata::new("second", "second.Service").with_bind("bind_strict"),
                ),
        )
        .unwrap();
    harness.settle().await;

    let snapshot = harness.snapshot("picky");
    assert_eq!(snapshot.state, ComponentState::UnsatisfiedReference);
    assert!(snapshot.last_failure.is_some());
    assert_eq!(snapshot.activation_count, 0);
    assert_eq!(snapshot.references[1].failed, vec![bad.id()]);
    assert_eq!(events(&log), ["bind:first", "unbind:first"]);
    assert!(harness.runtime.check_health().failure("picky").is_some());

    harness.publish("second.Service", "good", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("picky", ComponentState::Active, WAIT)
            .await
    );
    assert_eq!(
        events(&log),
        [
            "bind:first",
            "unbind:first",
            "bind:first",
            "bind:good",
            "activate"
        ]
    );
    let snapshot = harness.snapshot("picky");
    assert!(snapshot.last_failure.is_none());
    assert_eq!(snapshot.bound("first"), vec![first.id()]);
    assert!(harness.runtime.check_health().is_healthy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_activate_is_contained() {
    let implementation = ComponentImplementation::builder("fragile", |_| Ok(()))
        .activate("activate", |_: &(), _| panic!("激活时崩溃"))
        .build();
    let harness = Harness::new(ImplementationCatalog::new().with(implementation));
    harness
        .runtime
        .register_descriptor(
            ComponentMetadata::new("fragile", "fragile").with_provides("fragile.Service"),
        )
        .unwrap();
    harness.settle().await;

    let snapshot = harness.snapshot("fragile");
    assert_eq!(snapshot.state, ComponentState::UnsatisfiedReference);
    assert!(snapshot
        .last_failure
        .as_deref()
        .is_some_and(|failure| failure.contains("激活时崩溃")));
    assert!(harness.published("fragile.Service").is_empty());

    harness.runtime.disable("fragile").unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("fragile", ComponentState::Disabled, WAIT)
            .await
    );
    assert!(harness.runtime.check_health().is_healthy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_default_disabled_component_waits_for_enable() {
    let log = new_log();
    let harness = Harness::new(ImplementationCatalog::new().with(recorder("lazy", &log).build()));
    harness
        .runtime
        .register_descriptor(ComponentMetadata::new("lazy", "lazy").with_enabled(false))
        .unwrap();
    harness.settle().await;
    assert_eq!(harness.snapshot("lazy").state, ComponentState::Disabled);
    assert!(!harness.runtime.is_enabled("lazy").unwrap());

    harness.runtime.enable("lazy").unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("lazy", ComponentState::Active, WAIT)
            .await
    );
    assert_eq!(events(&log), ["activate"]);
}
