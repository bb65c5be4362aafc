//! 组件锁超时集成测试
mod common;

use common::*;
use component_runtime::{
    ComponentImplementation, ComponentMetadata, ImplementationCatalog, ReferenceMetadata,
};
use config_abstractions::RuntimeSettings;
use parking_lot::Mutex;
use scr_common::{ComponentState, DeactivationReason};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

/// 激活时与对端会合，然后禁用对端
struct Peer {
    other: String,
    barrier: Arc<Barrier>,
    outcomes: Arc<Mutex<Vec<(String, bool)>>>,
    waiting: Arc<AtomicUsize>,
}

fn peer(
    identity: &str,
    other: &str,
    barrier: &Arc<Barrier>,
    outcomes: &Arc<Mutex<Vec<(String, bool)>>>,
    waiting: &Arc<AtomicUsize>,
) -> ComponentImplementation {
    let other = other.to_string();
    let barrier = barrier.clone();
    let outcomes = outcomes.clone();
    let waiting = waiting.clone();
    ComponentImplementation::builder(identity, move |_| {
        Ok(Peer {
            other: other.clone(),
            barrier: barrier.clone(),
            outcomes: outcomes.clone(),
            waiting: waiting.clone(),
        })
    })
    .activate("activate", |p: &Peer, context| {
        p.barrier.wait();
        p.waiting.fetch_add(1, Ordering::SeqCst);
        let timed_out = match context.disable_component(&p.other) {
            Ok(()) => false,
            Err(e) => e.is_lock_timeout(),
        };
        p.outcomes.lock().push((context.name().to_string(), timed_out));
        // 双方都尝试完毕后才释放各自的组件锁
        p.barrier.wait();
        Ok(())
    })
    .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mutual_disable_times_out_instead_of_hanging() {
    let barrier = Arc::new(Barrier::new(2));
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let waiting = Arc::new(AtomicUsize::new(0));
    let catalog = ImplementationCatalog::new()
        .with(peer("alpha", "beta", &barrier, &outcomes, &waiting))
        .with(peer("beta", "alpha", &barrier, &outcomes, &waiting));
    let settings = RuntimeSettings::default()
        .with_lock_timeout(Duration::from_millis(200))
        .with_dispatch_concurrency(4);
    let harness = Harness::with_settings(catalog, settings);

    harness
        .runtime
        .register_descriptor(ComponentMetadata::new("alpha", "alpha"))
        .unwrap();
    harness
        .runtime
        .register_descriptor(ComponentMetadata::new("beta", "beta"))
        .unwrap();

    for name in ["alpha", "beta"] {
        assert!(
            harness
                .runtime
                .wait_for_state(name, ComponentState::Disabled, WAIT)
                .await,
            "{name} 应当最终被禁用"
        );
    }
    harness.settle().await;

    let mut outcomes = outcomes.lock().clone();
    outcomes.sort();
    assert_eq!(
        outcomes,
        vec![("alpha".to_string(), true), ("beta".to_string(), true)]
    );
    for name in ["alpha", "beta"] {
        let snapshot = harness.snapshot(name);
        assert_eq!(snapshot.activation_count, 1);
        assert_eq!(snapshot.last_deactivation, Some(DeactivationReason::Disabled));
        assert!(!harness.runtime.is_enabled(name).unwrap());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_self_disable_from_activate_is_deferred() {
    let log = new_log();
    let catalog = ImplementationCatalog::new().with(
        recorder("quitter", &log)
            .activate("activate", |r: &Recorder, context| {
                let result = context.disable_component(context.name());
                r.log.lock().push(format!("disable:{}", result.is_ok()));
                Ok(())
            })
            .build(),
    );
    let harness = Harness::new(catalog);
    harness
        .runtime
        .register_descriptor(ComponentMetadata::new("quitter", "quitter"))
        .unwrap();

    assert!(
        harness
            .runtime
            .wait_for_state("quitter", ComponentState::Disabled, WAIT)
            .await
    );
    harness.settle().await;
    assert_eq!(events(&log), ["disable:true", "deactivate:Disabled"]);
    assert_eq!(harness.snapshot("quitter").activation_count, 1);
}

/// 等待计数达到目标值
async fn wait_until(counter: &AtomicUsize, target: usize) {
    let deadline = Instant::now() + WAIT;
    while counter.load(Ordering::SeqCst) < target {
        assert!(Instant::now() < deadline, "计数未达到 {target}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unrelated_component_activates_during_mutual_timeout() {
    let barrier = Arc::new(Barrier::new(2));
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let waiting = Arc::new(AtomicUsize::new(0));
    let log = new_log();
    let catalog = ImplementationCatalog::new()
        .with(peer("alpha", "beta", &barrier, &outcomes, &waiting))
        .with(peer("beta", "alpha", &barrier, &outcomes, &waiting))
        .with(recorder("bystander", &log).build());
    let settings = RuntimeSettings::default()
        .with_lock_timeout(Duration::from_secs(2))
        .with_dispatch_concurrency(4);
    let harness = Harness::with_settings(catalog, settings);

    for name in ["alpha", "beta"] {
        harness
            .runtime
            .register_descriptor(ComponentMetadata::new(name, name))
            .unwrap();
    }
    wait_until(&waiting, 2).await;

    harness
        .runtime
        .register_descriptor(ComponentMetadata::new("bystander", "bystander"))
        .unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("bystander", ComponentState::Active, Duration::from_secs(1))
            .await
    );
    assert!(outcomes.lock().is_empty(), "alpha 与 beta 应当仍在等待对方的锁");
    assert_eq!(harness.snapshot("alpha").state, ComponentState::Activating);
    assert_eq!(events(&log), ["activate"]);

    for name in ["alpha", "beta"] {
        assert!(
            harness
                .runtime
                .wait_for_state(name, ComponentState::Disabled, WAIT)
                .await
        );
    }
    harness.settle().await;
    assert_eq!(outcomes.lock().len(), 2);
    assert!(outcomes.lock().iter().all(|(_, timed_out)| *timed_out));
    assert_eq!(harness.snapshot("bystander").state, ComponentState::Active);
}

/// 停用回调中停留，期间组件锁由调用禁用的线程持有
struct SlowStop {
    stopping: Arc<AtomicBool>,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_capability_event_during_lock_contention_is_not_lost() {
    let stopping = Arc::new(AtomicBool::new(false));
    let flag = stopping.clone();
    let catalog = ImplementationCatalog::new()
        .with(
            ComponentImplementation::builder("slow_stop", move |_| {
                Ok(SlowStop {
                    stopping: flag.clone(),
                })
            })
            .deactivate("deactivate", |s: &SlowStop, _, _| {
                s.stopping.store(true, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(400));
            })
            .build(),
        )
        .with(
            ComponentImplementation::builder("switch", |_| Ok(()))
                .activate("activate", |_: &(), context| {
                    context.disable_component("consumer").map_err(Into::into)
                })
                .build(),
        );
    let settings = RuntimeSettings::default()
        .with_lock_timeout(Duration::from_millis(50))
        .with_dispatch_concurrency(4);
    let harness = Harness::with_settings(catalog, settings);
    let svc = harness.publish("svc.Service", "x", 0);

    harness
        .runtime
        .register_descriptor(
            ComponentMetadata::new("consumer", "slow_stop").with_reference(
                ReferenceMetadata::new("svc", "svc.Service").with_policy("dynamic"),
            ),
        )
        .unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("consumer", ComponentState::Active, WAIT)
            .await
    );

    harness
        .runtime
        .register_descriptor(ComponentMetadata::new("switch", "switch"))
        .unwrap();
    let deadline = Instant::now() + WAIT;
    while !stopping.load(Ordering::SeqCst) {
        assert!(Instant::now() < deadline, "consumer 未进入停用回调");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // 移除事件排在 consumer 的队列中，锁被停用回调占住直到重试用尽
    harness.unpublish(&svc);

    assert!(
        harness
            .runtime
            .wait_for_state("consumer", ComponentState::Disabled, WAIT)
            .await
    );
    harness.settle().await;
    let failure = harness.snapshot("consumer").last_failure;
    assert!(failure.is_some_and(|f| f.contains("consumer")));

    harness.runtime.enable("consumer").unwrap();
    assert!(
        harness
            .runtime
            .wait_for_state("consumer", ComponentState::UnsatisfiedReference, WAIT)
            .await
    );
    harness.settle().await;
    let snapshot = harness.snapshot("consumer");
    assert!(snapshot.bound("svc").is_empty());
    assert!(snapshot.last_failure.is_some(), "锁超时诊断应当保留到下次成功激活");

    harness.publish("svc.Service", "y", 0);
    assert!(
        harness
            .runtime
            .wait_for_state("consumer", ComponentState::Active, WAIT)
            .await
    );
    harness.settle().await;
    assert!(harness.snapshot("consumer").last_failure.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_enable_from_activate_runs_on_target_queue() {
    let log = new_log();
    let starter_log = log.clone();
    let catalog = ImplementationCatalog::new()
        .with(
            recorder("slow", &log)
                .activate("activate", |r: &Recorder, _| {
                    std::thread::sleep(Duration::from_millis(100));
                    r.log.lock().push("slow:activate".to_string());
                    Ok(())
                })
                .build(),
        )
        .with(
            ComponentImplementation::builder("starter", move |_| Ok(starter_log.clone()))
                .activate("activate", |log: &EventLog, context| {
                    log.lock().push("starter:enable".to_string());
                    context.enable_component("slow")?;
                    log.lock().push("starter:enabled".to_string());
                    Ok(())
                })
                .build(),
        );
    let harness = Harness::new(catalog);
    harness
        .runtime
        .register_descriptor(ComponentMetadata::new("slow", "slow").with_enabled(false))
        .unwrap();
    harness
        .runtime
        .register_descriptor(ComponentMetadata::new("starter", "starter"))
        .unwrap();

    for name in ["starter", "slow"] {
        assert!(
            harness
                .runtime
                .wait_for_state(name, ComponentState::Active, WAIT)
                .await
        );
    }
    harness.settle().await;
    assert_eq!(
        events(&log),
        ["starter:enable", "starter:enabled", "slow:activate"]
    );
}
