//! 组合层端到端测试
mod common;

use common::*;
use registry_abstractions::CapabilityRegistry;
use registry_impl::InMemoryCapabilityRegistry;
use runtime_composition::RuntimeBuilder;
use scr_common::{ComponentState, TargetFilter};
use serde_json::json;
use std::sync::Arc;

const DESCRIPTORS: &str = r#"[
    {
        "name": "gateway",
        "implementation": "gateway",
        "provides": ["gateway.Api"],
        "properties": {"port": 8080},
        "references": [
            {"name": "backend", "interface": "backend.Service", "bind": "bind", "unbind": "unbind"}
        ]
    }
]"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_composed_runtime_runs_json_descriptors() {
    let log = new_log();
    let registry = Arc::new(InMemoryCapabilityRegistry::new());
    let composed = RuntimeBuilder::new()
        .add_settings_map("test", properties(&[("lock_timeout_ms", json!(1000))]))
        .with_registry(registry.clone())
        .register_implementation(recorder("gateway", &log).build())
        .add_descriptors_json(DESCRIPTORS)
        .unwrap()
        .build()
        .await
        .unwrap();
    assert!(composed.rejected.is_empty());
    assert_eq!(composed.runtime.settings().lock_timeout_ms, 1000);

    let runtime = composed.runtime;
    assert!(
        runtime
            .wait_for_state("gateway", ComponentState::UnsatisfiedReference, WAIT)
            .await
    );

    let mut backend = scr_common::Properties::new();
    backend.insert("name".to_string(), json!("db"));
    registry
        .publish(
            vec!["backend.Service".to_string()],
            backend,
            Arc::new(Named("db".to_string())),
        )
        .unwrap();
    assert!(
        runtime
            .wait_for_state("gateway", ComponentState::Active, WAIT)
            .await
    );

    let published = registry
        .lookup("gateway.Api", &TargetFilter::any())
        .candidates;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].properties().get("port"), Some(&json!(8080)));
    assert!(runtime.check_health().is_healthy());

    runtime.shutdown().await.unwrap();
    assert_eq!(events(&log), ["bind:db", "activate", "deactivate:ModuleStopped", "unbind:db"]);
}
