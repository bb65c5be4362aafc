//! 集成测试公共夹具
#![allow(dead_code)]

use component_runtime::{
    ComponentImplementation, ComponentRuntime, ImplementationBuilder, ImplementationCatalog,
};
use config_abstractions::RuntimeSettings;
use config_impl::InMemoryConfigurationStore;
use parking_lot::Mutex;
use registry_abstractions::{CapabilityRef, CapabilityRegistry};
use registry_impl::InMemoryCapabilityRegistry;
use scr_common::{ComponentSnapshot, Properties, SERVICE_RANKING};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// 等待上限，正常情况下远不会用满
pub const WAIT: Duration = Duration::from_secs(5);

/// 按发生顺序记录回调
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// 发布到注册表的测试能力
#[derive(Debug)]
pub struct Named(pub String);

/// 能力的 `name` 属性
pub fn name_of(capability: &CapabilityRef) -> String {
    capability
        .properties()
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string()
}

/// 记录全部回调的组件
pub struct Recorder {
    pub log: EventLog,
}

/// 带标准回调名的记录组件实现
///
/// `activate` / `deactivate` 与绑定方法 `bind` / `unbind` / `updated`。
pub fn recorder(identity: &str, log: &EventLog) -> ImplementationBuilder<Recorder> {
    let log = log.clone();
    ComponentImplementation::builder(identity, move |_| Ok(Recorder { log: log.clone() }))
        .activate("activate", |r: &Recorder, _| {
            r.log.lock().push("activate".to_string());
            Ok(())
        })
        .deactivate("deactivate", |r: &Recorder, _, reason| {
            r.log.lock().push(format!("deactivate:{reason:?}"));
        })
        .method("bind", |r: &Recorder, capability| {
            r.log.lock().push(format!("bind:{}", name_of(capability)));
            Ok(())
        })
        .method("unbind", |r: &Recorder, capability| {
            r.log.lock().push(format!("unbind:{}", name_of(capability)));
            Ok(())
        })
        .method("updated", |r: &Recorder, capability| {
            r.log.lock().push(format!("updated:{}", name_of(capability)));
            Ok(())
        })
}

pub struct Harness {
    pub runtime: ComponentRuntime,
    pub registry: Arc<InMemoryCapabilityRegistry>,
    pub store: Arc<InMemoryConfigurationStore>,
}

impl Harness {
    /// 必须在 tokio 运行时内调用
    pub fn new(catalog: ImplementationCatalog) -> Self {
        Self::with_settings(catalog, RuntimeSettings::default())
    }

    pub fn with_settings(catalog: ImplementationCatalog, settings: RuntimeSettings) -> Self {
        let registry = Arc::new(InMemoryCapabilityRegistry::new());
        let store = Arc::new(InMemoryConfigurationStore::new());
        let runtime = ComponentRuntime::new(
            settings,
            registry.clone(),
            store.clone(),
            Arc::new(catalog),
        )
        .unwrap();
        Self {
            runtime,
            registry,
            store,
        }
    }

    /// 发布带名称与排名的能力
    pub fn publish(&self, capability_type: &str, name: &str, ranking: i32) -> CapabilityRef {
        let mut properties = Properties::new();
        properties.insert("name".to_string(), json!(name));
        properties.insert(SERVICE_RANKING.to_string(), json!(ranking));
        self.registry
            .publish(
                vec![capability_type.to_string()],
                properties,
                Arc::new(Named(name.to_string())),
            )
            .unwrap()
    }

    pub fn unpublish(&self, capability: &CapabilityRef) {
        self.registry.unpublish(capability.id()).unwrap();
    }

    /// 等待全部排队操作完成
    pub async fn settle(&self) {
        assert!(self.runtime.wait_idle(WAIT).await, "派发队列未能清空");
    }

    /// 单例组件的快照
    pub fn snapshot(&self, name: &str) -> ComponentSnapshot {
        let mut snapshots = self.runtime.describe(name).unwrap();
        assert_eq!(snapshots.len(), 1, "组件 {name} 应当只有一个管理器");
        snapshots.remove(0)
    }

    /// 已发布的某类型能力名称，按优先级排序
    pub fn published(&self, capability_type: &str) -> Vec<CapabilityRef> {
        self.registry
            .lookup(capability_type, &scr_common::TargetFilter::any())
            .candidates
    }
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().clone()
}

pub fn properties(entries: &[(&str, Value)]) -> Properties {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}
