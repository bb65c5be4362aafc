//! 组件运行时
//!
//! 进程级协调者：接收能力注册表和配置存储的事件，分发给相关的持有者和管理器。
//! 对外提供描述符注册、启用禁用、状态查询与关闭。

use crate::context::ComponentAdmin;
use crate::descriptor::ComponentMetadata;
use crate::dispatch::DispatchPool;
use crate::holder::ComponentHolder;
use crate::implementation::ImplementationCatalog;
use config_abstractions::{ConfigurationEvent, ConfigurationStore, RuntimeSettings};
use dashmap::DashMap;
use registry_abstractions::{CapabilityEvent, CapabilityRegistry};
use scr_common::{
    ComponentId, ComponentSnapshot, ComponentState, DeactivationReason, HealthStatus,
    RuntimeError, RuntimeResult, Subscription, TargetFilter,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// 管理器共享的运行时服务
pub(crate) struct RuntimeServices {
    pub(crate) registry: Arc<dyn CapabilityRegistry>,
    pub(crate) admin: Weak<dyn ComponentAdmin>,
    pub(crate) pool: DispatchPool,
    pub(crate) settings: RuntimeSettings,
    epoch: watch::Sender<u64>,
    next_id: AtomicU64,
}

impl RuntimeServices {
    pub(crate) fn next_component_id(&self) -> ComponentId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// 状态变化后唤醒等待者
    pub(crate) fn bump_epoch(&self) {
        self.epoch.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }
}

/// 按能力类型的订阅
#[derive(Default)]
struct TypeEntry {
    subscription: Option<Subscription>,
    components: BTreeSet<String>,
}

pub(crate) struct RuntimeInner {
    services: Arc<RuntimeServices>,
    store: Arc<dyn ConfigurationStore>,
    catalog: Arc<ImplementationCatalog>,
    holders: DashMap<String, Arc<ComponentHolder>>,
    type_index: DashMap<String, TypeEntry>,
    shutting_down: AtomicBool,
}

impl RuntimeInner {
    fn holder(&self, name: &str) -> RuntimeResult<Arc<ComponentHolder>> {
        self.holders
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RuntimeError::ComponentNotFound {
                name: name.to_string(),
            })
    }

    fn capability_changed(&self, capability_type: &str, event: &CapabilityEvent) {
        let components: Vec<String> = match self.type_index.get(capability_type) {
            Some(entry) => entry.components.iter().cloned().collect(),
            None => return,
        };
        debug!(
            capability_type,
            kind = %event.kind,
            capability = event.capability.id(),
            tracking_count = event.tracking_count,
            "分发能力事件"
        );
        for name in components {
            let holder = self.holders.get(&name).map(|entry| entry.value().clone());
            if let Some(holder) = holder {
                holder.capability_changed(event);
            }
        }
    }
}

impl ComponentAdmin for RuntimeInner {
    fn set_component_enabled(&self, name: &str, enabled: bool) -> RuntimeResult<()> {
        let holder = self.holder(name)?;
        holder.enable_components(enabled)?;
        Ok(())
    }
}

/// 声明式组件运行时
#[derive(Clone)]
pub struct ComponentRuntime {
    inner: Arc<RuntimeInner>,
}

impl fmt::Debug for ComponentRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRuntime")
            .field("components", &self.inner.holders.len())
            .field("capability_types", &self.inner.type_index.len())
            .field("settings", &self.inner.services.settings)
            .finish()
    }
}

impl ComponentRuntime {
    /// 创建运行时，必须在 tokio 运行时内调用
    pub fn new(
        settings: RuntimeSettings,
        registry: Arc<dyn CapabilityRegistry>,
        store: Arc<dyn ConfigurationStore>,
        catalog: Arc<ImplementationCatalog>,
    ) -> RuntimeResult<Self> {
        let pool = DispatchPool::new(settings.dispatch_concurrency)?;
        let (epoch, _) = watch::channel(0u64);
        info!(
            lock_timeout_ms = settings.lock_timeout_ms,
            dispatch_concurrency = settings.dispatch_concurrency,
            "创建组件运行时"
        );

        let inner = Arc::new_cyclic(|weak: &Weak<RuntimeInner>| {
            let admin: Weak<dyn ComponentAdmin> = weak.clone();
            RuntimeInner {
                services: Arc::new(RuntimeServices {
                    registry,
                    admin,
                    pool,
                    settings,
                    epoch,
                    next_id: AtomicU64::new(0),
                }),
                store,
                catalog,
                holders: DashMap::new(),
                type_index: DashMap::new(),
                shutting_down: AtomicBool::new(false),
            }
        });
        Ok(Self { inner })
    }

    /// 运行时设置
    pub fn settings(&self) -> &RuntimeSettings {
        &self.inner.services.settings
    }

    /// 能力注册表
    pub fn registry(&self) -> Arc<dyn CapabilityRegistry> {
        self.inner.services.registry.clone()
    }

    /// 配置存储
    pub fn store(&self) -> Arc<dyn ConfigurationStore> {
        self.inner.store.clone()
    }

    /// 组件实现目录
    pub fn catalog(&self) -> &Arc<ImplementationCatalog> {
        &self.inner.catalog
    }

    /// 注册组件描述符
    ///
    /// 验证失败只影响该描述符。默认启用的组件会在派发队列上开始激活。
    pub fn register_descriptor(&self, mut metadata: ComponentMetadata) -> RuntimeResult<()> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(RuntimeError::ShuttingDown);
        }

        let descriptor = match metadata.validate(&self.inner.catalog) {
            Ok(descriptor) => Arc::new(descriptor),
            Err(e) => {
                error!(component = %e.component(), "组件描述符验证失败: {}", e);
                return Err(e.into());
            }
        };
        let name = descriptor.name().to_string();

        let holder = ComponentHolder::new(descriptor, self.inner.services.clone());
        match self.inner.holders.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(RuntimeError::DuplicateComponent { name });
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(holder.clone());
            }
        }

        for capability_type in holder.capability_types() {
            self.index_capability_type(&capability_type, &name);
        }
        holder.start(&self.inner.store);
        info!(
            component = %name,
            factory = holder.descriptor().is_factory(),
            enabled = holder.is_enabled(),
            "注册组件描述符"
        );
        Ok(())
    }

    fn index_capability_type(&self, capability_type: &str, component: &str) {
        let mut subscription = if self.inner.type_index.contains_key(capability_type) {
            None
        } else {
            let weak = Arc::downgrade(&self.inner);
            let owned_type = capability_type.to_string();
            Some(self.inner.services.registry.subscribe(
                capability_type,
                TargetFilter::any(),
                Arc::new(move |event: &CapabilityEvent| {
                    if let Some(inner) = weak.upgrade() {
                        inner.capability_changed(&owned_type, event);
                    }
                }),
            ))
        };

        {
            let mut entry = self
                .inner
                .type_index
                .entry(capability_type.to_string())
                .or_default();
            if entry.subscription.is_none() {
                entry.subscription = subscription.take();
            }
            entry.components.insert(component.to_string());
        }
        // 并发注册时多余的订阅在此释放
        drop(subscription);
    }

    /// 注销组件描述符，释放其全部管理器
    pub fn unregister_descriptor(&self, name: &str) -> RuntimeResult<()> {
        let (_, holder) =
            self.inner
                .holders
                .remove(name)
                .ok_or_else(|| RuntimeError::ComponentNotFound {
                    name: name.to_string(),
                })?;

        for capability_type in holder.capability_types() {
            if let Some(mut entry) = self.inner.type_index.get_mut(&capability_type) {
                entry.components.remove(name);
            }
            self.inner
                .type_index
                .remove_if(&capability_type, |_, entry| entry.components.is_empty());
        }
        holder.dispose(DeactivationReason::Disposed);
        info!(component = %name, "注销组件描述符");
        Ok(())
    }

    /// 启用组件（排队执行）
    pub fn enable(&self, name: &str) -> RuntimeResult<()> {
        self.inner.holder(name)?.enable(true);
        Ok(())
    }

    /// 禁用组件（排队执行）
    pub fn disable(&self, name: &str) -> RuntimeResult<()> {
        self.inner.holder(name)?.enable(false);
        Ok(())
    }

    /// 组件是否启用
    pub fn is_enabled(&self, name: &str) -> RuntimeResult<bool> {
        Ok(self.inner.holder(name)?.is_enabled())
    }

    /// 已注册的组件名称
    pub fn component_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .holders
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// 组件的全部管理器快照（工厂组件每个配置一个）
    pub fn describe(&self, name: &str) -> RuntimeResult<Vec<ComponentSnapshot>> {
        Ok(self.inner.holder(name)?.snapshots())
    }

    /// 全部管理器快照，按组件名称排序
    pub fn describe_all(&self) -> Vec<ComponentSnapshot> {
        self.component_names()
            .iter()
            .filter_map(|name| self.inner.holder(name).ok())
            .flat_map(|holder| holder.snapshots())
            .collect()
    }

    /// 健康检查：启用的组件存在失败记录时为降级
    pub fn check_health(&self) -> HealthStatus {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return HealthStatus::ShuttingDown;
        }

        let mut failures = BTreeMap::new();
        let mut managers = 0usize;
        for entry in self.inner.holders.iter() {
            let holder = entry.value();
            managers += holder.manager_count();
            if !holder.is_enabled() {
                continue;
            }
            for snapshot in holder.snapshots() {
                if let Some(failure) = snapshot.last_failure {
                    let key = match snapshot.configuration_pid {
                        Some(pid) => format!("{}[{}]", snapshot.name, pid),
                        None => snapshot.name,
                    };
                    failures.insert(key, failure);
                }
            }
        }

        let status = HealthStatus::from_failures(failures);
        debug!(components = self.inner.holders.len(), managers, %status, "组件运行时健康检查");
        status
    }

    /// 直接投递配置事件
    ///
    /// 与配置存储订阅走同一路径，过期的变更计数同样被丢弃。
    pub fn deliver_configuration(&self, event: &ConfigurationEvent) {
        let holders: Vec<Arc<ComponentHolder>> = self
            .inner
            .holders
            .iter()
            .filter(|entry| entry.value().accepts(event))
            .map(|entry| entry.value().clone())
            .collect();
        if holders.is_empty() {
            debug!(pid = %event.pid(), "没有组件接收该配置");
        }
        for holder in holders {
            holder.configuration_changed(event);
        }
    }

    /// 等待派发队列清空
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        self.inner.services.pool.wait_idle(timeout).await
    }

    /// 等待组件的任一管理器进入指定状态
    pub async fn wait_for_state(&self, name: &str, state: ComponentState, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut epoch = self.inner.services.epoch.subscribe();
        loop {
            epoch.borrow_and_update();
            let reached = self
                .inner
                .holder(name)
                .map(|holder| holder.snapshots().iter().any(|s| s.state == state))
                .unwrap_or(false);
            if reached {
                return true;
            }
            match tokio::time::timeout_at(deadline, epoch.changed()).await {
                Ok(Ok(())) => continue,
                _ => return false,
            }
        }
    }

    /// 关闭运行时
    ///
    /// 以 `ModuleStopped` 停用全部组件，在停止超时内等待排队任务完成，
    /// 然后释放全部订阅。
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(components = self.inner.holders.len(), "关闭组件运行时");

        let holders: Vec<Arc<ComponentHolder>> = self
            .inner
            .holders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for holder in &holders {
            holder.dispose(DeactivationReason::ModuleStopped);
        }

        let stop_timeout = self.inner.services.settings.stop_timeout();
        if !self.wait_idle(stop_timeout).await {
            warn!(
                stop_timeout_ms = self.inner.services.settings.stop_timeout_ms,
                "等待组件停用超时"
            );
        }

        self.inner.type_index.clear();
        self.inner.holders.clear();
        info!("组件运行时已关闭");
        Ok(())
    }
}
