//! 组件持有者
//!
//! 持有者维护描述符到管理器的映射：单例组件恰好一个管理器，
//! 工厂组件每个工厂配置一个管理器。配置投递携带变更计数，
//! 不大于已见计数的投递视为过期或重复并被丢弃，删除后计数仍然保留。

use crate::descriptor::{ComponentDescriptor, ConfigurationPolicy};
use crate::manager::{ComponentManager, ConfigurationChange, Operation};
use crate::runtime::RuntimeServices;
use config_abstractions::{ConfigurationEvent, ConfigurationStore, ConfigurationTarget};
use parking_lot::Mutex;
use registry_abstractions::CapabilityEvent;
use scr_common::{ComponentSnapshot, DeactivationReason, LifecycleResult, Subscription};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default)]
struct HolderState {
    /// 单例组件以配置标识为键，工厂组件以工厂配置标识为键
    managers: BTreeMap<String, Arc<ComponentManager>>,
    change_counts: HashMap<String, u64>,
    subscription: Option<Subscription>,
    disposed: bool,
}

pub(crate) struct ComponentHolder {
    descriptor: Arc<ComponentDescriptor>,
    services: Arc<RuntimeServices>,
    enabled: AtomicBool,
    state: Mutex<HolderState>,
}

impl ComponentHolder {
    pub(crate) fn new(descriptor: Arc<ComponentDescriptor>, services: Arc<RuntimeServices>) -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(descriptor.is_default_enabled()),
            descriptor,
            services,
            state: Mutex::new(HolderState::default()),
        })
    }

    pub(crate) fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub(crate) fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.descriptor
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// 引用的全部能力类型
    pub(crate) fn capability_types(&self) -> BTreeSet<String> {
        self.descriptor
            .references()
            .iter()
            .map(|r| r.capability_type().to_string())
            .collect()
    }

    fn configuration_target(&self) -> ConfigurationTarget {
        let pid = self.descriptor.configuration_pid().to_string();
        if self.descriptor.is_factory() {
            ConfigurationTarget::Factory(pid)
        } else {
            ConfigurationTarget::Pid(pid)
        }
    }

    /// 订阅配置、创建单例管理器并投递初始配置
    pub(crate) fn start(self: &Arc<Self>, store: &Arc<dyn ConfigurationStore>) {
        let ignores_configuration =
            self.descriptor.configuration_policy() == ConfigurationPolicy::Ignore;

        if !self.descriptor.is_factory() {
            // 持锁创建，期间到达的能力事件在管理器就位后投递
            let mut state = self.state.lock();
            let manager = ComponentManager::new(
                self.descriptor.clone(),
                self.services.clone(),
                None,
                None,
            );
            state
                .managers
                .insert(self.descriptor.configuration_pid().to_string(), manager);
        }

        if !ignores_configuration {
            let target = self.configuration_target();
            let holder = Arc::downgrade(self);
            let subscription = store.subscribe(
                target.clone(),
                Arc::new(move |event: &ConfigurationEvent| {
                    if let Some(holder) = holder.upgrade() {
                        holder.configuration_changed(event);
                    }
                }),
            );
            self.state.lock().subscription = Some(subscription);

            for configuration in store.list(&target) {
                self.configuration_changed(&ConfigurationEvent::Updated(configuration));
            }
        }

        if self.is_enabled() {
            self.enable(true);
        }
    }

    /// 配置投递是否属于该持有者
    pub(crate) fn accepts(&self, event: &ConfigurationEvent) -> bool {
        self.descriptor.configuration_policy() != ConfigurationPolicy::Ignore
            && self
                .configuration_target()
                .matches(event.pid(), event.factory_pid())
    }

    /// 处理配置变更
    pub(crate) fn configuration_changed(&self, event: &ConfigurationEvent) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }

        let pid = event.pid().to_string();
        let change_count = event.change_count();
        if let Some(&seen) = state.change_counts.get(&pid) {
            if change_count <= seen {
                debug!(
                    component = %self.name(),
                    pid = %pid,
                    change_count,
                    seen,
                    "丢弃过期或重复的配置投递"
                );
                return;
            }
        }
        state.change_counts.insert(pid.clone(), change_count);

        match event {
            ConfigurationEvent::Updated(configuration) => {
                let change = ConfigurationChange::Updated(configuration.properties.clone());
                if !self.descriptor.is_factory() {
                    for manager in state.managers.values() {
                        manager.post(Operation::Configure(change.clone()));
                    }
                } else if let Some(manager) = state.managers.get(&pid) {
                    manager.post(Operation::Configure(change));
                } else if !self.services.settings.factory_enabled {
                    warn!(
                        component = %self.name(),
                        pid = %pid,
                        "工厂组件已关闭, 不创建管理器"
                    );
                } else {
                    let manager = ComponentManager::new(
                        self.descriptor.clone(),
                        self.services.clone(),
                        Some(pid.clone()),
                        Some(configuration.properties.clone()),
                    );
                    info!(
                        component = %self.name(),
                        pid = %pid,
                        id = manager.id(),
                        "创建工厂组件管理器"
                    );
                    if self.is_enabled() {
                        manager.set_disabled(false);
                        manager.post(Operation::SyncEnabled);
                    }
                    state.managers.insert(pid, manager);
                }
            }
            ConfigurationEvent::Deleted { .. } => {
                if !self.descriptor.is_factory() {
                    for manager in state.managers.values() {
                        manager.post(Operation::Configure(ConfigurationChange::Deleted));
                    }
                } else if let Some(manager) = state.managers.remove(&pid) {
                    info!(
                        component = %self.name(),
                        pid = %pid,
                        id = manager.id(),
                        "工厂配置已删除, 释放管理器"
                    );
                    manager.post(Operation::Dispose(DeactivationReason::ConfigurationDeleted));
                }
            }
        }
    }

    /// 转发能力事件
    pub(crate) fn capability_changed(&self, event: &CapabilityEvent) {
        let state = self.state.lock();
        for manager in state.managers.values() {
            manager.post(Operation::Capability(event.clone()));
        }
    }

    /// 异步启用或禁用：记录意图后排队执行
    pub(crate) fn enable(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        let state = self.state.lock();
        for manager in state.managers.values() {
            manager.set_disabled(!enabled);
            manager.post(Operation::SyncEnabled);
        }
        info!(component = %self.name(), enabled, "组件启用状态变更");
    }

    /// 同步启用或禁用
    ///
    /// 逐个管理器在组件锁内完成状态转换，启用后的激活在管理器队列中进行。
    /// 返回遇到的第一个错误（通常是锁超时）。
    pub(crate) fn enable_components(&self, enabled: bool) -> LifecycleResult<()> {
        self.enabled.store(enabled, Ordering::SeqCst);
        let managers: Vec<Arc<ComponentManager>> =
            self.state.lock().managers.values().cloned().collect();

        let mut first_error = None;
        for manager in managers {
            if let Err(e) = manager.enable_now(enabled) {
                warn!(component = %self.name(), enabled, "启用状态变更已转入队列: {}", e);
                first_error.get_or_insert(e);
            }
        }
        info!(component = %self.name(), enabled, "组件启用状态变更");
        first_error.map_or(Ok(()), Err)
    }

    /// 快照，按配置标识排序
    pub(crate) fn snapshots(&self) -> Vec<ComponentSnapshot> {
        let state = self.state.lock();
        state.managers.values().map(|m| m.snapshot()).collect()
    }

    /// 管理器数量
    pub(crate) fn manager_count(&self) -> usize {
        self.state.lock().managers.len()
    }

    #[cfg(test)]
    pub(crate) fn managers(&self) -> Vec<Arc<ComponentManager>> {
        self.state.lock().managers.values().cloned().collect()
    }

    /// 释放订阅和全部管理器
    pub(crate) fn dispose(&self, reason: DeactivationReason) {
        let (subscription, managers) = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (
                state.subscription.take(),
                std::mem::take(&mut state.managers),
            )
        };
        if let Some(subscription) = subscription {
            subscription.dispose();
        }
        for manager in managers.values() {
            manager.post(Operation::Dispose(reason));
        }
        info!(component = %self.name(), %reason, "组件持有者已释放");
    }
}
