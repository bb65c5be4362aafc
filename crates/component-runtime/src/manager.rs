//! 组件管理器
//!
//! 一个组件管理器对应一个配置标识，持有该组件唯一的实例和状态机。
//! 所有状态转换都在组件锁内进行，事件通过管理器自己的串行队列投递。
//! 禁用标志独立于锁保存最新的管理意图，在每个状态转换边界检查。

use crate::context::ComponentContext;
use crate::dependency::{DependencyManager, EventEffect, Reconcile};
use crate::descriptor::{ComponentDescriptor, ConfigurationPolicy};
use crate::dispatch::SerialQueue;
use crate::implementation::{guarded, ComponentInstance};
use crate::lock::ComponentLock;
use crate::runtime::RuntimeServices;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use registry_abstractions::{CapabilityEvent, CapabilityRef};
use scr_common::{
    merge_properties, public_properties, ComponentId, ComponentSnapshot, ComponentState,
    DeactivationReason, LifecycleResult, Properties, COMPONENT_ID, COMPONENT_NAME,
    SERVICE_FACTORY_PID, SERVICE_PID,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 队列任务遇到锁超时时的最大尝试次数
const LOCK_ATTEMPTS: usize = 3;

/// 配置变更
#[derive(Debug, Clone)]
pub(crate) enum ConfigurationChange {
    Updated(Properties),
    Deleted,
}

/// 派发到管理器队列的操作
#[derive(Debug, Clone)]
pub(crate) enum Operation {
    /// 与禁用标志记录的管理意图同步
    SyncEnabled,
    Capability(CapabilityEvent),
    Configure(ConfigurationChange),
    Dispose(DeactivationReason),
    /// 补做因锁超时放弃的操作
    Resync,
}

/// 因锁超时放弃、等待下次持锁时补做的工作
#[derive(Debug, Default)]
struct Stalled {
    /// 需要重新读取候选并协调绑定
    resync: bool,
    configuration: Option<ConfigurationChange>,
    dispose: Option<DeactivationReason>,
    failure: Option<String>,
    /// 队列中已有一个待执行的 Resync
    queued: bool,
}

impl Stalled {
    /// 取出待补做的工作，保留排队标记
    fn take(&mut self) -> Stalled {
        let queued = self.queued;
        std::mem::replace(
            self,
            Stalled {
                queued,
                ..Stalled::default()
            },
        )
    }
}

/// 一次激活的产物
struct Activation {
    instance: ComponentInstance,
    context: Arc<ComponentContext>,
    published: Option<CapabilityRef>,
}

/// 组件锁保护的管理器状态
struct ManagerCore {
    state: ComponentState,
    dependencies: Vec<DependencyManager>,
    configuration: Option<Properties>,
    properties: Properties,
    activation: Option<Activation>,
    last_failure: Option<String>,
    last_deactivation: Option<DeactivationReason>,
    activated_at: Option<DateTime<Utc>>,
    activation_count: u64,
}

pub(crate) struct ComponentManager {
    id: ComponentId,
    name: String,
    instance_pid: Option<String>,
    descriptor: Arc<ComponentDescriptor>,
    services: Arc<RuntimeServices>,
    disabled: AtomicBool,
    disposed: AtomicBool,
    queue: SerialQueue,
    core: ComponentLock<ManagerCore>,
    stalled: Mutex<Stalled>,
    snapshot: RwLock<ComponentSnapshot>,
}

impl ComponentManager {
    /// 创建管理器，初始为禁用状态
    ///
    /// `instance_pid` 只用于工厂组件，是该管理器对应的工厂配置标识。
    pub(crate) fn new(
        descriptor: Arc<ComponentDescriptor>,
        services: Arc<RuntimeServices>,
        instance_pid: Option<String>,
        configuration: Option<Properties>,
    ) -> Arc<Self> {
        let id = services.next_component_id();
        let name = descriptor.name().to_string();
        let queue_name = match &instance_pid {
            Some(pid) => format!("{name}[{pid}]"),
            None => name.clone(),
        };

        let mut dependencies: Vec<DependencyManager> = descriptor
            .references()
            .iter()
            .map(|reference| DependencyManager::new(&name, reference.clone()))
            .collect();
        for dependency in &mut dependencies {
            dependency.refresh(services.registry.as_ref());
        }

        let mut manager = Self {
            id,
            name: name.clone(),
            instance_pid,
            queue: services.pool.queue(queue_name),
            core: ComponentLock::new(
                id,
                name.clone(),
                services.settings.lock_timeout(),
                ManagerCore {
                    state: ComponentState::Disabled,
                    dependencies,
                    configuration: None,
                    properties: Properties::new(),
                    activation: None,
                    last_failure: None,
                    last_deactivation: None,
                    activated_at: None,
                    activation_count: 0,
                },
            ),
            stalled: Mutex::new(Stalled::default()),
            snapshot: RwLock::new(ComponentSnapshot {
                id,
                name,
                configuration_pid: None,
                state: ComponentState::Disabled,
                properties: Properties::new(),
                references: Vec::new(),
                last_failure: None,
                last_deactivation: None,
                activated_at: None,
                activation_count: 0,
            }),
            descriptor,
            services,
            disabled: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
        };

        {
            let core = manager.core.get_mut();
            core.configuration = configuration;
        }
        manager.initialize_configuration();
        Arc::new(manager)
    }

    pub(crate) fn id(&self) -> ComponentId {
        self.id
    }

    /// 最近一次发布的快照
    pub(crate) fn snapshot(&self) -> ComponentSnapshot {
        self.snapshot.read().clone()
    }

    /// 记录管理意图
    pub(crate) fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    /// 投递操作到管理器队列
    pub(crate) fn post(self: &Arc<Self>, operation: Operation) {
        let manager = self.clone();
        if !self.queue.post(move || manager.run(operation)) {
            warn!(component = %self.name, "派发队列已关闭, 操作被丢弃");
        }
    }

    /// 同步执行启用或禁用
    ///
    /// 禁用在调用线程上完成停用。启用只在锁内把组件移出禁用状态，
    /// 激活由管理器自己的队列执行。
    /// 当前线程已持有本管理器的锁（组件在自己的回调中操作自己）时改为排队执行。
    /// 等锁超时时操作同样排队，并返回锁超时错误。
    pub(crate) fn enable_now(self: &Arc<Self>, enabled: bool) -> LifecycleResult<()> {
        self.set_disabled(!enabled);
        if self.core.is_held_by_current_thread() {
            debug!(component = %self.name, "组件在自身回调中变更启用状态, 排队执行");
            self.post(Operation::SyncEnabled);
            return Ok(());
        }
        let result = self.core.acquire().map(|mut core| {
            if enabled {
                self.mark_enabled(&mut core);
            } else {
                self.sync_enabled(&mut core);
            }
            self.publish_snapshot(&core);
        });
        if enabled || result.is_err() {
            self.post(Operation::SyncEnabled);
        }
        result
    }

    fn run(self: &Arc<Self>, operation: Operation) {
        let mut attempts = 0;
        loop {
            match self.core.acquire() {
                Ok(mut core) => {
                    let stalled = self.take_stalled(&operation);
                    self.recover(&mut core, stalled);
                    self.execute(&mut core, operation);
                    self.publish_snapshot(&core);
                    self.services.bump_epoch();
                    return;
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= LOCK_ATTEMPTS {
                        error!(component = %self.name, attempts, "放弃排队操作: {}", e);
                        self.stall(operation, e.to_string());
                        self.services.bump_epoch();
                        return;
                    }
                    warn!(component = %self.name, attempts, "获取组件锁超时, 重试");
                }
            }
        }
    }

    /// 记录放弃的操作并排队补做
    fn stall(self: &Arc<Self>, operation: Operation, failure: String) {
        let post = {
            let mut stalled = self.stalled.lock();
            match operation {
                Operation::Resync => {
                    stalled.queued = false;
                    stalled.resync = true;
                }
                Operation::SyncEnabled | Operation::Capability(_) => stalled.resync = true,
                Operation::Configure(change) => stalled.configuration = Some(change),
                Operation::Dispose(reason) => stalled.dispose = Some(reason),
            }
            stalled.failure = Some(failure.clone());
            let post = !stalled.queued && !self.disposed.load(Ordering::SeqCst);
            if post {
                stalled.queued = true;
            }
            post
        };
        self.snapshot.write().last_failure = Some(failure);
        if post {
            self.post(Operation::Resync);
        }
    }

    fn take_stalled(&self, operation: &Operation) -> Stalled {
        let mut stalled = self.stalled.lock();
        if matches!(operation, Operation::Resync) {
            stalled.queued = false;
        }
        stalled.take()
    }

    /// 补做放弃的操作：保留失败原因，应用最新配置，按注册表现状重新协调
    fn recover(&self, core: &mut ManagerCore, stalled: Stalled) {
        if let Some(failure) = stalled.failure {
            core.last_failure = Some(failure);
        }
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(change) = stalled.configuration {
            self.handle_configuration(core, change);
        }
        if stalled.resync {
            self.resync(core);
        }
        if let Some(reason) = stalled.dispose {
            self.dispose_locked(core, reason);
        }
    }

    /// 丢失的能力事件无法重放，改为重新读取全部候选后协调
    fn resync(&self, core: &mut ManagerCore) {
        info!(component = %self.name, id = self.id, state = %core.state, "重新同步组件");
        if core.state != ComponentState::Disabled {
            for dependency in &mut core.dependencies {
                dependency.refresh(self.services.registry.as_ref());
                dependency.configure(&core.properties);
            }
            match core.state {
                ComponentState::Active => {
                    let touched: Vec<usize> = (0..core.dependencies.len()).collect();
                    let modified: Vec<(usize, u64)> = core
                        .dependencies
                        .iter()
                        .enumerate()
                        .flat_map(|(index, dependency)| {
                            dependency
                                .stale_bound()
                                .into_iter()
                                .map(move |id| (index, id))
                        })
                        .collect();
                    self.reconcile_active(core, &touched, &modified);
                }
                ComponentState::UnsatisfiedReference
                | ComponentState::UnsatisfiedConfiguration
                | ComponentState::Satisfied => self.try_activate(core),
                _ => {}
            }
        }
        self.sync_enabled(core);
    }

    fn execute(&self, core: &mut ManagerCore, operation: Operation) {
        if self.disposed.load(Ordering::SeqCst) {
            debug!(component = %self.name, ?operation, "管理器已释放, 忽略操作");
            return;
        }
        match operation {
            Operation::SyncEnabled => self.sync_enabled(core),
            Operation::Capability(event) => self.handle_capability(core, &event),
            Operation::Configure(change) => self.handle_configuration(core, change),
            Operation::Dispose(reason) => self.dispose_locked(core, reason),
            Operation::Resync => {}
        }
    }

    fn sync_enabled(&self, core: &mut ManagerCore) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.disabled.load(Ordering::SeqCst) {
            if core.state == ComponentState::Disabled {
                return;
            }
            self.deactivate(core, DeactivationReason::Disabled, ComponentState::Disabled);
            self.transition(core, ComponentState::Disabled);
            info!(component = %self.name, id = self.id, "组件已禁用");
            return;
        }

        self.mark_enabled(core);
        self.try_activate(core);
    }

    /// 移出禁用状态并读取当前候选，不激活
    fn mark_enabled(&self, core: &mut ManagerCore) {
        if self.disabled.load(Ordering::SeqCst)
            || self.disposed.load(Ordering::SeqCst)
            || core.state != ComponentState::Disabled
        {
            return;
        }
        for dependency in &mut core.dependencies {
            dependency.refresh(self.services.registry.as_ref());
            dependency.configure(&core.properties);
        }
        self.transition(core, ComponentState::UnsatisfiedReference);
        info!(component = %self.name, id = self.id, "组件已启用");
    }

    fn try_activate(&self, core: &mut ManagerCore) {
        if self.disabled.load(Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if !core.state.is_unsatisfied() && core.state != ComponentState::Satisfied {
            return;
        }
        if self.descriptor.configuration_policy() == ConfigurationPolicy::Require
            && core.configuration.is_none()
        {
            self.transition(core, ComponentState::UnsatisfiedConfiguration);
            return;
        }
        if let Some(unsatisfied) = core.dependencies.iter().find(|d| !d.is_satisfied()) {
            debug!(
                component = %self.name,
                reference = %unsatisfied.name(),
                "引用未满足"
            );
            self.transition(core, ComponentState::UnsatisfiedReference);
            return;
        }
        self.transition(core, ComponentState::Satisfied);
        self.activate(core);
    }

    fn activate(&self, core: &mut ManagerCore) {
        self.transition(core, ComponentState::Activating);

        let context = Arc::new(ComponentContext::new(
            &self.name,
            self.id,
            core.properties.clone(),
            self.services.admin.clone(),
        ));
        for dependency in &core.dependencies {
            if let Some(index) = dependency.descriptor().parameter() {
                context.set_parameter(index, dependency.choose_binding().into_vec());
            }
        }

        let constructor = self.descriptor.implementation().constructor();
        let instance = match guarded(|| constructor(&context)) {
            Ok(instance) => instance,
            Err(e) => {
                self.activation_failed(core, format!("构造组件实例失败: {e}"));
                return;
            }
        };

        for index in 0..core.dependencies.len() {
            if let Err(e) = core.dependencies[index].bind_initial(&instance, &context) {
                unbind_reverse(&mut core.dependencies[..=index], &instance, &context);
                self.activation_failed(core, e.to_string());
                return;
            }
        }

        if self.disabled.load(Ordering::SeqCst) {
            unbind_reverse(&mut core.dependencies, &instance, &context);
            self.transition(core, ComponentState::Disabled);
            info!(component = %self.name, "激活期间组件被禁用, 放弃激活");
            return;
        }

        if let Some(activate) = &self.descriptor.activate {
            if let Err(e) = guarded(|| activate(&instance, &context)) {
                unbind_reverse(&mut core.dependencies, &instance, &context);
                self.activation_failed(core, format!("激活回调失败: {e}"));
                return;
            }
        }

        let published = if self.descriptor.provides().is_empty() {
            None
        } else {
            match self.services.registry.publish(
                self.descriptor.provides().to_vec(),
                public_properties(&core.properties),
                instance.clone(),
            ) {
                Ok(capability) => Some(capability),
                Err(e) => {
                    self.invoke_deactivate(&instance, &context, DeactivationReason::Unspecified);
                    unbind_reverse(&mut core.dependencies, &instance, &context);
                    self.activation_failed(core, format!("发布能力失败: {e}"));
                    return;
                }
            }
        };

        core.activation = Some(Activation {
            instance,
            context,
            published,
        });
        core.activated_at = Some(Utc::now());
        core.activation_count += 1;
        core.last_failure = None;
        self.transition(core, ComponentState::Active);
        info!(component = %self.name, id = self.id, "组件已激活");

        if self.disabled.load(Ordering::SeqCst) {
            self.deactivate(core, DeactivationReason::Disabled, ComponentState::Disabled);
            info!(component = %self.name, id = self.id, "组件已禁用");
        }
    }

    fn activation_failed(&self, core: &mut ManagerCore, message: String) {
        warn!(component = %self.name, id = self.id, "组件激活失败: {}", message);
        core.last_failure = Some(message);
        self.transition(core, ComponentState::UnsatisfiedReference);
    }

    /// 停用：撤销发布、停用回调、逆序解绑、丢弃实例
    fn deactivate(&self, core: &mut ManagerCore, reason: DeactivationReason, next: ComponentState) {
        let Some(activation) = core.activation.take() else {
            return;
        };
        self.transition(core, ComponentState::Deactivating);

        if let Some(published) = &activation.published {
            if let Err(e) = self.services.registry.unpublish(published.id()) {
                warn!(component = %self.name, "撤销能力发布失败: {}", e);
            }
        }
        self.invoke_deactivate(&activation.instance, &activation.context, reason);
        unbind_reverse(
            &mut core.dependencies,
            &activation.instance,
            &activation.context,
        );

        core.last_deactivation = Some(reason);
        core.activated_at = None;
        self.transition(core, next);
        info!(component = %self.name, id = self.id, %reason, "组件已停用");
    }

    fn invoke_deactivate(
        &self,
        instance: &ComponentInstance,
        context: &ComponentContext,
        reason: DeactivationReason,
    ) {
        if let Some(deactivate) = &self.descriptor.deactivate {
            let result = guarded(|| {
                deactivate(instance, context, reason);
                Ok(())
            });
            if let Err(e) = result {
                warn!(component = %self.name, "停用回调失败: {}", e);
            }
        }
    }

    fn handle_capability(&self, core: &mut ManagerCore, event: &CapabilityEvent) {
        let mut touched = Vec::new();
        let mut modified = Vec::new();
        for (index, dependency) in core.dependencies.iter_mut().enumerate() {
            if !event.capability.provides(dependency.capability_type()) {
                continue;
            }
            match dependency.apply_event(event) {
                EventEffect::Ignored => {}
                EventEffect::Changed => touched.push(index),
                EventEffect::BoundModified(id) => {
                    touched.push(index);
                    modified.push((index, id));
                }
            }
        }
        if touched.is_empty() {
            return;
        }

        match core.state {
            ComponentState::Active => self.reconcile_active(core, &touched, &modified),
            ComponentState::UnsatisfiedReference
            | ComponentState::UnsatisfiedConfiguration
            | ComponentState::Satisfied => self.try_activate(core),
            _ => {}
        }
    }

    fn reconcile_active(
        &self,
        core: &mut ManagerCore,
        touched: &[usize],
        modified: &[(usize, u64)],
    ) {
        let Some((instance, context)) = core
            .activation
            .as_ref()
            .map(|a| (a.instance.clone(), a.context.clone()))
        else {
            return;
        };

        for &(index, id) in modified {
            core.dependencies[index].bound_modified(&instance, &context, id);
        }

        let mut reactivate = false;
        for &index in touched {
            match core.dependencies[index].reconcile(&instance, &context) {
                Reconcile::Unchanged | Reconcile::Changed => {}
                Reconcile::Reactivate | Reconcile::Unsatisfied => {
                    debug!(
                        component = %self.name,
                        reference = %core.dependencies[index].name(),
                        "引用变化需要重新激活"
                    );
                    reactivate = true;
                    break;
                }
            }
        }

        if reactivate {
            self.deactivate(
                core,
                DeactivationReason::ReferenceUnsatisfied,
                ComponentState::UnsatisfiedReference,
            );
            self.try_activate(core);
        }
    }

    fn handle_configuration(&self, core: &mut ManagerCore, change: ConfigurationChange) {
        if self.descriptor.configuration_policy() == ConfigurationPolicy::Ignore {
            debug!(component = %self.name, "组件忽略配置");
            return;
        }
        let reason = match change {
            ConfigurationChange::Updated(properties) => {
                core.configuration = Some(properties);
                DeactivationReason::ConfigurationModified
            }
            ConfigurationChange::Deleted => {
                core.configuration = None;
                DeactivationReason::ConfigurationDeleted
            }
        };
        core.properties = self.compute_properties(core.configuration.as_ref());
        for dependency in &mut core.dependencies {
            dependency.configure(&core.properties);
        }
        debug!(component = %self.name, %reason, "应用配置变更");

        match core.state {
            ComponentState::Active => {
                if !self.modify_in_place(core) {
                    self.deactivate(core, reason, ComponentState::UnsatisfiedReference);
                    self.try_activate(core);
                }
            }
            ComponentState::UnsatisfiedReference
            | ComponentState::UnsatisfiedConfiguration
            | ComponentState::Satisfied => self.try_activate(core),
            _ => {}
        }
    }

    /// 调用 modified 回调原地更新配置，无法原地更新时返回 false
    fn modify_in_place(&self, core: &mut ManagerCore) -> bool {
        let Some(modified) = &self.descriptor.modified else {
            return false;
        };
        if self.descriptor.configuration_policy() == ConfigurationPolicy::Require
            && core.configuration.is_none()
        {
            return false;
        }
        if core
            .dependencies
            .iter()
            .any(|d| !d.is_satisfied() || d.static_binding_lost())
        {
            return false;
        }
        let Some((instance, context)) = core
            .activation
            .as_ref()
            .map(|a| (a.instance.clone(), a.context.clone()))
        else {
            return false;
        };

        context.set_properties(core.properties.clone());
        if let Err(e) = guarded(|| modified(&instance, &context)) {
            warn!(component = %self.name, "modified 回调失败: {}", e);
            core.last_failure = Some(format!("modified 回调失败: {e}"));
            return false;
        }

        for dependency in core.dependencies.iter_mut().filter(|d| !d.descriptor().is_static()) {
            if dependency.reconcile(&instance, &context) == Reconcile::Unsatisfied {
                return false;
            }
        }

        let public = public_properties(&core.properties);
        if let Some(activation) = core.activation.as_mut() {
            if let Some(published) = &activation.published {
                match self.services.registry.update_properties(published.id(), public) {
                    Ok(updated) => activation.published = Some(updated),
                    Err(e) => warn!(component = %self.name, "更新能力属性失败: {}", e),
                }
            }
        }
        info!(component = %self.name, id = self.id, "组件配置已原地更新");
        true
    }

    fn dispose_locked(&self, core: &mut ManagerCore, reason: DeactivationReason) {
        self.deactivate(core, reason, ComponentState::Disposed);
        self.disposed.store(true, Ordering::SeqCst);
        self.transition(core, ComponentState::Disposed);
        debug!(component = %self.name, id = self.id, %reason, "组件管理器已释放");
    }

    fn initialize_configuration(&mut self) {
        let configuration = self.core.get_mut().configuration.clone();
        let properties = self.compute_properties(configuration.as_ref());
        let core = self.core.get_mut();
        for dependency in &mut core.dependencies {
            dependency.configure(&properties);
        }
        core.properties = properties;
        let snapshot = build_snapshot(self.id, &self.name, &self.instance_pid, core);
        *self.snapshot.get_mut() = snapshot;
    }

    /// 描述符属性 < 配置属性 < 组件标识属性
    fn compute_properties(&self, configuration: Option<&Properties>) -> Properties {
        let mut properties = self.descriptor.properties().clone();
        if let Some(configuration) = configuration {
            properties = merge_properties(&properties, configuration);
            match &self.instance_pid {
                Some(pid) => {
                    properties.insert(SERVICE_PID.to_string(), json!(pid));
                    properties.insert(
                        SERVICE_FACTORY_PID.to_string(),
                        json!(self.descriptor.configuration_pid()),
                    );
                }
                None => {
                    properties.insert(
                        SERVICE_PID.to_string(),
                        json!(self.descriptor.configuration_pid()),
                    );
                }
            }
        }
        properties.insert(COMPONENT_NAME.to_string(), json!(self.name));
        properties.insert(COMPONENT_ID.to_string(), json!(self.id));
        properties
    }

    fn transition(&self, core: &mut ManagerCore, state: ComponentState) {
        if core.state == state {
            return;
        }
        debug!(
            component = %self.name,
            id = self.id,
            from = %core.state,
            to = %state,
            "组件状态转换"
        );
        core.state = state;
        self.publish_snapshot(core);
        self.services.bump_epoch();
    }

    fn publish_snapshot(&self, core: &ManagerCore) {
        let mut snapshot = build_snapshot(self.id, &self.name, &self.instance_pid, core);
        if snapshot.last_failure.is_none() {
            snapshot.last_failure = self.stalled.lock().failure.clone();
        }
        *self.snapshot.write() = snapshot;
    }

    /// 在持有组件锁期间执行
    #[cfg(test)]
    pub(crate) fn with_lock_held<R>(&self, f: impl FnOnce() -> R) -> LifecycleResult<R> {
        let _core = self.core.acquire()?;
        Ok(f())
    }
}

fn build_snapshot(
    id: ComponentId,
    name: &str,
    instance_pid: &Option<String>,
    core: &ManagerCore,
) -> ComponentSnapshot {
    ComponentSnapshot {
        id,
        name: name.to_string(),
        configuration_pid: instance_pid.clone(),
        state: core.state,
        properties: core.properties.clone(),
        references: core.dependencies.iter().map(|d| d.snapshot()).collect(),
        last_failure: core.last_failure.clone(),
        last_deactivation: core.last_deactivation,
        activated_at: core.activated_at,
        activation_count: core.activation_count,
    }
}

/// 按声明的逆序解绑全部引用
fn unbind_reverse(
    dependencies: &mut [DependencyManager],
    instance: &ComponentInstance,
    context: &ComponentContext,
) {
    for dependency in dependencies.iter_mut().rev() {
        dependency.unbind_all(instance, context);
    }
}
