//! 依赖管理器
//!
//! 每个组件管理器为每个引用持有一个依赖管理器。依赖管理器记录该能力类型的全部候选
//! （按优先级排序）、当前已绑定的候选（绑定顺序）以及绑定失败的候选，按策略决定
//! 绑定哪些候选，并对组件实例执行 bind / unbind / updated 回调和字段注入。
//!
//! 依赖管理器只在所属组件锁内被访问。

use crate::context::ComponentContext;
use crate::implementation::{guarded, ComponentInstance, FieldValue, InjectedValue};
use crate::reference::{FieldStrategy, FieldValueType, ReferenceDescriptor};
use registry_abstractions::{
    sort_by_priority, CapabilityEvent, CapabilityEventKind, CapabilityRef, CapabilityRegistry,
};
use scr_common::{
    CapabilityId, LifecycleError, LifecycleResult, Properties, ReferenceSnapshot, TargetFilter,
};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// 绑定决策
#[derive(Debug, Clone)]
pub(crate) enum Binding {
    /// 应当绑定的候选（单值引用最多一个）
    Bound(Vec<CapabilityRef>),
    /// 没有可绑定的候选
    Unbound,
}

impl Binding {
    pub(crate) fn into_vec(self) -> Vec<CapabilityRef> {
        match self {
            Self::Bound(candidates) => candidates,
            Self::Unbound => Vec::new(),
        }
    }
}

/// 能力事件对依赖管理器的影响
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EventEffect {
    /// 过期或无关的事件
    Ignored,
    /// 候选集合发生变化
    Changed,
    /// 已绑定候选的属性更新
    BoundModified(CapabilityId),
}

/// 激活期间的依赖协调结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reconcile {
    Unchanged,
    Changed,
    /// 静态引用失去了已绑定的候选，需要重新激活
    Reactivate,
    /// 引用不再满足
    Unsatisfied,
}

pub(crate) struct DependencyManager {
    component: String,
    descriptor: ReferenceDescriptor,
    target: TargetFilter,
    minimum: usize,
    candidates: Vec<CapabilityRef>,
    tracking_count: u64,
    bound: Vec<CapabilityRef>,
    failed: BTreeSet<CapabilityId>,
}

impl DependencyManager {
    pub(crate) fn new(component: impl Into<String>, descriptor: ReferenceDescriptor) -> Self {
        Self {
            component: component.into(),
            target: descriptor.target().clone(),
            minimum: descriptor.cardinality().minimum(),
            descriptor,
            candidates: Vec::new(),
            tracking_count: 0,
            bound: Vec::new(),
            failed: BTreeSet::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub(crate) fn capability_type(&self) -> &str {
        self.descriptor.capability_type()
    }

    pub(crate) fn descriptor(&self) -> &ReferenceDescriptor {
        &self.descriptor
    }

    pub(crate) fn is_bound(&self, id: CapabilityId) -> bool {
        self.bound.iter().any(|c| c.id() == id)
    }

    /// 从注册表读取全部候选
    pub(crate) fn refresh(&mut self, registry: &dyn CapabilityRegistry) {
        let snapshot = registry.lookup(self.descriptor.capability_type(), &TargetFilter::any());
        self.candidates = snapshot.candidates;
        self.tracking_count = snapshot.tracking_count;
        self.failed
            .retain(|id| self.candidates.iter().any(|c| c.id() == *id));
        debug!(
            component = %self.component,
            reference = %self.descriptor.name(),
            tracking_count = self.tracking_count,
            candidates = self.candidates.len(),
            "读取候选能力"
        );
    }

    /// 应用配置中的目标过滤条件与最小基数覆盖
    pub(crate) fn configure(&mut self, properties: &Properties) {
        let target_key = self.descriptor.target_property_name();
        self.target = match properties.get(&target_key) {
            None => self.descriptor.target().clone(),
            Some(value) => match TargetFilter::from_value(&target_key, value) {
                Ok(target) => target,
                Err(e) => {
                    warn!(component = %self.component, "忽略无效的目标过滤条件: {}", e);
                    self.descriptor.target().clone()
                }
            },
        };

        let declared = self.descriptor.cardinality().minimum();
        let minimum_key = self.descriptor.min_cardinality_property_name();
        self.minimum = match properties.get(&minimum_key).map(parse_minimum) {
            None => declared,
            Some(None) => {
                warn!(component = %self.component, key = %minimum_key, "忽略无效的最小基数");
                declared
            }
            Some(Some(minimum)) if !self.descriptor.is_multiple() && minimum > 1 => {
                warn!(
                    component = %self.component,
                    key = %minimum_key,
                    minimum,
                    "单值引用的最小基数只能为 0 或 1, 忽略"
                );
                declared
            }
            Some(Some(minimum)) if minimum < declared => {
                warn!(
                    component = %self.component,
                    key = %minimum_key,
                    minimum,
                    declared,
                    "最小基数不能低于声明值, 忽略"
                );
                declared
            }
            Some(Some(minimum)) => minimum,
        };
    }

    /// 应用能力事件，跟踪计数不大于已读取计数的事件视为过期
    pub(crate) fn apply_event(&mut self, event: &CapabilityEvent) -> EventEffect {
        if event.tracking_count <= self.tracking_count {
            debug!(
                component = %self.component,
                reference = %self.descriptor.name(),
                tracking_count = event.tracking_count,
                seen = self.tracking_count,
                "丢弃过期的能力事件"
            );
            return EventEffect::Ignored;
        }
        self.tracking_count = event.tracking_count;

        let capability = &event.capability;
        let position = self.candidates.iter().position(|c| c.id() == capability.id());
        match event.kind {
            CapabilityEventKind::Added | CapabilityEventKind::Modified => {
                match position {
                    Some(index) => self.candidates[index] = capability.clone(),
                    None => self.candidates.push(capability.clone()),
                }
                sort_by_priority(&mut self.candidates);
                if event.kind == CapabilityEventKind::Modified && self.is_bound(capability.id()) {
                    return EventEffect::BoundModified(capability.id());
                }
                EventEffect::Changed
            }
            CapabilityEventKind::Removing => {
                self.failed.remove(&capability.id());
                match position {
                    Some(index) => {
                        self.candidates.remove(index);
                        EventEffect::Changed
                    }
                    None => EventEffect::Ignored,
                }
            }
        }
    }

    /// 满足目标过滤条件且未绑定失败的候选（优先级顺序）
    pub(crate) fn available(&self) -> Vec<CapabilityRef> {
        self.candidates
            .iter()
            .filter(|c| self.target.matches(c.properties()) && !self.failed.contains(&c.id()))
            .cloned()
            .collect()
    }

    fn is_available(&self, id: CapabilityId) -> bool {
        self.candidates.iter().any(|c| {
            c.id() == id && self.target.matches(c.properties()) && !self.failed.contains(&id)
        })
    }

    pub(crate) fn is_satisfied(&self) -> bool {
        self.available().len() >= self.minimum
    }

    /// 按策略选择绑定
    ///
    /// 多值引用绑定全部可用候选；单值引用贪婪时选择最高优先级，
    /// 勉强时保留仍然可用的当前绑定。
    pub(crate) fn choose_binding(&self) -> Binding {
        let available = self.available();
        if available.is_empty() {
            return Binding::Unbound;
        }
        if self.descriptor.is_multiple() {
            return Binding::Bound(available);
        }
        if !self.descriptor.is_greedy() {
            if let Some(current) = self.bound.first() {
                if let Some(kept) = available.iter().find(|c| c.id() == current.id()) {
                    return Binding::Bound(vec![kept.clone()]);
                }
            }
        }
        Binding::Bound(available.into_iter().take(1).collect())
    }

    /// 静态引用的绑定是否会因候选变化而失效
    pub(crate) fn static_binding_lost(&self) -> bool {
        self.descriptor.is_static() && self.bound.iter().any(|c| !self.is_available(c.id()))
    }

    /// 激活时执行初始绑定
    pub(crate) fn bind_initial(
        &mut self,
        instance: &ComponentInstance,
        context: &ComponentContext,
    ) -> LifecycleResult<()> {
        self.bound.clear();
        loop {
            let pending: Vec<CapabilityRef> = self
                .choose_binding()
                .into_vec()
                .into_iter()
                .filter(|c| !self.is_bound(c.id()))
                .collect();
            if pending.is_empty() {
                break;
            }
            for capability in pending {
                match self.invoke_bind(instance, &capability) {
                    Ok(()) => self.bound.push(capability),
                    Err(e) => {
                        warn!("{}", e);
                        self.failed.insert(capability.id());
                    }
                }
            }
            if self.descriptor.is_multiple() || !self.bound.is_empty() {
                break;
            }
        }

        if self.bound.len() < self.minimum {
            return Err(LifecycleError::activation_failure(
                &self.component,
                format!(
                    "引用 {} 只绑定了 {} 个候选, 至少需要 {}",
                    self.descriptor.name(),
                    self.bound.len(),
                    self.minimum
                ),
            ));
        }

        self.inject_replace(instance);
        if self.field_strategy() == Some(FieldStrategy::Update) {
            for capability in self.bound.clone() {
                self.inject(instance, FieldValue::Added(self.injected(&capability)));
            }
        }
        context.set_bound(self.descriptor.name(), self.bound.clone());
        Ok(())
    }

    /// 停用时按绑定的逆序解绑
    pub(crate) fn unbind_all(&mut self, instance: &ComponentInstance, context: &ComponentContext) {
        while let Some(capability) = self.bound.pop() {
            self.invoke_unbind(instance, &capability);
        }
        context.set_bound(self.descriptor.name(), Vec::new());
    }

    /// 组件激活期间协调绑定
    pub(crate) fn reconcile(
        &mut self,
        instance: &ComponentInstance,
        context: &ComponentContext,
    ) -> Reconcile {
        if !self.is_satisfied() {
            return Reconcile::Unsatisfied;
        }
        if self.descriptor.is_static() {
            return if self.static_binding_lost() {
                Reconcile::Reactivate
            } else {
                Reconcile::Unchanged
            };
        }

        let mut changed = false;
        loop {
            let desired = self.choose_binding().into_vec();
            let added: Vec<CapabilityRef> = desired
                .iter()
                .filter(|c| !self.is_bound(c.id()))
                .cloned()
                .collect();
            let removed: Vec<CapabilityRef> = self
                .bound
                .iter()
                .rev()
                .filter(|c| !desired.iter().any(|d| d.id() == c.id()))
                .cloned()
                .collect();
            if added.is_empty() && removed.is_empty() {
                break;
            }
            changed = true;

            let mut bind_failed = false;
            for capability in added {
                match self.invoke_bind(instance, &capability) {
                    Ok(()) => {
                        self.bound.push(capability.clone());
                        if self.field_strategy() == Some(FieldStrategy::Update) {
                            self.inject(instance, FieldValue::Added(self.injected(&capability)));
                        }
                    }
                    Err(e) => {
                        warn!("{}", e);
                        self.failed.insert(capability.id());
                        bind_failed = true;
                    }
                }
            }
            // 单值引用的新候选绑定失败时保留旧绑定，下一轮重新选择
            if bind_failed && !self.descriptor.is_multiple() {
                continue;
            }
            for capability in removed {
                self.bound.retain(|c| c.id() != capability.id());
                self.invoke_unbind(instance, &capability);
            }
        }

        if changed {
            self.inject_replace(instance);
            context.set_bound(self.descriptor.name(), self.bound.clone());
        }
        if self.bound.len() < self.minimum {
            return Reconcile::Unsatisfied;
        }
        if changed {
            Reconcile::Changed
        } else {
            Reconcile::Unchanged
        }
    }

    /// 已绑定候选属性更新：替换句柄并调用 updated 回调
    pub(crate) fn bound_modified(
        &mut self,
        instance: &ComponentInstance,
        context: &ComponentContext,
        id: CapabilityId,
    ) {
        let Some(latest) = self.candidates.iter().find(|c| c.id() == id).cloned() else {
            return;
        };
        if !self.is_available(id) {
            return;
        }
        for slot in self.bound.iter_mut().filter(|c| c.id() == id) {
            *slot = latest.clone();
        }
        context.set_bound(self.descriptor.name(), self.bound.clone());
        if let Some(updated) = &self.descriptor.updated {
            if let Err(e) = guarded(|| updated(instance, &latest)) {
                warn!(
                    component = %self.component,
                    reference = %self.descriptor.name(),
                    capability = id,
                    "updated 回调失败: {}", e
                );
            }
        }
    }

    /// 属性与最新候选不一致的已绑定能力
    pub(crate) fn stale_bound(&self) -> Vec<CapabilityId> {
        self.bound
            .iter()
            .filter(|bound| {
                self.candidates
                    .iter()
                    .any(|c| c.id() == bound.id() && c.properties() != bound.properties())
            })
            .map(|bound| bound.id())
            .collect()
    }

    pub(crate) fn snapshot(&self) -> ReferenceSnapshot {
        ReferenceSnapshot {
            name: self.descriptor.name().to_string(),
            capability_type: self.descriptor.capability_type().to_string(),
            satisfied: self.is_satisfied(),
            bound: self.bound.iter().map(|c| c.id()).collect(),
            failed: self.failed.iter().copied().collect(),
        }
    }

    fn field_strategy(&self) -> Option<FieldStrategy> {
        self.descriptor.field().map(|f| f.strategy())
    }

    fn injected(&self, capability: &CapabilityRef) -> InjectedValue {
        let value_type = self
            .descriptor
            .field()
            .map(|f| f.value_type())
            .unwrap_or(FieldValueType::Service);
        InjectedValue::new(capability.clone(), value_type)
    }

    fn inject_replace(&self, instance: &ComponentInstance) {
        if self.field_strategy() != Some(FieldStrategy::Replace) {
            return;
        }
        let value = if self.descriptor.is_multiple() {
            FieldValue::Multiple(self.bound.iter().map(|c| self.injected(c)).collect())
        } else {
            FieldValue::Unary(self.bound.first().map(|c| self.injected(c)))
        };
        self.inject(instance, value);
    }

    fn inject(&self, instance: &ComponentInstance, value: FieldValue) {
        let Some(field) = self.descriptor.field() else {
            return;
        };
        if let Err(e) = guarded(|| (field.setter)(instance, value)) {
            warn!(
                component = %self.component,
                reference = %self.descriptor.name(),
                field = %field.name(),
                "字段注入失败: {}", e
            );
        }
    }

    fn invoke_bind(
        &self,
        instance: &ComponentInstance,
        capability: &CapabilityRef,
    ) -> LifecycleResult<()> {
        debug!(
            component = %self.component,
            reference = %self.descriptor.name(),
            capability = capability.id(),
            "绑定能力"
        );
        let Some(bind) = &self.descriptor.bind else {
            return Ok(());
        };
        guarded(|| bind(instance, capability)).map_err(|e| LifecycleError::BindFailure {
            component: self.component.clone(),
            reference: self.descriptor.name().to_string(),
            capability: capability.id(),
            message: e.to_string(),
        })
    }

    fn invoke_unbind(&self, instance: &ComponentInstance, capability: &CapabilityRef) {
        debug!(
            component = %self.component,
            reference = %self.descriptor.name(),
            capability = capability.id(),
            "解绑能力"
        );
        if self.field_strategy() == Some(FieldStrategy::Update) {
            self.inject(instance, FieldValue::Removed(self.injected(capability)));
        }
        if let Some(unbind) = &self.descriptor.unbind {
            if let Err(e) = guarded(|| unbind(instance, capability)) {
                warn!(
                    component = %self.component,
                    reference = %self.descriptor.name(),
                    capability = capability.id(),
                    "unbind 回调失败: {}", e
                );
            }
        }
    }
}

fn parse_minimum(value: &Value) -> Option<usize> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
