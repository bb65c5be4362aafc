//! 内存能力注册表

use parking_lot::{Mutex, RwLock};
use registry_abstractions::{
    sort_by_priority, CandidateSnapshot, CapabilityEvent, CapabilityEventKind,
    CapabilityInstance, CapabilityListener, CapabilityRef, CapabilityRegistry,
};
use scr_common::{
    CapabilityId, Properties, RegistryError, RegistryResult, Subscription, TargetFilter,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

struct ListenerEntry {
    capability_type: String,
    filter: TargetFilter,
    listener: CapabilityListener,
}

impl ListenerEntry {
    fn matches(&self, capability: &CapabilityRef) -> bool {
        capability.provides(&self.capability_type) && self.filter.matches(capability.properties())
    }
}

#[derive(Default)]
struct RegistryState {
    next_capability_id: CapabilityId,
    next_listener_id: u64,
    tracking_count: u64,
    capabilities: BTreeMap<CapabilityId, CapabilityRef>,
    listeners: HashMap<u64, Arc<ListenerEntry>>,
}

struct Inner {
    state: RwLock<RegistryState>,
    /// 串行化事件的产生与投递，保证监听器按代数顺序收到事件
    delivery: Mutex<()>,
}

type Notification = (CapabilityListener, CapabilityEvent);

/// 内存能力注册表
///
/// - 能力标识按注册顺序单调递增
/// - 每个事件使注册表代数加一
/// - 监听器在注册表自身的锁之外同步调用
#[derive(Clone)]
pub struct InMemoryCapabilityRegistry {
    inner: Arc<Inner>,
}

impl InMemoryCapabilityRegistry {
    /// 创建新的内存能力注册表
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(RegistryState::default()),
                delivery: Mutex::new(()),
            }),
        }
    }

    /// 已发布能力的数量
    pub fn len(&self) -> usize {
        self.inner.state.read().capabilities.len()
    }

    /// 是否没有已发布能力
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 活跃订阅数量
    pub fn listener_count(&self) -> usize {
        self.inner.state.read().listeners.len()
    }

    /// 按标识获取能力
    pub fn get(&self, id: CapabilityId) -> Option<CapabilityRef> {
        self.inner.state.read().capabilities.get(&id).cloned()
    }

    fn notify(notifications: Vec<Notification>) {
        for (listener, event) in notifications {
            listener(&event);
        }
    }
}

impl Default for InMemoryCapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryCapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("InMemoryCapabilityRegistry")
            .field("capabilities", &state.capabilities.len())
            .field("listeners", &state.listeners.len())
            .field("tracking_count", &state.tracking_count)
            .finish()
    }
}

impl CapabilityRegistry for InMemoryCapabilityRegistry {
    fn subscribe(
        &self,
        capability_type: &str,
        filter: TargetFilter,
        listener: CapabilityListener,
    ) -> Subscription {
        let listener_id = {
            let mut state = self.inner.state.write();
            state.next_listener_id += 1;
            let listener_id = state.next_listener_id;
            state.listeners.insert(
                listener_id,
                Arc::new(ListenerEntry {
                    capability_type: capability_type.to_string(),
                    filter,
                    listener,
                }),
            );
            listener_id
        };

        debug!(capability_type, listener_id, "新增能力订阅");

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(format!("capability:{capability_type}"), move || {
            if let Some(inner) = weak.upgrade() {
                inner.state.write().listeners.remove(&listener_id);
            }
        })
    }

    fn lookup(&self, capability_type: &str, filter: &TargetFilter) -> CandidateSnapshot {
        let state = self.inner.state.read();
        let mut candidates: Vec<CapabilityRef> = state
            .capabilities
            .values()
            .filter(|c| c.provides(capability_type) && filter.matches(c.properties()))
            .cloned()
            .collect();
        sort_by_priority(&mut candidates);

        CandidateSnapshot {
            candidates,
            tracking_count: state.tracking_count,
        }
    }

    fn publish(
        &self,
        types: Vec<String>,
        properties: Properties,
        instance: CapabilityInstance,
    ) -> RegistryResult<CapabilityRef> {
        if types.is_empty() {
            return Err(RegistryError::MissingCapabilityTypes);
        }

        let _delivery = self.inner.delivery.lock();
        let (capability, notifications) = {
            let mut state = self.inner.state.write();
            state.next_capability_id += 1;
            state.tracking_count += 1;
            let capability =
                CapabilityRef::new(state.next_capability_id, types, properties, instance);
            state
                .capabilities
                .insert(capability.id(), capability.clone());

            let event = CapabilityEvent::new(
                CapabilityEventKind::Added,
                capability.clone(),
                state.tracking_count,
            );
            let notifications: Vec<Notification> = state
                .listeners
                .values()
                .filter(|entry| entry.matches(&capability))
                .map(|entry| (entry.listener.clone(), event.clone()))
                .collect();
            (capability, notifications)
        };

        info!("发布能力: {}", capability);
        Self::notify(notifications);
        Ok(capability)
    }

    fn update_properties(
        &self,
        id: CapabilityId,
        properties: Properties,
    ) -> RegistryResult<CapabilityRef> {
        let _delivery = self.inner.delivery.lock();
        let (updated, notifications) = {
            let mut state = self.inner.state.write();
            let previous = state
                .capabilities
                .get(&id)
                .cloned()
                .ok_or(RegistryError::UnknownCapability { id })?;
            state.tracking_count += 1;
            let tracking_count = state.tracking_count;
            let updated = previous.with_properties(properties);
            state.capabilities.insert(id, updated.clone());

            // 过滤条件的匹配结果可能随属性改变
            let notifications: Vec<Notification> = state
                .listeners
                .values()
                .filter_map(|entry| {
                    let kind = match (entry.matches(&previous), entry.matches(&updated)) {
                        (true, true) => CapabilityEventKind::Modified,
                        (false, true) => CapabilityEventKind::Added,
                        (true, false) => CapabilityEventKind::Removing,
                        (false, false) => return None,
                    };
                    let capability = if kind == CapabilityEventKind::Removing {
                        previous.clone()
                    } else {
                        updated.clone()
                    };
                    Some((
                        entry.listener.clone(),
                        CapabilityEvent::new(kind, capability, tracking_count),
                    ))
                })
                .collect();
            (updated, notifications)
        };

        debug!("更新能力属性: {}", updated);
        Self::notify(notifications);
        Ok(updated)
    }

    fn unpublish(&self, id: CapabilityId) -> RegistryResult<()> {
        let _delivery = self.inner.delivery.lock();
        let (capability, notifications) = {
            let mut state = self.inner.state.write();
            let capability = state
                .capabilities
                .remove(&id)
                .ok_or(RegistryError::UnknownCapability { id })?;
            state.tracking_count += 1;

            let event = CapabilityEvent::new(
                CapabilityEventKind::Removing,
                capability.clone(),
                state.tracking_count,
            );
            let notifications: Vec<Notification> = state
                .listeners
                .values()
                .filter(|entry| entry.matches(&capability))
                .map(|entry| (entry.listener.clone(), event.clone()))
                .collect();
            (capability, notifications)
        };

        info!("注销能力: {}", capability);
        Self::notify(notifications);
        Ok(())
    }

    fn tracking_count(&self) -> u64 {
        self.inner.state.read().tracking_count
    }
}
