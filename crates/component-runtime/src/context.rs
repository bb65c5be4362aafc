//! 组件上下文

use parking_lot::RwLock;
use registry_abstractions::CapabilityRef;
use scr_common::{ComponentId, Properties, RuntimeError, RuntimeResult};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

/// 运行时的管理入口，供组件在回调中启用或禁用其他组件
pub trait ComponentAdmin: Send + Sync {
    /// 启用或禁用组件
    ///
    /// 目标组件正被其他线程持锁时最多等待锁超时时间，超时返回
    /// [`LifecycleError::LockTimeout`](scr_common::LifecycleError::LockTimeout)，
    /// 操作转入目标组件的派发队列稍后执行。
    fn set_component_enabled(&self, name: &str, enabled: bool) -> RuntimeResult<()>;
}

/// 单次激活的组件上下文
///
/// 构造函数、生命周期回调通过上下文访问组件属性和已绑定的能力。
pub struct ComponentContext {
    name: String,
    id: ComponentId,
    properties: RwLock<Properties>,
    bound: RwLock<HashMap<String, Vec<CapabilityRef>>>,
    parameters: RwLock<BTreeMap<usize, Vec<CapabilityRef>>>,
    admin: Weak<dyn ComponentAdmin>,
}

impl ComponentContext {
    pub(crate) fn new(
        name: impl Into<String>,
        id: ComponentId,
        properties: Properties,
        admin: Weak<dyn ComponentAdmin>,
    ) -> Self {
        Self {
            name: name.into(),
            id,
            properties: RwLock::new(properties),
            bound: RwLock::new(HashMap::new()),
            parameters: RwLock::new(BTreeMap::new()),
            admin,
        }
    }

    /// 组件名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 组件标识
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// 当前组件属性
    pub fn properties(&self) -> Properties {
        self.properties.read().clone()
    }

    /// 读取单个属性
    pub fn property(&self, key: &str) -> Option<serde_json::Value> {
        self.properties.read().get(key).cloned()
    }

    /// 引用当前绑定的首个能力
    pub fn locate(&self, reference: &str) -> Option<CapabilityRef> {
        self.bound
            .read()
            .get(reference)
            .and_then(|bound| bound.first().cloned())
    }

    /// 引用当前绑定的全部能力（绑定顺序）
    pub fn locate_all(&self, reference: &str) -> Vec<CapabilityRef> {
        self.bound
            .read()
            .get(reference)
            .cloned()
            .unwrap_or_default()
    }

    /// 引用当前绑定的首个能力实例
    pub fn locate_service<T: Any + Send + Sync>(&self, reference: &str) -> Option<Arc<T>> {
        self.locate(reference)?.downcast::<T>()
    }

    /// 构造参数：对应索引的引用在构造前选定的能力
    pub fn parameter(&self, index: usize) -> Vec<CapabilityRef> {
        self.parameters
            .read()
            .get(&index)
            .cloned()
            .unwrap_or_default()
    }

    /// 构造参数的首个能力实例
    pub fn parameter_service<T: Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
        self.parameter(index).first()?.downcast::<T>()
    }

    /// 启用组件
    pub fn enable_component(&self, name: &str) -> RuntimeResult<()> {
        self.admin()?.set_component_enabled(name, true)
    }

    /// 禁用组件
    pub fn disable_component(&self, name: &str) -> RuntimeResult<()> {
        self.admin()?.set_component_enabled(name, false)
    }

    fn admin(&self) -> RuntimeResult<Arc<dyn ComponentAdmin>> {
        self.admin.upgrade().ok_or(RuntimeError::ShuttingDown)
    }

    pub(crate) fn set_properties(&self, properties: Properties) {
        *self.properties.write() = properties;
    }

    pub(crate) fn set_bound(&self, reference: &str, bound: Vec<CapabilityRef>) {
        let mut map = self.bound.write();
        if bound.is_empty() {
            map.remove(reference);
        } else {
            map.insert(reference.to_string(), bound);
        }
    }

    pub(crate) fn set_parameter(&self, index: usize, candidates: Vec<CapabilityRef>) {
        self.parameters.write().insert(index, candidates);
    }
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("bound", &self.bound.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
