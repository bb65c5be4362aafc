//! 组件实现与回调表
//!
//! 组件实现以类型化构建器注册具名回调，注册时即擦除为统一签名的回调表。
//! 描述符验证时按名称解析回调，之后的事件处理不再按名称查找。

use crate::context::ComponentContext;
use crate::reference::FieldValueType;
use dashmap::DashMap;
use registry_abstractions::CapabilityRef;
use scr_common::{BoxError, CapabilityId, DeactivationReason, Properties};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{info, warn};

/// 类型擦除的组件实例
pub type ComponentInstance = Arc<dyn Any + Send + Sync>;

pub(crate) type ConstructorFn =
    Arc<dyn Fn(&ComponentContext) -> Result<ComponentInstance, BoxError> + Send + Sync>;
pub(crate) type LifecycleFn =
    Arc<dyn Fn(&ComponentInstance, &ComponentContext) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type DeactivateFn =
    Arc<dyn Fn(&ComponentInstance, &ComponentContext, DeactivationReason) + Send + Sync>;
pub(crate) type BindFn =
    Arc<dyn Fn(&ComponentInstance, &CapabilityRef) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type FieldFn =
    Arc<dyn Fn(&ComponentInstance, FieldValue) -> Result<(), BoxError> + Send + Sync>;

/// 注入到字段的单个值，视图由引用声明的字段值类型决定
#[derive(Clone)]
pub struct InjectedValue {
    capability: CapabilityRef,
    value_type: FieldValueType,
}

impl InjectedValue {
    pub(crate) fn new(capability: CapabilityRef, value_type: FieldValueType) -> Self {
        Self {
            capability,
            value_type,
        }
    }

    /// 来源能力标识
    pub fn id(&self) -> CapabilityId {
        self.capability.id()
    }

    /// 字段值类型
    pub fn value_type(&self) -> FieldValueType {
        self.value_type
    }

    /// 能力实例（`service` 与 `tuple`）
    pub fn service<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self.value_type {
            FieldValueType::Service | FieldValueType::Tuple => self.capability.downcast::<T>(),
            _ => None,
        }
    }

    /// 能力属性（`properties` 与 `tuple`）
    pub fn properties(&self) -> Option<&Properties> {
        match self.value_type {
            FieldValueType::Properties | FieldValueType::Tuple => {
                Some(self.capability.properties())
            }
            _ => None,
        }
    }

    /// 能力句柄（`reference` 与 `serviceobjects`）
    pub fn reference(&self) -> Option<&CapabilityRef> {
        match self.value_type {
            FieldValueType::Reference | FieldValueType::ServiceObjects => Some(&self.capability),
            _ => None,
        }
    }
}

impl fmt::Debug for InjectedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectedValue")
            .field("id", &self.capability.id())
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// 字段注入值
///
/// `replace` 策略整体替换字段（`Unary` / `Multiple`），
/// `update` 策略逐个增删（`Added` / `Removed`）。
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// 单值字段的新值
    Unary(Option<InjectedValue>),
    /// 多值字段的完整列表，按绑定顺序
    Multiple(Vec<InjectedValue>),
    /// 新增一个值
    Added(InjectedValue),
    /// 移除一个值
    Removed(InjectedValue),
}

/// 组件实现
///
/// 通过 [`ComponentImplementation::builder`] 为具体类型 `T` 构建。
pub struct ComponentImplementation {
    identity: String,
    constructor: ConstructorFn,
    lifecycle: HashMap<String, LifecycleFn>,
    deactivators: HashMap<String, DeactivateFn>,
    methods: HashMap<String, BindFn>,
    fields: HashMap<String, FieldFn>,
}

impl ComponentImplementation {
    /// 创建组件实现构建器
    pub fn builder<T, F>(identity: impl Into<String>, constructor: F) -> ImplementationBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ComponentContext) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let constructor: ConstructorFn = Arc::new(move |context: &ComponentContext| {
            let instance = constructor(context)?;
            Ok(Arc::new(instance) as ComponentInstance)
        });
        ImplementationBuilder {
            implementation: Self {
                identity: identity.into(),
                constructor,
                lifecycle: HashMap::new(),
                deactivators: HashMap::new(),
                methods: HashMap::new(),
                fields: HashMap::new(),
            },
            _marker: PhantomData,
        }
    }

    /// 实现标识
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub(crate) fn constructor(&self) -> ConstructorFn {
        self.constructor.clone()
    }

    pub(crate) fn lifecycle(&self, name: &str) -> Option<LifecycleFn> {
        self.lifecycle.get(name).cloned()
    }

    pub(crate) fn deactivator(&self, name: &str) -> Option<DeactivateFn> {
        self.deactivators.get(name).cloned()
    }

    pub(crate) fn method(&self, name: &str) -> Option<BindFn> {
        self.methods.get(name).cloned()
    }

    pub(crate) fn field(&self, name: &str) -> Option<FieldFn> {
        self.fields.get(name).cloned()
    }
}

impl fmt::Debug for ComponentImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentImplementation")
            .field("identity", &self.identity)
            .field("lifecycle", &self.lifecycle.keys().collect::<Vec<_>>())
            .field("deactivators", &self.deactivators.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn typed<T: Send + Sync + 'static>(instance: &ComponentInstance) -> Result<&T, BoxError> {
    instance.as_ref().downcast_ref::<T>().ok_or_else(|| {
        format!("组件实例类型不匹配, 期望: {}", std::any::type_name::<T>()).into()
    })
}

/// 组件实现构建器
pub struct ImplementationBuilder<T> {
    implementation: ComponentImplementation,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ImplementationBuilder<T> {
    /// 注册激活回调
    pub fn activate<F>(self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T, &ComponentContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.lifecycle_callback(name, callback)
    }

    /// 注册配置修改回调
    pub fn modified<F>(self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T, &ComponentContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.lifecycle_callback(name, callback)
    }

    /// 注册停用回调
    pub fn deactivate<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T, &ComponentContext, DeactivationReason) + Send + Sync + 'static,
    {
        let erased: DeactivateFn = Arc::new(
            move |instance: &ComponentInstance,
                  context: &ComponentContext,
                  reason: DeactivationReason| {
                match instance.as_ref().downcast_ref::<T>() {
                    Some(typed) => callback(typed, context, reason),
                    None => warn!(
                        "组件实例类型不匹配, 跳过停用回调: {}",
                        std::any::type_name::<T>()
                    ),
                }
            },
        );
        self.implementation
            .deactivators
            .insert(name.into(), erased);
        self
    }

    /// 注册绑定方法（bind / unbind / updated 共用）
    pub fn method<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T, &CapabilityRef) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let erased: BindFn = Arc::new(move |instance: &ComponentInstance,
                                            capability: &CapabilityRef| {
            callback(typed::<T>(instance)?, capability)
        });
        self.implementation.methods.insert(name.into(), erased);
        self
    }

    /// 注册字段设置器
    pub fn field<F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&T, FieldValue) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let erased: FieldFn = Arc::new(move |instance: &ComponentInstance, value: FieldValue| {
            setter(typed::<T>(instance)?, value)
        });
        self.implementation.fields.insert(name.into(), erased);
        self
    }

    /// 完成构建
    pub fn build(self) -> ComponentImplementation {
        self.implementation
    }

    fn lifecycle_callback<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&T, &ComponentContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let erased: LifecycleFn = Arc::new(move |instance: &ComponentInstance,
                                                 context: &ComponentContext| {
            callback(typed::<T>(instance)?, context)
        });
        self.implementation.lifecycle.insert(name.into(), erased);
        self
    }
}

/// 组件实现目录
///
/// 按实现标识查找组件实现，替代按名称反射。
#[derive(Debug, Default)]
pub struct ImplementationCatalog {
    implementations: DashMap<String, Arc<ComponentImplementation>>,
}

impl ImplementationCatalog {
    /// 创建新的实现目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册组件实现，返回被替换的旧实现
    pub fn register(
        &self,
        implementation: ComponentImplementation,
    ) -> Option<Arc<ComponentImplementation>> {
        let identity = implementation.identity().to_string();
        info!("注册组件实现: {}", identity);
        let previous = self
            .implementations
            .insert(identity.clone(), Arc::new(implementation));
        if previous.is_some() {
            warn!("组件实现被替换: {}", identity);
        }
        previous
    }

    /// 以构建器方式注册
    pub fn with(self, implementation: ComponentImplementation) -> Self {
        self.register(implementation);
        self
    }

    /// 查找组件实现
    pub fn get(&self, identity: &str) -> Option<Arc<ComponentImplementation>> {
        self.implementations
            .get(identity)
            .map(|entry| entry.value().clone())
    }

    /// 是否包含实现
    pub fn contains(&self, identity: &str) -> bool {
        self.implementations.contains_key(identity)
    }

    /// 已注册实现数量
    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }
}

/// 调用用户回调，将 panic 转换为错误
pub(crate) fn guarded<R>(f: impl FnOnce() -> Result<R, BoxError>) -> Result<R, BoxError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "未知 panic".to_string());
            Err(format!("回调 panic: {message}").into())
        }
    }
}
