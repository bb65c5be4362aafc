//! 引用描述符
//!
//! [`ReferenceMetadata`] 是模块加载器交付的原始元数据，枚举属性以字符串保存，
//! 验证时解析，非法取值表现为 [`ValidationError`]。验证只进行一次：
//! 验证后元数据被冻结，之后的修改被忽略，派生标志只计算一次。
//! 验证同时产出不可变的 [`ReferenceDescriptor`]，可在并发激活的管理器间共享。

use crate::descriptor::SpecVersion;
use crate::implementation::{BindFn, ComponentImplementation, FieldFn};
use scr_common::{TargetFilter, ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// 引用基数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// `0..1`
    Optional,
    /// `0..n`
    Multiple,
    /// `1..1`
    Mandatory,
    /// `1..n`
    AtLeastOne,
}

impl Cardinality {
    /// 解析基数字符串
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "0..1" => Some(Self::Optional),
            "0..n" => Some(Self::Multiple),
            "1..1" => Some(Self::Mandatory),
            "1..n" => Some(Self::AtLeastOne),
            _ => None,
        }
    }

    /// 是否可选
    pub fn is_optional(self) -> bool {
        matches!(self, Self::Optional | Self::Multiple)
    }

    /// 是否多值
    pub fn is_multiple(self) -> bool {
        matches!(self, Self::Multiple | Self::AtLeastOne)
    }

    /// 满足引用所需的最少绑定数量
    pub fn minimum(self) -> usize {
        usize::from(!self.is_optional())
    }

    /// 规范字符串
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Optional => "0..1",
            Self::Multiple => "0..n",
            Self::Mandatory => "1..1",
            Self::AtLeastOne => "1..n",
        }
    }
}

/// 引用策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferencePolicy {
    /// 激活期间绑定不可变，变化需要重新激活
    Static,
    /// 激活期间可以原地重新绑定
    Dynamic,
}

impl ReferencePolicy {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "static" => Some(Self::Static),
            "dynamic" => Some(Self::Dynamic),
            _ => None,
        }
    }
}

/// 引用策略选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyOption {
    /// 已绑定的候选保持不变，直到其消失
    Reluctant,
    /// 出现更高优先级的候选时立即抢占
    Greedy,
}

impl PolicyOption {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "reluctant" => Some(Self::Reluctant),
            "greedy" => Some(Self::Greedy),
            _ => None,
        }
    }
}

/// 字段注入策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldStrategy {
    /// 整体替换字段值
    Replace,
    /// 逐个增删，只适用于多值引用
    Update,
}

impl FieldStrategy {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "replace" => Some(Self::Replace),
            "update" => Some(Self::Update),
            _ => None,
        }
    }
}

/// 字段值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldValueType {
    /// 能力实例
    Service,
    /// 能力属性
    Properties,
    /// 能力句柄
    Reference,
    /// 可按需获取实例的能力句柄
    ServiceObjects,
    /// 实例与属性
    Tuple,
}

impl FieldValueType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "service" => Some(Self::Service),
            "properties" => Some(Self::Properties),
            "reference" => Some(Self::Reference),
            "serviceobjects" => Some(Self::ServiceObjects),
            "tuple" => Some(Self::Tuple),
            _ => None,
        }
    }
}

/// 验证时一次性计算的派生标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DerivedFlags {
    optional: bool,
    multiple: bool,
    is_static: bool,
    is_greedy: bool,
}

/// 引用的原始元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReferenceMetadata {
    name: Option<String>,
    interface: Option<String>,
    cardinality: Option<String>,
    policy: Option<String>,
    policy_option: Option<String>,
    #[serde(default)]
    target: TargetFilter,
    bind: Option<String>,
    unbind: Option<String>,
    updated: Option<String>,
    field: Option<String>,
    field_option: Option<String>,
    field_collection_type: Option<String>,
    parameter: Option<String>,
    #[serde(skip)]
    derived: Option<DerivedFlags>,
}

macro_rules! frozen_setter {
    ($(#[$doc:meta])* $setter:ident, $builder:ident, $field:ident) => {
        $(#[$doc])*
        pub fn $setter(&mut self, value: impl Into<String>) {
            if self.check_mutable(stringify!($field)) {
                self.$field = Some(value.into());
            }
        }

        $(#[$doc])*
        pub fn $builder(mut self, value: impl Into<String>) -> Self {
            self.$setter(value);
            self
        }
    };
}

impl ReferenceMetadata {
    /// 创建引用元数据
    pub fn new(name: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            interface: Some(interface.into()),
            ..Self::default()
        }
    }

    /// 创建未命名的引用元数据（1.1 起名称默认为能力类型）
    pub fn for_interface(interface: impl Into<String>) -> Self {
        Self {
            interface: Some(interface.into()),
            ..Self::default()
        }
    }

    fn check_mutable(&self, attribute: &str) -> bool {
        if self.derived.is_some() {
            debug!(
                reference = self.name.as_deref().unwrap_or(""),
                attribute, "引用元数据已冻结, 忽略修改"
            );
            return false;
        }
        true
    }

    frozen_setter!(
        /// 设置名称
        set_name, with_name, name
    );
    frozen_setter!(
        /// 设置能力类型
        set_interface, with_interface, interface
    );
    frozen_setter!(
        /// 设置基数（`0..1`、`0..n`、`1..1`、`1..n`）
        set_cardinality, with_cardinality, cardinality
    );
    frozen_setter!(
        /// 设置策略（`static`、`dynamic`）
        set_policy, with_policy, policy
    );
    frozen_setter!(
        /// 设置策略选项（`reluctant`、`greedy`）
        set_policy_option, with_policy_option, policy_option
    );
    frozen_setter!(
        /// 设置绑定方法名
        set_bind, with_bind, bind
    );
    frozen_setter!(
        /// 设置解绑方法名
        set_unbind, with_unbind, unbind
    );
    frozen_setter!(
        /// 设置更新方法名
        set_updated, with_updated, updated
    );
    frozen_setter!(
        /// 设置注入字段名
        set_field, with_field, field
    );
    frozen_setter!(
        /// 设置字段策略（`replace`、`update`）
        set_field_option, with_field_option, field_option
    );
    frozen_setter!(
        /// 设置字段值类型
        set_field_collection_type, with_field_collection_type, field_collection_type
    );
    frozen_setter!(
        /// 设置构造参数索引
        set_parameter, with_parameter, parameter
    );

    /// 设置目标过滤条件
    pub fn set_target(&mut self, target: TargetFilter) {
        if self.check_mutable("target") {
            self.target = target;
        }
    }

    /// 以构建器方式设置目标过滤条件
    pub fn with_target(mut self, target: TargetFilter) -> Self {
        self.set_target(target);
        self
    }

    /// 名称
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 能力类型
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// 基数字符串，缺省为 `1..1`
    pub fn cardinality(&self) -> &str {
        self.cardinality.as_deref().unwrap_or("1..1")
    }

    /// 是否已验证并冻结
    pub fn is_validated(&self) -> bool {
        self.derived.is_some()
    }

    /// 是否可选（仅验证后有意义）
    pub fn is_optional(&self) -> bool {
        self.derived.map_or(false, |d| d.optional)
    }

    /// 是否多值（仅验证后有意义）
    pub fn is_multiple(&self) -> bool {
        self.derived.map_or(false, |d| d.multiple)
    }

    /// 是否静态策略（仅验证后有意义）
    pub fn is_static(&self) -> bool {
        self.derived.map_or(false, |d| d.is_static)
    }

    /// 是否贪婪选项（仅验证后有意义）
    pub fn is_greedy(&self) -> bool {
        self.derived.map_or(false, |d| d.is_greedy)
    }

    /// 目标过滤条件的配置属性名
    pub fn target_property_name(&self) -> String {
        format!("{}.target", self.name.as_deref().unwrap_or_default())
    }

    /// 最小基数的配置属性名
    pub fn min_cardinality_property_name(&self) -> String {
        format!(
            "{}.cardinality.minimum",
            self.name.as_deref().unwrap_or_default()
        )
    }

    /// 验证并冻结，同时按实现解析回调
    pub fn validate(
        &mut self,
        component: &str,
        version: SpecVersion,
        implementation: &ComponentImplementation,
    ) -> ValidationResult<ReferenceDescriptor> {
        let descriptor = self.build_descriptor(component, version, implementation)?;
        if self.derived.is_none() {
            if self.name.is_none() {
                self.name = Some(descriptor.name.clone());
            }
            self.derived = Some(DerivedFlags {
                optional: descriptor.optional,
                multiple: descriptor.multiple,
                is_static: descriptor.is_static,
                is_greedy: descriptor.is_greedy,
            });
        }
        Ok(descriptor)
    }

    fn build_descriptor(
        &self,
        component: &str,
        version: SpecVersion,
        implementation: &ComponentImplementation,
    ) -> ValidationResult<ReferenceDescriptor> {
        let capability_type = match self.interface.as_deref() {
            Some(interface) if !interface.is_empty() => interface.to_string(),
            _ => {
                return Err(ValidationError::MissingCapabilityType {
                    component: component.to_string(),
                    reference: self.name.clone().unwrap_or_default(),
                })
            }
        };

        let name = match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ if version >= SpecVersion::V1_1 => capability_type.clone(),
            _ => {
                return Err(ValidationError::MissingReferenceName {
                    component: component.to_string(),
                })
            }
        };

        let unsupported = |feature: &str, required: SpecVersion| {
            ValidationError::UnsupportedBySpecVersion {
                component: component.to_string(),
                feature: format!("{name}.{feature}"),
                required: required.to_string(),
                actual: version.to_string(),
            }
        };

        let cardinality = Cardinality::parse(self.cardinality()).ok_or_else(|| {
            ValidationError::InvalidCardinality {
                component: component.to_string(),
                reference: name.clone(),
                value: self.cardinality().to_string(),
            }
        })?;

        let policy_text = self.policy.as_deref().unwrap_or("static");
        let policy = ReferencePolicy::parse(policy_text).ok_or_else(|| {
            ValidationError::InvalidPolicy {
                component: component.to_string(),
                reference: name.clone(),
                value: policy_text.to_string(),
            }
        })?;

        let option_text = self.policy_option.as_deref().unwrap_or("reluctant");
        let policy_option = PolicyOption::parse(option_text).ok_or_else(|| {
            ValidationError::InvalidPolicyOption {
                component: component.to_string(),
                reference: name.clone(),
                value: option_text.to_string(),
            }
        })?;
        if policy_option == PolicyOption::Greedy && version < SpecVersion::V1_2 {
            return Err(unsupported("greedy", SpecVersion::V1_2));
        }
        if policy_option == PolicyOption::Greedy && policy == ReferencePolicy::Static {
            return Err(ValidationError::StaticGreedyReference {
                component: component.to_string(),
                reference: name.clone(),
            });
        }

        if self.updated.is_some()
            && version < SpecVersion::V1_2
            && version != SpecVersion::V1_1Felix
        {
            return Err(unsupported("updated", SpecVersion::V1_2));
        }

        let resolve_method = |method: &Option<String>| -> ValidationResult<Option<BindFn>> {
            match method {
                None => Ok(None),
                Some(method) => implementation.method(method).map(Some).ok_or_else(|| {
                    ValidationError::UnresolvedCallback {
                        component: component.to_string(),
                        implementation: implementation.identity().to_string(),
                        callback: method.clone(),
                    }
                }),
            }
        };
        let bind = resolve_method(&self.bind)?;
        let unbind = resolve_method(&self.unbind)?;
        let updated = resolve_method(&self.updated)?;

        let field = match self.field.as_deref() {
            None => None,
            Some(field_name) => {
                if version < SpecVersion::V1_3 {
                    return Err(unsupported("field", SpecVersion::V1_3));
                }
                let strategy_text = self.field_option.as_deref().unwrap_or("replace");
                let strategy = FieldStrategy::parse(strategy_text).ok_or_else(|| {
                    ValidationError::InvalidFieldStrategy {
                        component: component.to_string(),
                        reference: name.clone(),
                        value: strategy_text.to_string(),
                    }
                })?;
                if strategy == FieldStrategy::Update && !cardinality.is_multiple() {
                    return Err(ValidationError::FieldUpdateOnUnary {
                        component: component.to_string(),
                        reference: name.clone(),
                    });
                }
                let type_text = self.field_collection_type.as_deref().unwrap_or("service");
                let value_type = FieldValueType::parse(type_text).ok_or_else(|| {
                    ValidationError::InvalidFieldValueType {
                        component: component.to_string(),
                        reference: name.clone(),
                        value: type_text.to_string(),
                    }
                })?;
                let setter = implementation.field(field_name).ok_or_else(|| {
                    ValidationError::UnresolvedCallback {
                        component: component.to_string(),
                        implementation: implementation.identity().to_string(),
                        callback: field_name.to_string(),
                    }
                })?;
                Some(FieldBinding {
                    name: field_name.to_string(),
                    strategy,
                    value_type,
                    setter,
                })
            }
        };

        let parameter = match self.parameter.as_deref() {
            None => None,
            Some(text) => {
                if version < SpecVersion::V1_4 {
                    return Err(unsupported("parameter", SpecVersion::V1_4));
                }
                let index = text.trim().parse::<i64>().map_err(|_| {
                    ValidationError::InvalidParameter {
                        component: component.to_string(),
                        reference: name.clone(),
                        value: text.to_string(),
                        reason: "参数索引不是数字".to_string(),
                    }
                })?;
                let index = usize::try_from(index).map_err(|_| ValidationError::InvalidParameter {
                    component: component.to_string(),
                    reference: name.clone(),
                    value: text.to_string(),
                    reason: "参数索引不能为负数".to_string(),
                })?;
                Some(index)
            }
        };

        Ok(ReferenceDescriptor {
            optional: cardinality.is_optional(),
            multiple: cardinality.is_multiple(),
            is_static: policy == ReferencePolicy::Static,
            is_greedy: policy_option == PolicyOption::Greedy,
            name,
            capability_type,
            cardinality,
            policy,
            policy_option,
            target: self.target.clone(),
            bind,
            unbind,
            updated,
            bind_name: self.bind.clone(),
            unbind_name: self.unbind.clone(),
            updated_name: self.updated.clone(),
            field,
            parameter,
        })
    }
}

/// 字段绑定
#[derive(Clone)]
pub struct FieldBinding {
    name: String,
    strategy: FieldStrategy,
    value_type: FieldValueType,
    pub(crate) setter: FieldFn,
}

impl FieldBinding {
    /// 字段名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 字段策略
    pub fn strategy(&self) -> FieldStrategy {
        self.strategy
    }

    /// 字段值类型
    pub fn value_type(&self) -> FieldValueType {
        self.value_type
    }
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// 已验证的引用描述符（不可变）
#[derive(Clone)]
pub struct ReferenceDescriptor {
    name: String,
    capability_type: String,
    cardinality: Cardinality,
    policy: ReferencePolicy,
    policy_option: PolicyOption,
    target: TargetFilter,
    optional: bool,
    multiple: bool,
    is_static: bool,
    is_greedy: bool,
    pub(crate) bind: Option<BindFn>,
    pub(crate) unbind: Option<BindFn>,
    pub(crate) updated: Option<BindFn>,
    bind_name: Option<String>,
    unbind_name: Option<String>,
    updated_name: Option<String>,
    field: Option<FieldBinding>,
    parameter: Option<usize>,
}

impl ReferenceDescriptor {
    /// 引用名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 能力类型
    pub fn capability_type(&self) -> &str {
        &self.capability_type
    }

    /// 基数
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// 策略
    pub fn policy(&self) -> ReferencePolicy {
        self.policy
    }

    /// 策略选项
    pub fn policy_option(&self) -> PolicyOption {
        self.policy_option
    }

    /// 声明的目标过滤条件
    pub fn target(&self) -> &TargetFilter {
        &self.target
    }

    /// 是否可选
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// 是否多值
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// 是否静态策略
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// 是否贪婪选项
    pub fn is_greedy(&self) -> bool {
        self.is_greedy
    }

    /// 字段绑定
    pub fn field(&self) -> Option<&FieldBinding> {
        self.field.as_ref()
    }

    /// 构造参数索引
    pub fn parameter(&self) -> Option<usize> {
        self.parameter
    }

    /// 目标过滤条件的配置属性名
    pub fn target_property_name(&self) -> String {
        format!("{}.target", self.name)
    }

    /// 最小基数的配置属性名
    pub fn min_cardinality_property_name(&self) -> String {
        format!("{}.cardinality.minimum", self.name)
    }
}

impl fmt::Debug for ReferenceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceDescriptor")
            .field("name", &self.name)
            .field("capability_type", &self.capability_type)
            .field("cardinality", &self.cardinality.as_str())
            .field("policy", &self.policy)
            .field("policy_option", &self.policy_option)
            .field("target", &self.target.to_string())
            .field("bind", &self.bind_name)
            .field("unbind", &self.unbind_name)
            .field("updated", &self.updated_name)
            .field("field", &self.field)
            .field("parameter", &self.parameter)
            .finish()
    }
}
