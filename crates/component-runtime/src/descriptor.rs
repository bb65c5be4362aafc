//! 组件描述符
//!
//! [`ComponentMetadata`] 由模块加载器解析得到，验证后产出不可变的
//! [`ComponentDescriptor`]。回调名称在验证时解析为回调表中的闭包。

use crate::implementation::{
    ComponentImplementation, DeactivateFn, ImplementationCatalog, LifecycleFn,
};
use crate::reference::{ReferenceDescriptor, ReferenceMetadata};
use scr_common::{Properties, ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 默认激活回调名
pub const DEFAULT_ACTIVATE: &str = "activate";

/// 默认停用回调名
pub const DEFAULT_DEACTIVATE: &str = "deactivate";

/// 元数据版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpecVersion {
    V1_0,
    V1_1,
    /// 1.1 加上 `updated` 回调扩展
    V1_1Felix,
    V1_2,
    V1_3,
    V1_4,
    V1_5,
}

impl SpecVersion {
    /// 解析版本字符串
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1.0" => Some(Self::V1_0),
            "1.1" => Some(Self::V1_1),
            "1.1-felix" => Some(Self::V1_1Felix),
            "1.2" => Some(Self::V1_2),
            "1.3" => Some(Self::V1_3),
            "1.4" => Some(Self::V1_4),
            "1.5" => Some(Self::V1_5),
            _ => None,
        }
    }

    /// 版本字符串
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
            Self::V1_1Felix => "1.1-felix",
            Self::V1_2 => "1.2",
            Self::V1_3 => "1.3",
            Self::V1_4 => "1.4",
            Self::V1_5 => "1.5",
        }
    }
}

impl Default for SpecVersion {
    fn default() -> Self {
        Self::V1_5
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 配置策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigurationPolicy {
    /// 忽略配置
    Ignore,
    /// 有配置则使用
    Optional,
    /// 必须有配置才能满足
    Require,
}

impl ConfigurationPolicy {
    /// 解析配置策略字符串
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ignore" => Some(Self::Ignore),
            "optional" => Some(Self::Optional),
            "require" => Some(Self::Require),
            _ => None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// 组件的原始元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComponentMetadata {
    pub name: Option<String>,
    pub implementation: Option<String>,
    pub spec_version: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub configuration_policy: Option<String>,
    pub configuration_pid: Option<String>,
    /// 工厂配置组件：每个工厂配置对应一个管理器
    #[serde(default)]
    pub factory: bool,
    pub activate: Option<String>,
    pub deactivate: Option<String>,
    pub modified: Option<String>,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub references: Vec<ReferenceMetadata>,
}

impl ComponentMetadata {
    /// 创建组件元数据
    pub fn new(name: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            implementation: Some(implementation.into()),
            enabled: true,
            ..Self::default()
        }
    }

    /// 设置元数据版本
    pub fn with_spec_version(mut self, version: impl Into<String>) -> Self {
        self.spec_version = Some(version.into());
        self
    }

    /// 设置是否默认启用
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 设置配置策略（`ignore`、`optional`、`require`）
    pub fn with_configuration_policy(mut self, policy: impl Into<String>) -> Self {
        self.configuration_policy = Some(policy.into());
        self
    }

    /// 设置配置标识
    pub fn with_configuration_pid(mut self, pid: impl Into<String>) -> Self {
        self.configuration_pid = Some(pid.into());
        self
    }

    /// 标记为工厂配置组件
    pub fn as_factory(mut self) -> Self {
        self.factory = true;
        self
    }

    /// 设置激活回调名
    pub fn with_activate(mut self, name: impl Into<String>) -> Self {
        self.activate = Some(name.into());
        self
    }

    /// 设置停用回调名
    pub fn with_deactivate(mut self, name: impl Into<String>) -> Self {
        self.deactivate = Some(name.into());
        self
    }

    /// 设置配置修改回调名
    pub fn with_modified(mut self, name: impl Into<String>) -> Self {
        self.modified = Some(name.into());
        self
    }

    /// 声明提供的能力类型
    pub fn with_provides(mut self, capability_type: impl Into<String>) -> Self {
        self.provides.push(capability_type.into());
        self
    }

    /// 设置默认属性
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// 追加引用
    pub fn with_reference(mut self, reference: ReferenceMetadata) -> Self {
        self.references.push(reference);
        self
    }

    /// 验证元数据，按实现目录解析回调
    pub fn validate(
        &mut self,
        catalog: &ImplementationCatalog,
    ) -> ValidationResult<ComponentDescriptor> {
        let name = match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => return Err(ValidationError::MissingComponentName),
        };

        let identity = match self.implementation.as_deref() {
            Some(identity) if !identity.trim().is_empty() => identity.to_string(),
            _ => return Err(ValidationError::MissingImplementation { component: name }),
        };
        let implementation =
            catalog
                .get(&identity)
                .ok_or_else(|| ValidationError::UnknownImplementation {
                    component: name.clone(),
                    implementation: identity.clone(),
                })?;

        let spec_version = match self.spec_version.as_deref() {
            None => SpecVersion::default(),
            Some(text) => {
                SpecVersion::parse(text).ok_or_else(|| ValidationError::UnknownSpecVersion {
                    component: name.clone(),
                    value: text.to_string(),
                })?
            }
        };

        let policy_text = self.configuration_policy.as_deref().unwrap_or("optional");
        let configuration_policy = ConfigurationPolicy::parse(policy_text).ok_or_else(|| {
            ValidationError::InvalidConfigurationPolicy {
                component: name.clone(),
                value: policy_text.to_string(),
            }
        })?;
        if self.factory && configuration_policy == ConfigurationPolicy::Ignore {
            return Err(ValidationError::FactoryIgnoresConfiguration { component: name });
        }

        let activate = resolve_lifecycle(
            &name,
            &implementation,
            self.activate.as_deref(),
            DEFAULT_ACTIVATE,
        )?;
        let deactivate = match self.deactivate.as_deref() {
            Some(callback) => Some(implementation.deactivator(callback).ok_or_else(|| {
                ValidationError::UnresolvedCallback {
                    component: name.clone(),
                    implementation: identity.clone(),
                    callback: callback.to_string(),
                }
            })?),
            None => implementation.deactivator(DEFAULT_DEACTIVATE),
        };
        let modified = match self.modified.as_deref() {
            None => None,
            Some(_) if spec_version < SpecVersion::V1_1 => {
                return Err(ValidationError::UnsupportedBySpecVersion {
                    component: name,
                    feature: "modified".to_string(),
                    required: SpecVersion::V1_1.to_string(),
                    actual: spec_version.to_string(),
                })
            }
            Some(callback) => Some(implementation.lifecycle(callback).ok_or_else(|| {
                ValidationError::UnresolvedCallback {
                    component: name.clone(),
                    implementation: identity.clone(),
                    callback: callback.to_string(),
                }
            })?),
        };

        let mut seen = HashSet::new();
        let mut references = Vec::with_capacity(self.references.len());
        for reference in &mut self.references {
            let descriptor = reference.validate(&name, spec_version, &implementation)?;
            if !seen.insert(descriptor.name().to_string()) {
                return Err(ValidationError::DuplicateReference {
                    component: name,
                    reference: descriptor.name().to_string(),
                });
            }
            references.push(descriptor);
        }

        let configuration_pid = self
            .configuration_pid
            .clone()
            .filter(|pid| !pid.is_empty())
            .unwrap_or_else(|| name.clone());

        Ok(ComponentDescriptor {
            name,
            implementation,
            spec_version,
            enabled: self.enabled,
            configuration_policy,
            configuration_pid,
            factory: self.factory,
            activate,
            deactivate,
            modified,
            activate_name: self.activate.clone(),
            modified_name: self.modified.clone(),
            provides: self.provides.clone(),
            properties: self.properties.clone(),
            references,
        })
    }
}

/// 解析生命周期回调：显式声明的名称必须存在，默认名称缺失表示没有回调
fn resolve_lifecycle(
    component: &str,
    implementation: &ComponentImplementation,
    declared: Option<&str>,
    default_name: &str,
) -> ValidationResult<Option<LifecycleFn>> {
    match declared {
        Some(callback) => implementation
            .lifecycle(callback)
            .map(Some)
            .ok_or_else(|| ValidationError::UnresolvedCallback {
                component: component.to_string(),
                implementation: implementation.identity().to_string(),
                callback: callback.to_string(),
            }),
        None => Ok(implementation.lifecycle(default_name)),
    }
}

/// 已验证的组件描述符（不可变）
pub struct ComponentDescriptor {
    name: String,
    implementation: Arc<ComponentImplementation>,
    spec_version: SpecVersion,
    enabled: bool,
    configuration_policy: ConfigurationPolicy,
    configuration_pid: String,
    factory: bool,
    pub(crate) activate: Option<LifecycleFn>,
    pub(crate) deactivate: Option<DeactivateFn>,
    pub(crate) modified: Option<LifecycleFn>,
    activate_name: Option<String>,
    modified_name: Option<String>,
    provides: Vec<String>,
    properties: Properties,
    references: Vec<ReferenceDescriptor>,
}

impl ComponentDescriptor {
    /// 组件名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 组件实现
    pub fn implementation(&self) -> &Arc<ComponentImplementation> {
        &self.implementation
    }

    /// 元数据版本
    pub fn spec_version(&self) -> SpecVersion {
        self.spec_version
    }

    /// 是否默认启用
    pub fn is_default_enabled(&self) -> bool {
        self.enabled
    }

    /// 配置策略
    pub fn configuration_policy(&self) -> ConfigurationPolicy {
        self.configuration_policy
    }

    /// 配置标识（工厂组件为工厂标识）
    pub fn configuration_pid(&self) -> &str {
        &self.configuration_pid
    }

    /// 是否为工厂配置组件
    pub fn is_factory(&self) -> bool {
        self.factory
    }

    /// 是否声明了配置修改回调
    pub fn has_modified(&self) -> bool {
        self.modified.is_some()
    }

    /// 提供的能力类型
    pub fn provides(&self) -> &[String] {
        &self.provides
    }

    /// 默认属性
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// 引用描述符（声明顺序）
    pub fn references(&self) -> &[ReferenceDescriptor] {
        &self.references
    }

    /// 按名称查找引用描述符
    pub fn reference(&self, name: &str) -> Option<&ReferenceDescriptor> {
        self.references.iter().find(|r| r.name() == name)
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("implementation", &self.implementation.identity())
            .field("spec_version", &self.spec_version)
            .field("configuration_policy", &self.configuration_policy)
            .field("configuration_pid", &self.configuration_pid)
            .field("factory", &self.factory)
            .field("activate", &self.activate_name)
            .field("modified", &self.modified_name)
            .field("provides", &self.provides)
            .field("references", &self.references)
            .finish()
    }
}
