//! 组件生命周期状态

use serde::{Deserialize, Serialize};
use std::fmt;

/// 组件管理器状态
///
/// ```text
/// Disabled → Unsatisfied → Satisfied → Activating → Active
///                 ↑                                   ↓
///                 └──────────── Deactivating ←────────┘
/// ```
///
/// `Disabled` 既是初始状态，也可以由管理操作重新进入。`Disposed` 是终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentState {
    /// 已禁用
    Disabled,
    /// 等待必需的配置
    UnsatisfiedConfiguration,
    /// 等待必需的引用
    UnsatisfiedReference,
    /// 依赖已满足，尚未激活
    Satisfied,
    /// 激活中
    Activating,
    /// 已激活，实例存在且能力已发布
    Active,
    /// 停用中
    Deactivating,
    /// 已释放
    Disposed,
}

impl ComponentState {
    /// 是否处于启用状态
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled | Self::Disposed)
    }

    /// 是否处于未满足状态
    pub fn is_unsatisfied(self) -> bool {
        matches!(self, Self::UnsatisfiedConfiguration | Self::UnsatisfiedReference)
    }

    /// 依赖是否已满足
    pub fn is_satisfied(self) -> bool {
        matches!(
            self,
            Self::Satisfied | Self::Activating | Self::Active | Self::Deactivating
        )
    }

    /// 是否已激活
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// 是否处于过渡状态
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Activating | Self::Deactivating)
    }
}

impl Default for ComponentState {
    fn default() -> Self {
        Self::Disabled
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disabled => "disabled",
            Self::UnsatisfiedConfiguration => "unsatisfied-configuration",
            Self::UnsatisfiedReference => "unsatisfied-reference",
            Self::Satisfied => "satisfied",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Deactivating => "deactivating",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// 停用原因，传递给停用回调
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeactivationReason {
    /// 未指定
    Unspecified,
    /// 组件被禁用
    Disabled,
    /// 引用不再满足
    ReferenceUnsatisfied,
    /// 配置被修改
    ConfigurationModified,
    /// 配置被删除
    ConfigurationDeleted,
    /// 组件被释放
    Disposed,
    /// 所属模块停止
    ModuleStopped,
}

impl DeactivationReason {
    /// 数值编码
    pub fn code(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::Disabled => 1,
            Self::ReferenceUnsatisfied => 2,
            Self::ConfigurationModified => 3,
            Self::ConfigurationDeleted => 4,
            Self::Disposed => 5,
            Self::ModuleStopped => 6,
        }
    }
}

impl fmt::Display for DeactivationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unspecified => "Unspecified",
            Self::Disabled => "Component disabled",
            Self::ReferenceUnsatisfied => "Reference became unsatisfied",
            Self::ConfigurationModified => "Configuration modified",
            Self::ConfigurationDeleted => "Configuration deleted",
            Self::Disposed => "Component disposed",
            Self::ModuleStopped => "Module stopped",
        };
        f.write_str(text)
    }
}
