//! 运行状态快照
//!
//! 提供组件管理器对外可查询的只读视图

use crate::lifecycle::{ComponentState, DeactivationReason};
use crate::properties::Properties;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 能力标识，由能力注册表分配，单调递增
pub type CapabilityId = u64;

/// 组件管理器标识，由运行时分配，单调递增
pub type ComponentId = u64;

/// 单个引用的运行状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    /// 引用名称
    pub name: String,
    /// 能力类型
    pub capability_type: String,
    /// 当前是否满足
    pub satisfied: bool,
    /// 已绑定的能力，按绑定顺序
    pub bound: Vec<CapabilityId>,
    /// 匹配但当前不可用的能力（绑定失败）
    pub failed: Vec<CapabilityId>,
}

/// 组件管理器快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    /// 管理器标识
    pub id: ComponentId,
    /// 组件名称
    pub name: String,
    /// 工厂组件的配置标识，单例组件为 None
    pub configuration_pid: Option<String>,
    /// 当前状态
    pub state: ComponentState,
    /// 合并后的组件属性
    pub properties: Properties,
    /// 各引用的状态，按声明顺序
    pub references: Vec<ReferenceSnapshot>,
    /// 最近一次激活失败原因
    pub last_failure: Option<String>,
    /// 最近一次停用原因
    pub last_deactivation: Option<DeactivationReason>,
    /// 最近一次激活完成时间
    pub activated_at: Option<DateTime<Utc>>,
    /// 累计激活次数
    pub activation_count: u64,
}

impl ComponentSnapshot {
    /// 未满足的引用名称
    pub fn unsatisfied_references(&self) -> Vec<&str> {
        self.references
            .iter()
            .filter(|r| !r.satisfied)
            .map(|r| r.name.as_str())
            .collect()
    }

    /// 某个引用当前绑定的能力
    pub fn bound(&self, reference: &str) -> Vec<CapabilityId> {
        self.references
            .iter()
            .find(|r| r.name == reference)
            .map(|r| r.bound.clone())
            .unwrap_or_default()
    }
}
