//! 组件运行时健康状态

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 组件运行时健康状态
///
/// 降级时按组件（工厂实例为 `name[pid]`）列出最近一次失败原因。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// 启用的组件存在失败记录
    Degraded { failures: BTreeMap<String, String> },
    /// 运行时正在关闭
    ShuttingDown,
}

impl HealthStatus {
    /// 无失败记录时为健康，否则为降级
    pub fn from_failures(failures: BTreeMap<String, String>) -> Self {
        if failures.is_empty() {
            Self::Healthy
        } else {
            Self::Degraded { failures }
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// 正在关闭的运行时视为不健康
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }

    /// 组件的失败原因
    pub fn failure(&self, component: &str) -> Option<&str> {
        match self {
            Self::Degraded { failures } => failures.get(component).map(String::as_str),
            Self::Healthy | Self::ShuttingDown => None,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => f.write_str("健康"),
            Self::Degraded { failures } => write!(f, "降级: {} 个组件存在失败", failures.len()),
            Self::ShuttingDown => f.write_str("组件运行时正在关闭"),
        }
    }
}
