//! 配置变更事件定义

use scr_common::Properties;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 配置订阅目标
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigurationTarget {
    /// 单一配置标识
    Pid(String),
    /// 工厂配置标识，匹配该工厂下的所有配置
    Factory(String),
}

impl ConfigurationTarget {
    /// 判断配置是否属于该目标
    pub fn matches(&self, pid: &str, factory_pid: Option<&str>) -> bool {
        match self {
            Self::Pid(target) => factory_pid.is_none() && target == pid,
            Self::Factory(target) => factory_pid == Some(target.as_str()),
        }
    }
}

impl fmt::Display for ConfigurationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pid(pid) => write!(f, "pid:{pid}"),
            Self::Factory(factory) => write!(f, "factory:{factory}"),
        }
    }
}

/// 一份配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// 配置标识
    pub pid: String,
    /// 所属工厂标识
    pub factory_pid: Option<String>,
    /// 配置属性
    pub properties: Properties,
    /// 变更计数，每次更新或删除递增
    pub change_count: u64,
    /// 最后更新时间
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Configuration {
    /// 创建新的配置
    pub fn new(
        pid: impl Into<String>,
        factory_pid: Option<String>,
        properties: Properties,
        change_count: u64,
    ) -> Self {
        Self {
            pid: pid.into(),
            factory_pid,
            properties,
            change_count,
            updated_at: chrono::Utc::now(),
        }
    }
}

/// 配置变更事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigurationEvent {
    /// 配置已创建或更新
    Updated(Configuration),
    /// 配置已删除
    Deleted {
        /// 配置标识
        pid: String,
        /// 所属工厂标识
        factory_pid: Option<String>,
        /// 删除时的变更计数
        change_count: u64,
    },
}

impl ConfigurationEvent {
    /// 配置标识
    pub fn pid(&self) -> &str {
        match self {
            Self::Updated(configuration) => &configuration.pid,
            Self::Deleted { pid, .. } => pid,
        }
    }

    /// 所属工厂标识
    pub fn factory_pid(&self) -> Option<&str> {
        match self {
            Self::Updated(configuration) => configuration.factory_pid.as_deref(),
            Self::Deleted { factory_pid, .. } => factory_pid.as_deref(),
        }
    }

    /// 变更计数
    pub fn change_count(&self) -> u64 {
        match self {
            Self::Updated(configuration) => configuration.change_count,
            Self::Deleted { change_count, .. } => *change_count,
        }
    }
}
