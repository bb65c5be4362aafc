//! 能力注册表事件

use crate::capability::CapabilityRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 能力事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityEventKind {
    /// 能力已发布
    Added,
    /// 能力属性已修改
    Modified,
    /// 能力即将注销
    Removing,
}

impl fmt::Display for CapabilityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Removing => "REMOVING",
        };
        f.write_str(name)
    }
}

/// 能力事件
///
/// `tracking_count` 是注册表在产生该事件时的代数，单调递增，
/// 订阅者用它判断事件是否已被更晚的查找结果覆盖。
#[derive(Debug, Clone)]
pub struct CapabilityEvent {
    /// 事件类型
    pub kind: CapabilityEventKind,
    /// 相关能力
    pub capability: CapabilityRef,
    /// 注册表代数
    pub tracking_count: u64,
}

impl CapabilityEvent {
    /// 创建新的能力事件
    pub fn new(kind: CapabilityEventKind, capability: CapabilityRef, tracking_count: u64) -> Self {
        Self {
            kind,
            capability,
            tracking_count,
        }
    }
}
