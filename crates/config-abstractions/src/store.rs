//! 配置存储抽象接口

use crate::events::{Configuration, ConfigurationEvent, ConfigurationTarget};
use scr_common::Subscription;
use std::sync::Arc;

/// 配置事件监听器
///
/// 监听器在产生事件的线程上同步调用，必须快速返回。
pub type ConfigurationListener = Arc<dyn Fn(&ConfigurationEvent) + Send + Sync>;

/// 配置存储 trait
///
/// 配置的持久化与分发完全由存储负责，运行时只订阅与读取。
pub trait ConfigurationStore: Send + Sync {
    /// 订阅目标的配置变更
    fn subscribe(&self, target: ConfigurationTarget, listener: ConfigurationListener)
        -> Subscription;

    /// 列出目标当前的全部配置，用于订阅后的初始投递
    fn list(&self, target: &ConfigurationTarget) -> Vec<Configuration>;

    /// 获取单个配置
    fn get(&self, pid: &str) -> Option<Configuration>;
}
