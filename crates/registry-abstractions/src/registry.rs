//! 能力注册表抽象接口

use crate::capability::{CapabilityInstance, CapabilityRef};
use crate::events::CapabilityEvent;
use scr_common::{CapabilityId, Properties, RegistryResult, Subscription, TargetFilter};
use std::sync::Arc;

/// 能力事件监听器
///
/// 监听器在产生事件的线程上同步调用，必须快速返回，且不能在回调内发布或注销能力。
pub type CapabilityListener = Arc<dyn Fn(&CapabilityEvent) + Send + Sync>;

/// 查找结果
#[derive(Debug, Clone, Default)]
pub struct CandidateSnapshot {
    /// 按优先级排序的候选
    pub candidates: Vec<CapabilityRef>,
    /// 查找时的注册表代数
    pub tracking_count: u64,
}

/// 能力注册表 trait
///
/// 能力注册表由外部拥有，运行时只通过该接口读写。
pub trait CapabilityRegistry: Send + Sync {
    /// 订阅指定类型且满足过滤条件的能力事件
    ///
    /// 订阅只接收此后产生的事件；已有能力通过 [`CapabilityRegistry::lookup`] 获取。
    fn subscribe(
        &self,
        capability_type: &str,
        filter: TargetFilter,
        listener: CapabilityListener,
    ) -> Subscription;

    /// 查找指定类型且满足过滤条件的能力，按优先级排序
    fn lookup(&self, capability_type: &str, filter: &TargetFilter) -> CandidateSnapshot;

    /// 发布能力
    fn publish(
        &self,
        types: Vec<String>,
        properties: Properties,
        instance: CapabilityInstance,
    ) -> RegistryResult<CapabilityRef>;

    /// 更新已发布能力的属性
    fn update_properties(
        &self,
        id: CapabilityId,
        properties: Properties,
    ) -> RegistryResult<CapabilityRef>;

    /// 注销能力
    fn unpublish(&self, id: CapabilityId) -> RegistryResult<()>;

    /// 当前注册表代数
    fn tracking_count(&self) -> u64;
}
