//! 能力句柄

use scr_common::{ranking_of, CapabilityId, Properties};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// 能力实例的类型擦除指针
pub type CapabilityInstance = Arc<dyn Any + Send + Sync>;

/// 已发布能力的句柄
///
/// 句柄是发布时（或最近一次属性更新时）的不可变视图，克隆开销很小。
/// 同一能力的不同视图通过 [`CapabilityRef::id`] 识别。
#[derive(Clone)]
pub struct CapabilityRef {
    id: CapabilityId,
    types: Arc<[String]>,
    properties: Arc<Properties>,
    ranking: i32,
    instance: CapabilityInstance,
}

impl CapabilityRef {
    /// 创建新的能力句柄
    pub fn new(
        id: CapabilityId,
        types: Vec<String>,
        properties: Properties,
        instance: CapabilityInstance,
    ) -> Self {
        let ranking = ranking_of(&properties);
        Self {
            id,
            types: types.into(),
            properties: Arc::new(properties),
            ranking,
            instance,
        }
    }

    /// 以新属性创建同一能力的新视图
    pub fn with_properties(&self, properties: Properties) -> Self {
        Self {
            id: self.id,
            types: self.types.clone(),
            ranking: ranking_of(&properties),
            properties: Arc::new(properties),
            instance: self.instance.clone(),
        }
    }

    /// 能力标识（注册顺序）
    pub fn id(&self) -> CapabilityId {
        self.id
    }

    /// 能力类型
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// 是否提供指定类型
    pub fn provides(&self, capability_type: &str) -> bool {
        self.types.iter().any(|t| t == capability_type)
    }

    /// 能力属性
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// 能力排名
    pub fn ranking(&self) -> i32 {
        self.ranking
    }

    /// 类型擦除的实例
    pub fn instance(&self) -> &CapabilityInstance {
        &self.instance
    }

    /// 将实例向下转型为具体类型
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast::<T>().ok()
    }

    /// 候选排序：排名高者在前，排名相同时先注册者在前
    pub fn cmp_priority(&self, other: &Self) -> Ordering {
        other
            .ranking
            .cmp(&self.ranking)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// 是否比另一个能力优先
    pub fn outranks(&self, other: &Self) -> bool {
        self.cmp_priority(other) == Ordering::Less
    }
}

impl PartialEq for CapabilityRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CapabilityRef {}

impl fmt::Debug for CapabilityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRef")
            .field("id", &self.id)
            .field("types", &self.types)
            .field("ranking", &self.ranking)
            .field("properties", &self.properties)
            .field("instance", &"<instance>")
            .finish()
    }
}

impl fmt::Display for CapabilityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}[{}]", self.id, self.types.join(","))
    }
}

/// 按优先级排序候选列表
pub fn sort_by_priority(candidates: &mut [CapabilityRef]) {
    candidates.sort_by(CapabilityRef::cmp_priority);
}
