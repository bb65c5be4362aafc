//! 属性映射与标准属性名

use serde_json::Value;
use std::collections::BTreeMap;

/// 组件与能力的属性映射
///
/// 使用有序映射，保证日志与快照输出稳定。
pub type Properties = BTreeMap<String, Value>;

/// 组件名称属性
pub const COMPONENT_NAME: &str = "component.name";

/// 组件 ID 属性
pub const COMPONENT_ID: &str = "component.id";

/// 配置标识属性
pub const SERVICE_PID: &str = "service.pid";

/// 工厂配置标识属性
pub const SERVICE_FACTORY_PID: &str = "service.factoryPid";

/// 能力排名属性，数值越高优先级越高
pub const SERVICE_RANKING: &str = "service.ranking";

/// 以此前缀开头的属性为私有属性，不随能力发布
pub const PRIVATE_PROPERTY_PREFIX: char = '.';

/// 合并两个属性映射，`overlay` 中的键覆盖 `base`
pub fn merge_properties(base: &Properties, overlay: &Properties) -> Properties {
    let mut merged = base.clone();
    merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// 去除私有属性，得到可发布的属性
pub fn public_properties(properties: &Properties) -> Properties {
    properties
        .iter()
        .filter(|(key, _)| !key.starts_with(PRIVATE_PROPERTY_PREFIX))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// 读取能力排名，缺失或非整数时为 0
pub fn ranking_of(properties: &Properties) -> i32 {
    properties
        .get(SERVICE_RANKING)
        .and_then(Value::as_i64)
        .and_then(|rank| i32::try_from(rank).ok())
        .unwrap_or(0)
}

/// 从键值对构建属性映射
pub fn properties_from<I, K>(entries: I) -> Properties
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
