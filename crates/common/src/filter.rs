//! 引用目标过滤条件
//!
//! 过滤条件是属性相等约束的合取：候选能力的属性必须包含过滤条件中的每个键，
//! 且取值相等。更丰富的过滤表达式由能力注册表协作方负责，不在运行时范围内。

use crate::errors::ConfigError;
use crate::properties::Properties;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 目标过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetFilter {
    constraints: Properties,
}

impl TargetFilter {
    /// 创建不限制候选的过滤条件
    pub fn any() -> Self {
        Self::default()
    }

    /// 添加相等约束
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.constraints.insert(key.into(), value);
        self
    }

    /// 从配置值解析过滤条件（JSON 对象）
    pub fn from_value(key: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(map) => Ok(Self {
                constraints: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            }),
            Value::Null => Ok(Self::any()),
            other => Err(ConfigError::invalid_value(
                key,
                format!("目标过滤条件必须是对象, 实际: {other}"),
            )),
        }
    }

    /// 是否不限制候选
    pub fn is_any(&self) -> bool {
        self.constraints.is_empty()
    }

    /// 判断属性是否满足过滤条件
    pub fn matches(&self, properties: &Properties) -> bool {
        self.constraints
            .iter()
            .all(|(key, expected)| properties.get(key) == Some(expected))
    }
}

impl fmt::Display for TargetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            return f.write_str("(*)");
        }
        f.write_str("(&")?;
        for (key, value) in &self.constraints {
            write!(f, "({key}={value})")?;
        }
        f.write_str(")")
    }
}
