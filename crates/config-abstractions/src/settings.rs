//! 运行时设置
//!
//! 运行时设置在构造时注入运行时，不存在全局可变的设置单例。
//! 分层解析是纯函数：内置默认值在最底层，之后每一层依次覆盖。

use scr_common::{ConfigError, ConfigResult, Properties};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// 锁等待超时时间的默认值（毫秒）
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// 停止超时时间的默认值（毫秒）
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 60_000;

/// 派发并发度的默认值
pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 4;

/// 设置键
pub mod keys {
    /// 组件锁等待超时（毫秒）
    pub const LOCK_TIMEOUT_MS: &str = "lock_timeout_ms";
    /// 停止超时（毫秒）
    pub const STOP_TIMEOUT_MS: &str = "stop_timeout_ms";
    /// 派发并发度
    pub const DISPATCH_CONCURRENCY: &str = "dispatch_concurrency";
    /// 日志级别
    pub const LOG_LEVEL: &str = "log_level";
    /// 是否保留延迟组件实例
    pub const KEEP_INSTANCES: &str = "keep_instances";
    /// 是否启用工厂组件
    pub const FACTORY_ENABLED: &str = "factory_enabled";
}

/// 兼容的框架属性名与设置键的对应关系
const ALIASES: &[(&str, &str)] = &[
    ("ds.lock.timeout.milliseconds", keys::LOCK_TIMEOUT_MS),
    ("ds.stop.timeout.milliseconds", keys::STOP_TIMEOUT_MS),
    ("ds.loglevel", keys::LOG_LEVEL),
    ("ds.delayed.keepInstances", keys::KEEP_INSTANCES),
    ("ds.factory.enabled", keys::FACTORY_ENABLED),
];

/// 运行时设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// 组件锁等待超时（毫秒），超时视为疑似死锁
    pub lock_timeout_ms: u64,
    /// 关闭时等待排队任务完成的超时（毫秒）
    pub stop_timeout_ms: u64,
    /// 同时执行生命周期任务的最大工作线程数
    pub dispatch_concurrency: usize,
    /// 日志级别
    pub log_level: String,
    /// 保留实例（保留选项，当前不影响行为）
    pub keep_instances: bool,
    /// 为 false 时工厂组件只注册、不创建管理器
    pub factory_enabled: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            dispatch_concurrency: DEFAULT_DISPATCH_CONCURRENCY,
            log_level: "info".to_string(),
            keep_instances: false,
            factory_enabled: true,
        }
    }
}

impl RuntimeSettings {
    /// 分层解析运行时设置
    ///
    /// 内置默认值之上依次应用每一层，后面的层覆盖前面的层。
    /// 未知键被忽略，类型错误的取值返回 [`ConfigError::InvalidValue`]。
    pub fn resolve(layers: &[Properties]) -> ConfigResult<Self> {
        let mut settings = Self::default();
        for layer in layers {
            for (key, value) in layer {
                let key = canonical_key(key);
                settings.apply(key, value)?;
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    /// 组件锁等待超时
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// 停止超时
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// 设置锁等待超时
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// 设置派发并发度
    pub fn with_dispatch_concurrency(mut self, concurrency: usize) -> Self {
        self.dispatch_concurrency = concurrency;
        self
    }

    /// 设置是否启用工厂组件
    pub fn with_factory_enabled(mut self, enabled: bool) -> Self {
        self.factory_enabled = enabled;
        self
    }

    fn apply(&mut self, key: &str, value: &Value) -> ConfigResult<()> {
        match key {
            keys::LOCK_TIMEOUT_MS => self.lock_timeout_ms = parse_u64(key, value)?,
            keys::STOP_TIMEOUT_MS => self.stop_timeout_ms = parse_u64(key, value)?,
            keys::DISPATCH_CONCURRENCY => {
                let concurrency = parse_u64(key, value)?;
                self.dispatch_concurrency = usize::try_from(concurrency)
                    .map_err(|_| ConfigError::invalid_value(key, "数值超出范围"))?;
            }
            keys::LOG_LEVEL => self.log_level = parse_log_level(key, value)?,
            keys::KEEP_INSTANCES => self.keep_instances = parse_bool(key, value)?,
            keys::FACTORY_ENABLED => self.factory_enabled = parse_bool(key, value)?,
            _ => {}
        }
        Ok(())
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                keys::LOCK_TIMEOUT_MS,
                "锁等待超时必须大于 0",
            ));
        }
        if self.dispatch_concurrency == 0 {
            return Err(ConfigError::invalid_value(
                keys::DISPATCH_CONCURRENCY,
                "派发并发度必须大于 0",
            ));
        }
        Ok(())
    }
}

fn canonical_key(key: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(key))
        .map_or(key, |(_, canonical)| *canonical)
}

fn parse_u64(key: &str, value: &Value) -> ConfigResult<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| ConfigError::invalid_value(key, format!("需要非负整数, 实际: {number}"))),
        Value::String(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::invalid_value(key, format!("需要非负整数, 实际: {text}"))),
        other => Err(ConfigError::invalid_value(
            key,
            format!("需要非负整数, 实际: {other}"),
        )),
    }
}

fn parse_bool(key: &str, value: &Value) -> ConfigResult<bool> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConfigError::invalid_value(
                key,
                format!("需要布尔值, 实际: {text}"),
            )),
        },
        other => Err(ConfigError::invalid_value(
            key,
            format!("需要布尔值, 实际: {other}"),
        )),
    }
}

fn parse_log_level(key: &str, value: &Value) -> ConfigResult<String> {
    let level = match value {
        Value::Number(number) => match number.as_u64() {
            Some(1) => "error",
            Some(2) => "warn",
            Some(3) => "info",
            Some(4) => "debug",
            _ => {
                return Err(ConfigError::invalid_value(
                    key,
                    format!("未知的日志级别: {number}"),
                ))
            }
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" | "4" => "debug",
            "info" | "3" => "info",
            "warn" | "warning" | "2" => "warn",
            "error" | "1" => "error",
            _ => {
                return Err(ConfigError::invalid_value(
                    key,
                    format!("未知的日志级别: {text}"),
                ))
            }
        },
        other => {
            return Err(ConfigError::invalid_value(
                key,
                format!("未知的日志级别: {other}"),
            ))
        }
    };
    Ok(level.to_string())
}
