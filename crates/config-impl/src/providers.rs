//! 运行时设置来源实现

use async_trait::async_trait;
use config_abstractions::SettingsSource;
use scr_common::{ConfigError, ConfigResult, Properties};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 环境变量前缀的默认值
pub const DEFAULT_ENV_PREFIX: &str = "SCR";

/// 将嵌套对象展开为以点分隔的扁平键
fn flatten_into(prefix: &str, value: Value, out: &mut Properties) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let full_key = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&full_key, nested, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other);
        }
    }
}

fn parse_error(err: config::ConfigError) -> ConfigError {
    ConfigError::ParseError {
        source: Box::new(err),
    }
}

/// 显式键值设置来源
#[derive(Debug, Clone)]
pub struct MapSettingsSource {
    name: String,
    values: Properties,
    priority: i32,
}

impl MapSettingsSource {
    /// 创建新的键值设置来源
    pub fn new(name: impl Into<String>, values: Properties) -> Self {
        Self {
            name: name.into(),
            values,
            priority: 300, // 显式设置最高优先级
        }
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl SettingsSource for MapSettingsSource {
    async fn load(&self) -> ConfigResult<Properties> {
        Ok(self.values.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 文件设置来源（TOML / JSON / YAML，按扩展名识别）
#[derive(Debug, Clone)]
pub struct FileSettingsSource {
    file_path: PathBuf,
    required: bool,
    priority: i32,
}

impl FileSettingsSource {
    /// 创建新的文件设置来源
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            file_path: path.as_ref().to_path_buf(),
            required: true,
            priority: 100, // 文件默认中等优先级
        }
    }

    /// 文件不存在时视为空设置
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 文件路径
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

#[async_trait]
impl SettingsSource for FileSettingsSource {
    async fn load(&self) -> ConfigResult<Properties> {
        if !self.file_path.exists() {
            if self.required {
                return Err(ConfigError::FileNotFound {
                    path: self.file_path.display().to_string(),
                });
            }
            debug!("设置文件不存在，跳过: {}", self.file_path.display());
            return Ok(Properties::new());
        }

        debug!("加载设置文件: {}", self.file_path.display());

        let settings = config::Config::builder()
            .add_source(config::File::from(self.file_path.as_path()))
            .build()
            .map_err(parse_error)?;
        let value: Value = settings.try_deserialize().map_err(parse_error)?;

        let mut properties = Properties::new();
        flatten_into("", value, &mut properties);
        debug!("设置文件加载完成, 共 {} 项", properties.len());
        Ok(properties)
    }

    fn name(&self) -> &str {
        "FileSettingsSource"
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 环境变量设置来源
///
/// `SCR_LOCK_TIMEOUT_MS=250` 映射为 `lock_timeout_ms = 250`。
#[derive(Debug, Clone)]
pub struct EnvironmentSettingsSource {
    prefix: String,
    variables: Option<HashMap<String, String>>,
    priority: i32,
}

impl EnvironmentSettingsSource {
    /// 创建新的环境变量设置来源
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            variables: None,
            priority: 200, // 环境变量高于文件
        }
    }

    /// 使用给定的变量表代替进程环境
    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 环境变量前缀
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for EnvironmentSettingsSource {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_PREFIX)
    }
}

#[async_trait]
impl SettingsSource for EnvironmentSettingsSource {
    async fn load(&self) -> ConfigResult<Properties> {
        debug!("加载环境变量，前缀: {}", self.prefix);

        let environment = config::Environment::with_prefix(&self.prefix)
            .try_parsing(true)
            .source(self.variables.clone());
        let settings = config::Config::builder()
            .add_source(environment)
            .build()
            .map_err(parse_error)?;
        let value: Value = settings.try_deserialize().map_err(parse_error)?;

        let mut properties = Properties::new();
        flatten_into("", value, &mut properties);
        debug!("加载了 {} 个环境变量", properties.len());
        Ok(properties)
    }

    fn name(&self) -> &str {
        "EnvironmentSettingsSource"
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
