//! 日志初始化

use scr_common::{RuntimeError, RuntimeResult};
use tracing_subscriber::EnvFilter;

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别，`RUST_LOG` 存在时以环境变量为准
    pub level: tracing::Level,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 按运行时设置中的日志级别调整
    pub fn with_level_name(mut self, level: &str) -> RuntimeResult<Self> {
        self.level = level
            .parse()
            .map_err(|_| RuntimeError::BootstrapFailed {
                message: format!("无效的日志级别: {level}"),
            })?;
        Ok(self)
    }

    /// 初始化全局日志订阅者
    ///
    /// 已存在全局订阅者时返回 `false`，不视为错误。
    pub fn init(&self) -> bool {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string().to_lowercase()));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_file)
            .with_line_number(self.show_line_number);

        let result = if self.json_format {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        match result {
            Ok(()) => {
                tracing::info!(level = %self.level, json = self.json_format, "日志系统初始化完成");
                true
            }
            Err(e) => {
                tracing::debug!("日志系统已初始化, 跳过: {}", e);
                false
            }
        }
    }
}
