//! 运行时设置管理器

use config_abstractions::{RuntimeSettings, SettingsSource};
use scr_common::ConfigResult;
use tracing::{debug, info};

/// 运行时设置管理器
///
/// 按优先级从低到高加载各来源，交给纯函数 [`RuntimeSettings::resolve`] 合并。
#[derive(Default)]
pub struct SettingsManager {
    sources: Vec<Box<dyn SettingsSource>>,
}

impl std::fmt::Debug for SettingsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsManager")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl SettingsManager {
    /// 创建新的设置管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加设置来源
    pub fn add_source(&mut self, source: Box<dyn SettingsSource>) {
        info!("注册设置来源: {} (优先级 {})", source.name(), source.priority());
        self.sources.push(source);
        // 稳定排序，同优先级保持注册顺序
        self.sources.sort_by_key(|s| s.priority());
    }

    /// 以构建器方式添加设置来源
    pub fn with_source(mut self, source: impl SettingsSource + 'static) -> Self {
        self.add_source(Box::new(source));
        self
    }

    /// 来源数量
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// 加载全部来源并解析运行时设置
    pub async fn resolve(&self) -> ConfigResult<RuntimeSettings> {
        let mut layers = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let layer = source.load().await?;
            debug!("设置来源 {} 提供 {} 项", source.name(), layer.len());
            layers.push(layer);
        }

        let settings = RuntimeSettings::resolve(&layers)?;
        info!(
            lock_timeout_ms = settings.lock_timeout_ms,
            dispatch_concurrency = settings.dispatch_concurrency,
            "运行时设置解析完成"
        );
        Ok(settings)
    }
}
