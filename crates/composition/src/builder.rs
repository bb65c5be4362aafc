//! 组件运行时构建器

use crate::logging::LoggingConfig;
use component_runtime::{
    ComponentImplementation, ComponentMetadata, ComponentRuntime, ImplementationCatalog,
};
use config_abstractions::{ConfigurationStore, RuntimeSettings, SettingsSource};
use config_impl::{
    EnvironmentSettingsSource, FileSettingsSource, InMemoryConfigurationStore, MapSettingsSource,
    SettingsManager,
};
use registry_abstractions::CapabilityRegistry;
use registry_impl::InMemoryCapabilityRegistry;
use scr_common::{Properties, RuntimeError, RuntimeResult, ValidationError};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 构建结果
///
/// 运行时本身以及注册被拒绝的描述符。单个描述符验证失败不影响其余组件。
#[derive(Debug)]
pub struct ComposedRuntime {
    /// 已启动的组件运行时
    pub runtime: ComponentRuntime,
    /// 被拒绝的描述符及原因
    pub rejected: Vec<(String, RuntimeError)>,
}

/// 组件运行时构建器
///
/// 使用建造者模式组装设置来源、能力注册表、配置存储、实现目录和组件描述符。
pub struct RuntimeBuilder {
    settings_manager: SettingsManager,
    explicit_settings: Option<RuntimeSettings>,
    registry: Option<Arc<dyn CapabilityRegistry>>,
    store: Option<Arc<dyn ConfigurationStore>>,
    catalog: ImplementationCatalog,
    descriptors: Vec<ComponentMetadata>,
    logging: Option<LoggingConfig>,
}

impl RuntimeBuilder {
    /// 创建新的运行时构建器
    pub fn new() -> Self {
        Self {
            settings_manager: SettingsManager::new(),
            explicit_settings: None,
            registry: None,
            store: None,
            catalog: ImplementationCatalog::new(),
            descriptors: Vec::new(),
            logging: None,
        }
    }

    /// 添加设置文件（TOML / JSON / YAML）
    pub fn add_settings_file<P: AsRef<Path>>(mut self, path: P) -> RuntimeResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RuntimeError::BootstrapFailed {
                message: format!("设置文件不存在: {}", path.display()),
            });
        }
        info!("添加设置文件: {}", path.display());
        self.settings_manager
            .add_source(Box::new(FileSettingsSource::new(path)));
        Ok(self)
    }

    /// 添加可选的设置文件，文件不存在时忽略
    pub fn add_optional_settings_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.settings_manager
            .add_source(Box::new(FileSettingsSource::new(path).optional()));
        self
    }

    /// 添加环境变量设置来源
    pub fn add_settings_env(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        info!("添加环境变量设置来源, 前缀: {}", prefix);
        self.settings_manager
            .add_source(Box::new(EnvironmentSettingsSource::new(prefix)));
        self
    }

    /// 添加显式键值设置
    pub fn add_settings_map(mut self, name: impl Into<String>, values: Properties) -> Self {
        self.settings_manager
            .add_source(Box::new(MapSettingsSource::new(name, values)));
        self
    }

    /// 添加自定义设置来源
    pub fn add_settings_source<S: SettingsSource + 'static>(mut self, source: S) -> Self {
        self.settings_manager.add_source(Box::new(source));
        self
    }

    /// 直接指定运行时设置，忽略全部设置来源
    pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
        self.explicit_settings = Some(settings);
        self
    }

    /// 使用外部能力注册表，默认使用内存注册表
    pub fn with_registry(mut self, registry: Arc<dyn CapabilityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 使用外部配置存储，默认使用内存配置存储
    pub fn with_store(mut self, store: Arc<dyn ConfigurationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 注册组件实现
    pub fn register_implementation(mut self, implementation: ComponentImplementation) -> Self {
        debug!("注册组件实现: {}", implementation.identity());
        self.catalog.register(implementation);
        self
    }

    /// 添加组件描述符，构建时按添加顺序注册
    pub fn add_descriptor(mut self, metadata: ComponentMetadata) -> Self {
        self.descriptors.push(metadata);
        self
    }

    /// 从 JSON 加载组件描述符列表
    pub fn add_descriptors_json(mut self, json: &str) -> RuntimeResult<Self> {
        let descriptors: Vec<ComponentMetadata> =
            serde_json::from_str(json).map_err(|e| RuntimeError::BootstrapFailed {
                message: format!("组件描述符解析失败: {e}"),
            })?;
        info!("从 JSON 加载 {} 个组件描述符", descriptors.len());
        self.descriptors.extend(descriptors);
        Ok(self)
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// 开发环境：调试日志，读取可选的 `scr.dev.toml`
    pub fn auto_configure_development(self) -> Self {
        info!("自动配置开发环境");
        self.with_logging(LoggingConfig::development())
            .add_optional_settings_file("./scr.dev.toml")
            .add_settings_env(config_impl::DEFAULT_ENV_PREFIX)
    }

    /// 生产环境：JSON 日志，读取可选的 `scr.prod.toml`
    pub fn auto_configure_production(self) -> Self {
        info!("自动配置生产环境");
        self.with_logging(LoggingConfig::production())
            .add_optional_settings_file("./scr.prod.toml")
            .add_settings_env(config_impl::DEFAULT_ENV_PREFIX)
    }

    /// 构建并启动组件运行时，必须在 tokio 运行时内调用
    pub async fn build(self) -> RuntimeResult<ComposedRuntime> {
        if let Some(logging) = &self.logging {
            logging.init();
        }
        info!("开始构建组件运行时");

        let settings = match self.explicit_settings {
            Some(settings) => settings,
            None => self.settings_manager.resolve().await.map_err(|e| {
                error!("运行时设置解析失败: {}", e);
                RuntimeError::from(e)
            })?,
        };

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(InMemoryCapabilityRegistry::new()));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryConfigurationStore::new()));
        let runtime = ComponentRuntime::new(settings, registry, store, Arc::new(self.catalog))?;

        let mut rejected = Vec::new();
        for metadata in self.descriptors {
            let name = metadata
                .name
                .clone()
                .unwrap_or_else(|| ValidationError::MissingComponentName.to_string());
            if let Err(e) = runtime.register_descriptor(metadata) {
                error!(component = %name, "组件描述符注册失败: {}", e);
                rejected.push((name, e));
            }
        }

        info!(
            components = runtime.component_names().len(),
            rejected = rejected.len(),
            "组件运行时构建完成"
        );
        Ok(ComposedRuntime { runtime, rejected })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
