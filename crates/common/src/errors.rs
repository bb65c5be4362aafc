//! 错误类型定义

use thiserror::Error;

/// 用户回调（构造、激活、绑定等）返回的错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 描述符验证错误
///
/// 验证失败只对所属描述符致命，该描述符永远不会被激活。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("组件名称缺失")]
    MissingComponentName,

    #[error("组件 {component} 未声明实现标识")]
    MissingImplementation { component: String },

    #[error("组件 {component} 的实现未注册: {implementation}")]
    UnknownImplementation {
        component: String,
        implementation: String,
    },

    #[error("组件 {component} 使用了未知的元数据版本: {value}")]
    UnknownSpecVersion { component: String, value: String },

    #[error("组件 {component} 的配置策略无效: {value}")]
    InvalidConfigurationPolicy { component: String, value: String },

    #[error("工厂组件 {component} 不能忽略配置")]
    FactoryIgnoresConfiguration { component: String },

    #[error("组件 {component} 的引用名称重复: {reference}")]
    DuplicateReference { component: String, reference: String },

    #[error("组件 {component} 的引用必须声明名称")]
    MissingReferenceName { component: String },

    #[error("组件 {component} 的引用 {reference} 必须声明能力类型")]
    MissingCapabilityType { component: String, reference: String },

    #[error("组件 {component} 的引用 {reference} 基数无效: {value}")]
    InvalidCardinality {
        component: String,
        reference: String,
        value: String,
    },

    #[error("组件 {component} 的引用 {reference} 策略无效: {value}")]
    InvalidPolicy {
        component: String,
        reference: String,
        value: String,
    },

    #[error("组件 {component} 的引用 {reference} 策略选项无效: {value}")]
    InvalidPolicyOption {
        component: String,
        reference: String,
        value: String,
    },

    #[error("组件 {component} 的引用 {reference} 不允许 static 与 greedy 组合")]
    StaticGreedyReference { component: String, reference: String },

    #[error("组件 {component} 的引用 {reference} 字段策略无效: {value}")]
    InvalidFieldStrategy {
        component: String,
        reference: String,
        value: String,
    },

    #[error("组件 {component} 的单值引用 {reference} 不允许使用 update 字段策略")]
    FieldUpdateOnUnary { component: String, reference: String },

    #[error("组件 {component} 的引用 {reference} 字段值类型无效: {value}")]
    InvalidFieldValueType {
        component: String,
        reference: String,
        value: String,
    },

    #[error("组件 {component} 的引用 {reference} 参数索引无效: {value}, 原因: {reason}")]
    InvalidParameter {
        component: String,
        reference: String,
        value: String,
        reason: String,
    },

    #[error("组件 {component} 的 {feature} 需要元数据版本 {required} 或更高, 实际: {actual}")]
    UnsupportedBySpecVersion {
        component: String,
        feature: String,
        required: String,
        actual: String,
    },

    #[error("组件 {component} 的实现 {implementation} 未声明回调: {callback}")]
    UnresolvedCallback {
        component: String,
        implementation: String,
        callback: String,
    },
}

impl ValidationError {
    /// 出错组件的名称（组件名缺失时为空）
    pub fn component(&self) -> &str {
        match self {
            Self::MissingComponentName => "",
            Self::MissingImplementation { component }
            | Self::UnknownImplementation { component, .. }
            | Self::UnknownSpecVersion { component, .. }
            | Self::InvalidConfigurationPolicy { component, .. }
            | Self::FactoryIgnoresConfiguration { component }
            | Self::DuplicateReference { component, .. }
            | Self::MissingReferenceName { component }
            | Self::MissingCapabilityType { component, .. }
            | Self::InvalidCardinality { component, .. }
            | Self::InvalidPolicy { component, .. }
            | Self::InvalidPolicyOption { component, .. }
            | Self::StaticGreedyReference { component, .. }
            | Self::InvalidFieldStrategy { component, .. }
            | Self::FieldUpdateOnUnary { component, .. }
            | Self::InvalidFieldValueType { component, .. }
            | Self::InvalidParameter { component, .. }
            | Self::UnsupportedBySpecVersion { component, .. }
            | Self::UnresolvedCallback { component, .. } => component,
        }
    }
}

/// 组件生命周期错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("组件激活失败: {component}, 原因: {message}")]
    ActivationFailure { component: String, message: String },

    #[error("获取组件锁超时（疑似死锁）: {component}, 等待 {waited_ms}ms")]
    LockTimeout { component: String, waited_ms: u64 },

    #[error("引用绑定失败: {component}.{reference}, 能力 {capability}, 原因: {message}")]
    BindFailure {
        component: String,
        reference: String,
        capability: u64,
        message: String,
    },

    #[error("组件已释放: {component}")]
    Disposed { component: String },
}

impl LifecycleError {
    /// 创建激活失败错误
    pub fn activation_failure(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActivationFailure {
            component: component.into(),
            message: message.into(),
        }
    }

    /// 是否为锁超时
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// 能力注册表错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("能力不存在: {id}")]
    UnknownCapability { id: u64 },

    #[error("发布能力时必须至少声明一个能力类型")]
    MissingCapabilityTypes,
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置项取值无效: {key}, 原因: {message}")]
    InvalidValue { key: String, message: String },

    #[error("配置不存在: {pid}")]
    UnknownConfiguration { pid: String },
}

impl ConfigError {
    /// 创建取值无效错误
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// 运行时错误类型
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("描述符验证错误: {source}")]
    Validation {
        #[from]
        source: ValidationError,
    },

    #[error("生命周期错误: {source}")]
    Lifecycle {
        #[from]
        source: LifecycleError,
    },

    #[error("注册表错误: {source}")]
    Registry {
        #[from]
        source: RegistryError,
    },

    #[error("配置错误: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("组件不存在: {name}")]
    ComponentNotFound { name: String },

    #[error("组件已注册: {name}")]
    DuplicateComponent { name: String },

    #[error("运行时正在关闭")]
    ShuttingDown,

    #[error("运行时启动失败: {message}")]
    BootstrapFailed { message: String },
}

impl RuntimeError {
    /// 是否为锁超时
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::Lifecycle { source } if source.is_lock_timeout())
    }
}

/// 结果类型别名
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type LifecycleResult<T> = Result<T, LifecycleError>;
pub type RegistryResult<T> = Result<T, RegistryError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
