//! # Configuration Abstractions
//!
//! 配置抽象层，定义配置存储协作方接口以及运行时自身的设置模型。
//!
//! ## 核心接口
//!
//! - [`ConfigurationStore`] - 按配置标识或工厂标识订阅配置变更
//! - [`ConfigurationEvent`] - 配置更新与删除事件，携带变更计数
//! - [`RuntimeSettings`] - 运行时设置及其纯函数分层解析
//! - [`SettingsSource`] - 运行时设置来源

pub mod events;
pub mod settings;
pub mod source;
pub mod store;

pub use events::*;
pub use settings::*;
pub use source::*;
pub use store::*;
