//! # Configuration Implementation
//!
//! 配置实现层，提供内存配置存储、运行时设置来源和设置管理器。

pub mod manager;
pub mod providers;
pub mod store;

pub use manager::*;
pub use providers::*;
pub use store::*;
