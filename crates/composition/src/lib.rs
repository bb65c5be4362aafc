//! # 运行时组合层
//!
//! 将设置来源、能力注册表、配置存储、实现目录和日志组合成一个可运行的组件运行时。
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use runtime_composition::{LoggingConfig, RuntimeBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let composed = RuntimeBuilder::new()
//!         .with_logging(LoggingConfig::development())
//!         .add_settings_env("SCR")
//!         .build()
//!         .await?;
//!
//!     for snapshot in composed.runtime.describe_all() {
//!         println!("{} {}", snapshot.name, snapshot.state);
//!     }
//!
//!     composed.runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod logging;

pub use builder::{ComposedRuntime, RuntimeBuilder};
pub use logging::LoggingConfig;
