//! # Capability Registry Implementation
//!
//! 内存能力注册表实现，供组合层和测试使用。

pub mod memory;

pub use memory::*;
