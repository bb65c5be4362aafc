//! 运行时设置来源抽象接口

use async_trait::async_trait;
use scr_common::{ConfigResult, Properties};

/// 设置来源 trait
///
/// 定义从不同数据源读取运行时设置的统一接口
#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// 读取设置，返回扁平的键值映射
    async fn load(&self) -> ConfigResult<Properties>;

    /// 获取来源名称
    fn name(&self) -> &str;

    /// 获取来源优先级，优先级高的来源后应用
    fn priority(&self) -> i32 {
        0
    }
}
