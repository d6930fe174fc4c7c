//! 统一可观测性模块
//!
//! 提供 logging 与 metrics 的统一初始化。
//! 所有组件通过单一入口点配置可观测性，确保一致的日志格式和指标命名。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

use crate::config::ObservabilityConfig;

/// 统一初始化可观测性
///
/// 指标通过 `metrics` facade 记录，由宿主进程决定安装哪个 recorder；
/// 未安装 recorder 时记录调用是空操作。
///
/// # Example
///
/// ```ignore
/// use campaign_shared::config::AppConfig;
/// use campaign_shared::observability;
///
/// let config = AppConfig::load("campaign-service")?;
/// observability::init(&config.service_name, &config.observability)?;
/// ```
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<()> {
    tracing::init(config)?;

    if config.metrics_enabled {
        metrics::describe();
    }

    info!(
        service = %service_name,
        log_level = %config.log_level,
        log_format = %config.log_format,
        metrics_enabled = config.metrics_enabled,
        "Observability initialized"
    );

    Ok(())
}
