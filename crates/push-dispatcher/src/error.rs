//! 推送分发错误类型
//!
//! 这些错误只在分发器内部流转，最终被折叠进 `DispatchReport.errors`，
//! 不会抛给调用方。

use campaign_shared::error::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("推送服务商调用失败: {reason}")]
    ProviderFailed { reason: String },

    #[error("推送服务商调用超时: {timeout_ms}ms")]
    ProviderTimeout { timeout_ms: u64 },

    #[error("设备查询失败: {0}")]
    Registry(#[source] StoreError),

    #[error("通知偏好查询失败: {0}")]
    Preferences(#[source] StoreError),

    #[error("站内通知保存失败: {0}")]
    Sink(#[source] StoreError),
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderFailed { .. } => "PROVIDER_FAILED",
            Self::ProviderTimeout { .. } => "PROVIDER_TIMEOUT",
            Self::Registry(_) => "DEVICE_REGISTRY_ERROR",
            Self::Preferences(_) => "PREFERENCE_STORE_ERROR",
            Self::Sink(_) => "NOTIFICATION_SINK_ERROR",
        }
    }
}
