//! 推送服务商接口
//!
//! 通过 `PushProvider` trait 抽象唯一的网络边界。当前提供的实现为模拟发送
//! （仅记录日志），便于在无外部依赖的情况下验证分发流程。接入真实服务商时
//! 只需实现同一 trait。

use async_trait::async_trait;
use dashmap::DashSet;
use tracing::info;
use uuid::Uuid;

use crate::error::DispatchError;

/// 推送请求
#[derive(Debug, Clone, PartialEq)]
pub struct PushRequest {
    pub device_ids: Vec<String>,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// 服务商响应
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    /// 成功投递的设备数
    pub delivered: usize,
    /// 服务商返回的消息标识，用于追踪投递状态
    pub message_id: Option<String>,
    /// 服务商判定为失效的设备 ID
    pub invalid_device_ids: Vec<String>,
    pub errors: Vec<String>,
}

/// 推送服务商
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send(&self, request: &PushRequest) -> Result<ProviderResponse, DispatchError>;
}

/// 模拟推送服务商
///
/// 记录日志并返回成功。通过 `mark_invalid` 预置的设备 ID 会被报告为失效。
#[derive(Debug, Default)]
pub struct SimulatedPushProvider {
    invalid: DashSet<String>,
}

impl SimulatedPushProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_invalid(&self, device_id: impl Into<String>) {
        self.invalid.insert(device_id.into());
    }
}

#[async_trait]
impl PushProvider for SimulatedPushProvider {
    async fn send(&self, request: &PushRequest) -> Result<ProviderResponse, DispatchError> {
        let message_id = Uuid::now_v7().to_string();

        let (invalid, valid): (Vec<String>, Vec<String>) = request
            .device_ids
            .iter()
            .cloned()
            .partition(|id| self.invalid.contains(id));

        info!(
            channel = "APP_PUSH",
            message_id = %message_id,
            devices = valid.len(),
            invalid = invalid.len(),
            title = %request.title,
            "模拟发送 APP 推送通知"
        );

        Ok(ProviderResponse {
            delivered: valid.len(),
            message_id: Some(message_id),
            invalid_device_ids: invalid,
            errors: Vec::new(),
        })
    }
}
