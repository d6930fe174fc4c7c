//! 分发请求、站内通知与分发报告

use campaign_shared::models::NotificationCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单个接收人的分发请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub recipient_id: String,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    /// 透传给客户端的附加数据（目标动作、活动 ID 等）
    pub payload: serde_json::Value,
}

/// 站内通知记录
///
/// 收件箱与审计的数据来源，无论推送是否成功都会保存。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InAppNotification {
    pub id: Uuid,
    pub recipient_id: String,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl InAppNotification {
    pub fn from_request(request: &DispatchRequest) -> Self {
        Self {
            id: Uuid::now_v7(),
            recipient_id: request.recipient_id.clone(),
            category: request.category,
            title: request.title.clone(),
            body: request.body.clone(),
            payload: request.payload.clone(),
            created_at: Utc::now(),
        }
    }
}

/// 跳过推送的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoActiveDevices,
    CategoryDisabled,
    PushDisabled,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoActiveDevices => "no_active_devices",
            Self::CategoryDisabled => "category_disabled",
            Self::PushDisabled => "push_disabled",
        }
    }
}

/// 分发报告
///
/// 分发器从不抛错，所有失败都记录在 `errors` 中。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub notification_saved: bool,
    pub push_sent: bool,
    /// 去重后的活跃设备数
    pub device_count: usize,
    pub skipped: Option<SkipReason>,
    /// 按服务商反馈被标记为不活跃的设备数
    pub invalidated_devices: usize,
    pub message_id: Option<String>,
    pub errors: Vec<String>,
}

impl DispatchReport {
    /// 站内通知已保存且没有任何错误
    pub fn is_clean(&self) -> bool {
        self.notification_saved && self.errors.is_empty()
    }

    /// 用于日志与指标的结果标签
    pub fn outcome(&self) -> &'static str {
        if !self.errors.is_empty() {
            "failed"
        } else if self.push_sent {
            "sent"
        } else if self.skipped.is_some() {
            "skipped"
        } else {
            "not_delivered"
        }
    }
}
