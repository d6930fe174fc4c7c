//! 活动领域事件与进程内事件总线
//!
//! 活动生命周期中的副作用（审计日志、运营看板等）通过显式事件对象传递，
//! 由订阅方自行消费。活动核心从不订阅与自身无关的领域事件。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// 活动领域事件
///
/// 每个事件都携带操作人，供外部审计日志持久化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CampaignEvent {
    Created {
        campaign_id: Uuid,
        actor: String,
        at: DateTime<Utc>,
    },
    Updated {
        campaign_id: Uuid,
        actor: String,
        at: DateTime<Utc>,
    },
    Previewed {
        campaign_id: Uuid,
        actor: String,
        audience_count: usize,
        at: DateTime<Utc>,
    },
    Scheduled {
        campaign_id: Uuid,
        actor: String,
        scheduled_for: DateTime<Utc>,
    },
    ExecutionStarted {
        campaign_id: Uuid,
        actor: String,
        audience_count: usize,
        at: DateTime<Utc>,
    },
    ExecutionCompleted {
        campaign_id: Uuid,
        total_sent: u64,
        total_failed: u64,
        at: DateTime<Utc>,
    },
    ExecutionFailed {
        campaign_id: Uuid,
        error: String,
        at: DateTime<Utc>,
    },
    Cancelled {
        campaign_id: Uuid,
        actor: String,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl CampaignEvent {
    pub fn campaign_id(&self) -> Uuid {
        match self {
            Self::Created { campaign_id, .. }
            | Self::Updated { campaign_id, .. }
            | Self::Previewed { campaign_id, .. }
            | Self::Scheduled { campaign_id, .. }
            | Self::ExecutionStarted { campaign_id, .. }
            | Self::ExecutionCompleted { campaign_id, .. }
            | Self::ExecutionFailed { campaign_id, .. }
            | Self::Cancelled { campaign_id, .. } => *campaign_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Previewed { .. } => "previewed",
            Self::Scheduled { .. } => "scheduled",
            Self::ExecutionStarted { .. } => "execution_started",
            Self::ExecutionCompleted { .. } => "execution_completed",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// 进程内事件总线
///
/// 基于 `tokio::sync::broadcast`，没有订阅者时发布的事件直接丢弃，
/// 慢订阅者会收到 `Lagged` 并跳过积压的事件。
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CampaignEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CampaignEvent> {
        self.sender.subscribe()
    }

    /// 发布事件，返回收到事件的订阅者数量
    pub fn publish(&self, event: CampaignEvent) -> usize {
        let kind = event.kind();
        let campaign_id = event.campaign_id();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(%campaign_id, kind, "没有订阅者，事件已丢弃");
                0
            }
        }
    }
}
