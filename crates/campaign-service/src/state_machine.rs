//! 活动状态机
//!
//! | 起始状态 | 转换 | 目标状态 | 守卫 |
//! |---|---|---|---|
//! | draft/previewed/scheduled | edit | draft | - |
//! | draft/previewed/scheduled | preview | previewed | - |
//! | draft/previewed/scheduled | schedule | scheduled | 已预览 |
//! | draft/previewed/scheduled | execute | sending | 已预览 |
//! | sending | complete | sent | - |
//! | sending | fail | failed | - |
//! | draft/previewed/scheduled | cancel | cancelled | - |
//!
//! 守卫 `StatusGuard` 同时交给仓储层做比较并交换，
//! 保证检查与写入在存储端是一个原子步骤。

use chrono::{DateTime, Utc};

use crate::error::StateError;
use crate::models::{Campaign, CampaignStatus, DeliveryTally};

/// 状态守卫
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusGuard {
    pub action: &'static str,
    pub allowed: &'static [CampaignStatus],
    pub requires_preview: bool,
}

impl StatusGuard {
    pub fn admits(&self, status: CampaignStatus, preview_count: Option<u64>) -> bool {
        self.allowed.contains(&status) && (!self.requires_preview || preview_count.is_some())
    }

    /// 检查活动当前是否满足守卫，不满足时给出观察到的状态
    pub fn check(&self, campaign: &Campaign) -> Result<(), StateError> {
        if !self.allowed.contains(&campaign.status) {
            return Err(StateError::IllegalTransition {
                campaign_id: campaign.id,
                status: campaign.status,
                action: self.action,
            });
        }
        if self.requires_preview && campaign.preview_count.is_none() {
            return Err(StateError::PreviewRequired {
                campaign_id: campaign.id,
                action: self.action,
            });
        }
        Ok(())
    }

    pub fn allowed_names(&self) -> Vec<String> {
        self.allowed.iter().map(|s| s.as_str().to_string()).collect()
    }
}

const SENDING: &[CampaignStatus] = &[CampaignStatus::Sending];

/// 状态转换
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// 编辑活动内容，需要重新预览
    Edit,
    Preview { audience_count: u64 },
    Schedule { at: DateTime<Utc> },
    Execute,
    Complete { tally: DeliveryTally },
    Fail { error: String, partial: DeliveryTally },
    Cancel { reason: String },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Preview { .. } => "preview",
            Self::Schedule { .. } => "schedule",
            Self::Execute => "execute",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
            Self::Cancel { .. } => "cancel",
        }
    }

    pub fn target(&self) -> CampaignStatus {
        match self {
            Self::Edit => CampaignStatus::Draft,
            Self::Preview { .. } => CampaignStatus::Previewed,
            Self::Schedule { .. } => CampaignStatus::Scheduled,
            Self::Execute => CampaignStatus::Sending,
            Self::Complete { .. } => CampaignStatus::Sent,
            Self::Fail { .. } => CampaignStatus::Failed,
            Self::Cancel { .. } => CampaignStatus::Cancelled,
        }
    }

    pub fn guard(&self) -> StatusGuard {
        let (allowed, requires_preview) = match self {
            Self::Edit | Self::Preview { .. } | Self::Cancel { .. } => (CampaignStatus::EDITABLE, false),
            Self::Schedule { .. } | Self::Execute => (CampaignStatus::EDITABLE, true),
            Self::Complete { .. } | Self::Fail { .. } => (SENDING, false),
        };
        StatusGuard {
            action: self.name(),
            allowed,
            requires_preview,
        }
    }
}

impl Campaign {
    /// 应用状态转换
    ///
    /// 守卫不满足时活动保持不变。
    pub fn apply(&mut self, transition: Transition, now: DateTime<Utc>) -> Result<(), StateError> {
        transition.guard().check(self)?;
        let target = transition.target();

        match transition {
            Transition::Edit => {
                self.preview_count = None;
                self.scheduled_for = None;
            }
            Transition::Preview { audience_count } => {
                self.preview_count = Some(audience_count);
                self.scheduled_for = None;
            }
            Transition::Schedule { at } => self.scheduled_for = Some(at),
            Transition::Execute => {}
            Transition::Complete { tally } => {
                self.total_sent = tally.total_sent;
                self.total_failed = tally.total_failed;
                self.errors = tally.errors;
                self.sent_at = Some(now);
            }
            Transition::Fail { error, partial } => {
                self.total_sent = partial.total_sent;
                self.total_failed = partial.total_failed;
                self.errors = partial.errors;
                self.errors.push(error);
            }
            Transition::Cancel { reason } => {
                self.cancel_reason = Some(reason);
                self.cancelled_at = Some(now);
            }
        }

        self.status = target;
        self.revision += 1;
        self.updated_at = now;
        Ok(())
    }
}
