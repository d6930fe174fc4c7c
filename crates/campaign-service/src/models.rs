//! 活动领域模型

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rule_engine::{AudienceResult, AudienceRule, AudienceRuleSpec};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::template::{RenderedNotification, Template, TemplateKey};

/// 模板变量，按变量名排序
pub type Variables = BTreeMap<String, String>;

/// 活动状态
///
/// `sent`、`cancelled`、`failed` 为终态；`sending` 期间只允许更新聚合结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Previewed,
    Scheduled,
    Sending,
    Sent,
    Cancelled,
    Failed,
}

impl CampaignStatus {
    pub const EDITABLE: &'static [CampaignStatus] = &[Self::Draft, Self::Previewed, Self::Scheduled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Previewed => "previewed",
            Self::Scheduled => "scheduled",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Cancelled | Self::Failed)
    }

    pub fn is_editable(&self) -> bool {
        Self::EDITABLE.contains(self)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "previewed" => Ok(Self::Previewed),
            "scheduled" => Ok(Self::Scheduled),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(format!("未知的活动状态: {other}")),
        }
    }
}

/// 推送活动
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub audience: AudienceRule,
    /// 创建时冻结的模板版本
    pub template: Template,
    pub variables: Variables,
    pub status: CampaignStatus,
    /// 仅由成功的预览写入，编辑后清空
    pub preview_count: Option<u64>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub total_sent: u64,
    pub total_failed: u64,
    /// 有界错误样本
    pub errors: Vec<String>,
    /// 每次状态转换加一，比较并交换时与存储中的值比对
    #[serde(default)]
    pub revision: u64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// 创建草稿活动
    pub fn draft(
        name: impl Into<String>,
        audience: AudienceRule,
        template: Template,
        variables: Variables,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            audience,
            template,
            variables,
            status: CampaignStatus::Draft,
            preview_count: None,
            scheduled_for: None,
            sent_at: None,
            cancelled_at: None,
            cancel_reason: None,
            total_sent: 0,
            total_failed: 0,
            errors: Vec::new(),
            revision: 0,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_previewed(&self) -> bool {
        self.preview_count.is_some()
    }
}

/// 单个接收人的执行记录，只追加不修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub recipient_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn delivered(campaign_id: Uuid, recipient_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            campaign_id,
            recipient_id: recipient_id.into(),
            success: true,
            error: None,
            delivered_at: Some(now),
            created_at: now,
        }
    }

    pub fn failed(campaign_id: Uuid, recipient_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            campaign_id,
            recipient_id: recipient_id.into(),
            success: false,
            error: Some(error.into()),
            delivered_at: None,
            created_at: Utc::now(),
        }
    }
}

/// 创建活动请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    pub audience: AudienceRuleSpec,
    pub template_key: TemplateKey,
    /// 为空时使用最新发布的版本
    #[serde(default)]
    pub template_version: Option<u32>,
    #[serde(default)]
    pub variables: Variables,
}

/// 编辑活动请求，未提供的字段保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub audience: Option<AudienceRuleSpec>,
    pub variables: Option<Variables>,
}

impl CampaignUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.audience.is_none() && self.variables.is_none()
    }
}

/// 投递计数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTally {
    pub total_sent: u64,
    pub total_failed: u64,
    /// 最先记录的若干条错误
    pub errors: Vec<String>,
}

impl DeliveryTally {
    pub fn processed(&self) -> u64 {
        self.total_sent + self.total_failed
    }
}

/// 活动预览结果
#[derive(Debug, Clone, Serialize)]
pub struct CampaignPreview {
    pub campaign: Campaign,
    pub audience: AudienceResult,
    pub rendered: RenderedNotification,
}

/// 活动执行汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSummary {
    pub campaign_id: Uuid,
    pub status: CampaignStatus,
    pub audience_count: usize,
    pub total_sent: u64,
    pub total_failed: u64,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
