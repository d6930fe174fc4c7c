//! PostgreSQL 仓储
//!
//! 状态的比较并交换通过带条件的 `UPDATE ... WHERE status = ANY($2) AND revision = $19` 实现，
//! 由数据库保证多实例部署下同一守卫至多被通过一次。表结构见 `migrations/`。

use async_trait::async_trait;
use campaign_shared::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::debug;
use uuid::Uuid;

use super::{CampaignRepository, ExecutionRecordRepository, SwapOutcome};
use crate::models::{Campaign, CampaignStatus, ExecutionRecord, Variables};
use crate::state_machine::StatusGuard;
use crate::template::Template;
use rule_engine::AudienceRule;

const CAMPAIGN_COLUMNS: &str = r#"
    id, name, audience, template, variables, status, preview_count, scheduled_for,
    sent_at, cancelled_at, cancel_reason, total_sent, total_failed, errors,
    revision, created_by, created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    name: String,
    audience: Json<AudienceRule>,
    template: Json<Template>,
    variables: Json<Variables>,
    status: String,
    preview_count: Option<i64>,
    scheduled_for: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    total_sent: i64,
    total_failed: i64,
    errors: Json<Vec<String>>,
    revision: i64,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = StoreError;

    fn try_from(row: CampaignRow) -> Result<Self> {
        let status = row.status.parse::<CampaignStatus>().map_err(StoreError::Internal)?;
        Ok(Self {
            id: row.id,
            name: row.name,
            audience: row.audience.0,
            template: row.template.0,
            variables: row.variables.0,
            status,
            preview_count: row.preview_count.map(|c| c as u64),
            scheduled_for: row.scheduled_for,
            sent_at: row.sent_at,
            cancelled_at: row.cancelled_at,
            cancel_reason: row.cancel_reason,
            total_sent: row.total_sent as u64,
            total_failed: row.total_failed as u64,
            errors: row.errors.0,
            revision: row.revision as u64,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 活动仓储（PostgreSQL）
#[derive(Debug, Clone)]
pub struct PgCampaignRepository {
    pool: PgPool,
}

impl PgCampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for PgCampaignRepository {
    async fn insert(&self, campaign: &Campaign) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO campaigns (id, name, audience, template, variables, status, preview_count,
                                   scheduled_for, sent_at, cancelled_at, cancel_reason, total_sent,
                                   total_failed, errors, revision, created_by, created_at,
                                   updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(campaign.id)
        .bind(&campaign.name)
        .bind(Json(&campaign.audience))
        .bind(Json(&campaign.template))
        .bind(Json(&campaign.variables))
        .bind(campaign.status.as_str())
        .bind(campaign.preview_count.map(|c| c as i64))
        .bind(campaign.scheduled_for)
        .bind(campaign.sent_at)
        .bind(campaign.cancelled_at)
        .bind(&campaign.cancel_reason)
        .bind(campaign.total_sent as i64)
        .bind(campaign.total_failed as i64)
        .bind(Json(&campaign.errors))
        .bind(campaign.revision as i64)
        .bind(&campaign.created_by)
        .bind(campaign.created_at)
        .bind(campaign.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                entity: "campaign".into(),
                id: campaign.id.to_string(),
            });
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Campaign>> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Campaign::try_from).transpose()
    }

    async fn list_by_status(&self, status: CampaignStatus) -> Result<Vec<Campaign>> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE status = $1 ORDER BY created_at ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Campaign::try_from).collect()
    }

    async fn compare_and_swap(
        &self,
        guard: &StatusGuard,
        expected_revision: u64,
        next: &Campaign,
    ) -> Result<SwapOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET name = $3, audience = $4, template = $5, variables = $6, status = $7,
                preview_count = $8, scheduled_for = $9, sent_at = $10, cancelled_at = $11,
                cancel_reason = $12, total_sent = $13, total_failed = $14, errors = $15,
                updated_at = $16, revision = $18
            WHERE id = $1
              AND status = ANY($2)
              AND (NOT $17 OR preview_count IS NOT NULL)
              AND revision = $19
            "#,
        )
        .bind(next.id)
        .bind(guard.allowed_names())
        .bind(&next.name)
        .bind(Json(&next.audience))
        .bind(Json(&next.template))
        .bind(Json(&next.variables))
        .bind(next.status.as_str())
        .bind(next.preview_count.map(|c| c as i64))
        .bind(next.scheduled_for)
        .bind(next.sent_at)
        .bind(next.cancelled_at)
        .bind(&next.cancel_reason)
        .bind(next.total_sent as i64)
        .bind(next.total_failed as i64)
        .bind(Json(&next.errors))
        .bind(next.updated_at)
        .bind(guard.requires_preview)
        .bind(next.revision as i64)
        .bind(expected_revision as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(SwapOutcome::Swapped);
        }

        debug!(
            campaign_id = %next.id,
            action = guard.action,
            expected_revision,
            "状态守卫或版本号未通过"
        );
        Ok(match self.get(next.id).await? {
            Some(current) => SwapOutcome::Conflict(Box::new(current)),
            None => SwapOutcome::Missing,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ExecutionRecordRow {
    id: Uuid,
    campaign_id: Uuid,
    recipient_id: String,
    success: bool,
    error: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ExecutionRecordRow> for ExecutionRecord {
    fn from(row: ExecutionRecordRow) -> Self {
        Self {
            id: row.id,
            campaign_id: row.campaign_id,
            recipient_id: row.recipient_id,
            success: row.success,
            error: row.error,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
        }
    }
}

/// 执行记录仓储（PostgreSQL）
#[derive(Debug, Clone)]
pub struct PgExecutionRecordRepository {
    pool: PgPool,
}

impl PgExecutionRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionRecordRepository for PgExecutionRecordRepository {
    async fn append(&self, record: &ExecutionRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO execution_records (id, campaign_id, recipient_id, success, error, delivered_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (campaign_id, recipient_id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.campaign_id)
        .bind(&record.recipient_id)
        .bind(record.success)
        .bind(&record.error)
        .bind(record.delivered_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                entity: "execution_record".into(),
                id: format!("{}/{}", record.campaign_id, record.recipient_id),
            });
        }
        Ok(())
    }

    async fn list(&self, campaign_id: Uuid) -> Result<Vec<ExecutionRecord>> {
        let rows = sqlx::query_as::<_, ExecutionRecordRow>(
            r#"
            SELECT id, campaign_id, recipient_id, success, error, delivered_at, created_at
            FROM execution_records
            WHERE campaign_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ExecutionRecord::from).collect())
    }

    async fn count(&self, campaign_id: Uuid) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM execution_records WHERE campaign_id = $1")
                .bind(campaign_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}
