//! 活动服务
//!
//! 管理端操作的入口：创建、编辑、预览、定时、执行、取消。
//! 所有状态变更都经由仓储的比较并交换提交，并发的同类操作至多一个成功。

use std::sync::Arc;
use std::time::Instant;

use campaign_shared::config::CampaignConfig;
use campaign_shared::events::{CampaignEvent, EventBus};
use campaign_shared::observability::metrics;
use chrono::{DateTime, Utc};
use push_dispatcher::Dispatcher;
use rule_engine::{AudienceDirectory, AudienceEngine};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::engine::ExecutionEngine;
use crate::error::{CampaignError, Result, StateError, ValidationError};
use crate::models::{
    Campaign, CampaignPreview, CampaignStatus, CampaignUpdate, DeliveryTally, ExecutionRecord,
    ExecutionSummary, NewCampaign,
};
use crate::repository::{CampaignRepository, ExecutionRecordRepository, SwapOutcome};
use crate::state_machine::Transition;
use crate::template::{TemplateRenderer, TemplateStore};

fn validate_name(name: &str) -> std::result::Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "name",
            reason: "活动名称不能为空".into(),
        });
    }
    Ok(name.to_string())
}

/// 活动服务
pub struct CampaignService {
    campaigns: Arc<dyn CampaignRepository>,
    records: Arc<dyn ExecutionRecordRepository>,
    templates: Arc<dyn TemplateStore>,
    engine: ExecutionEngine,
    audience: AudienceEngine,
    renderer: TemplateRenderer,
    events: EventBus,
    config: CampaignConfig,
}

impl CampaignService {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        records: Arc<dyn ExecutionRecordRepository>,
        templates: Arc<dyn TemplateStore>,
        directory: Arc<dyn AudienceDirectory>,
        dispatcher: Arc<dyn Dispatcher>,
        config: CampaignConfig,
    ) -> Self {
        let engine = ExecutionEngine::new(directory, dispatcher, records.clone(), config.clone());
        Self {
            campaigns,
            records,
            templates,
            engine,
            audience: AudienceEngine::new(config.preview_sample_size),
            renderer: TemplateRenderer,
            events: EventBus::default(),
            config,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    async fn load(&self, id: Uuid) -> Result<Campaign> {
        self.campaigns
            .get(id)
            .await?
            .ok_or(CampaignError::NotFound(id))
    }

    /// 应用状态转换并以比较并交换提交
    ///
    /// 存储中的活动已不满足守卫时返回 `StateError`，其中带有观察到的状态。
    async fn commit(&self, mut next: Campaign, transition: Transition) -> Result<Campaign> {
        let guard = transition.guard();
        let expected_revision = next.revision;
        next.apply(transition, Utc::now())?;

        match self
            .campaigns
            .compare_and_swap(&guard, expected_revision, &next)
            .await?
        {
            SwapOutcome::Swapped => Ok(next),
            SwapOutcome::Conflict(current) => {
                warn!(
                    campaign_id = %current.id,
                    action = guard.action,
                    observed = %current.status,
                    expected_revision,
                    observed_revision = current.revision,
                    "活动已被并发修改，操作被拒绝"
                );
                let err = guard.check(&current).err().unwrap_or(StateError::ConcurrentModification {
                    campaign_id: current.id,
                    status: current.status,
                    action: guard.action,
                });
                Err(err.into())
            }
            SwapOutcome::Missing => Err(CampaignError::NotFound(next.id)),
        }
    }

    /// 创建活动
    ///
    /// 冻结引用的模板版本，校验受众规则与模板变量。
    #[instrument(skip(self, request), fields(template = %request.template_key))]
    pub async fn create_campaign(&self, request: NewCampaign, actor: &str) -> Result<Campaign> {
        let name = validate_name(&request.name)?;
        let audience = self.audience.validate(&request.audience)?;

        let key = request.template_key;
        let template = match request.template_version {
            Some(version) => self.templates.get(key, version).await?,
            None => self.templates.latest(key).await?,
        };
        self.renderer
            .check_variables(&template, &request.variables)
            .map_err(ValidationError::from)?;

        let campaign = Campaign::draft(name, audience, template, request.variables, actor);
        self.campaigns.insert(&campaign).await?;

        self.events.publish(CampaignEvent::Created {
            campaign_id: campaign.id,
            actor: actor.to_string(),
            at: campaign.created_at,
        });
        info!(
            campaign_id = %campaign.id,
            template_version = campaign.template.version,
            audience = %campaign.audience.describe(),
            "活动已创建"
        );
        Ok(campaign)
    }

    /// 编辑活动
    ///
    /// 仅 draft/previewed/scheduled 可编辑，编辑后回到 draft，需要重新预览。
    #[instrument(skip(self, update))]
    pub async fn update_campaign(
        &self,
        id: Uuid,
        update: CampaignUpdate,
        actor: &str,
    ) -> Result<Campaign> {
        let current = self.load(id).await?;
        Transition::Edit.guard().check(&current)?;
        if update.is_empty() {
            return Ok(current);
        }

        let mut next = current;
        if let Some(name) = update.name {
            next.name = validate_name(&name)?;
        }
        if let Some(spec) = update.audience {
            next.audience = self.audience.validate(&spec)?;
        }
        if let Some(variables) = update.variables {
            self.renderer
                .check_variables(&next.template, &variables)
                .map_err(ValidationError::from)?;
            next.variables = variables;
        }

        let updated = self.commit(next, Transition::Edit).await?;
        self.events.publish(CampaignEvent::Updated {
            campaign_id: id,
            actor: actor.to_string(),
            at: updated.updated_at,
        });
        info!(campaign_id = %id, "活动已更新，需要重新预览");
        Ok(updated)
    }

    /// 预览活动
    ///
    /// 渲染模板并按当前目录评估受众，成功后记录预览人数。对目录只读，可重复调用。
    #[instrument(skip(self))]
    pub async fn preview_campaign(&self, id: Uuid, actor: &str) -> Result<CampaignPreview> {
        let current = self.load(id).await?;
        Transition::Preview { audience_count: 0 }.guard().check(&current)?;

        let rendered = self.renderer.render(&current.template, &current.variables)?;
        let audience = self.engine.resolve_audience(&current).await?;

        let campaign = self
            .commit(
                current,
                Transition::Preview {
                    audience_count: audience.count as u64,
                },
            )
            .await?;

        self.events.publish(CampaignEvent::Previewed {
            campaign_id: id,
            actor: actor.to_string(),
            audience_count: audience.count,
            at: campaign.updated_at,
        });
        info!(
            campaign_id = %id,
            audience_count = audience.count,
            sample = ?audience.sample_ids,
            "活动预览完成"
        );

        Ok(CampaignPreview {
            campaign,
            audience,
            rendered,
        })
    }

    /// 标记定时发送
    ///
    /// 只记录计划时间，触发由外部调度器负责。
    #[instrument(skip(self))]
    pub async fn schedule_campaign(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        actor: &str,
    ) -> Result<Campaign> {
        if at <= Utc::now() {
            return Err(ValidationError::InvalidField {
                field: "scheduled_for",
                reason: "计划时间必须晚于当前时间".into(),
            }
            .into());
        }

        let current = self.load(id).await?;
        let campaign = self.commit(current, Transition::Schedule { at }).await?;

        self.events.publish(CampaignEvent::Scheduled {
            campaign_id: id,
            actor: actor.to_string(),
            scheduled_for: at,
        });
        info!(campaign_id = %id, scheduled_for = %at, "活动已定时");
        Ok(campaign)
    }

    /// 执行活动
    ///
    /// 受众解析与规模检查在状态切换之前完成，失败时活动保持原状态且不写任何执行记录。
    /// 切换到 sending 之后的故障会把活动标记为 failed 并保留已写入的记录。
    #[instrument(skip(self))]
    pub async fn execute_campaign(&self, id: Uuid, actor: &str) -> Result<ExecutionSummary> {
        let start = Instant::now();
        let started_at = Utc::now();

        let current = self.load(id).await?;
        Transition::Execute.guard().check(&current)?;

        let audience = self.engine.resolve_audience(&current).await?;
        if audience.count > self.config.max_audience_size {
            warn!(
                campaign_id = %id,
                audience_size = audience.count,
                max = self.config.max_audience_size,
                "受众超过单次执行上限，拒绝执行"
            );
            metrics::record_campaign_execution("rejected", start.elapsed().as_secs_f64());
            return Err(CampaignError::RateLimitExceeded {
                audience_size: audience.count,
                max: self.config.max_audience_size,
            });
        }

        let sending = self.commit(current, Transition::Execute).await?;
        self.events.publish(CampaignEvent::ExecutionStarted {
            campaign_id: id,
            actor: actor.to_string(),
            audience_count: audience.count,
            at: sending.updated_at,
        });
        info!(
            campaign_id = %id,
            audience_count = audience.count,
            batch_size = self.config.batch_size,
            max_concurrency = self.config.max_concurrency,
            "活动开始投递"
        );

        let tally = match self.engine.run(&sending, &audience.recipient_ids).await {
            Ok(tally) => tally,
            Err(fault) => return Err(self.fail_execution(sending, fault.error, fault.partial, start).await),
        };

        match self
            .commit(sending.clone(), Transition::Complete { tally: tally.clone() })
            .await
        {
            Ok(done) => {
                self.events.publish(CampaignEvent::ExecutionCompleted {
                    campaign_id: id,
                    total_sent: done.total_sent,
                    total_failed: done.total_failed,
                    at: done.updated_at,
                });
                metrics::record_campaign_execution(
                    CampaignStatus::Sent.as_str(),
                    start.elapsed().as_secs_f64(),
                );

                Ok(ExecutionSummary {
                    campaign_id: id,
                    status: done.status,
                    audience_count: audience.count,
                    total_sent: done.total_sent,
                    total_failed: done.total_failed,
                    errors: done.errors,
                    started_at,
                    finished_at: done.updated_at,
                })
            }
            Err(e) => {
                error!(campaign_id = %id, error = %e, "提交完成状态失败，改为标记失败");
                Err(self.fail_execution(sending, e, tally, start).await)
            }
        }
    }

    /// 把投递中的活动标记为失败并保留已完成的计数，返回导致失败的错误
    async fn fail_execution(
        &self,
        sending: Campaign,
        cause: CampaignError,
        partial: DeliveryTally,
        start: Instant,
    ) -> CampaignError {
        let campaign_id = sending.id;
        let message = cause.to_string();
        error!(%campaign_id, error = %message, "活动执行失败");

        if let Err(e) = self
            .commit(
                sending,
                Transition::Fail {
                    error: message.clone(),
                    partial,
                },
            )
            .await
        {
            error!(%campaign_id, error = %e, "标记活动失败状态时出错");
        }
        self.events.publish(CampaignEvent::ExecutionFailed {
            campaign_id,
            error: message,
            at: Utc::now(),
        });
        metrics::record_campaign_execution(
            CampaignStatus::Failed.as_str(),
            start.elapsed().as_secs_f64(),
        );
        cause
    }

    /// 取消活动，sending 及之后的状态不可取消
    #[instrument(skip(self))]
    pub async fn cancel_campaign(&self, id: Uuid, actor: &str, reason: &str) -> Result<Campaign> {
        let current = self.load(id).await?;
        let campaign = self
            .commit(
                current,
                Transition::Cancel {
                    reason: reason.to_string(),
                },
            )
            .await?;

        self.events.publish(CampaignEvent::Cancelled {
            campaign_id: id,
            actor: actor.to_string(),
            reason: reason.to_string(),
            at: campaign.updated_at,
        });
        info!(campaign_id = %id, reason, "活动已取消");
        Ok(campaign)
    }

    pub async fn get_campaign(&self, id: Uuid) -> Result<Campaign> {
        self.load(id).await
    }

    pub async fn list_campaigns(&self, status: CampaignStatus) -> Result<Vec<Campaign>> {
        Ok(self.campaigns.list_by_status(status).await?)
    }

    pub async fn list_execution_records(&self, id: Uuid) -> Result<Vec<ExecutionRecord>> {
        self.load(id).await?;
        Ok(self.records.list(id).await?)
    }

    pub async fn count_execution_records(&self, id: Uuid) -> Result<u64> {
        self.load(id).await?;
        Ok(self.records.count(id).await?)
    }
}
