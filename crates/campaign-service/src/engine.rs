//! 活动执行引擎
//!
//! 对处于 `sending` 状态的活动：
//! 1. 按当前目录重新解析受众（不复用预览结果）
//! 2. 渲染一次模板，失败则整个执行中止
//! 3. 按固定批次顺序处理，批内有界并发，每个接收人独立
//! 4. 每个接收人恰好写入一条执行记录，单个接收人的失败只计数不中止
//!
//! 写执行记录失败属于引擎级故障：停止后续批次，已写入的记录保留。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use campaign_shared::config::CampaignConfig;
use campaign_shared::error::StoreError;
use campaign_shared::observability::metrics;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use push_dispatcher::{DispatchReport, DispatchRequest, Dispatcher};
use rule_engine::{AudienceDirectory, AudienceEngine, AudienceResult};
use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{CampaignError, Result};
use crate::models::{Campaign, DeliveryTally, ExecutionRecord};
use crate::repository::ExecutionRecordRepository;
use crate::template::{RenderedNotification, TemplateRenderer};

/// 引擎级故障，携带故障发生前已完成的计数
#[derive(Debug)]
pub struct EngineFault {
    pub partial: DeliveryTally,
    pub error: CampaignError,
}

/// 并发安全的投递计数
struct Tally {
    sent: AtomicU64,
    failed: AtomicU64,
    errors: Mutex<Vec<String>>,
    error_limit: usize,
}

impl Tally {
    fn new(error_limit: usize) -> Self {
        Self {
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            errors: Mutex::new(Vec::new()),
            error_limit,
        }
    }

    fn record_success(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self, recipient_id: &str, reason: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        let mut errors = self.errors.lock();
        if errors.len() < self.error_limit {
            errors.push(format!("{recipient_id}: {reason}"));
        }
    }

    fn snapshot(&self) -> DeliveryTally {
        DeliveryTally {
            total_sent: self.sent.load(Ordering::Relaxed),
            total_failed: self.failed.load(Ordering::Relaxed),
            errors: self.errors.lock().clone(),
        }
    }
}

fn failure_reason(report: &DispatchReport) -> String {
    if report.errors.is_empty() {
        "站内通知未保存".to_string()
    } else {
        report.errors.join("; ")
    }
}

/// 执行引擎
pub struct ExecutionEngine {
    directory: Arc<dyn AudienceDirectory>,
    audience: AudienceEngine,
    dispatcher: Arc<dyn Dispatcher>,
    records: Arc<dyn ExecutionRecordRepository>,
    renderer: TemplateRenderer,
    config: CampaignConfig,
}

impl ExecutionEngine {
    pub fn new(
        directory: Arc<dyn AudienceDirectory>,
        dispatcher: Arc<dyn Dispatcher>,
        records: Arc<dyn ExecutionRecordRepository>,
        config: CampaignConfig,
    ) -> Self {
        Self {
            directory,
            audience: AudienceEngine::new(config.preview_sample_size),
            dispatcher,
            records,
            renderer: TemplateRenderer,
            config,
        }
    }

    /// 按当前目录解析活动受众
    pub async fn resolve_audience(&self, campaign: &Campaign) -> Result<AudienceResult> {
        Ok(self
            .audience
            .evaluate(&campaign.audience, self.directory.as_ref())
            .await?)
    }

    /// 向给定接收人投递活动
    pub async fn run(
        &self,
        campaign: &Campaign,
        recipient_ids: &[String],
    ) -> std::result::Result<DeliveryTally, EngineFault> {
        let rendered = self
            .renderer
            .render(&campaign.template, &campaign.variables)
            .map_err(|e| EngineFault {
                partial: DeliveryTally::default(),
                error: e.into(),
            })?;

        let payload = json!({
            "campaign_id": campaign.id,
            "template": campaign.template.key,
            "template_version": campaign.template.version,
            "target_action": rendered.target_action,
        });

        let tally = Tally::new(self.config.error_sample_limit);
        let batch_size = self.config.batch_size.max(1);
        let concurrency = self.config.max_concurrency.max(1);
        let batches = recipient_ids.len().div_ceil(batch_size);

        for (index, batch) in recipient_ids.chunks(batch_size).enumerate() {
            let deliveries: Vec<_> = batch
                .iter()
                .map(|recipient_id| {
                    self.deliver(campaign.id, recipient_id, &rendered, &payload, &tally)
                })
                .collect();
            let results: Vec<std::result::Result<(), StoreError>> = stream::iter(deliveries)
                .buffer_unordered(concurrency)
                .collect()
                .await;

            if let Some(err) = results.into_iter().find_map(|r| r.err()) {
                let partial = tally.snapshot();
                error!(
                    campaign_id = %campaign.id,
                    batch = index + 1,
                    processed = partial.processed(),
                    error = %err,
                    "写入执行记录失败，停止后续批次"
                );
                return Err(EngineFault {
                    partial,
                    error: CampaignError::Engine(err.to_string()),
                });
            }

            debug!(
                campaign_id = %campaign.id,
                batch = index + 1,
                batches,
                size = batch.len(),
                "批次处理完成"
            );
        }

        let result = tally.snapshot();
        info!(
            campaign_id = %campaign.id,
            total_sent = result.total_sent,
            total_failed = result.total_failed,
            "活动投递完成"
        );
        Ok(result)
    }

    /// 投递单个接收人并写入执行记录
    ///
    /// 分发在独立任务中运行，分发过程中的 panic 记为该接收人的失败。
    async fn deliver(
        &self,
        campaign_id: Uuid,
        recipient_id: &str,
        rendered: &RenderedNotification,
        payload: &serde_json::Value,
        tally: &Tally,
    ) -> std::result::Result<(), StoreError> {
        let request = DispatchRequest {
            recipient_id: recipient_id.to_string(),
            category: rendered.category,
            title: rendered.title.clone(),
            body: rendered.body.clone(),
            payload: payload.clone(),
        };
        let dispatcher = Arc::clone(&self.dispatcher);
        let outcome = match tokio::spawn(async move { dispatcher.dispatch(&request).await }).await {
            Ok(report) if report.is_clean() => Ok(()),
            Ok(report) => Err(failure_reason(&report)),
            Err(e) => Err(format!("投递任务异常终止: {e}")),
        };

        let record = match &outcome {
            Ok(()) => ExecutionRecord::delivered(campaign_id, recipient_id),
            Err(reason) => ExecutionRecord::failed(campaign_id, recipient_id, reason.as_str()),
        };
        self.records.append(&record).await?;

        match outcome {
            Ok(()) => tally.record_success(),
            Err(reason) => {
                debug!(%campaign_id, recipient_id, reason = %reason, "接收人投递失败");
                tally.record_failure(recipient_id, &reason);
            }
        }
        metrics::record_delivery(record.success);
        Ok(())
    }
}
