//! 推送分发器
//!
//! 把一个接收人解析成设备列表，调用推送服务商，并保存站内通知。
//! 分发器从不抛错：设备查询、偏好查询、服务商调用、通知保存的失败
//! 都被收集到 `DispatchReport.errors`，由调用方决定如何计数。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campaign_shared::config::DispatchConfig;
use campaign_shared::observability::metrics;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::models::{DispatchReport, DispatchRequest, InAppNotification, SkipReason};
use crate::provider::{PushProvider, PushRequest};
use crate::stores::{DeviceRegistry, NotificationSink, PreferenceStore};

/// 分发器接口
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: &DispatchRequest) -> DispatchReport;
}

/// 设备 ID 去重，保持首次出现的顺序
pub fn dedup_preserving_order<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// 推送分发器
pub struct PushDispatcher {
    registry: Arc<dyn DeviceRegistry>,
    preferences: Arc<dyn PreferenceStore>,
    sink: Arc<dyn NotificationSink>,
    provider: Arc<dyn PushProvider>,
    config: DispatchConfig,
}

impl PushDispatcher {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        preferences: Arc<dyn PreferenceStore>,
        sink: Arc<dyn NotificationSink>,
        provider: Arc<dyn PushProvider>,
    ) -> Self {
        Self {
            registry,
            preferences,
            sink,
            provider,
            config: DispatchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// 解析活跃设备并去重，失败时记为错误并按无设备处理
    async fn resolve_devices(&self, recipient_id: &str, report: &mut DispatchReport) -> Vec<String> {
        match self.registry.active_devices(recipient_id).await {
            Ok(devices) => dedup_preserving_order(devices.into_iter().map(|d| d.id)),
            Err(e) => {
                report.errors.push(DispatchError::Registry(e).to_string());
                Vec::new()
            }
        }
    }

    /// 查询类别偏好，失败时不推送
    async fn category_enabled(&self, request: &DispatchRequest, report: &mut DispatchReport) -> bool {
        match self
            .preferences
            .is_category_enabled(&request.recipient_id, request.category)
            .await
        {
            Ok(enabled) => enabled,
            Err(e) => {
                report.errors.push(DispatchError::Preferences(e).to_string());
                false
            }
        }
    }

    async fn push(&self, request: &DispatchRequest, device_ids: Vec<String>, report: &mut DispatchReport) {
        let push_request = PushRequest {
            device_ids,
            title: request.title.clone(),
            body: request.body.clone(),
            data: request.payload.clone(),
        };

        let timeout_ms = self.config.provider_timeout_ms;
        let response = match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.provider.send(&push_request),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                report.errors.push(e.to_string());
                return;
            }
            Err(_) => {
                report
                    .errors
                    .push(DispatchError::ProviderTimeout { timeout_ms }.to_string());
                return;
            }
        };

        report.push_sent = response.delivered > 0;
        report.message_id = response.message_id;
        report.errors.extend(response.errors);

        // 只处理本次实际发送过的设备
        let invalid: Vec<String> = response
            .invalid_device_ids
            .into_iter()
            .filter(|id| push_request.device_ids.contains(id))
            .collect();
        if invalid.is_empty() {
            return;
        }

        match self.registry.deactivate(&request.recipient_id, &invalid).await {
            Ok(changed) => {
                report.invalidated_devices = changed;
                metrics::record_devices_invalidated(changed);
                info!(
                    recipient_id = %request.recipient_id,
                    devices = ?invalid,
                    changed,
                    "服务商反馈设备失效，已标记为不活跃"
                );
            }
            Err(e) => {
                warn!(
                    recipient_id = %request.recipient_id,
                    error = %e,
                    "标记失效设备失败"
                );
            }
        }
    }
}

#[async_trait]
impl Dispatcher for PushDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> DispatchReport {
        let mut report = DispatchReport::default();

        let device_ids = self.resolve_devices(&request.recipient_id, &mut report).await;
        report.device_count = device_ids.len();

        // 站内通知与推送结果无关，必须保存
        let notification = InAppNotification::from_request(request);
        match self.sink.save(&notification).await {
            Ok(()) => report.notification_saved = true,
            Err(e) => report.errors.push(DispatchError::Sink(e).to_string()),
        }

        if device_ids.is_empty() {
            report.skipped = Some(SkipReason::NoActiveDevices);
        } else if !self.category_enabled(request, &mut report).await {
            report.skipped = Some(SkipReason::CategoryDisabled);
        } else if !self.config.enabled {
            report.skipped = Some(SkipReason::PushDisabled);
        } else {
            self.push(request, device_ids, &mut report).await;
        }

        metrics::record_dispatch(report.outcome(), request.category.as_str());
        debug!(
            recipient_id = %request.recipient_id,
            category = %request.category,
            devices = report.device_count,
            outcome = report.outcome(),
            skipped = ?report.skipped,
            "推送分发完成"
        );

        report
    }
}
