//! 测试环境管理
//!
//! 统一组装活动服务依赖的目录、偏好、通知存储与推送服务商。

use std::sync::Arc;

use campaign::{
    CampaignService, MemoryCampaignRepository, MemoryExecutionRecordRepository,
    MemoryTemplateStore,
};
use campaign_shared::config::{CampaignConfig, DispatchConfig};
use campaign_shared::directory::MemoryDirectory;
use campaign_shared::events::{CampaignEvent, EventBus};
use push_dispatcher::{
    MemoryNotificationSink, MemoryPreferenceStore, PushDispatcher, SimulatedPushProvider,
};
use tokio::sync::broadcast;

/// 测试环境配置
#[derive(Debug, Clone)]
pub struct TestEnvConfig {
    pub campaign: CampaignConfig,
    pub dispatch: DispatchConfig,
    /// 事件总线容量
    pub event_capacity: usize,
}

impl Default for TestEnvConfig {
    fn default() -> Self {
        Self {
            campaign: CampaignConfig {
                max_audience_size: 500,
                batch_size: 3,
                max_concurrency: 4,
                error_sample_limit: 10,
                preview_sample_size: 5,
            },
            dispatch: DispatchConfig::default(),
            event_capacity: 256,
        }
    }
}

impl TestEnvConfig {
    pub fn with_max_audience(mut self, max: usize) -> Self {
        self.campaign.max_audience_size = max;
        self
    }
}

/// 端到端测试环境
///
/// 持有各内存组件的句柄，测试可直接修改目录或偏好并检查副作用。
pub struct TestEnvironment {
    pub service: Arc<CampaignService>,
    pub directory: MemoryDirectory,
    pub preferences: MemoryPreferenceStore,
    pub inbox: MemoryNotificationSink,
    pub provider: Arc<SimulatedPushProvider>,
    pub campaigns: MemoryCampaignRepository,
    pub records: MemoryExecutionRecordRepository,
    pub templates: MemoryTemplateStore,
    events: broadcast::Receiver<CampaignEvent>,
}

impl TestEnvironment {
    /// 使用默认配置和给定目录组装环境
    pub fn new(directory: MemoryDirectory) -> Self {
        Self::with_config(directory, TestEnvConfig::default())
    }

    pub fn with_config(directory: MemoryDirectory, config: TestEnvConfig) -> Self {
        let preferences = MemoryPreferenceStore::new();
        let inbox = MemoryNotificationSink::new();
        let provider = Arc::new(SimulatedPushProvider::new());
        let dispatcher = PushDispatcher::new(
            Arc::new(directory.clone()),
            Arc::new(preferences.clone()),
            Arc::new(inbox.clone()),
            provider.clone(),
        )
        .with_config(config.dispatch);

        let campaigns = MemoryCampaignRepository::new();
        let records = MemoryExecutionRecordRepository::new();
        let templates = MemoryTemplateStore::with_defaults().expect("默认模板应当合法");

        let bus = EventBus::new(config.event_capacity);
        let events = bus.subscribe();
        let service = CampaignService::new(
            Arc::new(campaigns.clone()),
            Arc::new(records.clone()),
            Arc::new(templates.clone()),
            Arc::new(directory.clone()),
            Arc::new(dispatcher),
            config.campaign,
        )
        .with_event_bus(bus);

        Self {
            service: Arc::new(service),
            directory,
            preferences,
            inbox,
            provider,
            campaigns,
            records,
            templates,
            events,
        }
    }

    /// 取出目前为止收到的所有事件
    pub fn drain_events(&mut self) -> Vec<CampaignEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}
