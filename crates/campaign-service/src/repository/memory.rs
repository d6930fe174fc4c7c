//! 内存仓储
//!
//! 比较并交换依赖 DashMap 分片写锁：`get_mut` 持有期间其他写入者阻塞，
//! 守卫检查与替换在同一临界区内完成。

use std::sync::Arc;

use async_trait::async_trait;
use campaign_shared::error::{Result, StoreError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{CampaignRepository, ExecutionRecordRepository, SwapOutcome};
use crate::models::{Campaign, CampaignStatus, ExecutionRecord};
use crate::state_machine::StatusGuard;

#[derive(Debug, Clone, Default)]
pub struct MemoryCampaignRepository {
    campaigns: Arc<DashMap<Uuid, Campaign>>,
}

impl MemoryCampaignRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignRepository for MemoryCampaignRepository {
    async fn insert(&self, campaign: &Campaign) -> Result<()> {
        match self.campaigns.entry(campaign.id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                entity: "campaign".into(),
                id: campaign.id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(campaign.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Campaign>> {
        Ok(self.campaigns.get(&id).map(|c| c.clone()))
    }

    async fn list_by_status(&self, status: CampaignStatus) -> Result<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.value().clone())
            .collect();
        campaigns.sort_by_key(|c| c.created_at);
        Ok(campaigns)
    }

    async fn compare_and_swap(
        &self,
        guard: &StatusGuard,
        expected_revision: u64,
        next: &Campaign,
    ) -> Result<SwapOutcome> {
        let Some(mut current) = self.campaigns.get_mut(&next.id) else {
            return Ok(SwapOutcome::Missing);
        };
        if current.revision != expected_revision
            || !guard.admits(current.status, current.preview_count)
        {
            return Ok(SwapOutcome::Conflict(Box::new(current.clone())));
        }
        *current = next.clone();
        Ok(SwapOutcome::Swapped)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryExecutionRecordRepository {
    records: Arc<DashMap<Uuid, Vec<ExecutionRecord>>>,
    offline: Arc<RwLock<bool>>,
}

impl MemoryExecutionRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟存储不可用
    pub fn set_online(&self, online: bool) {
        *self.offline.write() = !online;
    }

    pub fn total(&self) -> usize {
        self.records.iter().map(|entry| entry.len()).sum()
    }
}

#[async_trait]
impl ExecutionRecordRepository for MemoryExecutionRecordRepository {
    async fn append(&self, record: &ExecutionRecord) -> Result<()> {
        if *self.offline.read() {
            return Err(StoreError::Unavailable("执行记录存储不可用".into()));
        }
        let mut records = self.records.entry(record.campaign_id).or_default();
        if records.iter().any(|r| r.recipient_id == record.recipient_id) {
            return Err(StoreError::AlreadyExists {
                entity: "execution_record".into(),
                id: format!("{}/{}", record.campaign_id, record.recipient_id),
            });
        }
        records.push(record.clone());
        Ok(())
    }

    async fn list(&self, campaign_id: Uuid) -> Result<Vec<ExecutionRecord>> {
        Ok(self
            .records
            .get(&campaign_id)
            .map(|records| records.clone())
            .unwrap_or_default())
    }

    async fn count(&self, campaign_id: Uuid) -> Result<u64> {
        Ok(self
            .records
            .get(&campaign_id)
            .map_or(0, |records| records.len() as u64))
    }
}
