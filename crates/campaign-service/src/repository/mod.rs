//! 仓储层
//!
//! 服务层依赖这里的 trait 而非具体实现，内存实现用于测试与单机开发，
//! PostgreSQL 实现用于多实例部署。

mod memory;
mod pool;
mod postgres;

pub use memory::{MemoryCampaignRepository, MemoryExecutionRecordRepository};
pub use pool::{PgRepositories, connect_pool, ensure_schema};
pub use postgres::{PgCampaignRepository, PgExecutionRecordRepository};

use async_trait::async_trait;
use campaign_shared::error::Result;
use uuid::Uuid;

use crate::models::{Campaign, CampaignStatus, ExecutionRecord};
use crate::state_machine::StatusGuard;

/// 比较并交换的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SwapOutcome {
    /// 守卫满足，已写入新值
    Swapped,
    /// 守卫不满足或版本号不一致，返回存储中的当前值
    Conflict(Box<Campaign>),
    Missing,
}

/// 活动仓储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn insert(&self, campaign: &Campaign) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Campaign>>;

    async fn list_by_status(&self, status: CampaignStatus) -> Result<Vec<Campaign>>;

    /// 仅当存储中的活动满足守卫且版本号仍为 `expected_revision` 时写入 `next`
    ///
    /// 检查与写入必须是一个原子步骤，并发调用中至多一个能基于同一版本写入成功。
    async fn compare_and_swap(
        &self,
        guard: &StatusGuard,
        expected_revision: u64,
        next: &Campaign,
    ) -> Result<SwapOutcome>;
}

/// 执行记录仓储，只追加
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionRecordRepository: Send + Sync {
    /// 追加记录，同一活动同一接收人只能有一条
    async fn append(&self, record: &ExecutionRecord) -> Result<()>;

    /// 按写入顺序列出活动的执行记录
    async fn list(&self, campaign_id: Uuid) -> Result<Vec<ExecutionRecord>>;

    async fn count(&self, campaign_id: Uuid) -> Result<u64>;
}
