//! PostgreSQL 连接与建表
//!
//! 活动仓储和执行记录仓储共用一个连接池。建表脚本随 crate 编译，可重复执行。

use std::time::Duration;

use campaign_shared::config::DatabaseConfig;
use campaign_shared::error::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use super::{PgCampaignRepository, PgExecutionRecordRepository};

/// 活动与执行记录表结构
pub const SCHEMA: &str = include_str!("../../migrations/20260101000001_campaigns.sql");

/// 按配置创建连接池
#[instrument(skip(config), fields(max_connections = config.max_connections))]
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect(&config.url)
        .await?;
    info!("活动库连接池已创建");
    Ok(pool)
}

/// 创建活动表与执行记录表
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    info!("活动表结构已就绪");
    Ok(())
}

/// 共用一个连接池的 PostgreSQL 仓储
#[derive(Debug, Clone)]
pub struct PgRepositories {
    pub campaigns: PgCampaignRepository,
    pub records: PgExecutionRecordRepository,
    pool: PgPool,
}

impl PgRepositories {
    /// 连接数据库、建表并构造两个仓储
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = connect_pool(config).await?;
        ensure_schema(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            campaigns: PgCampaignRepository::new(pool.clone()),
            records: PgExecutionRecordRepository::new(pool.clone()),
            pool,
        }
    }

    /// 存活检查
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("活动库连接池已关闭");
    }
}
