//! 用户目录查询接口
//!
//! 规则中可直接查询的条件被下推给目录，计算字段留在引擎内后置过滤。

use async_trait::async_trait;
use campaign_shared::directory::MemoryDirectory;
use campaign_shared::error::StoreError;
use campaign_shared::models::Recipient;
use chrono::{DateTime, Utc};

use crate::evaluator::{matches_all, matches_any};
use crate::models::RuleLeaf;

/// 下推到目录的查询条件
///
/// 只包含可查询的叶子。目录返回的结果必须同时满足：
/// 全部 `all` 条件、任一 `any` 条件（`any` 为空时不限制）、至少一台活跃设备。
#[derive(Debug, Clone, PartialEq)]
pub struct AudienceQuery {
    pub all: Vec<RuleLeaf>,
    pub any: Vec<RuleLeaf>,
    pub as_of: DateTime<Utc>,
}

impl AudienceQuery {
    pub fn new(all: Vec<RuleLeaf>, any: Vec<RuleLeaf>, as_of: DateTime<Utc>) -> Self {
        debug_assert!(all.iter().chain(any.iter()).all(|l| !l.is_computed()));
        Self { all, any, as_of }
    }

    /// 在内存中判断接收人是否满足查询
    pub fn matches(&self, recipient: &Recipient) -> bool {
        recipient.has_active_device()
            && matches_all(&self.all, recipient, self.as_of)
            && matches_any(&self.any, recipient, self.as_of)
    }
}

/// 用户目录
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudienceDirectory: Send + Sync {
    /// 查询满足条件的接收人，结果按 ID 升序
    async fn query(&self, query: &AudienceQuery) -> Result<Vec<Recipient>, StoreError>;
}

#[async_trait]
impl AudienceDirectory for MemoryDirectory {
    async fn query(&self, query: &AudienceQuery) -> Result<Vec<Recipient>, StoreError> {
        self.scan(|recipient| query.matches(recipient))
    }
}
