//! 受众执行器
//!
//! 把编译后的规则拆成“目录查询 + 后置过滤”两段执行：
//! 可查询条件下推给目录缩小候选集，计算字段只在缩小后的候选集上评估。

use std::time::Instant;

use campaign_shared::observability::metrics;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::compiler::RuleCompiler;
use crate::directory::{AudienceDirectory, AudienceQuery};
use crate::error::Result;
use crate::evaluator::{matches_all, matches_any};
use crate::models::{AudienceResult, AudienceRule, AudienceRuleSpec, RuleLeaf};

/// 默认预览样本数
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// 执行计划
///
/// `any` 组中只要出现计算字段，整个 `any` 组都改为后置过滤，
/// 否则目录无法正确表达 OR 语义。
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    pub query: AudienceQuery,
    pub post_all: Vec<RuleLeaf>,
    pub post_any: Vec<RuleLeaf>,
}

impl ExecutionPlan {
    pub fn build(rule: &AudienceRule, as_of: DateTime<Utc>) -> Self {
        let (post_all, query_all): (Vec<RuleLeaf>, Vec<RuleLeaf>) =
            rule.all().iter().cloned().partition(RuleLeaf::is_computed);

        let (query_any, post_any) = if rule.any().iter().any(RuleLeaf::is_computed) {
            (Vec::new(), rule.any().to_vec())
        } else {
            (rule.any().to_vec(), Vec::new())
        };

        Self {
            query: AudienceQuery::new(query_all, query_any, as_of),
            post_all,
            post_any,
        }
    }

    pub fn has_post_filter(&self) -> bool {
        !self.post_all.is_empty() || !self.post_any.is_empty()
    }
}

/// 受众引擎
#[derive(Debug, Clone)]
pub struct AudienceEngine {
    compiler: RuleCompiler,
    sample_size: usize,
}

impl Default for AudienceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE)
    }
}

impl AudienceEngine {
    pub fn new(sample_size: usize) -> Self {
        Self {
            compiler: RuleCompiler::new(),
            sample_size,
        }
    }

    /// 校验并编译原始规则
    pub fn validate(&self, spec: &AudienceRuleSpec) -> Result<AudienceRule> {
        self.compiler.compile(spec)
    }

    /// 以当前时间为基准评估受众
    pub async fn evaluate(
        &self,
        rule: &AudienceRule,
        directory: &dyn AudienceDirectory,
    ) -> Result<AudienceResult> {
        self.evaluate_at(rule, directory, Utc::now()).await
    }

    /// 以指定时间为基准评估受众
    ///
    /// 只读操作，可重复调用。同一目录快照与基准时间下结果确定：
    /// 接收人按 ID 升序，样本取前 N 个。
    pub async fn evaluate_at(
        &self,
        rule: &AudienceRule,
        directory: &dyn AudienceDirectory,
        as_of: DateTime<Utc>,
    ) -> Result<AudienceResult> {
        let start = Instant::now();
        let plan = ExecutionPlan::build(rule, as_of);

        let mut candidates = directory.query(&plan.query).await?;
        let narrowed = candidates.len();

        // 无活跃设备的接收人始终排除，不依赖目录实现是否已过滤
        candidates.retain(|r| {
            r.has_active_device()
                && matches_all(&plan.post_all, r, as_of)
                && matches_any(&plan.post_any, r, as_of)
        });
        if plan.has_post_filter() || candidates.len() != narrowed {
            debug!(
                narrowed,
                remaining = candidates.len(),
                "后置过滤完成"
            );
        }

        let mut recipient_ids: Vec<String> = candidates.into_iter().map(|r| r.id).collect();
        recipient_ids.sort();
        recipient_ids.dedup();

        let count = recipient_ids.len();
        let sample_ids = recipient_ids.iter().take(self.sample_size).cloned().collect();
        let elapsed = start.elapsed();

        metrics::record_audience_evaluation(count, elapsed.as_secs_f64());
        info!(
            count,
            narrowed,
            fields = ?rule.fields(),
            duration_ms = elapsed.as_millis() as u64,
            "受众评估完成"
        );

        Ok(AudienceResult {
            recipient_ids,
            count,
            sample_ids,
            description: rule.describe(),
            evaluated_at: as_of,
        })
    }
}
