//! 受众规则引擎
//!
//! 提供安全的受众筛选能力，支持：
//! - 封闭白名单的规则定义和校验
//! - 编译期确定类型的规则叶子
//! - 可查询条件下推与计算字段后置过滤
//! - 确定性的受众预览结果

pub mod compiler;
pub mod directory;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod operators;

pub use compiler::{RuleCompiler, WHITELIST, coerce_bool};
pub use directory::{AudienceDirectory, AudienceQuery};
pub use error::{Result, RuleError};
pub use executor::{AudienceEngine, ExecutionPlan};
pub use models::{AudienceResult, AudienceRule, AudienceRuleSpec, RawCondition, RuleLeaf};
pub use operators::Operator;
