//! 规则引擎错误类型

use campaign_shared::error::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("受众规则至少需要一个 all 或 any 条件组")]
    EmptyRule,

    #[error("字段不在白名单中: {field}")]
    DisallowedField { field: String },

    #[error("字段 {field} 不支持操作符 {operator}")]
    DisallowedOperator { field: String, operator: String },

    #[error("条件 {field} {operator} 的值无效: 期望 {expected}, 实际 {actual}")]
    InvalidValue {
        field: String,
        operator: String,
        expected: String,
        actual: String,
    },

    #[error("用户目录查询失败: {0}")]
    Directory(#[from] StoreError),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseError(_) => "RULE_PARSE_FAILED",
            Self::EmptyRule => "RULE_EMPTY",
            Self::DisallowedField { .. } => "RULE_FIELD_NOT_ALLOWED",
            Self::DisallowedOperator { .. } => "RULE_OPERATOR_NOT_ALLOWED",
            Self::InvalidValue { .. } => "RULE_INVALID_VALUE",
            Self::Directory(_) => "DIRECTORY_ERROR",
            Self::JsonError(_) => "RULE_PARSE_FAILED",
        }
    }

    /// 是否为规则本身的校验错误（与目录访问失败区分）
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Directory(_))
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
