//! 活动服务错误类型
//!
//! 定义活动生命周期中的校验错误、状态错误、模板错误与系统错误。
//! 单个接收人的投递失败不在此列，它们记录在执行记录中，从不向上抛出。

use campaign_shared::error::StoreError;
use rule_engine::RuleError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::CampaignStatus;
use crate::template::TemplateKey;

/// 模板定义错误
///
/// 在模板创建或查找时产生，与渲染阶段的变量错误区分。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("模板 {key} 的{part}不能为空")]
    EmptyText { key: TemplateKey, part: &'static str },

    #[error("模板 {key} 引用了未声明的变量: {placeholder}")]
    UnknownPlaceholder { key: TemplateKey, placeholder: String },

    #[error("模板 {key} 未使用必需变量: {variable}")]
    MissingPlaceholder { key: TemplateKey, variable: String },

    #[error("模板不存在: {key} v{version}")]
    NotFound { key: TemplateKey, version: u32 },

    #[error("模板 {key} 尚未发布任何版本")]
    NoPublishedVersion { key: TemplateKey },
}

impl TemplateError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyText { .. } => "TEMPLATE_EMPTY_TEXT",
            Self::UnknownPlaceholder { .. } => "TEMPLATE_UNKNOWN_PLACEHOLDER",
            Self::MissingPlaceholder { .. } => "TEMPLATE_MISSING_PLACEHOLDER",
            Self::NotFound { .. } | Self::NoPublishedVersion { .. } => "TEMPLATE_NOT_FOUND",
        }
    }
}

/// 模板渲染错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateRenderError {
    #[error("缺少模板变量: {}", .names.join(", "))]
    MissingVariables { names: Vec<String> },

    #[error("存在模板未声明的变量: {}", .names.join(", "))]
    UnexpectedVariables { names: Vec<String> },

    #[error("渲染后仍有未替换的占位符: {}", .tokens.join(", "))]
    UnresolvedPlaceholders { tokens: Vec<String> },
}

impl TemplateRenderError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingVariables { .. } => "TEMPLATE_MISSING_VARIABLES",
            Self::UnexpectedVariables { .. } => "TEMPLATE_UNEXPECTED_VARIABLES",
            Self::UnresolvedPlaceholders { .. } => "TEMPLATE_UNRESOLVED_PLACEHOLDERS",
        }
    }
}

/// 活动定义校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Rule(RuleError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Variables(#[from] TemplateRenderError),

    #[error("字段 {field} 无效: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rule(e) => e.code(),
            Self::Template(e) => e.code(),
            Self::Variables(e) => e.code(),
            Self::InvalidField { .. } => "INVALID_FIELD",
        }
    }
}

/// 状态机错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("活动 {campaign_id} 当前状态为 {status}，不允许执行 {action}")]
    IllegalTransition {
        campaign_id: Uuid,
        status: CampaignStatus,
        action: &'static str,
    },

    #[error("活动 {campaign_id} 尚未预览，不允许执行 {action}")]
    PreviewRequired {
        campaign_id: Uuid,
        action: &'static str,
    },

    /// 读取之后活动已被其他操作修改
    #[error("活动 {campaign_id} 已被并发修改（当前状态 {status}），{action} 被拒绝，请重新读取后重试")]
    ConcurrentModification {
        campaign_id: Uuid,
        status: CampaignStatus,
        action: &'static str,
    },
}

impl StateError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::IllegalTransition { .. } => "ILLEGAL_STATE_TRANSITION",
            Self::PreviewRequired { .. } => "PREVIEW_REQUIRED",
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
        }
    }

    /// 被拒绝时观察到的状态
    pub fn observed_status(&self) -> Option<CampaignStatus> {
        match self {
            Self::IllegalTransition { status, .. } | Self::ConcurrentModification { status, .. } => {
                Some(*status)
            }
            Self::PreviewRequired { .. } => None,
        }
    }
}

/// 活动服务错误
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("活动校验失败: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("受众人数 {audience_size} 超过单次执行上限 {max}")]
    RateLimitExceeded { audience_size: usize, max: usize },

    #[error("模板渲染失败: {0}")]
    TemplateRender(#[from] TemplateRenderError),

    #[error("活动不存在: {0}")]
    NotFound(Uuid),

    #[error("存储错误: {0}")]
    Store(#[from] StoreError),

    #[error("执行引擎故障: {0}")]
    Engine(String),
}

impl From<RuleError> for CampaignError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::Directory(e) => Self::Store(e),
            other => Self::Validation(ValidationError::Rule(other)),
        }
    }
}

impl From<TemplateError> for CampaignError {
    fn from(err: TemplateError) -> Self {
        Self::Validation(ValidationError::Template(err))
    }
}

impl CampaignError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::State(e) => e.code(),
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::TemplateRender(e) => e.code(),
            Self::NotFound(_) => "CAMPAIGN_NOT_FOUND",
            Self::Store(e) => e.code(),
            Self::Engine(_) => "ENGINE_FAULT",
        }
    }

    /// 是否为调用方输入导致的错误
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::State(_) | Self::RateLimitExceeded { .. } | Self::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CampaignError>;
