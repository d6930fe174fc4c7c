//! 统一错误处理模块
//!
//! 定义存储与目录访问层共享的错误类型，上层服务在此基础上扩展业务错误。

use thiserror::Error;

/// 存储层错误类型
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("记录已存在: {entity} id={id}")]
    AlreadyExists { entity: String, id: String },

    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("存储不可用: {0}")]
    Unavailable(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Unavailable(_))
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}
