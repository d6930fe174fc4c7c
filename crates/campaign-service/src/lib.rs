//! 推送活动服务
//!
//! 管理端按受众规则向用户批量发送推送与站内通知。
//!
//! ## 核心流程
//!
//! 创建（冻结模板版本）→ 预览（评估受众、校验渲染）→ 执行（原子切换到 sending，
//! 分批投递，每个接收人一条执行记录）→ sent / failed。
//!
//! ## 模块结构
//!
//! - `models`: 活动、执行记录与请求模型
//! - `error`: 错误类型定义
//! - `template`: 模板键、模板版本存储与渲染器
//! - `state_machine`: 状态转换与守卫
//! - `repository`: 活动与执行记录仓储（内存 / PostgreSQL）
//! - `engine`: 分批投递引擎
//! - `service`: 面向管理端的服务入口

pub mod engine;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;
pub mod state_machine;
pub mod template;

pub use engine::{EngineFault, ExecutionEngine};
pub use error::{CampaignError, Result, StateError, TemplateError, TemplateRenderError, ValidationError};
pub use models::{
    Campaign, CampaignPreview, CampaignStatus, CampaignUpdate, DeliveryTally, ExecutionRecord,
    ExecutionSummary, NewCampaign, Variables,
};
pub use repository::{
    CampaignRepository, ExecutionRecordRepository, MemoryCampaignRepository,
    MemoryExecutionRecordRepository, PgCampaignRepository, PgExecutionRecordRepository,
    PgRepositories, SwapOutcome,
};
pub use service::CampaignService;
pub use state_machine::{StatusGuard, Transition};
pub use template::{
    MemoryTemplateStore, RenderedNotification, Template, TemplateKey, TemplateRenderer,
    TemplateStore,
};
