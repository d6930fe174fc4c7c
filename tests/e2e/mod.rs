//! 推送活动系统端到端测试
//!
//! 在单进程内组装规则引擎、推送分发器与活动服务，覆盖完整的业务流程：
//! - 创建、预览、排期与执行
//! - 受众规则与资料完整度过滤
//! - 站内通知、推送偏好与设备失效
//! - 执行记录、汇总与领域事件的一致性
//! - 取消与非法状态转换

pub mod data;
pub mod helpers;
pub mod setup;
pub mod suites;

pub use setup::TestEnvironment;
