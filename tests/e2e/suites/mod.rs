//! 测试套件模块
//!
//! 按业务功能组织的测试用例集合。

pub mod campaign_flow;
pub mod cancellation;
pub mod data_consistency;
pub mod dispatch;
