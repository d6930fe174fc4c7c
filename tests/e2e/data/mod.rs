//! 测试数据模块
//!
//! 提供接收人目录、受众规则与活动请求的 fixtures。

mod fixtures;

pub use fixtures::*;
