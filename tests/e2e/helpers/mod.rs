//! 测试辅助工具模块
//!
//! 提供活动状态、执行记录与站内通知的断言。

mod assertions;

pub use assertions::*;
