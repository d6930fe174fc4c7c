//! 测试环境设置模块
//!
//! 提供测试环境的组装与事件收集。

mod environment;

pub use environment::{TestEnvConfig, TestEnvironment};
