//! 共享库
//!
//! 包含所有组件共用的配置、错误处理、用户目录模型、领域事件与可观测性基础设施代码。

pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod models;
pub mod observability;
pub mod test_utils;
