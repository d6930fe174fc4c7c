//! 推送分发器
//!
//! 把单个接收人解析为推送设备，调用推送服务商，并保存与推送结果无关的站内通知。

pub mod dispatcher;
pub mod error;
pub mod models;
pub mod provider;
pub mod stores;

pub use dispatcher::{Dispatcher, PushDispatcher, dedup_preserving_order};
pub use error::DispatchError;
pub use models::{DispatchReport, DispatchRequest, InAppNotification, SkipReason};
pub use provider::{ProviderResponse, PushProvider, PushRequest, SimulatedPushProvider};
pub use stores::{
    DeviceRegistry, MemoryNotificationSink, MemoryPreferenceStore, NotificationSink,
    PreferenceStore,
};
