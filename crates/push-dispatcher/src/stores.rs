//! 分发器依赖的外部存储接口
//!
//! 设备注册表、通知偏好与站内通知存储都由外部系统提供，
//! 这里给出接口以及基于内存的实现，供测试和开发环境使用。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use campaign_shared::directory::MemoryDirectory;
use campaign_shared::error::StoreError;
use campaign_shared::models::{Device, NotificationCategory};
use dashmap::DashMap;

use crate::models::InAppNotification;

/// 设备注册表
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// 接收人当前的活跃设备
    async fn active_devices(&self, recipient_id: &str) -> Result<Vec<Device>, StoreError>;

    /// 将设备标记为不活跃，返回实际变更数
    async fn deactivate(&self, recipient_id: &str, device_ids: &[String])
    -> Result<usize, StoreError>;
}

/// 通知偏好
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn is_category_enabled(
        &self,
        recipient_id: &str,
        category: NotificationCategory,
    ) -> Result<bool, StoreError>;
}

/// 站内通知存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn save(&self, notification: &InAppNotification) -> Result<(), StoreError>;
}

#[async_trait]
impl DeviceRegistry for MemoryDirectory {
    async fn active_devices(&self, recipient_id: &str) -> Result<Vec<Device>, StoreError> {
        MemoryDirectory::active_devices(self, recipient_id)
    }

    async fn deactivate(
        &self,
        recipient_id: &str,
        device_ids: &[String],
    ) -> Result<usize, StoreError> {
        self.deactivate_devices(recipient_id, device_ids)
    }
}

/// 内存通知偏好
///
/// 只记录被关闭的类别，未记录的接收人默认全部开启。
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    disabled: Arc<DashMap<String, HashSet<NotificationCategory>>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disable(&self, recipient_id: &str, category: NotificationCategory) {
        self.disabled
            .entry(recipient_id.to_string())
            .or_default()
            .insert(category);
    }

    pub fn enable(&self, recipient_id: &str, category: NotificationCategory) {
        if let Some(mut set) = self.disabled.get_mut(recipient_id) {
            set.remove(&category);
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn is_category_enabled(
        &self,
        recipient_id: &str,
        category: NotificationCategory,
    ) -> Result<bool, StoreError> {
        Ok(self
            .disabled
            .get(recipient_id)
            .is_none_or(|set| !set.contains(&category)))
    }
}

/// 内存站内通知存储
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationSink {
    notifications: Arc<DashMap<String, Vec<InAppNotification>>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接收人的站内通知，按保存顺序
    pub fn list_for(&self, recipient_id: &str) -> Vec<InAppNotification> {
        self.notifications
            .get(recipient_id)
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.notifications.iter().map(|entry| entry.value().len()).sum()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn save(&self, notification: &InAppNotification) -> Result<(), StoreError> {
        self.notifications
            .entry(notification.recipient_id.clone())
            .or_default()
            .push(notification.clone());
        Ok(())
    }
}
