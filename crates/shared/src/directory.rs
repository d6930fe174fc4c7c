//! 内存用户目录
//!
//! 使用 DashMap 实现的高并发目录存储，适用于测试和开发环境。
//! 生产环境的目录由外部系统提供，只需实现相同的查询与设备失效接口。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::models::{Device, Recipient};

/// 内存用户目录
///
/// 克隆后共享同一份数据，设备失效对所有持有者可见。
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    recipients: Arc<DashMap<String, Recipient>>,
    online: Arc<AtomicBool>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self {
            recipients: Arc::new(DashMap::new()),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// 插入或覆盖接收人
    pub fn insert(&self, recipient: Recipient) {
        self.recipients.insert(recipient.id.clone(), recipient);
    }

    /// 批量插入
    pub fn insert_many<I>(&self, recipients: I)
    where
        I: IntoIterator<Item = Recipient>,
    {
        for recipient in recipients {
            self.insert(recipient);
        }
    }

    pub fn remove(&self, id: &str) -> Option<Recipient> {
        self.recipients.remove(id).map(|(_, r)| r)
    }

    pub fn get(&self, id: &str) -> Option<Recipient> {
        self.recipients.get(id).map(|r| r.clone())
    }

    pub fn count(&self) -> usize {
        self.recipients.len()
    }

    /// 模拟目录不可达，离线时所有读操作返回 `StoreError::Unavailable`
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("用户目录不可达".to_string()))
        }
    }

    /// 按条件筛选接收人，结果按 ID 排序
    pub fn scan<F>(&self, predicate: F) -> Result<Vec<Recipient>>
    where
        F: Fn(&Recipient) -> bool,
    {
        self.ensure_online()?;
        let mut matched: Vec<Recipient> = self
            .recipients
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }

    /// 查询接收人当前的活跃设备
    pub fn active_devices(&self, recipient_id: &str) -> Result<Vec<Device>> {
        self.ensure_online()?;
        let recipient = self
            .recipients
            .get(recipient_id)
            .ok_or_else(|| StoreError::not_found("Recipient", recipient_id))?;
        Ok(recipient.active_devices().cloned().collect())
    }

    /// 将指定设备标记为不活跃，返回实际变更的设备数
    ///
    /// 只锁定目标接收人所在的分片。
    pub fn deactivate_devices(&self, recipient_id: &str, device_ids: &[String]) -> Result<usize> {
        self.ensure_online()?;
        let mut recipient = self
            .recipients
            .get_mut(recipient_id)
            .ok_or_else(|| StoreError::not_found("Recipient", recipient_id))?;

        let mut changed = 0;
        for device in recipient.devices.iter_mut() {
            if device.active && device_ids.iter().any(|id| id == &device.id) {
                device.active = false;
                changed += 1;
            }
        }

        debug!(recipient_id, changed, "设备已标记为不活跃");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;

    fn directory() -> MemoryDirectory {
        let dir = MemoryDirectory::new();
        dir.insert(
            Recipient::new("u-2")
                .with_device(Device::new("d-2a", Platform::Ios))
                .with_device(Device::new("d-2b", Platform::Android)),
        );
        dir.insert(Recipient::new("u-1").with_device(Device::new("d-1", Platform::Web)));
        dir
    }

    #[test]
    fn test_scan_sorted_by_id() {
        let dir = directory();
        let ids: Vec<_> = dir.scan(|_| true).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["u-1", "u-2"]);
    }

    #[test]
    fn test_deactivate_devices() {
        let dir = directory();
        let changed = dir
            .deactivate_devices("u-2", &["d-2a".to_string(), "unknown".to_string()])
            .unwrap();
        assert_eq!(changed, 1);

        let active = dir.active_devices("u-2").unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "d-2b");

        // 重复失效不再计数
        let changed = dir.deactivate_devices("u-2", &["d-2a".to_string()]).unwrap();
        assert_eq!(changed, 0);
    }

    #[test]
    fn test_unknown_recipient() {
        let dir = directory();
        let err = dir.active_devices("missing").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_offline_directory() {
        let dir = directory();
        dir.set_online(false);
        assert!(matches!(dir.scan(|_| true), Err(StoreError::Unavailable(_))));
        dir.set_online(true);
        assert_eq!(dir.scan(|_| true).unwrap().len(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let dir = directory();
        let other = dir.clone();
        other.deactivate_devices("u-1", &["d-1".to_string()]).unwrap();
        assert!(dir.active_devices("u-1").unwrap().is_empty());
    }
}
