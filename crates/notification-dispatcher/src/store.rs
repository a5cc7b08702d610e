//! 站内信存储
//!
//! 站内信是调度的权威落点：每次调度无条件写入恰好一条记录，
//! 外部渠道的任何失败都不回滚该记录。写入失败只影响站内渠道
//! 自身的结果，不会中止其余渠道的扇出。

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use fleet_shared::notifications::NotificationRecord;

/// 站内信存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InAppStore: Send + Sync {
    /// 写入站内信记录，返回记录 ID
    async fn create_notification(
        &self,
        record: &NotificationRecord,
    ) -> fleet_shared::error::Result<i64>;
}

/// 内存站内信存储
///
/// DashMap 实现，用于开发环境与测试；ID 单调递增模拟数据库自增主键。
#[derive(Default)]
pub struct InMemoryNotificationStore {
    next_id: AtomicI64,
    records: DashMap<i64, NotificationRecord>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询某用户的全部站内信
    pub fn list_for_user(&self, user_id: &str) -> Vec<NotificationRecord> {
        self.records
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl InAppStore for InMemoryNotificationStore {
    async fn create_notification(
        &self,
        record: &NotificationRecord,
    ) -> fleet_shared::error::Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.insert(id, record.clone());
        Ok(id)
    }
}
