//! 推送设备注册表
//!
//! 维护每个用户的推送设备生命周期：注册（按 token 幂等 upsert）、
//! 永久失效后的停用、活跃设备查询。token 全局唯一，同一 token 被
//! 其他用户重新注册时转移归属（最后写入者获胜）。

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use fleet_shared::notifications::{Device, DevicePlatform};

/// 设备注册表接口
///
/// 停用是幂等操作：token 未知或已停用时静默成功，
/// 以便推送失败的并发停用无需任何协调。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// 注册设备（按 token 幂等 upsert）
    ///
    /// token 已存在时更新归属用户、平台与活跃状态并刷新 last_used_at；
    /// 不存在时创建新设备行。
    async fn register(
        &self,
        user_id: &str,
        token: &str,
        platform: DevicePlatform,
    ) -> fleet_shared::error::Result<Device>;

    /// 停用设备（幂等）
    async fn deactivate(&self, token: &str) -> fleet_shared::error::Result<()>;

    /// 查询用户的活跃设备
    async fn active_devices_for(
        &self,
        user_id: &str,
    ) -> fleet_shared::error::Result<Vec<Device>>;
}

/// 内存设备注册表
///
/// 按 token 键控的 DashMap；每个 token 的更新相互独立，
/// 并发停用不同 token 无需跨行锁。
#[derive(Default)]
pub struct InMemoryDeviceRegistry {
    devices: DashMap<String, Device>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册表中的设备总数（含已停用）
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn register(
        &self,
        user_id: &str,
        token: &str,
        platform: DevicePlatform,
    ) -> fleet_shared::error::Result<Device> {
        if let Some(mut entry) = self.devices.get_mut(token) {
            // 重复注册：转移归属并重新激活，保留原始设备 ID
            entry.user_id = user_id.to_string();
            entry.platform = platform;
            entry.is_active = true;
            entry.last_used_at = Utc::now();
            return Ok(entry.clone());
        }

        let device = Device::new(user_id, token, platform);
        self.devices.insert(token.to_string(), device.clone());
        Ok(device)
    }

    async fn deactivate(&self, token: &str) -> fleet_shared::error::Result<()> {
        if let Some(mut entry) = self.devices.get_mut(token) {
            entry.is_active = false;
        }
        Ok(())
    }

    async fn active_devices_for(
        &self,
        user_id: &str,
    ) -> fleet_shared::error::Result<Vec<Device>> {
        Ok(self
            .devices
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.is_active)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
