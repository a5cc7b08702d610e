//! 用户偏好解析
//!
//! 从账号系统读取用户档案，供调度器做渠道资格判断。
//! 用户不存在是整个调度过程中唯一的不可恢复错误。

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use fleet_shared::notifications::UserProfile;

use crate::error::DispatchError;

/// 用户查询接口
///
/// 由账号系统实现；调度引擎只读，不修改任何用户数据。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// 按用户 ID 查询档案，不存在时返回 None
    async fn get_user(&self, user_id: &str) -> fleet_shared::error::Result<Option<UserProfile>>;
}

/// 偏好解析器
///
/// `UserLookup` 之上的薄封装，把「用户不存在」归一为不可恢复错误。
pub struct PreferenceResolver {
    users: Arc<dyn UserLookup>,
}

impl PreferenceResolver {
    pub fn new(users: Arc<dyn UserLookup>) -> Self {
        Self { users }
    }

    /// 解析用户档案与联系方式
    pub async fn resolve(&self, user_id: &str) -> Result<UserProfile, DispatchError> {
        match self.users.get_user(user_id).await {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => Err(DispatchError::UserNotFound {
                user_id: user_id.to_string(),
            }),
            Err(e) => Err(DispatchError::Shared(e)),
        }
    }
}

/// 内存用户目录
///
/// DashMap 实现的 `UserLookup`，用于开发环境与测试。
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, UserProfile>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入或覆盖用户档案
    pub fn insert(&self, profile: UserProfile) {
        self.users.insert(profile.user_id.clone(), profile);
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl UserLookup for InMemoryUserDirectory {
    async fn get_user(&self, user_id: &str) -> fleet_shared::error::Result<Option<UserProfile>> {
        Ok(self.users.get(user_id).map(|entry| entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_shared::error::FleetError;
    use fleet_shared::notifications::Language;

    #[tokio::test]
    async fn test_resolve_existing_user() {
        let directory = InMemoryUserDirectory::new();
        directory.insert(
            UserProfile::new("driver-001")
                .with_email("driver001@fleet.example.com")
                .with_language(Language::Zh),
        );

        let resolver = PreferenceResolver::new(Arc::new(directory));
        let profile = resolver.resolve("driver-001").await.unwrap();

        assert_eq!(profile.user_id, "driver-001");
        assert_eq!(
            profile.email.as_deref(),
            Some("driver001@fleet.example.com")
        );
        assert_eq!(profile.preferred_language, Language::Zh);
    }

    #[tokio::test]
    async fn test_resolve_missing_user() {
        let resolver = PreferenceResolver::new(Arc::new(InMemoryUserDirectory::new()));

        let err = resolver.resolve("driver-404").await.unwrap_err();
        assert!(matches!(err, DispatchError::UserNotFound { .. }));
        assert_eq!(err.to_string(), "用户不存在: driver-404");
    }

    #[tokio::test]
    async fn test_resolve_lookup_failure() {
        // 账号系统故障原样透传，调度器按不可恢复处理
        let mut mock = MockUserLookup::new();
        mock.expect_get_user()
            .returning(|_| Err(FleetError::Internal("账号服务不可用".to_string())));

        let resolver = PreferenceResolver::new(Arc::new(mock));
        let err = resolver.resolve("driver-001").await.unwrap_err();

        assert!(matches!(err, DispatchError::Shared(_)));
    }

    #[tokio::test]
    async fn test_insert_overwrites() {
        let directory = InMemoryUserDirectory::new();
        directory.insert(UserProfile::new("driver-001"));
        directory.insert(UserProfile::new("driver-001").with_phone("+8613800138000"));

        assert_eq!(directory.count(), 1);
        let profile = directory.get_user("driver-001").await.unwrap().unwrap();
        assert_eq!(profile.phone.as_deref(), Some("+8613800138000"));
    }
}
