//! 通知调度服务
//!
//! 加载配置、初始化日志，并装配内存协作方的调度器。
//! 生产部署由外围 REST 服务注入真实的存储、账号系统与渠道供应商。

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use fleet_shared::config::AppConfig;
use notification_dispatcher::{
    InMemoryDeviceRegistry, InMemoryNotificationStore, InMemoryUserDirectory,
    NotificationDispatcher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("notification-dispatcher")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    if config.observability.log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!(
        service = %config.service_name,
        environment = %config.environment,
        "Starting notification-dispatcher..."
    );

    let _dispatcher = NotificationDispatcher::new(
        Arc::new(InMemoryUserDirectory::new()),
        Arc::new(InMemoryNotificationStore::new()),
        Arc::new(InMemoryDeviceRegistry::new()),
        config.notification.clone(),
    );

    info!("通知调度器已就绪");
    Ok(())
}
