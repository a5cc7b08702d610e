//! 多渠道通知调度引擎
//!
//! 车队司机培训系统的通知核心：消费通知请求，按用户偏好与类型策略
//! 向站内信、邮件、短信、推送与 webhook 五个渠道扇出。
//!
//! ## 设计要点
//!
//! - **站内信权威**：每次调度先落站内信，外部渠道失败不回滚该记录
//! - **渠道隔离**：各渠道并发发送，单渠道失败不影响其他渠道
//! - **软降级**：未配置凭据的渠道记录日志并报告成功，无外部依赖即可完整演练
//! - **注入式协作方**：用户查询、站内信存储与设备注册表均为注入的
//!   trait 对象，便于用内存实现测试

pub mod channels;
pub mod devices;
pub mod dispatcher;
pub mod error;
pub mod localization;
pub mod preferences;
pub mod store;

pub use channels::{
    EmailAdapter, EmailProvider, HttpWebhookSink, NullEmailProvider, NullPushProvider,
    NullSmsProvider, NullWebhookSink, PushAdapter, PushProvider, SmsAdapter, SmsProvider,
    WebhookAdapter, WebhookSink,
};
pub use devices::{DeviceRegistry, InMemoryDeviceRegistry};
pub use dispatcher::NotificationDispatcher;
pub use error::DispatchError;
pub use localization::{LocalizationResolver, RenderedMessage};
pub use preferences::{InMemoryUserDirectory, PreferenceResolver, UserLookup};
pub use store::{InAppStore, InMemoryNotificationStore};
