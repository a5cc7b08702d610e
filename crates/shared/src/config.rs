//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。
//! 渠道凭据的有无在适配器构造期读取一次，决定渠道走真实发送
//! 还是软降级（只记录日志并报告成功）。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::notifications::{Language, NotificationKind};

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// 单渠道配置
///
/// 各外部渠道的延迟特性不同，超时按渠道单独配置。
/// endpoint/api_key 任一存在即视为已配置凭据。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub enabled: bool,
    /// 请求超时（毫秒）
    pub timeout_ms: u64,
    /// API 端点（如有）
    pub endpoint: Option<String>,
    /// API 密钥（如有）
    pub api_key: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 5000,
            endpoint: None,
            api_key: None,
        }
    }
}

impl ChannelConfig {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// 是否配置了外部凭据
    pub fn has_credentials(&self) -> bool {
        self.endpoint.is_some() || self.api_key.is_some()
    }
}

/// 各渠道的强制下发标记
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForcedChannels {
    pub email: bool,
    pub sms: bool,
    pub push: bool,
}

/// 按通知类型的渠道强制策略
///
/// 高危通知无视用户偏好强制下发的规则。原实现将这些规则散落在
/// 各业务调用点，这里集中为配置数据，避免行为随调用点漂移。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForcePolicy {
    /// 证件已过期：强制邮件
    pub document_expired_email: bool,
    /// 证件已过期：强制短信
    pub document_expired_sms: bool,
    /// 培训逾期：强制短信
    pub assignment_overdue_sms: bool,
    /// 证件剩余有效天数不超过该值时强制短信提醒
    pub document_expiring_sms_within_days: i64,
}

impl Default for ForcePolicy {
    fn default() -> Self {
        Self {
            document_expired_email: true,
            document_expired_sms: true,
            assignment_overdue_sms: true,
            document_expiring_sms_within_days: 7,
        }
    }
}

impl ForcePolicy {
    /// 计算指定通知类型的强制渠道
    ///
    /// 对通知类型做穷尽匹配，新增类型时编译器会强制补充策略分支。
    pub fn force_flags(&self, kind: NotificationKind, days_left: Option<i64>) -> ForcedChannels {
        match kind {
            NotificationKind::DocumentExpired => ForcedChannels {
                email: self.document_expired_email,
                sms: self.document_expired_sms,
                push: false,
            },
            NotificationKind::AssignmentOverdue => ForcedChannels {
                email: false,
                sms: self.assignment_overdue_sms,
                push: false,
            },
            NotificationKind::DocumentExpiring => ForcedChannels {
                email: false,
                sms: days_left
                    .is_some_and(|d| d <= self.document_expiring_sms_within_days),
                push: false,
            },
            NotificationKind::AssignmentCreated
            | NotificationKind::AssignmentDueSoon
            | NotificationKind::TrainingCompleted
            | NotificationKind::Reminder => ForcedChannels::default(),
        }
    }
}

/// 通知调度配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// 模板缺失时的回退语言
    pub default_language: Language,
    /// 批量发送的并发上限，防止对外部渠道无界扇出
    pub batch_concurrency: usize,
    pub email: ChannelConfig,
    pub sms: ChannelConfig,
    pub push: ChannelConfig,
    pub webhook: ChannelConfig,
    pub force_policy: ForcePolicy,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_language: Language::En,
            batch_concurrency: 8,
            email: ChannelConfig::new(true).with_timeout(10000),
            sms: ChannelConfig::new(true).with_timeout(5000),
            push: ChannelConfig::new(true).with_timeout(3000),
            webhook: ChannelConfig::new(true).with_timeout(5000),
            force_policy: ForcePolicy::default(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub observability: ObservabilityConfig,
    pub notification: NotificationConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（FLEET_ 前缀，如 FLEET_NOTIFICATION_BATCH_CONCURRENCY）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("FLEET_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{env}.toml"))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{service_name}.toml")))
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("FLEET")
                    .separator("_")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}
