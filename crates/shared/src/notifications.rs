//! 通知领域模型
//!
//! 定义通知调度引擎的核心数据结构：通知类型、投递渠道、调度请求、
//! 调度结果、站内信记录与推送设备。所有跨 crate 共享的通知相关类型
//! 集中在此，与具体渠道实现解耦。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Language — 通知语言
// ---------------------------------------------------------------------------

/// 通知语言
///
/// 固定的小语言集合。未识别的语言代码在解析时回退到给定默认语言，
/// 本地化解析器内部还有逐模板的回退链，这里不做更多容错。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    /// 解析语言代码，未识别时回退到 fallback
    pub fn from_code(code: &str, fallback: Language) -> Self {
        match code.to_ascii_lowercase().as_str() {
            "en" => Self::En,
            "zh" => Self::Zh,
            _ => fallback,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// NotificationKind — 通知类型
// ---------------------------------------------------------------------------

/// 通知类型枚举
///
/// 覆盖培训任务生命周期与司机证件状态的全部通知场景。
/// 封闭枚举保证新增类型时模板键、webhook 白名单等匹配逻辑
/// 必须同步补充分支。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// 新培训任务已分配
    AssignmentCreated,
    /// 培训任务即将到期
    AssignmentDueSoon,
    /// 培训任务已逾期
    AssignmentOverdue,
    /// 培训已完成
    TrainingCompleted,
    /// 证件即将过期
    DocumentExpiring,
    /// 证件已过期
    DocumentExpired,
    /// 通用提醒
    Reminder,
}

impl NotificationKind {
    /// 本地化模板键
    pub fn template_key(&self) -> &'static str {
        match self {
            Self::AssignmentCreated => "assignment_created",
            Self::AssignmentDueSoon => "assignment_due_soon",
            Self::AssignmentOverdue => "assignment_overdue",
            Self::TrainingCompleted => "training_completed",
            Self::DocumentExpiring => "document_expiring",
            Self::DocumentExpired => "document_expired",
            Self::Reminder => "reminder",
        }
    }

    /// 对外 webhook 事件名
    ///
    /// 只有外部系统关心的状态变化会触发 webhook：任务创建/逾期、
    /// 培训完成、证件状态变化。到期提醒与通用提醒属于站内提醒语义，
    /// 永不外发。
    pub fn webhook_event(&self) -> Option<&'static str> {
        match self {
            Self::AssignmentCreated => Some("assignment.created"),
            Self::AssignmentOverdue => Some("assignment.overdue"),
            Self::TrainingCompleted => Some("training.completed"),
            Self::DocumentExpiring => Some("document.expiring"),
            Self::DocumentExpired => Some("document.expired"),
            Self::AssignmentDueSoon | Self::Reminder => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 与 serde 的 SCREAMING_SNAKE_CASE 保持一致，便于日志与负载中统一引用
        let s = match self {
            Self::AssignmentCreated => "ASSIGNMENT_CREATED",
            Self::AssignmentDueSoon => "ASSIGNMENT_DUE_SOON",
            Self::AssignmentOverdue => "ASSIGNMENT_OVERDUE",
            Self::TrainingCompleted => "TRAINING_COMPLETED",
            Self::DocumentExpiring => "DOCUMENT_EXPIRING",
            Self::DocumentExpired => "DOCUMENT_EXPIRED",
            Self::Reminder => "REMINDER",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Channel — 投递渠道
// ---------------------------------------------------------------------------

/// 通知投递渠道
///
/// 站内信是唯一的权威记录渠道，其余渠道均为尽力投递。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    InApp,
    Email,
    Sms,
    Push,
    Webhook,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InApp => "IN_APP",
            Self::Email => "EMAIL",
            Self::Sms => "SMS",
            Self::Push => "PUSH",
            Self::Webhook => "WEBHOOK",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// UserProfile — 用户通知档案
// ---------------------------------------------------------------------------

/// 用户通知档案
///
/// 账号系统拥有并维护的用户投影，本引擎只读。
/// 邮件与短信偏好默认关闭，推送默认开启（移动端司机的首选渠道）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub preferred_language: Language,
    pub prefer_email: bool,
    pub prefer_sms: bool,
    pub prefer_push: bool,
    /// 所属车队，透传到 webhook 负载
    pub fleet_id: Option<String>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            phone: None,
            preferred_language: Language::default(),
            prefer_email: false,
            prefer_sms: false,
            prefer_push: true,
            fleet_id: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.preferred_language = language;
        self
    }

    /// 一次性设置三个渠道偏好开关
    pub fn with_preferences(mut self, email: bool, sms: bool, push: bool) -> Self {
        self.prefer_email = email;
        self.prefer_sms = sms;
        self.prefer_push = push;
        self
    }

    pub fn with_fleet_id(mut self, fleet_id: impl Into<String>) -> Self {
        self.fleet_id = Some(fleet_id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Device — 推送设备
// ---------------------------------------------------------------------------

/// 推送设备平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    Ios,
    Android,
    Web,
}

impl std::fmt::Display for DevicePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
        };
        write!(f, "{s}")
    }
}

/// 推送设备
///
/// 每个用户可注册多台设备；token 全局唯一，重复注册按 token 做 upsert。
/// 永久失效的 token 只停用不删除，保留排查痕迹。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub user_id: String,
    pub device_token: String,
    pub platform: DevicePlatform,
    pub is_active: bool,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    pub fn new(
        user_id: impl Into<String>,
        device_token: impl Into<String>,
        platform: DevicePlatform,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            device_token: device_token.into(),
            platform,
            is_active: true,
            last_used_at: now,
            created_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationRequest — 调度请求
// ---------------------------------------------------------------------------

/// 通知请求
///
/// 一次调度调用的完整输入，构造后不可变。
/// force_* 标记由调用方设置，用于无视用户偏好强制下发对应渠道；
/// 按通知类型的强制策略见 `config::ForcePolicy`，二者取并集。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    /// 请求唯一标识（UUID v7）
    pub request_id: String,
    /// 目标用户 ID
    pub user_id: String,
    pub kind: NotificationKind,
    /// 模板变量（用于渲染标题与正文）
    pub variables: HashMap<String, String>,
    /// 透传到推送 data 与 webhook 负载的业务数据
    pub data: HashMap<String, serde_json::Value>,
    pub assignment_id: Option<i64>,
    pub document_id: Option<i64>,
    pub force_email: bool,
    pub force_sms: bool,
    pub force_push: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationRequest {
    pub fn new(user_id: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            request_id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            kind,
            variables: HashMap::new(),
            data: HashMap::new(),
            assignment_id: None,
            document_id: None,
            force_email: false,
            force_sms: false,
            force_push: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_assignment(mut self, assignment_id: i64) -> Self {
        self.assignment_id = Some(assignment_id);
        self
    }

    pub fn with_document(mut self, document_id: i64) -> Self {
        self.document_id = Some(document_id);
        self
    }

    pub fn with_force_email(mut self) -> Self {
        self.force_email = true;
        self
    }

    pub fn with_force_sms(mut self) -> Self {
        self.force_sms = true;
        self
    }

    pub fn with_force_push(mut self) -> Self {
        self.force_push = true;
        self
    }

    /// 从模板变量中读取剩余天数，供证件到期的强制策略判断
    pub fn days_left(&self) -> Option<i64> {
        self.variables.get("days_left").and_then(|v| v.parse().ok())
    }

    /// 为批量发送复制请求：重设目标用户并生成新的请求标识
    pub fn for_user(&self, user_id: impl Into<String>) -> Self {
        let mut request = self.clone();
        request.request_id = Uuid::now_v7().to_string();
        request.user_id = user_id.into();
        request.created_at = Utc::now();
        request
    }
}

/// 请求构建器
///
/// 覆盖后端各业务调用点的便捷构造方法，变量命名与模板占位符一致。
pub struct RequestBuilder;

impl RequestBuilder {
    /// 新培训任务已分配
    pub fn assignment_created(
        user_id: impl Into<String>,
        assignment_id: i64,
        course_name: impl Into<String>,
        due_date: impl Into<String>,
    ) -> NotificationRequest {
        let course_name = course_name.into();
        NotificationRequest::new(user_id, NotificationKind::AssignmentCreated)
            .with_assignment(assignment_id)
            .with_variable("course_name", &course_name)
            .with_variable("due_date", due_date)
            .with_data("assignment_id", serde_json::json!(assignment_id))
            .with_data("course_name", serde_json::json!(&course_name))
    }

    /// 培训任务即将到期
    pub fn assignment_due_soon(
        user_id: impl Into<String>,
        assignment_id: i64,
        course_name: impl Into<String>,
        days_left: i64,
    ) -> NotificationRequest {
        let course_name = course_name.into();
        NotificationRequest::new(user_id, NotificationKind::AssignmentDueSoon)
            .with_assignment(assignment_id)
            .with_variable("course_name", &course_name)
            .with_variable("days_left", days_left.to_string())
            .with_data("assignment_id", serde_json::json!(assignment_id))
            .with_data("days_left", serde_json::json!(days_left))
    }

    /// 培训任务已逾期
    pub fn assignment_overdue(
        user_id: impl Into<String>,
        assignment_id: i64,
        course_name: impl Into<String>,
    ) -> NotificationRequest {
        let course_name = course_name.into();
        NotificationRequest::new(user_id, NotificationKind::AssignmentOverdue)
            .with_assignment(assignment_id)
            .with_variable("course_name", &course_name)
            .with_data("assignment_id", serde_json::json!(assignment_id))
            .with_data("course_name", serde_json::json!(&course_name))
    }

    /// 培训已完成
    pub fn training_completed(
        user_id: impl Into<String>,
        assignment_id: i64,
        course_name: impl Into<String>,
    ) -> NotificationRequest {
        let course_name = course_name.into();
        NotificationRequest::new(user_id, NotificationKind::TrainingCompleted)
            .with_assignment(assignment_id)
            .with_variable("course_name", &course_name)
            .with_data("assignment_id", serde_json::json!(assignment_id))
            .with_data("course_name", serde_json::json!(&course_name))
    }

    /// 证件即将过期
    pub fn document_expiring(
        user_id: impl Into<String>,
        document_id: i64,
        document_name: impl Into<String>,
        days_left: i64,
    ) -> NotificationRequest {
        let document_name = document_name.into();
        NotificationRequest::new(user_id, NotificationKind::DocumentExpiring)
            .with_document(document_id)
            .with_variable("document_name", &document_name)
            .with_variable("days_left", days_left.to_string())
            .with_data("document_id", serde_json::json!(document_id))
            .with_data("days_left", serde_json::json!(days_left))
    }

    /// 证件已过期
    pub fn document_expired(
        user_id: impl Into<String>,
        document_id: i64,
        document_name: impl Into<String>,
    ) -> NotificationRequest {
        let document_name = document_name.into();
        NotificationRequest::new(user_id, NotificationKind::DocumentExpired)
            .with_document(document_id)
            .with_variable("document_name", &document_name)
            .with_data("document_id", serde_json::json!(document_id))
            .with_data("document_name", serde_json::json!(&document_name))
    }

    /// 通用提醒
    pub fn reminder(
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> NotificationRequest {
        NotificationRequest::new(user_id, NotificationKind::Reminder)
            .with_variable("message", message)
    }
}

// ---------------------------------------------------------------------------
// NotificationRecord — 站内信记录
// ---------------------------------------------------------------------------

/// 站内信记录
///
/// 每次调度调用恰好创建一条，是用户侧唯一权威的通知记录；
/// 任何外部渠道失败都不影响该记录的存在。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    /// 恒为 IN_APP
    pub channel: Channel,
    pub created_at: DateTime<Utc>,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub related_assignment_id: Option<i64>,
    pub related_document_id: Option<i64>,
}

impl NotificationRecord {
    /// 由请求与渲染结果构建站内信记录
    ///
    /// 站内信写入即视为送达，is_sent/sent_at 在创建时一并落定。
    pub fn from_request(
        request: &NotificationRequest,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: request.user_id.clone(),
            title: title.into(),
            body: body.into(),
            kind: request.kind,
            channel: Channel::InApp,
            created_at: now,
            is_sent: true,
            sent_at: Some(now),
            related_assignment_id: request.assignment_id,
            related_document_id: request.document_id,
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchResult — 调度结果
// ---------------------------------------------------------------------------

/// 单渠道调度结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOutcome {
    /// 本次调度是否实际尝试了该渠道
    pub attempted: bool,
    pub success: bool,
    pub error: Option<String>,
}

impl ChannelOutcome {
    pub fn success() -> Self {
        Self {
            attempted: true,
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            attempted: true,
            success: false,
            error: Some(error.into()),
        }
    }

    /// 渠道未参与本次调度（偏好关闭、缺少联系方式或不在白名单内）
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            attempted: false,
            success: false,
            error: Some(reason.into()),
        }
    }

    pub fn not_attempted() -> Self {
        Self {
            attempted: false,
            success: false,
            error: None,
        }
    }
}

/// 推送渠道调度结果
///
/// 在通用结果之外记录设备维度统计。只要有任一设备送达即视为推送成功。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushOutcome {
    pub attempted: bool,
    pub success: bool,
    pub error: Option<String>,
    /// 本次尝试的活跃设备数
    pub device_count: usize,
    /// 成功送达的设备数
    pub delivered: usize,
}

impl PushOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            attempted: false,
            success: false,
            error: Some(reason.into()),
            device_count: 0,
            delivered: 0,
        }
    }

    pub fn not_attempted() -> Self {
        Self {
            attempted: false,
            success: false,
            error: None,
            device_count: 0,
            delivered: 0,
        }
    }

    /// 按设备维度结果聚合
    pub fn from_devices(device_count: usize, delivered: usize, errors: Vec<String>) -> Self {
        Self {
            attempted: true,
            success: delivered > 0,
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
            device_count,
            delivered,
        }
    }
}

/// 调度结果
///
/// 聚合五个渠道的结果；不持久化，同步返回给调用方用于日志与遥测。
/// 任一外部渠道的失败不影响其他渠道的结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub request_id: String,
    pub user_id: String,
    pub in_app: ChannelOutcome,
    pub email: ChannelOutcome,
    pub sms: ChannelOutcome,
    pub push: PushOutcome,
    pub webhook: ChannelOutcome,
    /// 不可恢复错误（目标用户不存在）；此时所有渠道均未尝试
    pub error: Option<String>,
    /// 调度耗时（毫秒）
    pub duration_ms: u64,
}

impl DispatchResult {
    /// 构建不可恢复错误的结果，所有渠道标记为未尝试
    pub fn unrecoverable(
        request_id: impl Into<String>,
        user_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            user_id: user_id.into(),
            in_app: ChannelOutcome::not_attempted(),
            email: ChannelOutcome::not_attempted(),
            sms: ChannelOutcome::not_attempted(),
            push: PushOutcome::not_attempted(),
            webhook: ChannelOutcome::not_attempted(),
            error: Some(error.into()),
            duration_ms: 0,
        }
    }

    /// 是否存在不可恢复错误
    pub fn is_unrecoverable(&self) -> bool {
        self.error.is_some()
    }

    /// 实际尝试的渠道数
    pub fn attempted_count(&self) -> usize {
        let mut count = [
            &self.in_app,
            &self.email,
            &self.sms,
            &self.webhook,
        ]
        .iter()
        .filter(|o| o.attempted)
        .count();
        if self.push.attempted {
            count += 1;
        }
        count
    }

    /// 尝试且成功的渠道数
    pub fn success_count(&self) -> usize {
        let mut count = [
            &self.in_app,
            &self.email,
            &self.sms,
            &self.webhook,
        ]
        .iter()
        .filter(|o| o.attempted && o.success)
        .count();
        if self.push.attempted && self.push.success {
            count += 1;
        }
        count
    }

    /// 尝试且失败的渠道数
    pub fn failure_count(&self) -> usize {
        self.attempted_count() - self.success_count()
    }

    /// 是否部分成功
    pub fn is_partial_success(&self) -> bool {
        let success = self.success_count();
        success > 0 && success < self.attempted_count()
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_code() {
        assert_eq!(Language::from_code("en", Language::En), Language::En);
        assert_eq!(Language::from_code("ZH", Language::En), Language::Zh);
        // 未识别的语言代码回退到默认语言
        assert_eq!(Language::from_code("tr", Language::En), Language::En);
        assert_eq!(Language::from_code("", Language::Zh), Language::Zh);
    }

    #[test]
    fn test_notification_kind_template_key() {
        assert_eq!(
            NotificationKind::AssignmentCreated.template_key(),
            "assignment_created"
        );
        assert_eq!(
            NotificationKind::DocumentExpired.template_key(),
            "document_expired"
        );
    }

    #[test]
    fn test_webhook_event_allow_list() {
        // 白名单内：创建、逾期、完成、证件状态变化
        assert_eq!(
            NotificationKind::AssignmentCreated.webhook_event(),
            Some("assignment.created")
        );
        assert_eq!(
            NotificationKind::AssignmentOverdue.webhook_event(),
            Some("assignment.overdue")
        );
        assert_eq!(
            NotificationKind::TrainingCompleted.webhook_event(),
            Some("training.completed")
        );
        assert_eq!(
            NotificationKind::DocumentExpiring.webhook_event(),
            Some("document.expiring")
        );
        assert_eq!(
            NotificationKind::DocumentExpired.webhook_event(),
            Some("document.expired")
        );

        // 提醒类通知永不外发
        assert_eq!(NotificationKind::AssignmentDueSoon.webhook_event(), None);
        assert_eq!(NotificationKind::Reminder.webhook_event(), None);
    }

    #[test]
    fn test_request_serialization() {
        let request = RequestBuilder::assignment_created(
            "driver-001",
            42,
            "危险品运输安全培训",
            "2025-09-01",
        );

        let json = serde_json::to_string(&request).unwrap();

        // 验证 camelCase 序列化格式
        assert!(json.contains("requestId"));
        assert!(json.contains("userId"));
        assert!(json.contains("assignmentId"));
        assert!(json.contains("ASSIGNMENT_CREATED"));

        let deserialized: NotificationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.user_id, "driver-001");
        assert_eq!(deserialized.kind, NotificationKind::AssignmentCreated);
        assert_eq!(deserialized.assignment_id, Some(42));
        assert_eq!(
            deserialized.variables.get("course_name").unwrap(),
            "危险品运输安全培训"
        );
    }

    #[test]
    fn test_request_force_flags() {
        let request = NotificationRequest::new("driver-001", NotificationKind::DocumentExpired)
            .with_force_email()
            .with_force_sms();

        assert!(request.force_email);
        assert!(request.force_sms);
        assert!(!request.force_push);
    }

    #[test]
    fn test_request_days_left() {
        let request = RequestBuilder::document_expiring("driver-001", 7, "驾驶证", 5);
        assert_eq!(request.days_left(), Some(5));

        let without = RequestBuilder::reminder("driver-001", "请完成体检");
        assert_eq!(without.days_left(), None);
    }

    #[test]
    fn test_request_for_user_restamps_identity() {
        let template = RequestBuilder::reminder("placeholder", "明早八点安全例会");
        let copy = template.for_user("driver-002");

        assert_eq!(copy.user_id, "driver-002");
        assert_ne!(copy.request_id, template.request_id);
        // 业务内容原样保留
        assert_eq!(copy.kind, NotificationKind::Reminder);
        assert_eq!(copy.variables, template.variables);
    }

    #[test]
    fn test_user_profile_defaults() {
        let profile = UserProfile::new("driver-001");

        // 推送默认开启，邮件与短信默认关闭
        assert!(profile.prefer_push);
        assert!(!profile.prefer_email);
        assert!(!profile.prefer_sms);
        assert_eq!(profile.preferred_language, Language::En);
        assert!(profile.email.is_none());
    }

    #[test]
    fn test_notification_record_from_request() {
        let request = RequestBuilder::assignment_created("driver-001", 42, "防御性驾驶", "2025-09-01");
        let record = NotificationRecord::from_request(&request, "新的培训任务", "您已被分配培训课程");

        assert_eq!(record.user_id, "driver-001");
        assert_eq!(record.channel, Channel::InApp);
        assert_eq!(record.related_assignment_id, Some(42));
        assert!(record.related_document_id.is_none());
        assert!(record.is_sent);
        assert!(record.sent_at.is_some());
    }

    #[test]
    fn test_channel_outcome_constructors() {
        let ok = ChannelOutcome::success();
        assert!(ok.attempted && ok.success);
        assert!(ok.error.is_none());

        let failed = ChannelOutcome::failed("短信网关超时");
        assert!(failed.attempted && !failed.success);
        assert_eq!(failed.error.as_deref(), Some("短信网关超时"));

        let skipped = ChannelOutcome::skipped("用户未开启短信通知");
        assert!(!skipped.attempted);
        assert!(skipped.error.is_some());
    }

    #[test]
    fn test_push_outcome_from_devices() {
        let outcome = PushOutcome::from_devices(2, 1, vec!["NotRegistered".to_string()]);

        assert!(outcome.attempted);
        // 任一设备送达即视为成功
        assert!(outcome.success);
        assert_eq!(outcome.device_count, 2);
        assert_eq!(outcome.delivered, 1);
        assert!(outcome.error.is_some());

        let none_delivered = PushOutcome::from_devices(2, 0, vec!["timeout".to_string()]);
        assert!(!none_delivered.success);
    }

    #[test]
    fn test_dispatch_result_counters() {
        let mut result = DispatchResult::unrecoverable("req-1", "driver-001", "用户不存在");
        assert!(result.is_unrecoverable());
        assert_eq!(result.attempted_count(), 0);

        result.error = None;
        result.in_app = ChannelOutcome::success();
        result.email = ChannelOutcome::failed("SMTP 连接失败");
        result.sms = ChannelOutcome::skipped("用户未开启短信通知");
        result.push = PushOutcome::from_devices(1, 1, vec![]);

        assert_eq!(result.attempted_count(), 3);
        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failure_count(), 1);
        assert!(result.is_partial_success());
    }

    #[test]
    fn test_dispatch_result_serialization() {
        let result = DispatchResult::unrecoverable("req-1", "driver-404", "用户不存在");
        let json = serde_json::to_string(&result).unwrap();

        assert!(json.contains("requestId"));
        assert!(json.contains("inApp"));
        assert!(json.contains("durationMs"));
    }

    #[test]
    fn test_device_new() {
        let device = Device::new("driver-001", "token-abc", DevicePlatform::Android);

        assert!(device.is_active);
        assert_eq!(device.user_id, "driver-001");
        assert_eq!(device.device_token, "token-abc");
        assert!(!device.id.is_empty());
    }
}
