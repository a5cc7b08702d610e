//! 通知调度器
//!
//! 消费通知请求，解析用户偏好与本地化内容，先落站内信建立权威记录，
//! 再向符合条件的外部渠道并发扇出，聚合为调度结果同步返回。
//! 站内信的成败独立于一切外部渠道；外部渠道之间互不影响。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use fleet_shared::config::NotificationConfig;
use fleet_shared::notifications::{
    ChannelOutcome, DispatchResult, NotificationRecord, NotificationRequest, PushOutcome,
    UserProfile,
};

use crate::channels::{
    EmailAdapter, EmailProvider, PushAdapter, PushProvider, SmsAdapter, SmsProvider,
    WebhookAdapter, WebhookSink,
};
use crate::devices::DeviceRegistry;
use crate::localization::{LocalizationResolver, RenderedMessage};
use crate::preferences::{PreferenceResolver, UserLookup};
use crate::store::InAppStore;

/// 通知调度器
///
/// 用户查询、站内信存储与设备注册表为注入的协作方；
/// 四个外部渠道适配器默认软降级，真实供应商通过 `with_*` 注入。
pub struct NotificationDispatcher {
    preferences: PreferenceResolver,
    localizer: LocalizationResolver,
    store: Arc<dyn InAppStore>,
    devices: Arc<dyn DeviceRegistry>,
    email: EmailAdapter,
    sms: SmsAdapter,
    push: PushAdapter,
    webhook: WebhookAdapter,
    config: NotificationConfig,
}

impl NotificationDispatcher {
    pub fn new(
        users: Arc<dyn UserLookup>,
        store: Arc<dyn InAppStore>,
        devices: Arc<dyn DeviceRegistry>,
        config: NotificationConfig,
    ) -> Self {
        Self {
            preferences: PreferenceResolver::new(users),
            localizer: LocalizationResolver::with_defaults(config.default_language),
            store,
            devices,
            email: EmailAdapter::unconfigured(config.email.clone()),
            sms: SmsAdapter::unconfigured(config.sms.clone()),
            push: PushAdapter::unconfigured(config.push.clone()),
            webhook: WebhookAdapter::from_config(config.webhook.clone()),
            config,
        }
    }

    pub fn with_email_provider(mut self, provider: Arc<dyn EmailProvider>) -> Self {
        self.email = EmailAdapter::new(provider, self.config.email.clone());
        self
    }

    pub fn with_sms_provider(mut self, provider: Arc<dyn SmsProvider>) -> Self {
        self.sms = SmsAdapter::new(provider, self.config.sms.clone());
        self
    }

    pub fn with_push_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.push = PushAdapter::new(provider, self.config.push.clone());
        self
    }

    pub fn with_webhook_sink(mut self, sink: Arc<dyn WebhookSink>) -> Self {
        self.webhook = WebhookAdapter::new(sink, self.config.webhook.clone());
        self
    }

    pub fn with_localizer(mut self, localizer: LocalizationResolver) -> Self {
        self.localizer = localizer;
        self
    }

    /// 调度单条通知
    ///
    /// 唯一的不可恢复错误是目标用户无法解析；所有渠道失败都收敛在
    /// 返回的结果中，绝不向调用方抛出。
    #[instrument(
        skip(self, request),
        fields(
            request_id = %request.request_id,
            user_id = %request.user_id,
            kind = %request.kind
        )
    )]
    pub async fn dispatch(&self, request: &NotificationRequest) -> DispatchResult {
        let start = Instant::now();

        info!("开始调度通知");

        // 1. 解析用户偏好与联系方式；用户不存在直接终止
        let profile = match self.preferences.resolve(&request.user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "用户解析失败，调度终止");
                return DispatchResult::unrecoverable(
                    &request.request_id,
                    &request.user_id,
                    e.to_string(),
                );
            }
        };

        // 2. 本地化渲染（缺失模板沿回退链降级，永不失败）
        let rendered = self.localizer.resolve(
            request.kind.template_key(),
            profile.preferred_language,
            &request.variables,
        );

        // 3. 无条件写入站内信，先于任何网络调用建立权威记录
        let record = NotificationRecord::from_request(request, &rendered.title, &rendered.body);
        let in_app = match self.store.create_notification(&record).await {
            Ok(record_id) => {
                debug!(record_id, "站内信已写入");
                ChannelOutcome::success()
            }
            Err(e) => {
                error!(error = %e, "站内信写入失败");
                ChannelOutcome::failed(e.to_string())
            }
        };

        // 4. 渠道资格 = 用户偏好 OR 请求强制标记 OR 类型策略
        let forced = self
            .config
            .force_policy
            .force_flags(request.kind, request.days_left());
        let want_email = profile.prefer_email || request.force_email || forced.email;
        let want_sms = profile.prefer_sms || request.force_sms || forced.sms;
        let want_push = profile.prefer_push || request.force_push || forced.push;

        // 5. 并发扇出；join 屏障等全部渠道返回后再聚合
        let (email, sms, push, webhook) = tokio::join!(
            self.dispatch_email(&profile, want_email, &rendered),
            self.dispatch_sms(&profile, want_sms, &rendered),
            self.dispatch_push(&profile, want_push, request, &rendered),
            self.dispatch_webhook(&profile, request),
        );

        let result = DispatchResult {
            request_id: request.request_id.clone(),
            user_id: request.user_id.clone(),
            in_app,
            email,
            sms,
            push,
            webhook,
            error: None,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        self.log_result(&result);
        result
    }

    /// 批量调度
    ///
    /// 逐用户独立执行同一请求模板，单个用户的彻底失败不影响其余条目；
    /// 有界并发避免对外部渠道无界扇出。
    #[instrument(skip(self, user_ids, template), fields(user_count = user_ids.len()))]
    pub async fn send_to_many(
        &self,
        user_ids: &[String],
        template: &NotificationRequest,
    ) -> HashMap<String, DispatchResult> {
        info!("开始批量调度通知");

        stream::iter(user_ids.iter().map(|user_id| async move {
            let request = template.for_user(user_id);
            let result = self.dispatch(&request).await;
            (user_id.clone(), result)
        }))
        .buffer_unordered(self.config.batch_concurrency.max(1))
        .collect()
        .await
    }

    async fn dispatch_email(
        &self,
        profile: &UserProfile,
        eligible: bool,
        rendered: &RenderedMessage,
    ) -> ChannelOutcome {
        if !eligible {
            return ChannelOutcome::skipped("用户未开启邮件通知");
        }
        let Some(email) = profile.email.as_deref().filter(|e| !e.is_empty()) else {
            return ChannelOutcome::skipped("用户未绑定邮箱");
        };

        self.email.send(email, &rendered.title, &rendered.body).await
    }

    async fn dispatch_sms(
        &self,
        profile: &UserProfile,
        eligible: bool,
        rendered: &RenderedMessage,
    ) -> ChannelOutcome {
        if !eligible {
            return ChannelOutcome::skipped("用户未开启短信通知");
        }
        let Some(phone) = profile.phone.as_deref().filter(|p| !p.is_empty()) else {
            return ChannelOutcome::skipped("用户未绑定手机号");
        };

        // 短信没有独立标题，标题与正文拼接为单条消息
        let message = format!("{} - {}", rendered.title, rendered.body);
        self.sms.send(phone, &message).await
    }

    async fn dispatch_push(
        &self,
        profile: &UserProfile,
        eligible: bool,
        request: &NotificationRequest,
        rendered: &RenderedMessage,
    ) -> PushOutcome {
        if !eligible {
            return PushOutcome::skipped("用户未开启推送通知");
        }
        if !self.push.is_enabled() {
            return PushOutcome::skipped("推送渠道已禁用");
        }

        let devices = match self.devices.active_devices_for(&profile.user_id).await {
            Ok(devices) => devices,
            Err(e) => {
                error!(error = %e, "活跃设备查询失败");
                return PushOutcome::from_devices(0, 0, vec![e.to_string()]);
            }
        };
        if devices.is_empty() {
            return PushOutcome::skipped("用户没有活跃设备");
        }

        let data = Self::build_push_data(request);
        let results = self
            .push
            .send_to_devices(&devices, &rendered.title, &rendered.body, &data)
            .await;

        // 永久失效的 token 停用对应设备；瞬时错误保持设备活跃。
        // 各 token 的停用相互独立，失败只记录日志。
        let mut delivered = 0;
        let mut errors = Vec::new();
        for device_result in &results {
            if device_result.success {
                delivered += 1;
                continue;
            }
            if let Some(err) = &device_result.error {
                errors.push(format!("{}: {err}", device_result.device_token));
            }
            if device_result.permanently_invalid {
                warn!(
                    device_token = %device_result.device_token,
                    "token 永久失效，停用设备"
                );
                if let Err(e) = self.devices.deactivate(&device_result.device_token).await {
                    error!(
                        device_token = %device_result.device_token,
                        error = %e,
                        "停用设备失败"
                    );
                }
            }
        }

        PushOutcome::from_devices(results.len(), delivered, errors)
    }

    async fn dispatch_webhook(
        &self,
        profile: &UserProfile,
        request: &NotificationRequest,
    ) -> ChannelOutcome {
        // 白名单由通知类型的穷尽匹配给出；提醒类通知永不外发
        let Some(event) = request.kind.webhook_event() else {
            return ChannelOutcome::skipped("通知类型不在 webhook 白名单内");
        };

        // 负载使用原始类型与变量，不携带本地化文本
        let payload = serde_json::json!({
            "type": request.kind,
            "variables": request.variables,
            "data": request.data,
            "assignmentId": request.assignment_id,
            "documentId": request.document_id,
        });

        self.webhook
            .send(event, &payload, profile.fleet_id.as_deref(), &profile.user_id)
            .await
    }

    /// 推送 data 为字符串化的模板变量加业务关联 ID
    fn build_push_data(request: &NotificationRequest) -> HashMap<String, String> {
        let mut data = request.variables.clone();
        for (key, value) in &request.data {
            let coerced = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            data.entry(key.clone()).or_insert(coerced);
        }
        data.insert("kind".to_string(), request.kind.to_string());
        if let Some(id) = request.assignment_id {
            data.insert("assignment_id".to_string(), id.to_string());
        }
        if let Some(id) = request.document_id {
            data.insert("document_id".to_string(), id.to_string());
        }
        data
    }

    /// 分级记录调度结果
    fn log_result(&self, result: &DispatchResult) {
        let attempted = result.attempted_count();
        let success = result.success_count();

        if success == attempted {
            info!(
                request_id = %result.request_id,
                attempted,
                duration_ms = result.duration_ms,
                "通知调度完成（全部成功）"
            );
        } else if result.is_partial_success() {
            warn!(
                request_id = %result.request_id,
                attempted,
                success,
                duration_ms = result.duration_ms,
                "通知调度完成（部分成功）"
            );
        } else {
            error!(
                request_id = %result.request_id,
                attempted,
                duration_ms = result.duration_ms,
                "通知调度完成（全部失败）"
            );
        }
    }
}
