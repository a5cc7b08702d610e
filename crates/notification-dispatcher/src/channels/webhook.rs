//! webhook 通知渠道
//!
//! 将白名单内的通知事件投递到外部系统。尽力而为语义：
//! 投递失败只记录日志并反映在渠道结果中，绝不阻塞调度。
//! 负载使用原始通知类型与变量，不携带本地化文本。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use fleet_shared::config::ChannelConfig;
use fleet_shared::error::FleetError;
use fleet_shared::notifications::ChannelOutcome;

use super::call_with_timeout;

/// webhook 事件落地接口（fire-and-forget）
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn dispatch_event(
        &self,
        event: &str,
        payload: &serde_json::Value,
        fleet_id: Option<&str>,
        user_id: &str,
    ) -> fleet_shared::error::Result<()>;
}

/// 未配置端点时的空实现
pub struct NullWebhookSink;

#[async_trait]
impl WebhookSink for NullWebhookSink {
    async fn dispatch_event(
        &self,
        event: &str,
        _payload: &serde_json::Value,
        _fleet_id: Option<&str>,
        user_id: &str,
    ) -> fleet_shared::error::Result<()> {
        info!(event = %event, user_id = %user_id, "webhook 端点未配置，模拟投递");
        Ok(())
    }
}

/// HTTP webhook 落地
///
/// 将事件 POST 到配置的端点，2xx 之外的状态码视为失败。
pub struct HttpWebhookSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpWebhookSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl WebhookSink for HttpWebhookSink {
    async fn dispatch_event(
        &self,
        event: &str,
        payload: &serde_json::Value,
        fleet_id: Option<&str>,
        user_id: &str,
    ) -> fleet_shared::error::Result<()> {
        let body = serde_json::json!({
            "event": event,
            "payload": payload,
            "fleetId": fleet_id,
            "userId": user_id,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| FleetError::ExternalService {
                service: "webhook".to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FleetError::ExternalService {
                service: "webhook".to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }
        Ok(())
    }
}

/// webhook 渠道适配器
pub struct WebhookAdapter {
    sink: Arc<dyn WebhookSink>,
    config: ChannelConfig,
}

impl WebhookAdapter {
    pub fn new(sink: Arc<dyn WebhookSink>, config: ChannelConfig) -> Self {
        Self { sink, config }
    }

    /// 根据配置选择落地实现
    ///
    /// 配置了端点时走 HTTP 投递，否则软降级为空实现。
    pub fn from_config(config: ChannelConfig) -> Self {
        let sink: Arc<dyn WebhookSink> = match &config.endpoint {
            Some(endpoint) => Arc::new(HttpWebhookSink::new(endpoint.clone())),
            None => Arc::new(NullWebhookSink),
        };
        Self::new(sink, config)
    }

    /// 投递事件并翻译为统一渠道结果
    pub async fn send(
        &self,
        event: &str,
        payload: &serde_json::Value,
        fleet_id: Option<&str>,
        user_id: &str,
    ) -> ChannelOutcome {
        if !self.config.enabled {
            return ChannelOutcome::skipped("webhook 渠道已禁用");
        }

        match call_with_timeout(
            "WEBHOOK",
            self.config.timeout_ms,
            self.sink.dispatch_event(event, payload, fleet_id, user_id),
        )
        .await
        {
            Ok(()) => ChannelOutcome::success(),
            Err(e) => {
                warn!(event = %event, error = %e, "webhook 投递失败");
                ChannelOutcome::failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 记录投递调用的测试落地
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, Option<String>, String)>>,
    }

    #[async_trait]
    impl WebhookSink for RecordingSink {
        async fn dispatch_event(
            &self,
            event: &str,
            _payload: &serde_json::Value,
            fleet_id: Option<&str>,
            user_id: &str,
        ) -> fleet_shared::error::Result<()> {
            self.events.lock().unwrap().push((
                event.to_string(),
                fleet_id.map(str::to_string),
                user_id.to_string(),
            ));
            Ok(())
        }
    }

    /// 投递必然失败的测试落地
    struct FailingSink;

    #[async_trait]
    impl WebhookSink for FailingSink {
        async fn dispatch_event(
            &self,
            _event: &str,
            _payload: &serde_json::Value,
            _fleet_id: Option<&str>,
            _user_id: &str,
        ) -> fleet_shared::error::Result<()> {
            Err(FleetError::ExternalService {
                service: "webhook".to_string(),
                message: "HTTP 502 Bad Gateway".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_send_success() {
        let sink = Arc::new(RecordingSink::default());
        let adapter = WebhookAdapter::new(sink.clone(), ChannelConfig::default());

        let payload = serde_json::json!({"documentId": 7});
        let outcome = adapter
            .send("document.expired", &payload, Some("fleet-01"), "driver-001")
            .await;

        assert!(outcome.attempted && outcome.success);
        assert_eq!(
            *sink.events.lock().unwrap(),
            vec![(
                "document.expired".to_string(),
                Some("fleet-01".to_string()),
                "driver-001".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_soft() {
        let adapter = WebhookAdapter::new(Arc::new(FailingSink), ChannelConfig::default());
        let outcome = adapter
            .send("assignment.created", &serde_json::json!({}), None, "driver-001")
            .await;

        assert!(outcome.attempted && !outcome.success);
        assert!(outcome.error.unwrap().contains("502"));
    }

    #[tokio::test]
    async fn test_send_disabled_channel() {
        let adapter = WebhookAdapter::from_config(ChannelConfig::new(false));
        let outcome = adapter
            .send("document.expired", &serde_json::json!({}), None, "driver-001")
            .await;

        assert!(!outcome.attempted);
    }

    #[tokio::test]
    async fn test_null_sink_reports_success() {
        // 未配置端点时软降级为空实现
        let adapter = WebhookAdapter::from_config(ChannelConfig::default());
        let outcome = adapter
            .send("training.completed", &serde_json::json!({}), None, "driver-001")
            .await;

        assert!(outcome.attempted && outcome.success);
    }

    #[test]
    fn test_from_config_selects_http_sink() {
        let config = ChannelConfig::new(true).with_endpoint("https://hooks.example.com/fleet");
        // 仅验证构造不恐慌；真实投递由集成环境覆盖
        let _adapter = WebhookAdapter::from_config(config);
    }
}
