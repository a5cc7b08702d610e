//! 短信通知渠道
//!
//! 通过注入的短信供应商发送；适配器负责 E.164 号码归一化，
//! 无法归一的号码按「无效号码」软失败处理，不进入供应商调用。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use fleet_shared::config::ChannelConfig;
use fleet_shared::notifications::ChannelOutcome;

use super::call_with_timeout;

/// 短信回执
#[derive(Debug, Clone)]
pub struct SmsReceipt {
    pub success: bool,
    /// 运营商侧消息标识，用于追踪投递状态
    pub message_id: Option<String>,
    pub error: Option<String>,
}

/// 短信供应商接口
///
/// 运营商网关的具体实现在引擎之外；号码已由适配器归一为 E.164。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send_sms(&self, to_e164: &str, body: &str)
    -> fleet_shared::error::Result<SmsReceipt>;
}

/// 未配置凭据时的空实现
pub struct NullSmsProvider;

#[async_trait]
impl SmsProvider for NullSmsProvider {
    async fn send_sms(
        &self,
        to_e164: &str,
        body: &str,
    ) -> fleet_shared::error::Result<SmsReceipt> {
        let message_id = format!("sms_{}", Uuid::now_v7());
        info!(to = %to_e164, body = %body, message_id = %message_id, "短信渠道未配置，模拟发送");
        Ok(SmsReceipt {
            success: true,
            message_id: Some(message_id),
            error: None,
        })
    }
}

/// E.164 号码归一化
///
/// 去除空格、连字符与括号；`00` 国际前缀转为 `+`。
/// 归一后必须是 `+` 加 8~15 位数字，否则视为无法归一。
pub fn normalize_e164(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let normalized = if let Some(rest) = cleaned.strip_prefix("00") {
        format!("+{rest}")
    } else {
        cleaned
    };

    let digits = normalized.strip_prefix('+')?;
    if digits.len() < 8 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(normalized)
}

/// 短信渠道适配器
pub struct SmsAdapter {
    provider: Arc<dyn SmsProvider>,
    config: ChannelConfig,
}

impl SmsAdapter {
    pub fn new(provider: Arc<dyn SmsProvider>, config: ChannelConfig) -> Self {
        Self { provider, config }
    }

    /// 构造软降级适配器（供应商未注入时的默认选择）
    pub fn unconfigured(config: ChannelConfig) -> Self {
        Self::new(Arc::new(NullSmsProvider), config)
    }

    /// 发送短信并翻译为统一渠道结果
    pub async fn send(&self, phone: &str, message: &str) -> ChannelOutcome {
        if !self.config.enabled {
            return ChannelOutcome::skipped("短信渠道已禁用");
        }

        let Some(to) = normalize_e164(phone) else {
            return ChannelOutcome::failed(format!("无效号码: {phone}"));
        };

        match call_with_timeout(
            "SMS",
            self.config.timeout_ms,
            self.provider.send_sms(&to, message),
        )
        .await
        {
            Ok(receipt) if receipt.success => ChannelOutcome::success(),
            Ok(receipt) => ChannelOutcome::failed(
                receipt
                    .error
                    .unwrap_or_else(|| "短信供应商返回失败".to_string()),
            ),
            Err(e) => ChannelOutcome::failed(e),
        }
    }
}
