//! 邮件通知渠道
//!
//! 通过注入的邮件供应商发送邮件；未配置凭据时使用空实现软降级，
//! 记录完整的待发内容并报告成功，保证无外部凭据时系统可完整演练。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use fleet_shared::config::ChannelConfig;
use fleet_shared::notifications::ChannelOutcome;

use super::call_with_timeout;

/// 邮件供应商接口
///
/// SMTP / SendGrid 等具体实现在引擎之外；返回值表示供应商是否接受投递。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> fleet_shared::error::Result<bool>;
}

/// 未配置凭据时的空实现
pub struct NullEmailProvider;

#[async_trait]
impl EmailProvider for NullEmailProvider {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        _html: &str,
        text: &str,
    ) -> fleet_shared::error::Result<bool> {
        info!(to = %to, subject = %subject, body = %text, "邮件渠道未配置，模拟发送");
        Ok(true)
    }
}

/// 邮件渠道适配器
pub struct EmailAdapter {
    provider: Arc<dyn EmailProvider>,
    config: ChannelConfig,
}

impl EmailAdapter {
    pub fn new(provider: Arc<dyn EmailProvider>, config: ChannelConfig) -> Self {
        Self { provider, config }
    }

    /// 构造软降级适配器（供应商未注入时的默认选择）
    pub fn unconfigured(config: ChannelConfig) -> Self {
        Self::new(Arc::new(NullEmailProvider), config)
    }

    /// 构建极简 HTML 正文
    ///
    /// 模板系统只做变量替换，富文本渲染不在职责内，这里仅做最小包装。
    fn build_html(title: &str, body: &str) -> String {
        format!(
            "<html><body><h2>{title}</h2><p>{body}</p>\
             <p style=\"color:#888;font-size:12px\">此邮件由车队培训系统自动发送，请勿回复。</p>\
             </body></html>"
        )
    }

    /// 发送邮件并翻译为统一渠道结果
    pub async fn send(&self, to: &str, title: &str, body: &str) -> ChannelOutcome {
        if !self.config.enabled {
            return ChannelOutcome::skipped("邮件渠道已禁用");
        }

        let html = Self::build_html(title, body);
        match call_with_timeout(
            "EMAIL",
            self.config.timeout_ms,
            self.provider.send_email(to, title, &html, body),
        )
        .await
        {
            Ok(true) => ChannelOutcome::success(),
            Ok(false) => ChannelOutcome::failed("邮件供应商拒绝投递"),
            Err(e) => ChannelOutcome::failed(e),
        }
    }
}
