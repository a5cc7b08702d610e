//! 通知渠道适配器
//!
//! 每个渠道文件包含三部分：供应商边界 trait（具体的 SMTP、运营商
//! 网关、推送服务实现在引擎之外）、未配置凭据时的空实现（软降级），
//! 以及把供应商结果翻译为统一 `ChannelOutcome` 的适配器。
//! 适配器是唯一了解供应商错误形态的组件。

mod email;
mod push;
mod sms;
mod webhook;

pub use email::{EmailAdapter, EmailProvider, NullEmailProvider};
pub use push::{DeviceSendResult, NullPushProvider, PushAdapter, PushProvider, PushReceipt};
pub use sms::{normalize_e164, NullSmsProvider, SmsAdapter, SmsProvider, SmsReceipt};
pub use webhook::{HttpWebhookSink, NullWebhookSink, WebhookAdapter, WebhookSink};

use std::future::Future;
use std::time::Duration;

/// 包装渠道调用的统一超时
///
/// 各外部渠道的延迟特性不同，超时时长来自渠道各自的配置。
/// 超时与供应商错误一样收敛为普通的渠道失败，不向兄弟渠道传播取消。
pub(crate) async fn call_with_timeout<T>(
    channel: &str,
    timeout_ms: u64,
    fut: impl Future<Output = fleet_shared::error::Result<T>>,
) -> Result<T, String> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("渠道发送超时: {channel}")),
    }
}
