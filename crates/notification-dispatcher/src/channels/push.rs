//! 推送通知渠道
//!
//! 向用户的所有活跃设备并发推送。适配器负责把供应商错误归类为
//! 「token 永久失效」与「瞬时失败」：前者由调度器停用对应设备，
//! 后者保持设备活跃等待下次投递。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::info;

use fleet_shared::config::ChannelConfig;
use fleet_shared::notifications::{Device, DevicePlatform};

use super::call_with_timeout;

/// 推送回执
#[derive(Debug, Clone)]
pub struct PushReceipt {
    pub success: bool,
    pub error: Option<String>,
}

/// 推送供应商接口
///
/// FCM / APNs 等具体实现在引擎之外。data 为字符串化的业务数据，
/// 随推送透传给客户端。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send_push(
        &self,
        token: &str,
        platform: DevicePlatform,
        title: &str,
        body: &str,
        data: &HashMap<String, String>,
    ) -> fleet_shared::error::Result<PushReceipt>;
}

/// 未配置凭据时的空实现
pub struct NullPushProvider;

#[async_trait]
impl PushProvider for NullPushProvider {
    async fn send_push(
        &self,
        token: &str,
        platform: DevicePlatform,
        title: &str,
        _body: &str,
        _data: &HashMap<String, String>,
    ) -> fleet_shared::error::Result<PushReceipt> {
        info!(
            device_token = %token,
            platform = %platform,
            title = %title,
            "推送渠道未配置，模拟发送"
        );
        Ok(PushReceipt {
            success: true,
            error: None,
        })
    }
}

/// 供应商错误是否表示 token 永久失效
///
/// FCM/APNs 语义：NotRegistered / InvalidRegistration 表示该 token
/// 永远不会再成功，应停用对应设备；其余错误视为瞬时。
fn is_permanent_token_error(error: &str) -> bool {
    error.contains("NotRegistered") || error.contains("InvalidRegistration")
}

/// 单设备发送结果
#[derive(Debug, Clone)]
pub struct DeviceSendResult {
    pub device_token: String,
    pub success: bool,
    /// 错误被归类为 token 永久失效
    pub permanently_invalid: bool,
    pub error: Option<String>,
}

/// 推送渠道适配器
pub struct PushAdapter {
    provider: Arc<dyn PushProvider>,
    config: ChannelConfig,
}

impl PushAdapter {
    pub fn new(provider: Arc<dyn PushProvider>, config: ChannelConfig) -> Self {
        Self { provider, config }
    }

    /// 构造软降级适配器（供应商未注入时的默认选择）
    pub fn unconfigured(config: ChannelConfig) -> Self {
        Self::new(Arc::new(NullPushProvider), config)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// 向设备列表并发推送
    ///
    /// 返回逐设备结果；是否停用失效设备由调度器根据
    /// `permanently_invalid` 决定。
    pub async fn send_to_devices(
        &self,
        devices: &[Device],
        title: &str,
        body: &str,
        data: &HashMap<String, String>,
    ) -> Vec<DeviceSendResult> {
        let futures: Vec<_> = devices
            .iter()
            .map(|device| async move {
                let outcome = call_with_timeout(
                    "PUSH",
                    self.config.timeout_ms,
                    self.provider
                        .send_push(&device.device_token, device.platform, title, body, data),
                )
                .await;

                match outcome {
                    Ok(receipt) if receipt.success => DeviceSendResult {
                        device_token: device.device_token.clone(),
                        success: true,
                        permanently_invalid: false,
                        error: None,
                    },
                    Ok(receipt) => {
                        let error = receipt
                            .error
                            .unwrap_or_else(|| "推送供应商返回失败".to_string());
                        DeviceSendResult {
                            device_token: device.device_token.clone(),
                            success: false,
                            permanently_invalid: is_permanent_token_error(&error),
                            error: Some(error),
                        }
                    }
                    // 超时等调用层错误不涉及 token 本身，一律按瞬时处理
                    Err(e) => DeviceSendResult {
                        device_token: device.device_token.clone(),
                        success: false,
                        permanently_invalid: false,
                        error: Some(e),
                    },
                }
            })
            .collect();

        join_all(futures).await
    }
}
