//! 通知调度错误类型
//!
//! 目标用户无法解析是唯一会使整次调度终止的错误；
//! 各渠道的发送失败以结果值的形式收敛在 `DispatchResult` 中，
//! 不走错误路径。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("用户不存在: {user_id}")]
    UserNotFound { user_id: String },

    #[error(transparent)]
    Shared(#[from] fleet_shared::error::FleetError),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, DispatchError>;
