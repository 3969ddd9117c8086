// ==========================================
// 服装工厂 ERP - 实时层错误类型
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("实时库不可用: {0}")]
    Unavailable(String),

    #[error("无效路径: {0}")]
    InvalidPath(String),

    #[error("事件通道错误: {0}")]
    Transport(String),

    #[error("事件通道认证失败: {0}")]
    AuthFailed(String),

    #[error("事件通道连接失败: 尝试 {attempts} 次, 最后错误: {last_error}")]
    ConnectFailed { attempts: u32, last_error: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
