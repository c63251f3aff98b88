//! Client error types

use shared::error::ErrorCode;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// 订单 / 菜品 / 份不存在 (不重试)
    #[error("Not found: {0}")]
    NotFound(String),

    /// 状态迁移被拒绝 (不重试)
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Request rejected by validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// 推送连接中断，需要显式重连
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// 由服务端错误码还原客户端错误
    pub fn from_code(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match ErrorCode::try_from(code) {
            Ok(c) if c.is_not_found() => ClientError::NotFound(message),
            Ok(c) if c.is_invalid_transition() => ClientError::InvalidTransition(message),
            Ok(
                ErrorCode::ValidationFailed
                | ErrorCode::InvalidRequest
                | ErrorCode::InvalidStatus
                | ErrorCode::OrderEmpty,
            ) => ClientError::Validation(message),
            _ => ClientError::Internal(message),
        }
    }

    /// 网络层错误 (连接失败、超时、流中断)
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Http(_) | ClientError::Transport(_))
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert!(matches!(ClientError::from_code(4001, "x"), ClientError::NotFound(_)));
        assert!(matches!(ClientError::from_code(4008, "x"), ClientError::NotFound(_)));
        assert!(matches!(
            ClientError::from_code(4010, "x"),
            ClientError::InvalidTransition(_)
        ));
        assert!(matches!(
            ClientError::from_code(4011, "Invalid status: DONE"),
            ClientError::Validation(_)
        ));
        assert!(matches!(ClientError::from_code(4007, "x"), ClientError::Validation(_)));
        assert!(matches!(ClientError::from_code(9001, "x"), ClientError::Internal(_)));
        assert!(matches!(ClientError::from_code(12345, "x"), ClientError::Internal(_)));
    }

    #[test]
    fn test_is_transport() {
        assert!(ClientError::Transport("eof".into()).is_transport());
        assert!(!ClientError::NotFound("x".into()).is_transport());
    }
}
