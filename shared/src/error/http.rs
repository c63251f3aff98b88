//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    ///
    /// 厨房变更接口约定：业务失败统一返回 400，由 `code` 区分具体原因。
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (not found, transitions, validation)
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::OrderNotFound
            | Self::OrderItemNotFound
            | Self::OrderEmpty
            | Self::OrderUnitNotFound
            | Self::InvalidStatusTransition
            | Self::OrderAlreadyCanceled
            | Self::InvalidStatus => StatusCode::BAD_REQUEST,
        }
    }
}
