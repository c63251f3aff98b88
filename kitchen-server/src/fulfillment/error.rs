use shared::error::{AppError, ErrorCode};
use shared::fulfillment::TransitionDenied;
use thiserror::Error;

use super::storage::StorageError;
use super::store::StoreError;

/// 出品服务错误
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// 订单 / 菜品 / 份 不存在
    #[error(transparent)]
    NotFound(#[from] StoreError),

    /// 订单已取消或份不可重开
    #[error(transparent)]
    InvalidTransition(#[from] TransitionDenied),

    /// 聚合或存储不变量被破坏，操作已中止
    #[error("Invariant violated: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type FulfillmentResult<T> = Result<T, FulfillmentError>;

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        let message = err.to_string();
        match err {
            FulfillmentError::NotFound(StoreError::OrderNotFound(order_id)) => {
                AppError::with_message(ErrorCode::OrderNotFound, message)
                    .with_detail("order_id", order_id)
            }
            FulfillmentError::NotFound(StoreError::ItemNotFound { order_id, item_id }) => {
                AppError::with_message(ErrorCode::OrderItemNotFound, message)
                    .with_detail("order_id", order_id)
                    .with_detail("item_id", item_id)
            }
            FulfillmentError::NotFound(StoreError::UnitNotFound(key)) => {
                AppError::with_message(ErrorCode::OrderUnitNotFound, message)
                    .with_detail("order_id", key.order_id)
                    .with_detail("item_id", key.item_id)
                    .with_detail("unit_index", key.unit_index)
            }
            FulfillmentError::InvalidTransition(TransitionDenied::OrderCanceled(order_id)) => {
                AppError::with_message(ErrorCode::OrderAlreadyCanceled, message)
                    .with_detail("order_id", order_id)
            }
            FulfillmentError::InvalidTransition(TransitionDenied::CanceledUnitReopen(_)) => {
                AppError::invalid_transition(message)
            }
            FulfillmentError::Internal(_) => {
                tracing::error!(error = %message, "Fulfillment invariant violated");
                AppError::internal(message)
            }
            FulfillmentError::Storage(e) => {
                tracing::error!(error = %e, "Storage error occurred");
                AppError::database(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::fulfillment::UnitKey;

    #[test]
    fn test_not_found_codes() {
        let err: AppError = FulfillmentError::from(StoreError::OrderNotFound(9)).into();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        assert_eq!(err.message, "Order 9 not found");

        let err: AppError =
            FulfillmentError::from(StoreError::UnitNotFound(UnitKey::new(1, 2, 5))).into();
        assert_eq!(err.code, ErrorCode::OrderUnitNotFound);
        assert!(err.code.is_not_found());
    }

    #[test]
    fn test_transition_codes() {
        let err: AppError = FulfillmentError::from(TransitionDenied::OrderCanceled(3)).into();
        assert_eq!(err.code, ErrorCode::OrderAlreadyCanceled);
        assert!(err.code.is_invalid_transition());
        assert_eq!(err.message, "Order 3 is canceled");

        let err: AppError = FulfillmentError::from(TransitionDenied::CanceledUnitReopen(
            UnitKey::new(3, 4, 0),
        ))
        .into();
        assert_eq!(err.code, ErrorCode::InvalidStatusTransition);
    }

    #[test]
    fn test_internal_is_server_error() {
        let err: AppError = FulfillmentError::Internal("count mismatch".into()).into();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert_eq!(err.http_status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
