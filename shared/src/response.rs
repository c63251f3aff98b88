//! Response types for the kitchen API
//!
//! 厨房变更接口使用扁平的 `{success, order}` / `{success:false, error, code}` 格式，
//! 查询与运维接口使用 [`crate::error::ApiResponse`]。

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::fulfillment::Order;

/// 变更接口响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    /// 提交后的订单 (成功时)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// [`crate::error::ErrorCode`] 数值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl MutationResponse {
    pub fn ok(order: Order) -> Self {
        Self {
            success: true,
            order: Some(order),
            error: None,
            code: None,
        }
    }

    pub fn failed(err: &AppError) -> Self {
        Self {
            success: false,
            order: None,
            error: Some(err.message.clone()),
            code: Some(err.code.code()),
        }
    }
}

/// `GET /health` 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub orders: usize,
    pub active_orders: usize,
    pub feed_connections: usize,
}
