//! Request types for the kitchen API

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::{Validate, ValidationError};

use crate::fulfillment::{InvalidStatus, ItemId, Status};

/// `PUT /kitchen/orders/{orderId}/items/{itemId}/unit/{unitIndex}` body
///
/// `status` 保持字符串，非法值由处理器返回 400 `Invalid status: X`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUnitStatusRequest {
    pub status: String,
}

impl UpdateUnitStatusRequest {
    pub fn new(status: Status) -> Self {
        Self {
            status: status.as_str().to_string(),
        }
    }

    pub fn parse_status(&self) -> Result<Status, InvalidStatus> {
        self.status.parse()
    }
}

/// `POST /orders` 中的单个菜品
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderItem {
    pub item_id: ItemId,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 1, max = 999))]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500))]
    pub observation: Option<String>,
}

/// `POST /orders` body
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub table_number: i32,
    #[validate(length(min = 1), nested, custom(function = validate_unique_item_ids))]
    pub items: Vec<CreateOrderItem>,
}

/// 同一订单内菜品 ID 必须唯一 (份键依赖 item_id 定位)
fn validate_unique_item_ids(items: &[CreateOrderItem]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.item_id) {
            let mut err = ValidationError::new("duplicate_item_id");
            err.add_param("item_id".into(), &item.item_id);
            return Err(err);
        }
    }
    Ok(())
}

/// `GET /orders/events` query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersFeedQuery {
    /// 调用方提供的连接 ID
    #[serde(default)]
    pub client_id: Option<String>,
    /// 只推送该状态的订单
    #[serde(default)]
    pub status: Option<String>,
}
