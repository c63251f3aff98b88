//! 出品状态与主键类型

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 订单 ID
pub type OrderId = i64;
/// 菜品 ID (菜单中的商品 ID)
pub type ItemId = i64;
/// 份序号 (0..count-1，订单生命周期内稳定)
pub type UnitIndex = u32;

/// 出品状态 - 份、菜品、订单三级共用
///
/// 线上格式为 `"PENDING" | "DELIVERED" | "CANCELED"`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// 待出品
    Pending,
    /// 已出品
    Delivered,
    /// 已取消
    Canceled,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Pending, Status::Delivered, Status::Canceled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Delivered => "DELIVERED",
            Status::Canceled => "CANCELED",
        }
    }

    /// 是否仍需厨房处理
    pub fn is_pending(&self) -> bool {
        matches!(self, Status::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status: {0}")]
pub struct InvalidStatus(pub String);

impl FromStr for Status {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Status::Pending),
            "DELIVERED" => Ok(Status::Delivered),
            "CANCELED" => Ok(Status::Canceled),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// 份的唯一键 `(order_id, item_id, unit_index)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitKey {
    pub order_id: OrderId,
    pub item_id: ItemId,
    pub unit_index: UnitIndex,
}

impl UnitKey {
    pub fn new(order_id: OrderId, item_id: ItemId, unit_index: UnitIndex) -> Self {
        Self {
            order_id,
            item_id,
            unit_index,
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.order_id, self.item_id, self.unit_index)
    }
}
