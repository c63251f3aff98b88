//! 变更推送 (SSE) 事件定义
//!
//! 每个事件由 SSE `event:` 名称和 JSON `data:` 组成，`data` 内的 `type`
//! 字段与事件名一一对应：
//!
//! | event | data.type |
//! |-------|-----------|
//! | `connection` | `connected` |
//! | `kitchen_orders` | `kitchen_orders_update` |
//! | `orders` | `orders_update` |
//! | `heartbeat` | `heartbeat` |
//! | `error` | `error` |

use serde::{Deserialize, Serialize};

use crate::fulfillment::Order;

pub const EVENT_CONNECTION: &str = "connection";
pub const EVENT_KITCHEN_ORDERS: &str = "kitchen_orders";
pub const EVENT_ORDERS: &str = "orders";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_ERROR: &str = "error";

/// 推送通道类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    /// 厨房：只推送未完成订单
    Kitchen,
    /// 通用订单推送，可按状态过滤
    Orders,
}

impl FeedKind {
    pub fn event_name(&self) -> &'static str {
        match self {
            FeedKind::Kitchen => EVENT_KITCHEN_ORDERS,
            FeedKind::Orders => EVENT_ORDERS,
        }
    }

    pub fn update_type(&self) -> &'static str {
        match self {
            FeedKind::Kitchen => "kitchen_orders_update",
            FeedKind::Orders => "orders_update",
        }
    }

    /// 连接 ID 前缀
    pub fn connection_prefix(&self) -> &'static str {
        match self {
            FeedKind::Kitchen => "kitchen",
            FeedKind::Orders => "orders",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectedData {
    #[serde(rename = "type")]
    kind: String,
    connection_id: String,
}

/// 快照 payload，同时用于 `GET /kitchen/orders` 响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub orders: Vec<Order>,
    pub timestamp: i64,
}

impl SnapshotPayload {
    pub fn new(kind: FeedKind, orders: Vec<Order>, timestamp: i64) -> Self {
        Self {
            kind: kind.update_type().to_string(),
            orders,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// 推送事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// 连接建立
    Connected { connection_id: String },
    /// 完整快照 (非增量)
    Snapshot {
        kind: FeedKind,
        orders: Vec<Order>,
        timestamp: i64,
    },
    /// 心跳
    Heartbeat,
    /// 服务端读取失败，连接继续
    Error { message: String },
}

impl FeedEvent {
    /// SSE `event:` 名称
    pub fn event_name(&self) -> &'static str {
        match self {
            FeedEvent::Connected { .. } => EVENT_CONNECTION,
            FeedEvent::Snapshot { kind, .. } => kind.event_name(),
            FeedEvent::Heartbeat => EVENT_HEARTBEAT,
            FeedEvent::Error { .. } => EVENT_ERROR,
        }
    }

    /// SSE `data:` 内容
    pub fn to_data(&self) -> Result<String, serde_json::Error> {
        match self {
            FeedEvent::Connected { connection_id } => serde_json::to_string(&ConnectedData {
                kind: "connected".to_string(),
                connection_id: connection_id.clone(),
            }),
            FeedEvent::Snapshot {
                kind,
                orders,
                timestamp,
            } => serde_json::to_string(&SnapshotPayload::new(*kind, orders.clone(), *timestamp)),
            FeedEvent::Heartbeat => serde_json::to_string(&MessageData {
                kind: EVENT_HEARTBEAT.to_string(),
                message: None,
            }),
            FeedEvent::Error { message } => serde_json::to_string(&MessageData {
                kind: EVENT_ERROR.to_string(),
                message: Some(message.clone()),
            }),
        }
    }

    /// 由 SSE 帧还原事件
    ///
    /// 未知事件名返回 `Ok(None)`，便于服务端新增事件时旧客户端忽略。
    pub fn decode(event: &str, data: &str) -> Result<Option<Self>, serde_json::Error> {
        let parsed = match event {
            EVENT_CONNECTION => {
                let d: ConnectedData = serde_json::from_str(data)?;
                FeedEvent::Connected {
                    connection_id: d.connection_id,
                }
            }
            EVENT_KITCHEN_ORDERS | EVENT_ORDERS => {
                let d: SnapshotPayload = serde_json::from_str(data)?;
                let kind = if event == EVENT_KITCHEN_ORDERS {
                    FeedKind::Kitchen
                } else {
                    FeedKind::Orders
                };
                FeedEvent::Snapshot {
                    kind,
                    orders: d.orders,
                    timestamp: d.timestamp,
                }
            }
            EVENT_HEARTBEAT => FeedEvent::Heartbeat,
            EVENT_ERROR => {
                let d: MessageData = serde_json::from_str(data)?;
                FeedEvent::Error {
                    message: d.message.unwrap_or_default(),
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }
}
