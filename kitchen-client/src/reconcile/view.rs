//! 对外暴露的不可变视图

use serde::Serialize;
use shared::fulfillment::{Order, UnitKey};

use super::engine::ReconciliationEngine;

/// 推送连接状态
///
/// `Connecting -> Connected -> Disconnected`。显式 `reconnect` 时为 `Reconnecting`，
/// 界面据此区分首次连接与用户发起的重试。不会自动重试。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Reconnecting,
    Connected {
        connection_id: String,
    },
    #[default]
    Disconnected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }
}

/// 某一时刻的完整客户端状态
///
/// 通过 `tokio::sync::watch` 发布，订阅者只读。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub active: Vec<Order>,
    pub fulfilled: Vec<Order>,
    pub pending: Vec<UnitKey>,
    pub connection: ConnectionState,
    /// 最近一次可恢复错误 (回滚、推送 error 事件、断线)
    pub last_error: Option<String>,
}

impl ViewSnapshot {
    pub fn capture(
        engine: &ReconciliationEngine,
        connection: ConnectionState,
        last_error: Option<String>,
    ) -> Self {
        Self {
            active: engine.active_orders(),
            fulfilled: engine.fulfilled_orders(),
            pending: engine.pending_keys().into_iter().collect(),
            connection,
            last_error,
        }
    }

    pub fn find(&self, order_id: shared::fulfillment::OrderId) -> Option<&Order> {
        self.active
            .iter()
            .chain(self.fulfilled.iter())
            .find(|o| o.id == order_id)
    }
}
