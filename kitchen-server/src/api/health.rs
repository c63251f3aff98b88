//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /health | GET | 订单数量与在线推送连接 |

use axum::{Json, Router, extract::State, routing::get};
use shared::response::HealthResponse;

use crate::core::ServerState;
use crate::fulfillment::OrderFilter;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let service = state.fulfillment();
    let (status, active_orders) = match service.orders(OrderFilter::Active) {
        Ok(orders) => ("ok", orders.len()),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed to read orders");
            ("degraded", 0)
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        orders: service.order_count(),
        active_orders,
        feed_connections: state.feeds.open_connections(),
    })
}
