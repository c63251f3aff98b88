//! Orders API
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /orders | POST | 新建订单 |
//! | /orders | GET | 全部订单 (可按 `status` 过滤) |
//! | /orders/{orderId} | GET | 单个订单 |
//! | /orders/events | GET | 通用订单推送 (SSE)，`clientId` / `status` 可选 |

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
};
use serde::Deserialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::feed::FeedKind;
use shared::fulfillment::{Order, OrderId, Status};
use shared::request::{CreateOrderRequest, OrdersFeedQuery};
use shared::util::connection_id;
use validator::Validate;

use crate::core::ServerState;
use crate::feed::sse_response;
use crate::fulfillment::OrderFilter;
use crate::utils::Operator;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/orders", get(list).post(create))
        .route("/orders/events", get(events))
        .route("/orders/{order_id}", get(get_by_id))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

fn parse_status_filter(raw: Option<&str>) -> AppResult<Option<Status>> {
    raw.filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Status>()
                .map_err(|e| AppError::with_message(ErrorCode::InvalidStatus, e.to_string()))
        })
        .transpose()
}

/// POST /orders - 新建订单 (所有份为 PENDING)
async fn create(
    State(state): State<ServerState>,
    operator: Operator,
    Json(req): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<Order>)> {
    if req.items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty));
    }
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let order = state.fulfillment().create_order(&req, operator.as_str())?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders - 按创建时间升序
async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let filter = parse_status_filter(query.status.as_deref())?
        .map(OrderFilter::Status)
        .unwrap_or(OrderFilter::All);
    Ok(Json(state.fulfillment().orders(filter)?))
}

/// GET /orders/{orderId}
async fn get_by_id(
    State(state): State<ServerState>,
    Path(order_id): Path<OrderId>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.fulfillment().get_order(order_id)?))
}

/// GET /orders/events - 通用订单推送
async fn events(
    State(state): State<ServerState>,
    Query(query): Query<OrdersFeedQuery>,
) -> AppResult<Response> {
    let status = parse_status_filter(query.status.as_deref())?;
    let id = query
        .client_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| connection_id(FeedKind::Orders.connection_prefix()));
    let rx = state
        .feeds
        .open(state.fulfillment.clone(), state.orders_feed_settings(status), id);
    Ok(sse_response(rx))
}
