//! Kitchen API
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /kitchen/orders | GET | 未完成订单快照 |
//! | /kitchen/orders/delivered | GET | 已完成订单快照 |
//! | /kitchen/orders/{orderId}/items/{itemId}/statuses | GET | 菜品的份列表 |
//! | /kitchen/orders/{orderId}/items/{itemId}/unit/{unitIndex} | PUT | 设置单份状态 |
//! | /kitchen/orders/{orderId}/items/{itemId}/deliver | PUT | 整菜出品 |
//! | /kitchen/orders/{orderId}/deliver | PUT | 整单出品 |
//! | /kitchen/orders/{orderId}/cancel | PUT | 整单取消 |
//! | /kitchen/events | GET | 厨房推送 (SSE) |
//!
//! 变更接口成功返回 `{success:true, order}`，失败返回 `{success:false, error, code}`。

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::feed::{FeedKind, SnapshotPayload};
use shared::fulfillment::{ItemId, OrderId, Unit, UnitIndex, UnitKey};
use shared::request::UpdateUnitStatusRequest;
use shared::response::MutationResponse;
use shared::util::{connection_id, now_millis};

use crate::core::ServerState;
use crate::feed::sse_response;
use crate::fulfillment::FulfillmentError;
use crate::utils::Operator;

pub fn router() -> Router<ServerState> {
    Router::new()
        .nest("/kitchen", kitchen_routes())
}

fn kitchen_routes() -> Router<ServerState> {
    Router::new()
        .route("/orders", get(active_orders))
        .route("/orders/delivered", get(delivered_orders))
        .route("/orders/{order_id}/items/{item_id}/statuses", get(unit_statuses))
        .route(
            "/orders/{order_id}/items/{item_id}/unit/{unit_index}",
            put(set_unit_status),
        )
        .route("/orders/{order_id}/items/{item_id}/deliver", put(deliver_item))
        .route("/orders/{order_id}/deliver", put(deliver_order))
        .route("/orders/{order_id}/cancel", put(cancel_order))
        .route("/events", get(events))
}

/// 变更接口的失败响应
#[derive(Debug)]
pub struct MutationRejection(pub AppError);

impl From<AppError> for MutationRejection {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<FulfillmentError> for MutationRejection {
    fn from(err: FulfillmentError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for MutationRejection {
    fn into_response(self) -> Response {
        let status = self.0.http_status();
        (status, Json(MutationResponse::failed(&self.0))).into_response()
    }
}

type MutationResult = Result<Json<MutationResponse>, MutationRejection>;

/// GET /kitchen/orders - 未完成订单，按创建时间升序
async fn active_orders(State(state): State<ServerState>) -> AppResult<Json<SnapshotPayload>> {
    let orders = state.fulfillment().active_orders()?;
    Ok(Json(SnapshotPayload::new(FeedKind::Kitchen, orders, now_millis())))
}

/// GET /kitchen/orders/delivered - 已出品或已取消的订单
async fn delivered_orders(State(state): State<ServerState>) -> AppResult<Json<SnapshotPayload>> {
    let orders = state.fulfillment().fulfilled_orders()?;
    Ok(Json(SnapshotPayload::new(FeedKind::Kitchen, orders, now_millis())))
}

/// GET /kitchen/orders/{orderId}/items/{itemId}/statuses
async fn unit_statuses(
    State(state): State<ServerState>,
    Path((order_id, item_id)): Path<(OrderId, ItemId)>,
) -> AppResult<Json<Vec<Unit>>> {
    Ok(Json(state.fulfillment().get_units(order_id, item_id)?))
}

/// PUT /kitchen/orders/{orderId}/items/{itemId}/unit/{unitIndex}
async fn set_unit_status(
    State(state): State<ServerState>,
    Path((order_id, item_id, unit_index)): Path<(OrderId, ItemId, UnitIndex)>,
    operator: Operator,
    body: Result<Json<UpdateUnitStatusRequest>, JsonRejection>,
) -> MutationResult {
    let Json(req) = body.map_err(|e| AppError::invalid_request(e.body_text()))?;
    let status = req
        .parse_status()
        .map_err(|e| AppError::with_message(ErrorCode::InvalidStatus, e.to_string()))?;

    let key = UnitKey::new(order_id, item_id, unit_index);
    let order = state
        .fulfillment()
        .set_unit_status(key, status, operator.as_str())
        .inspect_err(|e| tracing::info!(unit = %key, %status, error = %e, "Unit update rejected"))?;
    Ok(Json(MutationResponse::ok(order)))
}

/// PUT /kitchen/orders/{orderId}/items/{itemId}/deliver
async fn deliver_item(
    State(state): State<ServerState>,
    Path((order_id, item_id)): Path<(OrderId, ItemId)>,
    operator: Operator,
) -> MutationResult {
    let order = state
        .fulfillment()
        .mark_item_delivered(order_id, item_id, operator.as_str())
        .inspect_err(|e| tracing::info!(order_id, item_id, error = %e, "Item delivery rejected"))?;
    Ok(Json(MutationResponse::ok(order)))
}

/// PUT /kitchen/orders/{orderId}/deliver
async fn deliver_order(
    State(state): State<ServerState>,
    Path(order_id): Path<OrderId>,
    operator: Operator,
) -> MutationResult {
    let order = state
        .fulfillment()
        .mark_order_delivered(order_id, operator.as_str())
        .inspect_err(|e| tracing::info!(order_id, error = %e, "Order delivery rejected"))?;
    Ok(Json(MutationResponse::ok(order)))
}

/// PUT /kitchen/orders/{orderId}/cancel
async fn cancel_order(
    State(state): State<ServerState>,
    Path(order_id): Path<OrderId>,
    operator: Operator,
) -> MutationResult {
    let order = state
        .fulfillment()
        .cancel_order(order_id, operator.as_str())
        .inspect_err(|e| tracing::info!(order_id, error = %e, "Order cancel rejected"))?;
    tracing::info!(order_id, operator = operator.as_str(), "Order canceled");
    Ok(Json(MutationResponse::ok(order)))
}

/// GET /kitchen/events - 厨房推送
async fn events(State(state): State<ServerState>) -> Response {
    let id = connection_id(FeedKind::Kitchen.connection_prefix());
    let rx = state
        .feeds
        .open(state.fulfillment.clone(), state.kitchen_feed_settings(), id);
    sse_response(rx)
}
