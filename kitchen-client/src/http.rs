// kitchen-client/src/http.rs
// HTTP 客户端 - 厨房接口

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use shared::feed::SnapshotPayload;
use shared::fulfillment::{ItemId, Order, OrderId, Status, Unit, UnitKey};
use shared::request::{CreateOrderRequest, UpdateUnitStatusRequest};
use shared::response::{HealthResponse, MutationResponse};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::sse::{FeedStream, decode_feed};

/// 操作员请求头 (与服务端一致)
pub const OPERATOR_HEADER: &str = "x-operator";

/// 推送长连接的最长存活时间
const FEED_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// 服务端错误响应 (兼容 `ApiResponse` 与变更接口两种格式)
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// 厨房接口
///
/// 会话只依赖此 trait，测试中可替换为内存实现。
#[async_trait]
pub trait KitchenApi: Send + Sync + 'static {
    async fn set_unit_status(&self, key: UnitKey, status: Status) -> ClientResult<Order>;
    async fn mark_item_delivered(&self, order_id: OrderId, item_id: ItemId) -> ClientResult<Order>;
    async fn mark_order_delivered(&self, order_id: OrderId) -> ClientResult<Order>;
    async fn cancel_order(&self, order_id: OrderId) -> ClientResult<Order>;
    /// 未完成订单快照
    async fn active_orders(&self) -> ClientResult<Vec<Order>>;
    /// 已完成订单
    async fn delivered_orders(&self) -> ClientResult<Vec<Order>>;
    /// 打开厨房推送
    async fn open_feed(&self) -> ClientResult<FeedStream>;
}

/// 网络 HTTP 客户端
#[derive(Debug, Clone)]
pub struct HttpKitchenClient {
    client: Client,
    base_url: String,
    operator: String,
}

impl HttpKitchenClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            operator: config.operator.clone(),
        })
    }

    /// 获取基础 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    async fn put_mutation(
        &self,
        path: &str,
        body: Option<&UpdateUnitStatusRequest>,
    ) -> ClientResult<Order> {
        let mut req = self
            .client
            .put(self.url(path))
            .header(OPERATOR_HEADER, &self.operator);
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await?;
        let resp: MutationResponse = Self::handle_response(response).await?;
        if !resp.success {
            return Err(ClientError::from_code(
                resp.code.unwrap_or(1),
                resp.error.unwrap_or_else(|| "Unknown error".into()),
            ));
        }
        resp.order
            .ok_or_else(|| ClientError::InvalidResponse("Missing order in mutation response".into()))
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            // 尝试解析为带错误码的响应
            if let Ok(body) = serde_json::from_str::<ErrorBody>(&text)
                && let Some(code) = body.code
            {
                let message = body.error.or(body.message).unwrap_or(text);
                return Err(ClientError::from_code(code, message));
            }
            return match status {
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(text)),
                StatusCode::BAD_REQUEST => Err(ClientError::Validation(text)),
                _ => Err(ClientError::Internal(text)),
            };
        }
        Ok(response.json().await?)
    }

    // ========== Orders API ==========

    /// POST /orders
    pub async fn create_order(&self, req: &CreateOrderRequest) -> ClientResult<Order> {
        let response = self
            .client
            .post(self.url("/orders"))
            .header(OPERATOR_HEADER, &self.operator)
            .json(req)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// GET /orders/{orderId}
    pub async fn get_order(&self, order_id: OrderId) -> ClientResult<Order> {
        self.get(&format!("/orders/{order_id}")).await
    }

    /// GET /kitchen/orders/{orderId}/items/{itemId}/statuses
    pub async fn get_units(&self, order_id: OrderId, item_id: ItemId) -> ClientResult<Vec<Unit>> {
        self.get(&format!("/kitchen/orders/{order_id}/items/{item_id}/statuses"))
            .await
    }

    /// GET /health
    pub async fn health(&self) -> ClientResult<HealthResponse> {
        self.get("/health").await
    }
}

#[async_trait]
impl KitchenApi for HttpKitchenClient {
    async fn set_unit_status(&self, key: UnitKey, status: Status) -> ClientResult<Order> {
        let path = format!(
            "/kitchen/orders/{}/items/{}/unit/{}",
            key.order_id, key.item_id, key.unit_index
        );
        self.put_mutation(&path, Some(&UpdateUnitStatusRequest::new(status)))
            .await
    }

    async fn mark_item_delivered(&self, order_id: OrderId, item_id: ItemId) -> ClientResult<Order> {
        self.put_mutation(&format!("/kitchen/orders/{order_id}/items/{item_id}/deliver"), None)
            .await
    }

    async fn mark_order_delivered(&self, order_id: OrderId) -> ClientResult<Order> {
        self.put_mutation(&format!("/kitchen/orders/{order_id}/deliver"), None)
            .await
    }

    async fn cancel_order(&self, order_id: OrderId) -> ClientResult<Order> {
        self.put_mutation(&format!("/kitchen/orders/{order_id}/cancel"), None)
            .await
    }

    async fn active_orders(&self) -> ClientResult<Vec<Order>> {
        let payload: SnapshotPayload = self.get("/kitchen/orders").await?;
        Ok(payload.orders)
    }

    async fn delivered_orders(&self) -> ClientResult<Vec<Order>> {
        let payload: SnapshotPayload = self.get("/kitchen/orders/delivered").await?;
        Ok(payload.orders)
    }

    async fn open_feed(&self) -> ClientResult<FeedStream> {
        // 长连接不受普通请求超时限制
        let response = self
            .client
            .get(self.url("/kitchen/events"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .timeout(FEED_TIMEOUT)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "feed rejected with status {}",
                response.status()
            )));
        }
        tracing::debug!(url = %response.url(), "Kitchen feed opened");
        Ok(decode_feed(response.bytes_stream()))
    }
}
