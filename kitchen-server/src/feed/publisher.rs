//! 变更推送 - 每个连接一个后台任务
//!
//! # 连接状态机
//!
//! ```text
//! CONNECTING → CONNECTED → (SNAPSHOT | HEARTBEAT | ERROR)* → CLOSED
//! ```
//!
//! - 建立后立即发送 `connection` 事件
//! - 每个周期：读取完整快照 → `kitchen_orders` / `orders`，随后 `heartbeat`
//! - 收到变更通知时立即补发一次快照
//! - 读取失败发送 `error` 事件，连接继续
//! - 对端断开 (接收端被丢弃) 或服务关闭 (CancellationToken) 时退出
//!
//! 发布端不保存任何按连接的差量状态，每次都发送完整快照。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use shared::feed::{FeedEvent, FeedKind};
use shared::fulfillment::{Order, Status};
use shared::util::now_millis;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::fulfillment::{
    FulfillmentError, FulfillmentResult, FulfillmentService, MutationEvent, OrderFilter,
};

/// 快照数据源
///
/// 由 [`FulfillmentService`] 实现，测试中可替换为会失败的实现
pub trait OrderFeedSource: Send + Sync + 'static {
    fn snapshot(&self, filter: OrderFilter) -> FulfillmentResult<Vec<Order>>;

    fn subscribe(&self) -> broadcast::Receiver<MutationEvent>;
}

impl OrderFeedSource for FulfillmentService {
    fn snapshot(&self, filter: OrderFilter) -> FulfillmentResult<Vec<Order>> {
        self.orders(filter)
    }

    fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        FulfillmentService::subscribe(self)
    }
}

/// 单个连接的推送参数
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub kind: FeedKind,
    pub interval: Duration,
    /// 快照范围；厨房推送固定为 Active
    pub filter: OrderFilter,
    /// 连接内缓冲事件数
    pub channel_capacity: usize,
}

impl FeedSettings {
    /// 厨房推送：只包含未完成订单
    pub fn kitchen(interval: Duration, channel_capacity: usize) -> Self {
        Self {
            kind: FeedKind::Kitchen,
            interval,
            filter: OrderFilter::Active,
            channel_capacity,
        }
    }

    /// 通用订单推送，可按状态过滤
    pub fn orders(interval: Duration, channel_capacity: usize, status: Option<Status>) -> Self {
        Self {
            kind: FeedKind::Orders,
            interval,
            filter: status.map(OrderFilter::Status).unwrap_or(OrderFilter::All),
            channel_capacity,
        }
    }
}

/// 推送连接管理：统计在线连接，统一关闭
#[derive(Debug, Clone)]
pub struct FeedHub {
    connections: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl FeedHub {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown,
        }
    }

    /// 当前在线连接数
    pub fn open_connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// 关闭所有连接
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// 打开一个推送连接，返回事件接收端
    ///
    /// 丢弃接收端即关闭连接
    pub fn open<S>(
        &self,
        source: Arc<S>,
        settings: FeedSettings,
        connection_id: String,
    ) -> mpsc::Receiver<FeedEvent>
    where
        S: OrderFeedSource + ?Sized,
    {
        let (tx, rx) = mpsc::channel(settings.channel_capacity.max(1));
        let guard = ConnectionGuard::new(self.connections.clone(), connection_id.clone(), settings.kind);
        let cancel = self.shutdown.child_token();
        tokio::spawn(run_connection(source, settings, connection_id, tx, cancel, guard));
        rx
    }
}

/// 连接计数，任务结束时自动减一
struct ConnectionGuard {
    connections: Arc<AtomicUsize>,
    connection_id: String,
    kind: FeedKind,
}

impl ConnectionGuard {
    fn new(connections: Arc<AtomicUsize>, connection_id: String, kind: FeedKind) -> Self {
        let open = connections.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(connection_id = %connection_id, kind = ?kind, open, "Feed connection opened");
        Self {
            connections,
            connection_id,
            kind,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let open = self.connections.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        tracing::info!(
            connection_id = %self.connection_id,
            kind = ?self.kind,
            open,
            "Feed connection closed"
        );
    }
}

async fn run_connection<S>(
    source: Arc<S>,
    settings: FeedSettings,
    connection_id: String,
    tx: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
    _guard: ConnectionGuard,
) where
    S: OrderFeedSource + ?Sized,
{
    if tx
        .send(FeedEvent::Connected {
            connection_id: connection_id.clone(),
        })
        .await
        .is_err()
    {
        return;
    }

    let mut mutations = source.subscribe();
    let mut mutations_open = true;
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tx.closed() => break,
            _ = ticker.tick() => {
                if !send_snapshot(source.as_ref(), &settings, &tx).await {
                    break;
                }
                if tx.send(FeedEvent::Heartbeat).await.is_err() {
                    break;
                }
            }
            received = mutations.recv(), if mutations_open => {
                match received {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        // 合并积压的通知，只发一次快照
                        while mutations.try_recv().is_ok() {}
                        if !send_snapshot(source.as_ref(), &settings, &tx).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        mutations_open = false;
                    }
                }
            }
        }
    }

    tracing::debug!(connection_id = %connection_id, "Feed task finished");
}

/// 发送一次快照，读取失败时发送 `error` 事件
///
/// 返回 false 表示对端已断开
async fn send_snapshot<S>(source: &S, settings: &FeedSettings, tx: &mpsc::Sender<FeedEvent>) -> bool
where
    S: OrderFeedSource + ?Sized,
{
    let event = match source.snapshot(settings.filter) {
        Ok(orders) => FeedEvent::Snapshot {
            kind: settings.kind,
            orders,
            timestamp: now_millis(),
        },
        Err(e) => {
            tracing::warn!(error = %e, kind = ?settings.kind, "Feed snapshot failed");
            FeedEvent::Error {
                message: snapshot_error_message(&e),
            }
        }
    };
    tx.send(event).await.is_ok()
}

fn snapshot_error_message(err: &FulfillmentError) -> String {
    match err {
        FulfillmentError::Storage(_) => "Failed to load orders".to_string(),
        other => other.to_string(),
    }
}
