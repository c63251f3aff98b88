//! 厨房会话
//!
//! 把 [`ReconciliationEngine`] 与服务端连接起来：
//!
//! - 变更：本地乐观执行 -> 调用接口 -> 以服务端值确认或回滚
//! - 推送：后台任务读取厨房推送，快照交给引擎对账
//! - 视图：每次状态变化通过 `watch` 发布 [`ViewSnapshot`]
//!
//! 推送断开后保留最后的分区内容，只有显式调用 [`KitchenSession::reconnect`] 才会重连。

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use shared::FeedEvent;
use shared::feed::FeedKind;
use shared::fulfillment::{ItemId, Order, OrderId, Status, UnitKey};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::http::KitchenApi;
use crate::reconcile::{ConnectionState, Mutation, ReconciliationEngine, ViewSnapshot};

struct Inner<A: ?Sized> {
    api: Arc<A>,
    engine: Mutex<ReconciliationEngine>,
    connection: Mutex<ConnectionState>,
    last_error: Mutex<Option<String>>,
    view_tx: watch::Sender<ViewSnapshot>,
}

impl<A: KitchenApi + ?Sized> Inner<A> {
    /// 发布当前视图 (锁只在构造快照期间持有)
    fn publish(&self) {
        let snapshot = {
            let engine = self.engine.lock();
            ViewSnapshot::capture(
                &engine,
                self.connection.lock().clone(),
                self.last_error.lock().clone(),
            )
        };
        self.view_tx.send_replace(snapshot);
    }

    fn set_connection(&self, state: ConnectionState) {
        *self.connection.lock() = state;
        self.publish();
    }

    fn set_error(&self, message: Option<String>) {
        *self.last_error.lock() = message;
    }

    async fn refresh_fulfilled(&self) {
        match self.api.delivered_orders().await {
            Ok(orders) => self.engine.lock().ingest_fulfilled(orders),
            Err(e) => tracing::warn!(error = %e, "Failed to refresh delivered orders"),
        }
    }

    fn handle_event(&self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::Connected { connection_id } => {
                tracing::info!(%connection_id, "Kitchen feed connected");
                *self.connection.lock() = ConnectionState::Connected { connection_id };
                self.set_error(None);
                false
            }
            FeedEvent::Snapshot {
                kind: FeedKind::Kitchen,
                orders,
                ..
            } => {
                let outcome = self.engine.lock().ingest_snapshot(orders);
                !outcome.vanished.is_empty()
            }
            FeedEvent::Snapshot { orders, .. } => {
                let mut engine = self.engine.lock();
                for order in orders {
                    engine.upsert(order);
                }
                false
            }
            FeedEvent::Heartbeat => {
                tracing::trace!("Kitchen feed heartbeat");
                false
            }
            FeedEvent::Error { message } => {
                tracing::warn!(%message, "Kitchen feed reported an error");
                self.set_error(Some(message));
                false
            }
        }
    }
}

/// 后台推送任务句柄
struct FeedTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// 厨房会话
pub struct KitchenSession<A: KitchenApi + ?Sized> {
    inner: Arc<Inner<A>>,
    feed: Mutex<Option<FeedTask>>,
}

impl<A: KitchenApi + ?Sized> KitchenSession<A> {
    pub fn new(api: Arc<A>, config: &ClientConfig) -> Self {
        let engine = ReconciliationEngine::new(config.reopen_policy, config.operator.clone());
        let (view_tx, _) = watch::channel(ViewSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                api,
                engine: Mutex::new(engine),
                connection: Mutex::new(ConnectionState::Disconnected),
                last_error: Mutex::new(None),
                view_tx,
            }),
            feed: Mutex::new(None),
        }
    }

    /// 订阅视图变化
    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.inner.view_tx.subscribe()
    }

    /// 当前视图
    pub fn view(&self) -> ViewSnapshot {
        self.inner.view_tx.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.lock().clone()
    }

    /// 拉取两个分区的初始内容
    pub async fn load(&self) -> ClientResult<()> {
        let active = self.inner.api.active_orders().await?;
        let fulfilled = self.inner.api.delivered_orders().await?;
        {
            let mut engine = self.inner.engine.lock();
            engine.ingest_fulfilled(fulfilled);
            engine.ingest_snapshot(active);
        }
        self.inner.publish();
        Ok(())
    }

    // ========== Feed lifecycle ==========

    /// 打开推送 (已打开时先关闭旧连接)
    pub async fn connect(&self) {
        self.start_feed(ConnectionState::Connecting).await;
    }

    /// 显式重连：状态为 `Reconnecting`，直到收到新的 `connection` 事件
    pub async fn reconnect(&self) {
        tracing::info!("Reconnecting kitchen feed");
        self.start_feed(ConnectionState::Reconnecting).await;
    }

    async fn start_feed(&self, state: ConnectionState) {
        self.stop_feed().await;

        self.inner.set_connection(state);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_feed(self.inner.clone(), cancel.clone()));
        *self.feed.lock() = Some(FeedTask { cancel, handle });
    }

    /// 关闭推送，保留当前分区
    pub async fn close(&self) {
        self.stop_feed().await;
        self.inner.set_connection(ConnectionState::Disconnected);
    }

    async fn stop_feed(&self) {
        let task = self.feed.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                tracing::warn!(error = %e, "Feed task ended abnormally");
            }
        }
    }

    // ========== Mutations ==========

    pub async fn set_unit_status(&self, key: UnitKey, status: Status) -> ClientResult<Order> {
        self.run(Mutation::SetUnit { key, status }).await
    }

    pub async fn mark_item_delivered(&self, order_id: OrderId, item_id: ItemId) -> ClientResult<Order> {
        self.run(Mutation::DeliverItem { order_id, item_id }).await
    }

    pub async fn mark_order_delivered(&self, order_id: OrderId) -> ClientResult<Order> {
        self.run(Mutation::DeliverOrder { order_id }).await
    }

    pub async fn cancel_order(&self, order_id: OrderId) -> ClientResult<Order> {
        self.run(Mutation::CancelOrder { order_id }).await
    }

    /// 乐观执行 -> 调用接口 -> 确认或回滚
    ///
    /// 本地校验失败时不调用接口，视图不变。
    async fn run(&self, mutation: Mutation) -> ClientResult<Order> {
        let id = self.inner.engine.lock().apply_optimistic(mutation)?;
        self.inner.publish();

        let api = &self.inner.api;
        let result = match mutation {
            Mutation::SetUnit { key, status } => api.set_unit_status(key, status).await,
            Mutation::DeliverItem { order_id, item_id } => {
                api.mark_item_delivered(order_id, item_id).await
            }
            Mutation::DeliverOrder { order_id } => api.mark_order_delivered(order_id).await,
            Mutation::CancelOrder { order_id } => api.cancel_order(order_id).await,
        };

        match result {
            Ok(order) => {
                self.inner.engine.lock().confirm(id, order.clone());
                self.inner.publish();
                Ok(order)
            }
            Err(e) => {
                tracing::warn!(mutation_id = id, ?mutation, error = %e, "Mutation failed, rolling back");
                self.inner.engine.lock().fail(id);
                self.inner.set_error(Some(e.to_string()));
                self.inner.publish();
                Err(e)
            }
        }
    }
}

impl<A: KitchenApi + ?Sized> Drop for KitchenSession<A> {
    fn drop(&mut self) {
        if let Some(task) = self.feed.lock().take() {
            task.cancel.cancel();
        }
    }
}

/// 推送任务：读取事件直到取消、断线或流结束
async fn run_feed<A: KitchenApi + ?Sized>(inner: Arc<Inner<A>>, cancel: CancellationToken) {
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        r = inner.api.open_feed() => r,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to open kitchen feed");
            inner.set_error(Some(e.to_string()));
            inner.set_connection(ConnectionState::Disconnected);
            return;
        }
    };

    let reason: ClientError = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Kitchen feed task cancelled");
                return;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                let refresh = inner.handle_event(event);
                if refresh {
                    inner.refresh_fulfilled().await;
                }
                inner.publish();
            }
            Some(Err(e)) => break e,
            None => break ClientError::Transport("feed closed by server".into()),
        }
    };

    tracing::warn!(error = %reason, "Kitchen feed disconnected");
    inner.set_error(Some(reason.to_string()));
    inner.set_connection(ConnectionState::Disconnected);
}
