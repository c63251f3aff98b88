//! FulfillmentService - 出品状态的唯一写入口
//!
//! # Mutation Flow
//!
//! ```text
//! mutate(order_id, op)
//!     ├─ 1. 取订单条目并加写锁 (订单级)
//!     ├─ 2. 在副本上执行操作 (存在性校验 → 迁移校验 → 写入份状态)
//!     ├─ 3. 重新聚合菜品 / 订单状态，version + 1
//!     ├─ 4. 校验不变量，失败则丢弃副本
//!     ├─ 5. 写入 redb (可选)
//!     ├─ 6. 副本替换内存中的订单
//!     └─ 7. 广播 MutationEvent
//! ```
//!
//! 任一步失败都不会留下部分写入：批量操作 (整菜出品、整单出品、整单取消)
//! 要么全部生效，要么完全不生效。

use serde::Serialize;
use shared::fulfillment::{
    ItemId, Order, OrderId, OrderItem, Status, TransitionPolicy, Unit, UnitIndex, UnitKey,
    check_order_mutable, check_unit_transition, sort_by_creation,
};
use shared::request::CreateOrderRequest;
use shared::util::{new_order_id, now_millis};
use tokio::sync::broadcast;

use super::error::{FulfillmentError, FulfillmentResult};
use super::storage::OrderStorage;
use super::store::{StoreError, UnitStatusStore, write_unit};

/// 未提供操作员时记录的默认身份
pub const DEFAULT_OPERATOR: &str = "kitchen-user";

/// 变更类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationKind {
    OrderCreated,
    UnitStatus {
        item_id: ItemId,
        unit_index: UnitIndex,
        status: Status,
    },
    ItemDelivered {
        item_id: ItemId,
    },
    OrderDelivered,
    OrderCanceled,
}

/// 已提交的变更通知
#[derive(Debug, Clone, Serialize)]
pub struct MutationEvent {
    pub order_id: OrderId,
    pub kind: MutationKind,
    /// 提交后的订单版本
    pub version: u64,
    /// 提交后的订单状态
    pub status: Status,
    pub operator: String,
    pub timestamp: i64,
}

/// 订单查询范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    All,
    /// 仍需厨房处理 (PENDING)
    Active,
    /// 已完成 (DELIVERED / CANCELED)
    Fulfilled,
    Status(Status),
}

impl OrderFilter {
    fn matches(&self, order: &Order) -> bool {
        match self {
            OrderFilter::All => true,
            OrderFilter::Active => order.is_active(),
            OrderFilter::Fulfilled => !order.is_active(),
            OrderFilter::Status(status) => order.status == *status,
        }
    }
}

pub struct FulfillmentService {
    store: UnitStatusStore,
    storage: Option<OrderStorage>,
    policy: TransitionPolicy,
    event_tx: broadcast::Sender<MutationEvent>,
}

impl std::fmt::Debug for FulfillmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulfillmentService")
            .field("orders", &self.store.len())
            .field("persistent", &self.storage.is_some())
            .field("policy", &self.policy)
            .field("event_tx", &"<broadcast::Sender>")
            .finish()
    }
}

impl FulfillmentService {
    /// 纯内存模式
    pub fn new(policy: TransitionPolicy, channel_capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            store: UnitStatusStore::new(),
            storage: None,
            policy,
            event_tx,
        }
    }

    /// 写穿 redb，并加载已有订单
    pub fn with_storage(
        storage: OrderStorage,
        policy: TransitionPolicy,
        channel_capacity: usize,
    ) -> FulfillmentResult<Self> {
        let mut service = Self::new(policy, channel_capacity);
        let orders = storage.load_all()?;
        let count = orders.len();
        for mut order in orders {
            order.refresh_status();
            order.check_invariants().map_err(FulfillmentError::Internal)?;
            service.store.insert(order);
        }
        service.storage = Some(storage);
        tracing::info!(orders = count, policy = %policy, "Loaded orders from storage");
        Ok(service)
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.event_tx.subscribe()
    }

    pub fn order_count(&self) -> usize {
        self.store.len()
    }

    // ========== Commands ==========

    /// 新建订单，所有份为 PENDING
    ///
    /// 请求需已通过 `validator` 校验
    pub fn create_order(
        &self,
        req: &CreateOrderRequest,
        operator: &str,
    ) -> FulfillmentResult<Order> {
        let now = now_millis();
        let items = req
            .items
            .iter()
            .map(|i| OrderItem::new(i.item_id, i.name.clone(), i.count, i.observation.clone(), now))
            .collect();
        let mut order = Order::new(new_order_id(), req.table_number, Some(operator.to_string()), now, items);
        order.check_invariants().map_err(FulfillmentError::Internal)?;

        // 同一毫秒可能生成相同订单号：占位失败则换号重试，绝不覆盖已有订单
        while let Err(taken) = self.store.insert_new(order.clone()) {
            order = taken;
            order.id = new_order_id();
        }
        let id = order.id;

        if let Some(storage) = &self.storage
            && let Err(e) = storage.save(&order)
        {
            self.store.remove(id);
            return Err(e.into());
        }

        tracing::info!(order_id = id, table = req.table_number, operator, "Order created");
        self.emit(&order, MutationKind::OrderCreated, operator, now);
        Ok(order)
    }

    /// 写入单份状态
    pub fn set_unit_status(
        &self,
        key: UnitKey,
        status: Status,
        operator: &str,
    ) -> FulfillmentResult<Order> {
        let policy = self.policy;
        self.mutate(key.order_id, operator, |order, now| {
            let from = order
                .item(key.item_id)
                .ok_or(StoreError::ItemNotFound {
                    order_id: key.order_id,
                    item_id: key.item_id,
                })?
                .unit(key.unit_index)
                .map(|u| u.status)
                .ok_or(StoreError::UnitNotFound(key))?;
            check_order_mutable(order)?;
            check_unit_transition(key, from, status, policy)?;
            write_unit(order, key, status, now, operator)?;
            Ok(MutationKind::UnitStatus {
                item_id: key.item_id,
                unit_index: key.unit_index,
                status,
            })
        })
    }

    /// 整菜出品：所有未取消的份置为 DELIVERED
    pub fn mark_item_delivered(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        operator: &str,
    ) -> FulfillmentResult<Order> {
        self.mutate(order_id, operator, |order, now| {
            if order.item(item_id).is_none() {
                return Err(StoreError::ItemNotFound { order_id, item_id }.into());
            }
            check_order_mutable(order)?;
            if let Some(item) = order.item_mut(item_id) {
                deliver_units(&mut item.unit_statuses, now, operator);
            }
            Ok(MutationKind::ItemDelivered { item_id })
        })
    }

    /// 整单出品：所有菜品的未取消份置为 DELIVERED
    pub fn mark_order_delivered(
        &self,
        order_id: OrderId,
        operator: &str,
    ) -> FulfillmentResult<Order> {
        self.mutate(order_id, operator, |order, now| {
            check_order_mutable(order)?;
            for item in &mut order.items {
                deliver_units(&mut item.unit_statuses, now, operator);
            }
            Ok(MutationKind::OrderDelivered)
        })
    }

    /// 整单取消 (终态)
    ///
    /// 重复取消为幂等操作，仍会广播事件
    pub fn cancel_order(&self, order_id: OrderId, operator: &str) -> FulfillmentResult<Order> {
        self.mutate(order_id, operator, |order, now| {
            for item in &mut order.items {
                for unit in item
                    .unit_statuses
                    .iter_mut()
                    .filter(|u| u.status != Status::Canceled)
                {
                    unit.set_status(Status::Canceled, now, operator);
                }
            }
            order.cancelled = true;
            Ok(MutationKind::OrderCanceled)
        })
    }

    // ========== Queries ==========

    pub fn get_order(&self, order_id: OrderId) -> FulfillmentResult<Order> {
        self.store
            .get(order_id)
            .ok_or_else(|| StoreError::OrderNotFound(order_id).into())
    }

    pub fn get_units(&self, order_id: OrderId, item_id: ItemId) -> FulfillmentResult<Vec<Unit>> {
        Ok(self.store.get_units(order_id, item_id)?)
    }

    /// 按创建时间升序返回订单
    ///
    /// 任一订单不满足不变量时整体失败，推送端据此发送 `error` 事件
    pub fn orders(&self, filter: OrderFilter) -> FulfillmentResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|o| filter.matches(o))
            .collect();
        for order in &orders {
            order.check_invariants().map_err(FulfillmentError::Internal)?;
        }
        sort_by_creation(&mut orders);
        Ok(orders)
    }

    pub fn active_orders(&self) -> FulfillmentResult<Vec<Order>> {
        self.orders(OrderFilter::Active)
    }

    pub fn fulfilled_orders(&self) -> FulfillmentResult<Vec<Order>> {
        self.orders(OrderFilter::Fulfilled)
    }

    pub fn all_orders(&self) -> FulfillmentResult<Vec<Order>> {
        self.orders(OrderFilter::All)
    }

    // ========== Internals ==========

    fn mutate<F>(&self, order_id: OrderId, operator: &str, op: F) -> FulfillmentResult<Order>
    where
        F: FnOnce(&mut Order, i64) -> FulfillmentResult<MutationKind>,
    {
        let entry = self.store.entry(order_id)?;
        let mut current = entry.write();

        let now = now_millis();
        let mut draft = current.clone();
        let kind = op(&mut draft, now)?;

        draft.refresh_status();
        draft.updated_at = now;
        draft.version += 1;
        draft.check_invariants().map_err(FulfillmentError::Internal)?;

        if let Some(storage) = &self.storage {
            storage.save(&draft)?;
        }
        *current = draft.clone();
        drop(current);

        tracing::debug!(
            order_id,
            version = draft.version,
            status = %draft.status,
            kind = ?kind,
            operator,
            "Mutation committed"
        );
        self.emit(&draft, kind, operator, now);
        Ok(draft)
    }

    fn emit(&self, order: &Order, kind: MutationKind, operator: &str, now: i64) {
        let event = MutationEvent {
            order_id: order.id,
            kind,
            version: order.version,
            status: order.status,
            operator: operator.to_string(),
            timestamp: now,
        };
        if self.event_tx.send(event).is_err() {
            tracing::trace!(order_id = order.id, "No active feed subscribers");
        }
    }
}

/// 未取消且未出品的份置为 DELIVERED，已出品的份保留原审计字段
fn deliver_units(units: &mut [Unit], now: i64, operator: &str) {
    for unit in units.iter_mut().filter(|u| u.status == Status::Pending) {
        unit.set_status(Status::Delivered, now, operator);
    }
}
