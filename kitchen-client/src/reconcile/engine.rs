//! 客户端对账引擎
//!
//! 每个连接的客户端持有一个引擎实例：
//!
//! - **confirmed**: 服务端确认过的订单值 (来自快照或变更响应)，按 `version` 防止回退
//! - **pending**: 已在本地生效但尚未被服务端确认的乐观变更，按提交顺序保存
//! - **active / fulfilled**: 展示分区，始终等于 `confirmed` 重放剩余 `pending` 后的结果
//!
//! 引擎是同步、无 IO 的纯状态机，由 [`crate::KitchenSession`] 驱动。

use std::collections::{BTreeSet, HashMap, HashSet};

use shared::fulfillment::{
    ItemId, Order, OrderId, Status, TransitionDenied, TransitionPolicy, Unit, UnitKey,
    check_order_mutable, check_set_unit, sort_by_creation,
};
use shared::util::now_millis;

use crate::error::{ClientError, ClientResult};

/// 乐观变更编号 (会话内递增)
pub type MutationId = u64;

/// 展示分区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// 仍有待出品的份 (PENDING)
    Active,
    /// 已出品或已取消 (DELIVERED / CANCELED)
    Fulfilled,
}

impl Partition {
    pub fn of(order: &Order) -> Self {
        if order.is_active() {
            Partition::Active
        } else {
            Partition::Fulfilled
        }
    }
}

/// 本地可乐观执行的变更，与服务端四个变更接口一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    SetUnit { key: UnitKey, status: Status },
    DeliverItem { order_id: OrderId, item_id: ItemId },
    DeliverOrder { order_id: OrderId },
    CancelOrder { order_id: OrderId },
}

impl Mutation {
    pub fn order_id(&self) -> OrderId {
        match self {
            Mutation::SetUnit { key, .. } => key.order_id,
            Mutation::DeliverItem { order_id, .. }
            | Mutation::DeliverOrder { order_id }
            | Mutation::CancelOrder { order_id } => *order_id,
        }
    }

    /// 在订单上执行变更并重新聚合状态
    ///
    /// 校验顺序与服务端一致：先检查键是否存在，再检查迁移是否允许。
    /// 失败时订单保持不变。
    pub fn apply(
        &self,
        order: &mut Order,
        policy: TransitionPolicy,
        operator: &str,
        at: i64,
    ) -> ClientResult<()> {
        match *self {
            Mutation::SetUnit { key, status } => {
                let from = order
                    .item(key.item_id)
                    .ok_or_else(|| item_not_found(key.order_id, key.item_id))?
                    .unit(key.unit_index)
                    .map(|u| u.status)
                    .ok_or_else(|| ClientError::NotFound(format!("Unit {key} not found")))?;
                check_set_unit(order, key, from, status, policy).map_err(denied)?;
                if let Some(unit) = order
                    .item_mut(key.item_id)
                    .and_then(|item| item.unit_mut(key.unit_index))
                {
                    unit.set_status(status, at, operator);
                }
            }
            Mutation::DeliverItem { order_id, item_id } => {
                if order.item(item_id).is_none() {
                    return Err(item_not_found(order_id, item_id));
                }
                check_order_mutable(order).map_err(denied)?;
                if let Some(item) = order.item_mut(item_id) {
                    deliver_units(&mut item.unit_statuses, at, operator);
                }
            }
            Mutation::DeliverOrder { .. } => {
                check_order_mutable(order).map_err(denied)?;
                for item in &mut order.items {
                    deliver_units(&mut item.unit_statuses, at, operator);
                }
            }
            Mutation::CancelOrder { .. } => {
                for unit in order
                    .items
                    .iter_mut()
                    .flat_map(|item| item.unit_statuses.iter_mut())
                    .filter(|u| u.status != Status::Canceled)
                {
                    unit.set_status(Status::Canceled, at, operator);
                }
                order.cancelled = true;
            }
        }
        order.refresh_status();
        order.updated_at = at;
        Ok(())
    }

    /// 受影响的份
    pub fn keys(&self, order: &Order) -> Vec<UnitKey> {
        let unit_keys = |item_id: ItemId, units: &[Unit]| {
            units
                .iter()
                .map(move |u| UnitKey::new(order.id, item_id, u.unit_index))
                .collect::<Vec<_>>()
        };
        match *self {
            Mutation::SetUnit { key, .. } => vec![key],
            Mutation::DeliverItem { item_id, .. } => order
                .item(item_id)
                .map(|item| unit_keys(item_id, &item.unit_statuses))
                .unwrap_or_default(),
            Mutation::DeliverOrder { .. } | Mutation::CancelOrder { .. } => order
                .items
                .iter()
                .flat_map(|item| unit_keys(item.item_id, &item.unit_statuses))
                .collect(),
        }
    }

    /// 服务端值是否已经体现了这次变更
    pub fn is_reflected_in(&self, order: &Order) -> bool {
        let no_pending = |units: &[Unit]| units.iter().all(|u| u.status != Status::Pending);
        match *self {
            Mutation::SetUnit { key, status } => {
                order.unit_status(key.item_id, key.unit_index) == Some(status)
            }
            Mutation::DeliverItem { item_id, .. } => order
                .item(item_id)
                .is_some_and(|item| no_pending(&item.unit_statuses)),
            Mutation::DeliverOrder { .. } => {
                order.items.iter().all(|item| no_pending(&item.unit_statuses))
            }
            Mutation::CancelOrder { .. } => order.cancelled,
        }
    }
}

fn item_not_found(order_id: OrderId, item_id: ItemId) -> ClientError {
    ClientError::NotFound(format!("Item {item_id} not found in order {order_id}"))
}

fn denied(err: TransitionDenied) -> ClientError {
    ClientError::InvalidTransition(err.to_string())
}

fn deliver_units(units: &mut [Unit], at: i64, operator: &str) {
    for unit in units.iter_mut().filter(|u| u.status == Status::Pending) {
        unit.set_status(Status::Delivered, at, operator);
    }
}

#[derive(Debug, Clone)]
struct PendingMutation {
    id: MutationId,
    mutation: Mutation,
    keys: Vec<UnitKey>,
    applied_at: i64,
    /// 执行时的确认版本；只有更新的服务端值才可能体现这次变更
    base_version: u64,
}

impl PendingMutation {
    fn overlaps(&self, other: &PendingMutation) -> bool {
        self.mutation.order_id() == other.mutation.order_id()
            && self.keys.iter().any(|k| other.keys.contains(k))
    }

    fn covered_by(&self, other: &PendingMutation) -> bool {
        self.mutation.order_id() == other.mutation.order_id()
            && self.keys.iter().all(|k| other.keys.contains(k))
    }
}

/// 快照摄入结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SnapshotOutcome {
    /// 因快照已体现而自动确认的乐观变更
    pub confirmed: Vec<MutationId>,
    /// 从未完成快照中消失的订单 (已在别处完成)
    pub vanished: Vec<OrderId>,
    /// 版本低于已确认值而被忽略的订单
    pub stale: Vec<OrderId>,
}

/// 对账引擎
#[derive(Debug)]
pub struct ReconciliationEngine {
    policy: TransitionPolicy,
    operator: String,
    confirmed: HashMap<OrderId, Order>,
    active: HashMap<OrderId, Order>,
    fulfilled: HashMap<OrderId, Order>,
    pending: Vec<PendingMutation>,
    next_id: MutationId,
}

impl ReconciliationEngine {
    pub fn new(policy: TransitionPolicy, operator: impl Into<String>) -> Self {
        Self {
            policy,
            operator: operator.into(),
            confirmed: HashMap::new(),
            active: HashMap::new(),
            fulfilled: HashMap::new(),
            pending: Vec::new(),
            next_id: 1,
        }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    // ========== Optimistic mutations ==========

    /// 本地立即执行变更并登记为待确认
    ///
    /// 本地校验失败时返回错误，状态不变。
    pub fn apply_optimistic(&mut self, mutation: Mutation) -> ClientResult<MutationId> {
        let order_id = mutation.order_id();
        let mut order = self
            .visible(order_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("Order {order_id} not found")))?;

        let base_version = self.confirmed_version(order_id).unwrap_or_default();
        let at = now_millis();
        mutation.apply(&mut order, self.policy, &self.operator, at)?;
        let keys = mutation.keys(&order);

        let id = self.next_id;
        self.next_id += 1;
        self.pending.push(PendingMutation {
            id,
            mutation,
            keys,
            applied_at: at,
            base_version,
        });
        tracing::debug!(mutation_id = id, order_id, ?mutation, "Optimistic mutation applied");
        self.place(order);
        Ok(id)
    }

    /// 服务端确认：移除待确认记录，服务端值覆盖本地值
    pub fn confirm(&mut self, id: MutationId, order: Order) {
        let order_id = order.id;
        self.pending.retain(|p| p.id != id);
        if !self.accept(order) {
            tracing::debug!(mutation_id = id, order_id, "Stale mutation response ignored");
        }
        self.rebuild(order_id);
    }

    /// 服务端拒绝或网络失败：回滚到最近确认值 (保留同一订单上其余待确认变更)
    pub fn fail(&mut self, id: MutationId) -> Option<Mutation> {
        let pos = self.pending.iter().position(|p| p.id == id)?;
        let removed = self.pending.remove(pos);
        tracing::debug!(
            mutation_id = id,
            order_id = removed.mutation.order_id(),
            "Optimistic mutation rolled back"
        );
        self.rebuild(removed.mutation.order_id());
        Some(removed.mutation)
    }

    // ========== Server state ingestion ==========

    /// 摄入未完成订单快照
    ///
    /// - 快照中的订单成为新的确认值 (版本更旧的除外)
    /// - 快照已体现的待确认变更自动确认
    /// - 有待确认变更的订单保留乐观值，即使不在快照中也不会被移除
    /// - 其余不在快照中的未完成订单视为已在别处完成，从视图中移除
    pub fn ingest_snapshot(&mut self, orders: Vec<Order>) -> SnapshotOutcome {
        let mut outcome = SnapshotOutcome::default();
        let present: HashSet<OrderId> = orders.iter().map(|o| o.id).collect();

        for order in orders {
            let order_id = order.id;
            if !self.accept(order) {
                outcome.stale.push(order_id);
                continue;
            }
            outcome.confirmed.extend(self.confirm_reflected(order_id));
            self.rebuild(order_id);
        }

        let vanished: Vec<OrderId> = self
            .confirmed
            .values()
            .filter(|o| o.is_active() && !present.contains(&o.id))
            .map(|o| o.id)
            .filter(|id| !self.has_pending(*id))
            .collect();
        for order_id in &vanished {
            self.confirmed.remove(order_id);
            self.rebuild(*order_id);
        }
        outcome.vanished = vanished;

        if !outcome.confirmed.is_empty() || !outcome.vanished.is_empty() {
            tracing::debug!(
                confirmed = outcome.confirmed.len(),
                vanished = outcome.vanished.len(),
                stale = outcome.stale.len(),
                "Snapshot reconciled"
            );
        }
        outcome
    }

    /// 摄入已完成订单列表 (替换 fulfilled 分区的确认值)
    pub fn ingest_fulfilled(&mut self, orders: Vec<Order>) {
        let present: HashSet<OrderId> = orders.iter().map(|o| o.id).collect();
        for order in orders {
            let order_id = order.id;
            if self.accept(order) {
                self.confirm_reflected(order_id);
                self.rebuild(order_id);
            }
        }

        let dropped: Vec<OrderId> = self
            .confirmed
            .values()
            .filter(|o| !o.is_active() && !present.contains(&o.id))
            .map(|o| o.id)
            .filter(|id| !self.has_pending(*id))
            .collect();
        for order_id in dropped {
            self.confirmed.remove(&order_id);
            self.rebuild(order_id);
        }
    }

    /// 摄入单个服务端订单 (不影响其他订单)
    pub fn upsert(&mut self, order: Order) -> bool {
        let order_id = order.id;
        if !self.accept(order) {
            return false;
        }
        self.confirm_reflected(order_id);
        self.rebuild(order_id);
        true
    }

    // ========== Views ==========

    /// 未完成订单，按创建时间升序
    pub fn active_orders(&self) -> Vec<Order> {
        sorted(self.active.values())
    }

    /// 已完成订单，按创建时间升序
    pub fn fulfilled_orders(&self) -> Vec<Order> {
        sorted(self.fulfilled.values())
    }

    /// 当前展示的订单值 (含乐观变更)
    pub fn visible(&self, order_id: OrderId) -> Option<&Order> {
        self.active
            .get(&order_id)
            .or_else(|| self.fulfilled.get(&order_id))
    }

    pub fn partition_of(&self, order_id: OrderId) -> Option<Partition> {
        if self.active.contains_key(&order_id) {
            Some(Partition::Active)
        } else if self.fulfilled.contains_key(&order_id) {
            Some(Partition::Fulfilled)
        } else {
            None
        }
    }

    /// 最近一次服务端确认的值
    pub fn confirmed(&self, order_id: OrderId) -> Option<&Order> {
        self.confirmed.get(&order_id)
    }

    pub fn confirmed_version(&self, order_id: OrderId) -> Option<u64> {
        self.confirmed.get(&order_id).map(|o| o.version)
    }

    /// 所有待确认的份
    pub fn pending_keys(&self) -> BTreeSet<UnitKey> {
        self.pending
            .iter()
            .flat_map(|p| p.keys.iter().copied())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self, order_id: OrderId) -> bool {
        self.pending
            .iter()
            .any(|p| p.mutation.order_id() == order_id)
    }

    // ========== Internals ==========

    /// 版本守卫：只接受不旧于已确认值的服务端订单
    fn accept(&mut self, order: Order) -> bool {
        if let Some(current) = self.confirmed.get(&order.id)
            && current.version > order.version
        {
            return false;
        }
        self.confirmed.insert(order.id, order);
        true
    }

    /// 确认值已体现的待确认变更视为成功
    ///
    /// 条件：确认值版本新于变更执行时的版本，值与变更目标一致，且之后没有
    /// 同一份上的待确认变更。被它完全覆盖的更早变更一并移除。
    fn confirm_reflected(&mut self, order_id: OrderId) -> Vec<MutationId> {
        let Some(order) = self.confirmed.get(&order_id) else {
            return Vec::new();
        };
        let mut reflected: Vec<MutationId> = Vec::new();
        for (pos, pending) in self.pending.iter().enumerate() {
            if pending.mutation.order_id() != order_id
                || order.version <= pending.base_version
                || !pending.mutation.is_reflected_in(order)
                || self.pending[pos + 1..].iter().any(|later| later.overlaps(pending))
            {
                continue;
            }
            for earlier in self.pending[..pos].iter().filter(|e| e.covered_by(pending)) {
                if !reflected.contains(&earlier.id) {
                    reflected.push(earlier.id);
                }
            }
            if !reflected.contains(&pending.id) {
                reflected.push(pending.id);
            }
        }
        self.pending.retain(|p| !reflected.contains(&p.id));
        reflected.sort_unstable();
        reflected
    }

    /// 重新计算订单的展示值：确认值 + 按顺序重放剩余待确认变更
    fn rebuild(&mut self, order_id: OrderId) {
        let before = self.partition_of(order_id);
        self.active.remove(&order_id);
        self.fulfilled.remove(&order_id);

        let Some(mut order) = self.confirmed.get(&order_id).cloned() else {
            if !self.has_pending(order_id) {
                return;
            }
            // 没有确认值的待确认变更无从重放
            self.pending.retain(|p| p.mutation.order_id() != order_id);
            return;
        };

        for pending in self
            .pending
            .iter()
            .filter(|p| p.mutation.order_id() == order_id)
        {
            if let Err(e) =
                pending
                    .mutation
                    .apply(&mut order, self.policy, &self.operator, pending.applied_at)
            {
                tracing::debug!(mutation_id = pending.id, order_id, error = %e, "Pending mutation no longer applies");
            }
        }

        let after = Partition::of(&order);
        if before.is_some_and(|p| p != after) {
            tracing::debug!(order_id, from = ?before, to = ?after, "Order moved between partitions");
        }
        self.place(order);
    }

    fn place(&mut self, order: Order) {
        self.active.remove(&order.id);
        self.fulfilled.remove(&order.id);
        match Partition::of(&order) {
            Partition::Active => self.active.insert(order.id, order),
            Partition::Fulfilled => self.fulfilled.insert(order.id, order),
        };
    }
}

fn sorted<'a>(orders: impl Iterator<Item = &'a Order>) -> Vec<Order> {
    let mut orders: Vec<Order> = orders.cloned().collect();
    sort_by_creation(&mut orders);
    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::fulfillment::OrderItem;

    const OP: &str = "tester";

    fn order(id: OrderId, created_at: i64, counts: &[(ItemId, u32)]) -> Order {
        let items = counts
            .iter()
            .map(|(item_id, count)| OrderItem::new(*item_id, format!("item-{item_id}"), *count, None, created_at))
            .collect();
        Order::new(id, 1, None, created_at, items)
    }

    /// 模拟服务端提交：执行变更并递增版本
    fn server_apply(order: &Order, mutation: Mutation) -> Order {
        let mut next = order.clone();
        mutation
            .apply(&mut next, TransitionPolicy::AllowReopen, "server", now_millis())
            .unwrap();
        next.version += 1;
        next
    }

    fn set(order_id: OrderId, item_id: ItemId, unit_index: u32, status: Status) -> Mutation {
        Mutation::SetUnit {
            key: UnitKey::new(order_id, item_id, unit_index),
            status,
        }
    }

    fn engine_with(orders: Vec<Order>) -> ReconciliationEngine {
        let mut engine = ReconciliationEngine::new(TransitionPolicy::AllowReopen, OP);
        engine.ingest_snapshot(orders);
        engine
    }

    #[test]
    fn test_optimistic_apply_moves_partition_and_back() {
        let mut engine = engine_with(vec![order(1, 10, &[(1, 2)])]);
        assert_eq!(engine.partition_of(1), Some(Partition::Active));

        engine.apply_optimistic(set(1, 1, 0, Status::Delivered)).unwrap();
        assert_eq!(engine.partition_of(1), Some(Partition::Active));

        engine.apply_optimistic(set(1, 1, 1, Status::Delivered)).unwrap();
        assert_eq!(engine.partition_of(1), Some(Partition::Fulfilled));
        assert_eq!(engine.visible(1).unwrap().status, Status::Delivered);

        // 重新打开一份 -> 回到 active
        engine.apply_optimistic(set(1, 1, 0, Status::Pending)).unwrap();
        assert_eq!(engine.partition_of(1), Some(Partition::Active));
        assert_eq!(engine.pending_count(), 3);
    }

    #[test]
    fn test_three_units_scenario() {
        let mut engine = engine_with(vec![order(1, 10, &[(5, 3)])]);
        engine.apply_optimistic(set(1, 5, 0, Status::Delivered)).unwrap();
        assert_eq!(engine.visible(1).unwrap().items[0].overall_status, Status::Pending);

        engine.apply_optimistic(set(1, 5, 1, Status::Delivered)).unwrap();
        engine.apply_optimistic(set(1, 5, 2, Status::Delivered)).unwrap();
        let visible = engine.visible(1).unwrap();
        assert_eq!(visible.items[0].overall_status, Status::Delivered);
        assert_eq!(visible.status, Status::Delivered);
        assert!(engine.active_orders().is_empty());
    }

    #[test]
    fn test_delivered_and_canceled_items_fulfil_order() {
        let base = order(1, 10, &[(1, 1), (2, 2)]);
        let canceled = server_apply(&server_apply(&base, set(1, 2, 0, Status::Canceled)), set(1, 2, 1, Status::Canceled));
        let mut engine = engine_with(vec![canceled]);
        assert_eq!(engine.partition_of(1), Some(Partition::Active));

        engine.apply_optimistic(Mutation::DeliverItem { order_id: 1, item_id: 1 }).unwrap();
        let visible = engine.visible(1).unwrap();
        assert_eq!(visible.items[0].overall_status, Status::Delivered);
        assert_eq!(visible.items[1].overall_status, Status::Canceled);
        assert_eq!(visible.status, Status::Delivered);
        assert_eq!(engine.partition_of(1), Some(Partition::Fulfilled));
    }

    #[test]
    fn test_confirm_takes_server_value() {
        let base = order(1, 10, &[(1, 2)]);
        let mut engine = engine_with(vec![base.clone()]);
        let id = engine.apply_optimistic(set(1, 1, 0, Status::Delivered)).unwrap();
        assert!(engine.pending_keys().contains(&UnitKey::new(1, 1, 0)));

        let server = server_apply(&base, set(1, 1, 0, Status::Delivered));
        engine.confirm(id, server.clone());
        assert_eq!(engine.pending_count(), 0);
        assert_eq!(engine.visible(1), Some(&server));
        assert_eq!(engine.confirmed_version(1), Some(1));
    }

    #[test]
    fn test_fail_rolls_back_to_confirmed() {
        let base = order(1, 10, &[(1, 1)]);
        let mut engine = engine_with(vec![base.clone()]);
        let id = engine.apply_optimistic(set(1, 1, 0, Status::Delivered)).unwrap();
        assert_eq!(engine.partition_of(1), Some(Partition::Fulfilled));

        assert_eq!(engine.fail(id), Some(set(1, 1, 0, Status::Delivered)));
        assert_eq!(engine.partition_of(1), Some(Partition::Active));
        assert_eq!(engine.visible(1), Some(&base));
        assert!(engine.pending_keys().is_empty());
        assert_eq!(engine.fail(id), None);
    }

    #[test]
    fn test_fail_keeps_other_pending_mutations() {
        let mut engine = engine_with(vec![order(1, 10, &[(1, 2)])]);
        let first = engine.apply_optimistic(set(1, 1, 0, Status::Delivered)).unwrap();
        engine.apply_optimistic(set(1, 1, 1, Status::Delivered)).unwrap();

        engine.fail(first);
        let visible = engine.visible(1).unwrap();
        assert_eq!(visible.unit_status(1, 0), Some(Status::Pending));
        assert_eq!(visible.unit_status(1, 1), Some(Status::Delivered));
    }

    #[test]
    fn test_local_rejection_leaves_state_untouched() {
        let base = order(1, 10, &[(1, 1)]);
        let mut engine = engine_with(vec![base.clone()]);

        let err = engine.apply_optimistic(set(1, 9, 0, Status::Delivered)).unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
        let err = engine.apply_optimistic(set(2, 1, 0, Status::Delivered)).unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
        assert_eq!(engine.pending_count(), 0);
        assert_eq!(engine.visible(1), Some(&base));
    }

    #[test]
    fn test_cancel_then_set_is_invalid_transition() {
        let mut engine = engine_with(vec![order(1, 10, &[(1, 2)])]);
        engine.apply_optimistic(Mutation::CancelOrder { order_id: 1 }).unwrap();
        assert_eq!(engine.visible(1).unwrap().status, Status::Canceled);
        assert_eq!(engine.partition_of(1), Some(Partition::Fulfilled));

        let err = engine.apply_optimistic(set(1, 1, 0, Status::Pending)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidTransition(_)));
        assert_eq!(engine.pending_count(), 1);
    }

    #[test]
    fn test_strict_policy_blocks_reopen() {
        let base = server_apply(&order(1, 10, &[(1, 2)]), set(1, 1, 0, Status::Canceled));
        let mut engine = ReconciliationEngine::new(TransitionPolicy::Strict, OP);
        engine.ingest_snapshot(vec![base]);

        let err = engine.apply_optimistic(set(1, 1, 0, Status::Pending)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidTransition(_)));
    }

    #[test]
    fn test_snapshot_keeps_optimistic_order() {
        let seven = order(7, 10, &[(1, 1)]);
        let eight = order(8, 20, &[(1, 2)]);
        let mut engine = engine_with(vec![seven.clone(), eight.clone()]);
        engine.apply_optimistic(set(7, 1, 0, Status::Delivered)).unwrap();

        // 服务端尚未处理 7，但 8 被别人改过
        let eight_changed = server_apply(&eight, set(8, 1, 0, Status::Delivered));
        let outcome = engine.ingest_snapshot(vec![seven.clone(), eight_changed.clone()]);
        assert!(outcome.confirmed.is_empty());

        let visible = engine.visible(7).unwrap();
        assert_eq!(visible.unit_status(1, 0), Some(Status::Delivered));
        assert_eq!(engine.partition_of(7), Some(Partition::Fulfilled));
        assert_eq!(engine.visible(8), Some(&eight_changed));
        assert_eq!(engine.pending_count(), 1);
    }

    #[test]
    fn test_snapshot_never_drops_pending_order() {
        let mut engine = engine_with(vec![order(7, 10, &[(1, 2)]), order(8, 20, &[(1, 1)])]);
        engine.apply_optimistic(set(7, 1, 0, Status::Delivered)).unwrap();

        let outcome = engine.ingest_snapshot(Vec::new());
        assert_eq!(outcome.vanished, vec![8]);
        assert!(engine.visible(7).is_some());
        assert!(engine.visible(8).is_none());
    }

    #[test]
    fn test_snapshot_reflecting_mutation_confirms_it() {
        let base = order(1, 10, &[(1, 2)]);
        let mut engine = engine_with(vec![base.clone()]);
        let id = engine.apply_optimistic(set(1, 1, 0, Status::Delivered)).unwrap();

        let server = server_apply(&base, set(1, 1, 0, Status::Delivered));
        let outcome = engine.ingest_snapshot(vec![server.clone()]);
        assert_eq!(outcome.confirmed, vec![id]);
        assert_eq!(engine.pending_count(), 0);
        assert_eq!(engine.visible(1), Some(&server));
    }

    #[test]
    fn test_unchanged_snapshot_keeps_latest_of_opposing_mutations() {
        let base = order(1, 10, &[(1, 1)]);
        let mut engine = engine_with(vec![base.clone()]);
        engine.apply_optimistic(set(1, 1, 0, Status::Delivered)).unwrap();
        engine.apply_optimistic(set(1, 1, 0, Status::Pending)).unwrap();
        let before = engine.visible(1).unwrap().unit_status(1, 0);

        // 快照在两个请求到达服务端之前生成，值恰好等于后一次变更的目标
        let outcome = engine.ingest_snapshot(vec![base]);
        assert!(outcome.confirmed.is_empty());
        assert_eq!(engine.pending_count(), 2);
        assert_eq!(engine.visible(1).unwrap().unit_status(1, 0), before);
        assert_eq!(before, Some(Status::Pending));
    }

    #[test]
    fn test_newer_snapshot_confirms_latest_and_superseded_mutations() {
        let base = order(1, 10, &[(1, 1)]);
        let mut engine = engine_with(vec![base.clone()]);
        let first = engine.apply_optimistic(set(1, 1, 0, Status::Delivered)).unwrap();
        let second = engine.apply_optimistic(set(1, 1, 0, Status::Pending)).unwrap();

        let v1 = server_apply(&base, set(1, 1, 0, Status::Delivered));
        let v2 = server_apply(&v1, set(1, 1, 0, Status::Pending));
        let outcome = engine.ingest_snapshot(vec![v2.clone()]);
        assert_eq!(outcome.confirmed, vec![first, second]);
        assert_eq!(engine.pending_count(), 0);
        assert_eq!(engine.visible(1), Some(&v2));
    }

    #[test]
    fn test_earlier_mutation_not_confirmed_while_later_overlaps() {
        let base = order(1, 10, &[(1, 1)]);
        let mut engine = engine_with(vec![base.clone()]);
        engine.apply_optimistic(set(1, 1, 0, Status::Delivered)).unwrap();
        engine.apply_optimistic(set(1, 1, 0, Status::Pending)).unwrap();

        // 服务端只处理了第一次变更
        let v1 = server_apply(&base, set(1, 1, 0, Status::Delivered));
        let outcome = engine.ingest_snapshot(vec![v1]);
        assert!(outcome.confirmed.is_empty());
        assert_eq!(engine.visible(1).unwrap().unit_status(1, 0), Some(Status::Pending));
    }

    #[test]
    fn test_stale_snapshot_entry_ignored() {
        let base = order(1, 10, &[(1, 2)]);
        let v1 = server_apply(&base, set(1, 1, 0, Status::Delivered));
        let mut engine = engine_with(vec![v1.clone()]);

        let outcome = engine.ingest_snapshot(vec![base]);
        assert_eq!(outcome.stale, vec![1]);
        assert_eq!(engine.visible(1), Some(&v1));
    }

    #[test]
    fn test_stale_confirm_keeps_newer_value() {
        let base = order(1, 10, &[(1, 2)]);
        let mut engine = engine_with(vec![base.clone()]);
        let id = engine.apply_optimistic(set(1, 1, 0, Status::Delivered)).unwrap();

        let v1 = server_apply(&base, set(1, 1, 0, Status::Delivered));
        let v2 = server_apply(&v1, set(1, 1, 1, Status::Delivered));
        engine.ingest_snapshot(vec![v2.clone()]);
        engine.confirm(id, v1);
        assert_eq!(engine.visible(1), Some(&v2));
    }

    #[test]
    fn test_snapshot_moves_order_back_to_active() {
        let base = order(1, 10, &[(1, 1)]);
        let delivered = server_apply(&base, set(1, 1, 0, Status::Delivered));
        let mut engine = ReconciliationEngine::new(TransitionPolicy::AllowReopen, OP);
        engine.ingest_fulfilled(vec![delivered.clone()]);
        assert_eq!(engine.partition_of(1), Some(Partition::Fulfilled));

        let reopened = server_apply(&delivered, set(1, 1, 0, Status::Pending));
        engine.ingest_snapshot(vec![reopened]);
        assert_eq!(engine.partition_of(1), Some(Partition::Active));
        assert!(engine.fulfilled_orders().is_empty());
    }

    #[test]
    fn test_active_snapshot_leaves_fulfilled_partition_alone() {
        let done = server_apply(&order(2, 5, &[(1, 1)]), set(2, 1, 0, Status::Delivered));
        let mut engine = ReconciliationEngine::new(TransitionPolicy::AllowReopen, OP);
        engine.ingest_fulfilled(vec![done]);

        let outcome = engine.ingest_snapshot(vec![order(1, 10, &[(1, 1)])]);
        assert!(outcome.vanished.is_empty());
        assert_eq!(engine.fulfilled_orders().len(), 1);
        assert_eq!(engine.active_orders().len(), 1);
    }

    #[test]
    fn test_views_sorted_by_creation() {
        let engine = engine_with(vec![order(3, 30, &[(1, 1)]), order(1, 10, &[(1, 1)]), order(2, 20, &[(1, 1)])]);
        let ids: Vec<OrderId> = engine.active_orders().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_bulk_mutation_keys() {
        let base = order(1, 10, &[(1, 2), (2, 1)]);
        let keys = Mutation::DeliverOrder { order_id: 1 }.keys(&base);
        assert_eq!(keys.len(), 3);
        let keys = Mutation::DeliverItem { order_id: 1, item_id: 2 }.keys(&base);
        assert_eq!(keys, vec![UnitKey::new(1, 2, 0)]);
    }

    #[test]
    fn test_deliver_item_skips_canceled_units() {
        let mut base = server_apply(&order(1, 10, &[(1, 2)]), set(1, 1, 0, Status::Canceled));
        Mutation::DeliverItem { order_id: 1, item_id: 1 }
            .apply(&mut base, TransitionPolicy::Strict, OP, 99)
            .unwrap();
        assert_eq!(base.unit_status(1, 0), Some(Status::Canceled));
        assert_eq!(base.unit_status(1, 1), Some(Status::Delivered));
        assert_eq!(base.items[0].overall_status, Status::Delivered);
    }

    #[test]
    fn test_mark_item_delivered_idempotent_locally() {
        let mut once = order(1, 10, &[(1, 3)]);
        let mutation = Mutation::DeliverItem { order_id: 1, item_id: 1 };
        mutation.apply(&mut once, TransitionPolicy::AllowReopen, OP, 1).unwrap();
        let mut twice = once.clone();
        mutation.apply(&mut twice, TransitionPolicy::AllowReopen, OP, 2).unwrap();
        assert_eq!(once.items, twice.items);
        assert_eq!(once.status, twice.status);
    }
}
