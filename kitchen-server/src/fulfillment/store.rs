//! 份状态存储 - 内存中的订单文档
//!
//! 每个订单一把 `RwLock`，不同订单之间互不阻塞；读取返回克隆，
//! 写入在锁内完成并立即重新聚合，读写对同进程内的聚合计算立即可见。

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use shared::fulfillment::{ItemId, Order, OrderId, Status, Unit, UnitKey};
use std::sync::Arc;
use thiserror::Error;

/// 键不存在
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Item {item_id} not found in order {order_id}")]
    ItemNotFound { order_id: OrderId, item_id: ItemId },

    #[error("Unit {0} not found")]
    UnitNotFound(UnitKey),
}

/// 订单条目 (共享所有权 + 订单级锁)
pub type OrderEntry = Arc<RwLock<Order>>;

#[derive(Debug, Default)]
pub struct UnitStatusStore {
    orders: DashMap<OrderId, OrderEntry>,
}

impl UnitStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// 插入或替换订单 (仅用于从持久化恢复)
    pub fn insert(&self, order: Order) {
        self.orders.insert(order.id, Arc::new(RwLock::new(order)));
    }

    /// 仅在订单号空闲时插入；已被占用时原样退回订单
    pub fn insert_new(&self, order: Order) -> Result<(), Order> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(order),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(order)));
                Ok(())
            }
        }
    }

    pub fn remove(&self, order_id: OrderId) -> Option<Order> {
        self.orders
            .remove(&order_id)
            .map(|(_, entry)| entry.read().clone())
    }

    /// 获取订单条目，调用方自行加锁
    pub fn entry(&self, order_id: OrderId) -> Result<OrderEntry, StoreError> {
        self.orders
            .get(&order_id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    pub fn get(&self, order_id: OrderId) -> Option<Order> {
        self.orders.get(&order_id).map(|e| e.value().read().clone())
    }

    pub fn get_units(&self, order_id: OrderId, item_id: ItemId) -> Result<Vec<Unit>, StoreError> {
        let entry = self.entry(order_id)?;
        let order = entry.read();
        order
            .item(item_id)
            .map(|item| item.unit_statuses.clone())
            .ok_or(StoreError::ItemNotFound { order_id, item_id })
    }

    /// 写入单份状态并重新聚合该订单
    pub fn set_unit_status(
        &self,
        key: UnitKey,
        status: Status,
        at: i64,
        by: &str,
    ) -> Result<Unit, StoreError> {
        let entry = self.entry(key.order_id)?;
        let mut order = entry.write();
        write_unit(&mut order, key, status, at, by)
    }

    /// 所有订单的克隆 (顺序不定)
    pub fn snapshot(&self) -> Vec<Order> {
        // 先收集条目再逐个加锁，避免持有分片锁时等待订单锁
        let entries: Vec<OrderEntry> = self.orders.iter().map(|e| e.value().clone()).collect();
        entries.iter().map(|e| e.read().clone()).collect()
    }
}

/// 在订单文档上写入单份状态，并刷新菜品与订单状态
pub fn write_unit(
    order: &mut Order,
    key: UnitKey,
    status: Status,
    at: i64,
    by: &str,
) -> Result<Unit, StoreError> {
    let item = order.item_mut(key.item_id).ok_or(StoreError::ItemNotFound {
        order_id: key.order_id,
        item_id: key.item_id,
    })?;
    let unit = item
        .unit_mut(key.unit_index)
        .ok_or(StoreError::UnitNotFound(key))?;
    unit.set_status(status, at, by);
    let written = unit.clone();
    order.refresh_status();
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::fulfillment::OrderItem;

    fn store_with_order() -> UnitStatusStore {
        let store = UnitStatusStore::new();
        store.insert(Order::new(
            7,
            2,
            None,
            100,
            vec![
                OrderItem::new(12, "Skewer", 3, None, 100),
                OrderItem::new(13, "Beer", 1, None, 100),
            ],
        ));
        store
    }

    #[test]
    fn test_get_units() {
        let store = store_with_order();
        let units = store.get_units(7, 12).unwrap();
        assert_eq!(units.len(), 3);
        assert!(units.iter().all(|u| u.status == Status::Pending));

        assert_eq!(store.get_units(8, 12), Err(StoreError::OrderNotFound(8)));
        assert_eq!(
            store.get_units(7, 99),
            Err(StoreError::ItemNotFound {
                order_id: 7,
                item_id: 99
            })
        );
    }

    #[test]
    fn test_set_unit_status_visible_to_aggregation() {
        let store = store_with_order();
        let unit = store
            .set_unit_status(UnitKey::new(7, 13, 0), Status::Delivered, 200, "cook")
            .unwrap();
        assert_eq!(unit.status, Status::Delivered);
        assert_eq!(unit.updated_at, 200);
        assert_eq!(unit.updated_by.as_deref(), Some("cook"));

        let order = store.get(7).unwrap();
        assert_eq!(order.item(13).unwrap().overall_status, Status::Delivered);
        assert_eq!(order.status, Status::Pending);
    }

    #[test]
    fn test_set_unit_status_unknown_unit() {
        let store = store_with_order();
        let key = UnitKey::new(7, 12, 3);
        assert_eq!(
            store.set_unit_status(key, Status::Delivered, 1, "cook"),
            Err(StoreError::UnitNotFound(key))
        );
        // 失败不改动任何份
        assert!(
            store
                .get_units(7, 12)
                .unwrap()
                .iter()
                .all(|u| u.status == Status::Pending)
        );
    }

    #[test]
    fn test_insert_new_never_replaces() {
        let store = store_with_order();
        let taken = Order::new(7, 9, None, 300, vec![OrderItem::new(1, "Tea", 1, None, 300)]);
        let returned = store.insert_new(taken.clone()).unwrap_err();
        assert_eq!(returned, taken);
        assert_eq!(store.get(7).unwrap().table_number, 2);

        let free = Order::new(8, 9, None, 300, vec![OrderItem::new(1, "Tea", 1, None, 300)]);
        store.insert_new(free).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.remove(8).map(|o| o.table_number), Some(9));
        assert!(store.get(8).is_none());
    }

    #[test]
    fn test_concurrent_insert_new_same_id() {
        let store = Arc::new(UnitStatusStore::new());
        let handles: Vec<_> = (0..8)
            .map(|table| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .insert_new(Order::new(42, table, None, 1, vec![]))
                        .is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_clones() {
        let store = store_with_order();
        store.insert(Order::new(8, 3, None, 50, vec![]));
        let mut ids: Vec<_> = store.snapshot().iter().map(|o| o.id).collect();
        ids.sort();
        assert_eq!(ids, vec![7, 8]);
        assert_eq!(store.len(), 2);
    }
}
