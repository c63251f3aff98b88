//! 订单 / 菜品 / 份 数据模型
//!
//! 线上格式统一 camelCase，与厨房推送 payload 保持一致。

use serde::{Deserialize, Serialize};

use super::aggregate;
use super::status::{ItemId, OrderId, Status, UnitIndex};

/// 份 - 最小出品单位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub unit_index: UnitIndex,
    pub status: Status,
    /// 最近一次变更时间 (Unix millis)
    pub updated_at: i64,
    /// 最近一次变更的操作员
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl Unit {
    pub fn new(unit_index: UnitIndex, status: Status, updated_at: i64, updated_by: Option<String>) -> Self {
        Self {
            unit_index,
            status,
            updated_at,
            updated_by,
        }
    }

    /// 写入新状态并记录审计字段
    pub fn set_status(&mut self, status: Status, at: i64, by: &str) {
        self.status = status;
        self.updated_at = at;
        self.updated_by = Some(by.to_string());
    }
}

/// 菜品 - 归属于唯一的订单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub item_id: ItemId,
    pub name: String,
    /// 点单数量，创建后不可变
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub unit_statuses: Vec<Unit>,
    /// 由 `unit_statuses` 聚合得出，不直接写入
    pub overall_status: Status,
}

impl OrderItem {
    /// 新建菜品，所有份均为 PENDING
    pub fn new(
        item_id: ItemId,
        name: impl Into<String>,
        count: u32,
        observation: Option<String>,
        created_at: i64,
    ) -> Self {
        let unit_statuses = (0..count)
            .map(|i| Unit::new(i, Status::Pending, created_at, None))
            .collect();
        let mut item = Self {
            item_id,
            name: name.into(),
            count,
            observation,
            unit_statuses,
            overall_status: Status::Pending,
        };
        item.refresh_status();
        item
    }

    pub fn unit(&self, unit_index: UnitIndex) -> Option<&Unit> {
        self.unit_statuses.get(unit_index as usize)
    }

    pub fn unit_mut(&mut self, unit_index: UnitIndex) -> Option<&mut Unit> {
        self.unit_statuses.get_mut(unit_index as usize)
    }

    /// 重新计算聚合状态
    pub fn refresh_status(&mut self) -> Status {
        self.overall_status = aggregate::item_status(&self.unit_statuses);
        self.overall_status
    }

    /// 校验 `len(units) == count` 且序号连续
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.unit_statuses.len() != self.count as usize {
            return Err(format!(
                "item {} has {} units but count {}",
                self.item_id,
                self.unit_statuses.len(),
                self.count
            ));
        }
        if let Some((pos, unit)) = self
            .unit_statuses
            .iter()
            .enumerate()
            .find(|(pos, unit)| unit.unit_index as usize != *pos)
        {
            return Err(format!(
                "item {} has unit index {} at position {}",
                self.item_id, unit.unit_index, pos
            ));
        }
        Ok(())
    }
}

/// 订单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub table_number: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Unix millis
    pub created_at: i64,
    pub updated_at: i64,
    pub items: Vec<OrderItem>,
    /// 由菜品聚合得出；显式整单取消后恒为 CANCELED
    pub status: Status,
    /// 整单取消标记 (终态)
    #[serde(default)]
    pub cancelled: bool,
    /// 每次提交的变更 +1，客户端据此丢弃过期数据
    #[serde(default)]
    pub version: u64,
}

impl Order {
    pub fn new(id: OrderId, table_number: i32, created_by: Option<String>, created_at: i64, items: Vec<OrderItem>) -> Self {
        let mut order = Self {
            id,
            table_number,
            created_by,
            created_at,
            updated_at: created_at,
            items,
            status: Status::Pending,
            cancelled: false,
            version: 0,
        };
        order.refresh_status();
        order
    }

    pub fn item(&self, item_id: ItemId) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    pub fn item_mut(&mut self, item_id: ItemId) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|i| i.item_id == item_id)
    }

    pub fn unit_status(&self, item_id: ItemId, unit_index: UnitIndex) -> Option<Status> {
        self.item(item_id)?.unit(unit_index).map(|u| u.status)
    }

    /// 重新计算所有菜品及订单状态
    pub fn refresh_status(&mut self) -> Status {
        for item in &mut self.items {
            item.refresh_status();
        }
        self.status = aggregate::order_status(&self.items, self.cancelled);
        self.status
    }

    /// 仍需厨房处理 (active 分区)
    pub fn is_active(&self) -> bool {
        self.status.is_pending()
    }

    /// 校验结构不变量与聚合状态一致性
    pub fn check_invariants(&self) -> Result<(), String> {
        for item in &self.items {
            item.check_invariants()?;
            let expected = aggregate::item_status(&item.unit_statuses);
            if item.overall_status != expected {
                return Err(format!(
                    "item {} status {} disagrees with units ({})",
                    item.item_id, item.overall_status, expected
                ));
            }
        }
        let expected = aggregate::order_status(&self.items, self.cancelled);
        if self.status != expected {
            return Err(format!(
                "order {} status {} disagrees with items ({})",
                self.id, self.status, expected
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order::new(
            7,
            4,
            Some("waiter-1".to_string()),
            1_000,
            vec![
                OrderItem::new(12, "Skewer", 3, None, 1_000),
                OrderItem::new(15, "Soda", 1, Some("no ice".to_string()), 1_000),
            ],
        )
    }

    #[test]
    fn test_new_item_units_all_pending() {
        let item = OrderItem::new(1, "Rice", 3, None, 5);
        assert_eq!(item.unit_statuses.len(), 3);
        assert!(item.unit_statuses.iter().all(|u| u.status == Status::Pending));
        assert_eq!(item.unit_statuses[2].unit_index, 2);
        assert_eq!(item.overall_status, Status::Pending);
        assert!(item.check_invariants().is_ok());
    }

    #[test]
    fn test_order_refresh_status() {
        let mut order = sample_order();
        assert!(order.is_active());

        for item in &mut order.items {
            for unit in &mut item.unit_statuses {
                unit.set_status(Status::Delivered, 2_000, "cook");
            }
        }
        assert_eq!(order.refresh_status(), Status::Delivered);
        assert!(!order.is_active());
        assert_eq!(order.items[0].overall_status, Status::Delivered);
        assert!(order.check_invariants().is_ok());
    }

    #[test]
    fn test_check_invariants_detects_stale_status() {
        let mut order = sample_order();
        order.items[1].unit_statuses[0].status = Status::Delivered;
        assert!(order.check_invariants().is_err());

        order.refresh_status();
        assert!(order.check_invariants().is_ok());
    }

    #[test]
    fn test_check_invariants_detects_count_mismatch() {
        let mut order = sample_order();
        order.items[0].unit_statuses.pop();
        assert!(order.check_invariants().is_err());
    }

    #[test]
    fn test_unit_lookup() {
        let order = sample_order();
        assert_eq!(order.unit_status(12, 2), Some(Status::Pending));
        assert_eq!(order.unit_status(12, 3), None);
        assert_eq!(order.unit_status(99, 0), None);
    }

    #[test]
    fn test_wire_format_camel_case() {
        let order = sample_order();
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["tableNumber"], 4);
        assert_eq!(json["items"][0]["itemId"], 12);
        assert_eq!(json["items"][0]["unitStatuses"][1]["unitIndex"], 1);
        assert_eq!(json["items"][0]["overallStatus"], "PENDING");
        assert_eq!(json["items"][1]["observation"], "no ice");

        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }
}
