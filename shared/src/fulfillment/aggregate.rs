//! 状态聚合 - 由份状态推导菜品状态，由菜品推导订单状态
//!
//! 纯函数，无内部状态，服务端与客户端共用同一套规则。
//!
//! # 规则
//!
//! | 输入 | 结果 |
//! |------|------|
//! | 全部 CANCELED | CANCELED |
//! | 全部为 DELIVERED / CANCELED，且至少一个 DELIVERED | DELIVERED |
//! | 其余 (存在 PENDING) | PENDING |
//!
//! 已取消的份不阻塞出品：`[CANCELED, DELIVERED]` 的菜品视为 DELIVERED。
//! 订单级别沿用同一规则，另外显式取消的订单恒为 CANCELED。

use super::model::{OrderItem, Unit};
use super::status::Status;

/// 对一组状态应用聚合规则
///
/// 空输入按 "全部已取消" 处理。
pub fn aggregate_statuses<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    let mut any_delivered = false;
    for status in statuses {
        match status {
            Status::Pending => return Status::Pending,
            Status::Delivered => any_delivered = true,
            Status::Canceled => {}
        }
    }
    if any_delivered {
        Status::Delivered
    } else {
        Status::Canceled
    }
}

/// 菜品状态
pub fn item_status(units: &[Unit]) -> Status {
    aggregate_statuses(units.iter().map(|u| u.status))
}

/// 订单状态
///
/// `cancelled` 为显式整单取消标记，优先级最高。
/// 空订单视为 PENDING。
pub fn order_status(items: &[OrderItem], cancelled: bool) -> Status {
    if cancelled {
        return Status::Canceled;
    }
    if items.is_empty() {
        return Status::Pending;
    }
    aggregate_statuses(items.iter().map(|item| item_status(&item.unit_statuses)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use Status::{Canceled as C, Delivered as D, Pending as P};

    fn units(statuses: &[Status]) -> Vec<Unit> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| Unit::new(i as u32, *s, 0, None))
            .collect()
    }

    fn item(item_id: i64, statuses: &[Status]) -> OrderItem {
        let mut item = OrderItem::new(item_id, format!("item-{item_id}"), statuses.len() as u32, None, 0);
        item.unit_statuses = units(statuses);
        item.refresh_status();
        item
    }

    #[test]
    fn test_item_status_basic_rules() {
        assert_eq!(item_status(&units(&[P, P, P])), P);
        assert_eq!(item_status(&units(&[D, P, P])), P);
        assert_eq!(item_status(&units(&[D, D, D])), D);
        assert_eq!(item_status(&units(&[C, C])), C);
        assert_eq!(item_status(&units(&[C, P])), P);
    }

    #[test]
    fn test_canceled_units_do_not_block_delivery() {
        assert_eq!(item_status(&units(&[C, D])), D);
        assert_eq!(item_status(&units(&[C, C, D])), D);
    }

    #[test]
    fn test_item_status_exhaustive_characterization() {
        // 枚举长度 1..=4 的所有组合，校验 iff 性质
        for len in 1..=4u32 {
            let total = 3usize.pow(len);
            for mut n in 0..total {
                let mut statuses = Vec::new();
                for _ in 0..len {
                    statuses.push(Status::ALL[n % 3]);
                    n /= 3;
                }
                let result = item_status(&units(&statuses));

                let all_canceled = statuses.iter().all(|s| *s == C);
                let any_delivered = statuses.contains(&D);
                let any_pending = statuses.contains(&P);

                assert_eq!(result == C, all_canceled, "{statuses:?}");
                assert_eq!(result == D, any_delivered && !any_pending, "{statuses:?}");
                assert_eq!(result == P, any_pending, "{statuses:?}");
            }
        }
    }

    #[test]
    fn test_item_status_is_order_independent() {
        assert_eq!(item_status(&units(&[D, C, P])), item_status(&units(&[P, C, D])));
        assert_eq!(item_status(&units(&[D, C])), item_status(&units(&[C, D])));
    }

    #[test]
    fn test_order_status_all_delivered() {
        let items = vec![item(1, &[D, D]), item(2, &[D])];
        assert_eq!(order_status(&items, false), D);
    }

    #[test]
    fn test_order_status_fully_canceled_item_does_not_block() {
        let items = vec![item(1, &[D, D]), item(2, &[C, C])];
        assert_eq!(order_status(&items, false), D);
    }

    #[test]
    fn test_order_status_pending_when_any_item_pending() {
        let items = vec![item(1, &[D, D]), item(2, &[C, P])];
        assert_eq!(order_status(&items, false), P);
    }

    #[test]
    fn test_order_status_all_items_canceled() {
        let items = vec![item(1, &[C]), item(2, &[C, C])];
        assert_eq!(order_status(&items, false), C);
    }

    #[test]
    fn test_explicit_cancel_overrides_items() {
        let items = vec![item(1, &[D, D]), item(2, &[D])];
        assert_eq!(order_status(&items, true), C);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(item_status(&[]), C);
        assert_eq!(order_status(&[], false), P);
        assert_eq!(order_status(&[], true), C);
    }
}
