//! 状态迁移校验
//!
//! 份可以在 PENDING / DELIVERED 之间自由切换。CANCELED 的份能否重新打开
//! 由 [`TransitionPolicy`] 显式决定，整单取消后拒绝一切份级变更。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::model::Order;
use super::status::{OrderId, Status, UnitKey};

/// 取消份的重开策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// CANCELED 为终态
    Strict,
    /// 允许手动将 CANCELED 的份改回 PENDING / DELIVERED
    #[default]
    AllowReopen,
}

impl TransitionPolicy {
    /// 是否允许重开已取消的份
    pub fn can_reopen_canceled(&self) -> bool {
        matches!(self, TransitionPolicy::AllowReopen)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionPolicy::Strict => "strict",
            TransitionPolicy::AllowReopen => "allow",
        }
    }
}

impl fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(TransitionPolicy::Strict),
            "allow" | "allow_reopen" => Ok(TransitionPolicy::AllowReopen),
            other => Err(format!("unknown transition policy: {other}")),
        }
    }
}

/// 迁移被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionDenied {
    #[error("Order {0} is canceled")]
    OrderCanceled(OrderId),

    #[error("Unit {0} is canceled and cannot be reopened")]
    CanceledUnitReopen(UnitKey),
}

/// 订单是否还接受份级变更
pub fn check_order_mutable(order: &Order) -> Result<(), TransitionDenied> {
    if order.cancelled {
        return Err(TransitionDenied::OrderCanceled(order.id));
    }
    Ok(())
}

/// 单份迁移校验
///
/// 相同状态的写入总是允许 (幂等)。
pub fn check_unit_transition(
    key: UnitKey,
    from: Status,
    to: Status,
    policy: TransitionPolicy,
) -> Result<(), TransitionDenied> {
    if from == Status::Canceled && to != Status::Canceled && !policy.can_reopen_canceled() {
        return Err(TransitionDenied::CanceledUnitReopen(key));
    }
    Ok(())
}

/// 订单 + 单份的完整校验
pub fn check_set_unit(
    order: &Order,
    key: UnitKey,
    from: Status,
    to: Status,
    policy: TransitionPolicy,
) -> Result<(), TransitionDenied> {
    check_order_mutable(order)?;
    check_unit_transition(key, from, to, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::model::OrderItem;

    const KEY: UnitKey = UnitKey {
        order_id: 1,
        item_id: 2,
        unit_index: 0,
    };

    #[test]
    fn test_pending_delivered_always_allowed() {
        for policy in [TransitionPolicy::Strict, TransitionPolicy::AllowReopen] {
            assert!(check_unit_transition(KEY, Status::Pending, Status::Delivered, policy).is_ok());
            assert!(check_unit_transition(KEY, Status::Delivered, Status::Pending, policy).is_ok());
            assert!(check_unit_transition(KEY, Status::Pending, Status::Canceled, policy).is_ok());
            assert!(check_unit_transition(KEY, Status::Canceled, Status::Canceled, policy).is_ok());
        }
    }

    #[test]
    fn test_reopen_depends_on_policy() {
        assert!(TransitionPolicy::AllowReopen.can_reopen_canceled());
        assert!(!TransitionPolicy::Strict.can_reopen_canceled());

        assert!(
            check_unit_transition(KEY, Status::Canceled, Status::Pending, TransitionPolicy::AllowReopen)
                .is_ok()
        );
        assert_eq!(
            check_unit_transition(KEY, Status::Canceled, Status::Delivered, TransitionPolicy::Strict),
            Err(TransitionDenied::CanceledUnitReopen(KEY))
        );
    }

    #[test]
    fn test_cancelled_order_rejects_everything() {
        let mut order = Order::new(1, 3, None, 0, vec![OrderItem::new(2, "Tea", 1, None, 0)]);
        assert!(check_order_mutable(&order).is_ok());

        order.cancelled = true;
        assert_eq!(
            check_set_unit(&order, KEY, Status::Canceled, Status::Canceled, TransitionPolicy::AllowReopen),
            Err(TransitionDenied::OrderCanceled(1))
        );
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("strict".parse::<TransitionPolicy>(), Ok(TransitionPolicy::Strict));
        assert_eq!("ALLOW".parse::<TransitionPolicy>(), Ok(TransitionPolicy::AllowReopen));
        assert!("maybe".parse::<TransitionPolicy>().is_err());
        assert_eq!(TransitionPolicy::default(), TransitionPolicy::AllowReopen);
    }
}
