//! 出品状态引擎 - 服务端与客户端共用的领域模型与规则
//!
//! - [`status`]: 三态状态枚举与份键
//! - [`model`]: 订单 / 菜品 / 份
//! - [`aggregate`]: 份 → 菜品 → 订单 的状态聚合
//! - [`transition`]: 迁移校验与重开策略

pub mod aggregate;
pub mod model;
pub mod status;
pub mod transition;

pub use aggregate::{item_status, order_status};
pub use model::{Order, OrderItem, Unit};
pub use status::{InvalidStatus, ItemId, OrderId, Status, UnitIndex, UnitKey};
pub use transition::{
    TransitionDenied, TransitionPolicy, check_order_mutable, check_set_unit, check_unit_transition,
};

/// 按创建时间升序排列 (同一时间按 ID)
pub fn sort_by_creation(orders: &mut [Order]) {
    orders.sort_by_key(|o| (o.created_at, o.id));
}
