//! 出品状态服务
//!
//! - [`UnitStatusStore`]: 内存中的订单文档，订单级加锁
//! - [`OrderStorage`]: redb 持久化
//! - [`FulfillmentService`]: 校验、提交并广播所有变更

pub mod error;
pub mod service;
pub mod storage;
pub mod store;


pub use error::{FulfillmentError, FulfillmentResult};
pub use service::{
    DEFAULT_OPERATOR, FulfillmentService, MutationEvent, MutationKind, OrderFilter,
};
pub use storage::{OrderStorage, StorageError};
pub use store::{StoreError, UnitStatusStore};
