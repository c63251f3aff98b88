//! Kitchen Client - 厨房终端客户端
//!
//! - [`HttpKitchenClient`]: 厨房 HTTP 接口与 SSE 推送
//! - [`ReconciliationEngine`]: 乐观更新与服务端状态对账 (同步、无 IO)
//! - [`KitchenSession`]: 驱动引擎的异步会话，通过 `watch` 发布 [`ViewSnapshot`]

pub mod config;
pub mod error;
pub mod http;
pub mod reconcile;
pub mod session;
pub mod sse;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::{HttpKitchenClient, KitchenApi};
pub use reconcile::{
    ConnectionState, Mutation, MutationId, Partition, ReconciliationEngine, ViewSnapshot,
};
pub use session::KitchenSession;

// Re-export shared types for convenience
pub use shared::fulfillment::{Order, OrderItem, Status, TransitionPolicy, Unit, UnitKey};
