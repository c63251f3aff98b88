//! Shared types for the kitchen fulfillment system
//!
//! Domain model, aggregation rules, feed framing and the unified error
//! system, used by both `kitchen-server` and `kitchen-client`.

pub mod error;
pub mod feed;
pub mod fulfillment;
pub mod request;
pub mod response;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use feed::{FeedEvent, FeedKind, SnapshotPayload};
pub use fulfillment::{Order, OrderId, OrderItem, Status, TransitionPolicy, Unit, UnitKey};
