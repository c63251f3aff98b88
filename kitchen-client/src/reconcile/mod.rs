//! 乐观更新与服务端状态对账

pub mod engine;
pub mod view;

pub use engine::{Mutation, MutationId, Partition, ReconciliationEngine, SnapshotOutcome};
pub use view::{ConnectionState, ViewSnapshot};
