//! Kitchen Server - 餐厅出品状态服务
//!
//! # 架构概述
//!
//! - **出品服务** (`fulfillment`): 份状态存储、状态聚合、变更校验与提交
//! - **持久化** (`fulfillment::storage`): redb 写穿存储
//! - **变更推送** (`feed`): 每连接一个任务的 SSE 快照推送
//! - **HTTP API** (`api`): 厨房操作与订单查询接口
//!
//! # 模块结构
//!
//! ```text
//! kitchen-server/src/
//! ├── core/          # 配置、状态、错误、HTTP 服务器
//! ├── fulfillment/   # 份状态存储、redb、出品服务
//! ├── feed/          # SSE 推送
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 日志、操作员提取
//! ```

pub mod api;
pub mod core;
pub mod feed;
pub mod fulfillment;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use fulfillment::{FulfillmentError, FulfillmentService, OrderStorage};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境：创建工作目录，初始化日志 (生产环境写入 `{WORK_DIR}/logs`)
pub fn setup_environment(config: &Config) -> std::io::Result<()> {
    config.ensure_work_dir_structure()?;
    let log_dir = config.log_dir();
    init_logger_with_file(
        Some(&config.log_level),
        config.log_json,
        config.is_production().then_some(log_dir.as_path()),
    );
    Ok(())
}
