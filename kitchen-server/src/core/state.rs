use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{Config, Result};
use crate::feed::{FeedHub, FeedSettings};
use crate::fulfillment::{FulfillmentService, OrderStorage};
use shared::fulfillment::Status;

/// 服务器状态 - 持有所有服务的共享引用
///
/// 使用 Arc 实现浅拷贝，每个请求克隆的成本极低。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | fulfillment | Arc<FulfillmentService> | 出品状态服务 |
/// | feeds | FeedHub | 推送连接管理 |
#[derive(Clone, Debug)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 出品状态服务 (唯一写入口)
    pub fulfillment: Arc<FulfillmentService>,
    /// 推送连接管理
    pub feeds: FeedHub,
}

impl ServerState {
    pub fn new(config: Config, fulfillment: Arc<FulfillmentService>) -> Self {
        Self {
            config,
            fulfillment,
            feeds: FeedHub::new(CancellationToken::new()),
        }
    }

    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. redb 数据库 (work_dir/kitchen.redb)，加载已有订单
    /// 3. 出品服务
    pub fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;

        let fulfillment = if config.persistence {
            let path = config.database_path();
            tracing::info!(path = %path.display(), "Opening order storage");
            let storage = OrderStorage::open(&path)?;
            FulfillmentService::with_storage(
                storage,
                config.reopen_policy,
                config.mutation_channel_capacity,
            )
            .map_err(|e| anyhow::anyhow!("failed to load orders: {e}"))?
        } else {
            tracing::warn!("Persistence disabled, orders are kept in memory only");
            FulfillmentService::new(config.reopen_policy, config.mutation_channel_capacity)
        };

        Ok(Self::new(config.clone(), Arc::new(fulfillment)))
    }

    /// 纯内存状态 (测试用)
    pub fn in_memory(config: Config) -> Self {
        let fulfillment =
            FulfillmentService::new(config.reopen_policy, config.mutation_channel_capacity);
        Self::new(config, Arc::new(fulfillment))
    }

    pub fn fulfillment(&self) -> &FulfillmentService {
        &self.fulfillment
    }

    pub fn kitchen_feed_settings(&self) -> FeedSettings {
        FeedSettings::kitchen(
            self.config.kitchen_feed_interval(),
            self.config.feed_channel_capacity,
        )
    }

    pub fn orders_feed_settings(&self, status: Option<Status>) -> FeedSettings {
        FeedSettings::orders(
            self.config.orders_feed_interval(),
            self.config.feed_channel_capacity,
            status,
        )
    }

    /// 关闭所有推送连接
    pub fn shutdown(&self) {
        self.feeds.shutdown();
    }
}
