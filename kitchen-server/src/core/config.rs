use std::path::PathBuf;
use std::time::Duration;

use shared::fulfillment::TransitionPolicy;

/// 服务器配置 - 厨房出品服务的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data/kitchen | 工作目录 (数据库、日志) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 / EnvFilter 表达式 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | KITCHEN_FEED_INTERVAL_MS | 3000 | 厨房推送间隔(毫秒) |
/// | ORDERS_FEED_INTERVAL_MS | 5000 | 订单推送间隔(毫秒) |
/// | FEED_CHANNEL_CAPACITY | 64 | 单连接缓冲事件数 |
/// | MUTATION_CHANNEL_CAPACITY | 1024 | 变更事件广播容量 |
/// | UNIT_REOPEN_POLICY | allow | 已取消份能否重开 (allow / strict) |
/// | PERSISTENCE | true | 是否写入 redb |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/kitchen HTTP_PORT=8080 UNIT_REOPEN_POLICY=strict cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    /// 厨房推送间隔 (毫秒)
    pub kitchen_feed_interval_ms: u64,
    /// 通用订单推送间隔 (毫秒)
    pub orders_feed_interval_ms: u64,
    /// 每个推送连接的缓冲事件数
    pub feed_channel_capacity: usize,
    /// 变更事件广播通道容量
    pub mutation_channel_capacity: usize,
    /// 已取消份的重开策略
    pub reopen_policy: TransitionPolicy,
    /// 是否持久化到 redb
    pub persistence: bool,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或解析失败，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data/kitchen".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            kitchen_feed_interval_ms: std::env::var("KITCHEN_FEED_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            orders_feed_interval_ms: std::env::var("ORDERS_FEED_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            feed_channel_capacity: std::env::var("FEED_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(64),
            mutation_channel_capacity: std::env::var("MUTATION_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            reopen_policy: std::env::var("UNIT_REOPEN_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            persistence: std::env::var("PERSISTENCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// redb 数据库文件路径
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("kitchen.redb")
    }

    /// 日志目录
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn kitchen_feed_interval(&self) -> Duration {
        Duration::from_millis(self.kitchen_feed_interval_ms.max(1))
    }

    pub fn orders_feed_interval(&self) -> Duration {
        Duration::from_millis(self.orders_feed_interval_ms.max(1))
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
