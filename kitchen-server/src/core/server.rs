//! Server Implementation
//!
//! HTTP 服务器启动和管理

use std::future::Future;

use tokio::net::TcpListener;

use crate::api;
use crate::core::{Config, Result, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    /// 监听 `HTTP_PORT`，Ctrl-C 时优雅关闭
    pub async fn run(&self) -> Result<()> {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = TcpListener::bind(addr).await?;

        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        };
        self.serve(listener, shutdown).await
    }

    /// 在给定监听器上提供服务，直到 `shutdown` 完成
    ///
    /// 关闭时先结束所有推送连接，否则长连接会阻塞优雅关闭
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config)?,
        };

        let app = api::build_app().with_state(state.clone());
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            environment = %self.config.environment,
            policy = %self.config.reopen_policy,
            "Kitchen server starting"
        );

        let feeds = state.feeds.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                feeds.shutdown();
            })
            .await?;

        tracing::info!("Kitchen server stopped");
        Ok(())
    }
}
