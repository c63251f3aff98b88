use kitchen_server::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 读取 .env (可选)
    dotenv::dotenv().ok();

    // 2. 加载配置
    let config = Config::from_env();

    // 3. 工作目录与日志
    setup_environment(&config)?;
    tracing::info!(
        work_dir = %config.work_dir,
        port = config.http_port,
        persistence = config.persistence,
        "Kitchen server starting..."
    );

    // 4. 初始化服务器状态 (加载已持久化订单)
    let state = ServerState::initialize(&config)?;

    // 5. 启动 HTTP 服务器
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Server error");
        return Err(e.into());
    }

    Ok(())
}
