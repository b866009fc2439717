use buaa_proxy::modules;
use buaa_proxy::proxy;

#[tokio::main]
async fn main() -> Result<(), String> {
    modules::logger::init_logger();

    let config = match modules::config::GatewayConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::error!("configuration error: {}", err);
            return Err(err);
        }
    };

    tracing::info!("BUAA proxy service starting");

    let (server, handle) = proxy::AxumServer::start(config).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown signal: {}", e))?;

    tracing::info!("shutdown requested, stopping server...");
    server.stop();
    let _ = handle.await;

    Ok(())
}
