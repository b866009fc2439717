use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Local};
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use crate::modules::config::GatewayConfig;
use crate::proxy::auth::ApiKeySet;
use crate::proxy::forwarder::Forwarder;
use crate::proxy::handlers;
use crate::proxy::middleware;
use crate::proxy::upstream::IClassClient;

/// Shared application state; everything in here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<ApiKeySet>,
    pub iclass: Arc<IClassClient>,
    pub forwarder: Arc<Forwarder>,
    pub started_at: DateTime<Local>,
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl AxumServer {
    /// Start the gateway: build state and routes, bind, and serve on a
    /// spawned task until `stop` is called.
    pub async fn start(
        config: GatewayConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), String> {
        let state = AppState {
            api_keys: Arc::new(ApiKeySet::new(config.api_keys)),
            iclass: Arc::new(IClassClient::new()),
            forwarder: Arc::new(Forwarder::new(config.trusted_tls_hosts)),
            started_at: Local::now(),
        };

        tracing::info!("loaded {} API key(s)", state.api_keys.len());

        let app = Router::new()
            .route("/", get(handlers::health::home))
            .route("/favicon.ico", get(handlers::health::favicon))
            .route("/health", get(handlers::health::health))
            .route("/api/iClassSchedule", get(handlers::iclass::schedule))
            .route("/api/iClassSign", post(handlers::iclass::sign))
            .route("/proxy", post(handlers::proxy::forward))
            .fallback(handlers::health::not_found)
            .layer(axum::middleware::from_fn(middleware::access_log_middleware))
            .layer(middleware::cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = format!("{}:{}", config.bind_address, config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("failed to bind {}: {}", addr, e))?;

        tracing::info!("BUAA proxy listening on http://{}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            // ConnectInfo provides the peer address the client-ip resolver
            // falls back to.
            let service = app.into_make_service_with_connect_info::<SocketAddr>();
            let server = axum::serve(listener, service).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });

            if let Err(err) = server.await {
                tracing::error!("server error: {}", err);
            }
            tracing::info!("server stopped listening");
        });

        Ok((Self { shutdown_tx: Some(shutdown_tx) }, handle))
    }

    /// Stop the server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
