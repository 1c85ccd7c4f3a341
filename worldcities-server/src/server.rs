//! HTTP server with graceful shutdown

use axum::{extract::Request, Router};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    config::Config,
    error::Result,
    ids::request_id_of,
    middleware::{request_id_layer, request_id_propagation_layer, sensitive_headers_layer},
};

/// Server instance
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the server with the given router until SIGINT or SIGTERM
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = self.config.bind_address();

        tracing::info!("Starting {} on {}", self.config.service.name, addr);
        self.log_middleware_config();

        let app = self.apply_layers(app);

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Wrap `app` in the middleware stack
    ///
    /// The last layer added is the outermost: request ids are assigned before
    /// the trace span opens, so every log line of a request carries its id.
    pub fn apply_layers(&self, app: Router) -> Router {
        let middleware = &self.config.middleware;
        let body_limit = middleware.body_limit_bytes();

        let mut app = app.layer(self.build_cors_layer());

        if middleware.compression {
            app = app.layer(CompressionLayer::new());
        }

        app = app
            .layer(TimeoutLayer::with_status_code(
                http::StatusCode::REQUEST_TIMEOUT,
                self.config.service.timeout(),
            ))
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &Request| {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id_of(request),
                        )
                    })
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(sensitive_headers_layer())
            .layer(request_id_propagation_layer())
            .layer(request_id_layer());

        if middleware.catch_panic {
            app = app.layer(CatchPanicLayer::new());
        }

        app
    }

    fn log_middleware_config(&self) {
        let middleware = &self.config.middleware;
        tracing::info!("Middleware configuration:");
        tracing::info!("  - Panic recovery: {}", enabled(middleware.catch_panic));
        tracing::info!("  - Request ID tracking: enabled");
        tracing::info!("  - Sensitive header masking: enabled");
        tracing::info!("  - Request body limit: {} MB", middleware.body_limit_mb);
        tracing::info!("  - Compression: {}", enabled(middleware.compression));
        tracing::info!("  - CORS mode: {}", middleware.cors_mode);
        tracing::info!(
            "  - Request timeout: {} seconds",
            self.config.service.timeout_secs
        );
    }

    fn build_cors_layer(&self) -> CorsLayer {
        match self.config.middleware.cors_mode.as_str() {
            "permissive" => CorsLayer::permissive(),
            "restrictive" | "disabled" => CorsLayer::new(),
            other => {
                tracing::warn!("Unknown CORS mode: {}, defaulting to permissive", other);
                CorsLayer::permissive()
            }
        }
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    tracing::info!("Shutdown signal received, draining requests...");
}
