//! # HTTP Server
//!
//! Combines the content routes and the health check into one Axum router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::HeaderValue, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::EngineConfig;
use crate::observability::{log_event_with_fields, Event};
use crate::schema::SchemaRegistry;
use crate::store::DocumentStore;

use super::config::HttpServerConfig;
use super::content_routes::{content_routes, ContentState};

/// `GET /health` body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Content types with a registered schema
    pub content_types: usize,
}

/// HTTP server over one document store
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(store: Arc<dyn DocumentStore>, schemas: SchemaRegistry, config: EngineConfig) -> Self {
        let http = config.http.clone();
        let health = HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            content_types: schemas.len(),
        };
        let state = Arc::new(ContentState::new(store, schemas, config));
        let router = Router::new()
            .route(
                "/health",
                get(move || {
                    let health = health.clone();
                    async move { Json(health) }
                }),
            )
            .nest("/api", content_routes(state))
            .layer(cors_layer(&http.cors_origins));
        Self { config: http, router }
    }

    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// The assembled router, for serving in-process
    pub fn router(self) -> Router {
        self.router
    }

    /// Binds and serves until the listener fails.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{}", e)))?;

        let listener = TcpListener::bind(addr).await?;
        log_event_with_fields(Event::ServerStarted, &[("addr", &addr.to_string())]);
        axum::serve(listener, self.router).await
    }
}

/// Any origin when the list is empty; unparsable origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
