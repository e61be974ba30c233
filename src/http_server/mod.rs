//! # HTTP Server Module
//!
//! Axum server exposing the query engine over HTTP.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/api/content/:content_type` - URL-grammar list queries
//! - `/api/content/:content_type/{query,count,aggregate,grouped}` - JSON bodies
//! - `/api/content/:content_type/{stats,timeseries,suggest}` - rollups and suggestions
//! - `/api/stats`, `/api/search`, `/api/operators`

pub mod config;
pub mod content_routes;
pub mod errors;
pub mod server;

pub use config::HttpServerConfig;
pub use content_routes::{content_routes, ContentState, REQUEST_ID_HEADER, TENANT_HEADER};
pub use errors::{ApiError, ApiResult, ErrorResponse};
pub use server::HttpServer;
