//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::builder::{sql, QueryBuilder, Scope, SqlStatement};
use crate::config::EngineConfig;
use crate::http_server::HttpServer;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::parser::{parse_json, parse_query_string};
use crate::schema::{QueryValidator, SchemaRegistry};
use crate::store::{Fixtures, MemoryStore};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_stdout;

/// Parse command line arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, fixtures, port } => serve(&config, fixtures.as_deref(), port),
        Command::Explain {
            schema,
            content_type,
            url,
            json,
            config,
        } => {
            let config = match config {
                Some(path) => EngineConfig::load(&path)?,
                None => EngineConfig::default(),
            };
            let input = match (url, json) {
                (Some(url), _) => QueryInput::Url(url),
                (None, Some(json)) => QueryInput::Json(json),
                (None, None) => return Err(CliError::io_error("explain needs --url or --json")),
            };
            let schemas = SchemaRegistry::load_file(&schema)?;
            let explained = explain(&schemas, &config, &content_type, &input)?;
            write_stdout(&explained)
        }
    }
}

/// Serve the HTTP API over an in-memory store.
///
/// The store starts empty unless a fixtures file is given; its schemas
/// become the schema registry.
pub fn serve(config_path: &Path, fixtures_path: Option<&Path>, port: Option<u16>) -> CliResult<()> {
    let mut config = EngineConfig::load(config_path)?;
    if let Some(port) = port {
        config.http.port = port;
    }
    Logger::set_min_severity(config.log_severity());
    log_event_with_fields(Event::ConfigLoaded, &[("path", &config_path.display().to_string())]);

    let (store, schemas) = match fixtures_path {
        Some(path) => {
            let fixtures = Fixtures::load(path)?;
            let schemas = fixtures.registry()?;
            let store = fixtures.into_store()?;
            log_event_with_fields(
                Event::FixturesLoaded,
                &[
                    ("path", &path.display().to_string()),
                    ("documents", &store.len().to_string()),
                    ("content_types", &schemas.len().to_string()),
                ],
            );
            (store, schemas)
        }
        None => (MemoryStore::new(), SchemaRegistry::new()),
    };

    log_event_with_fields(
        Event::SchemasLoaded,
        &[("content_types", &schemas.content_types().collect::<Vec<_>>().join(","))],
    );

    let server = HttpServer::new(Arc::new(store), schemas, config);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Query text for `explain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryInput {
    Url(String),
    Json(String),
}

/// Rendered list and count statements of one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explained {
    pub content_type: String,
    pub list: SqlStatement,
    pub count: SqlStatement,
}

/// Parses, validates, and compiles a query without running it.
pub fn explain(
    schemas: &SchemaRegistry,
    config: &EngineConfig,
    content_type: &str,
    input: &QueryInput,
) -> CliResult<Explained> {
    let query = match input {
        QueryInput::Url(raw) => parse_query_string(raw)?,
        QueryInput::Json(body) => parse_json(body)?,
    };
    let schema = schemas.require(content_type)?;
    QueryValidator::new(schema).validate(&query)?;

    let builder = QueryBuilder::new(schema, Scope::content_type(content_type))
        .with_language(config.search_language.clone())
        .with_max_page_size(config.max_page_size);
    Ok(Explained {
        content_type: content_type.to_string(),
        list: sql::render_select(&builder.build_list(&query)?),
        count: sql::render_count(&builder.build_count(&query)?),
    })
}
