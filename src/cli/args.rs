//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery serve --config <path> [--fixtures <path>]
//! - aeroquery explain --schema <path> --content-type <t> (--url <qs> | --json <body>)

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// aeroquery - dynamic filter and query engine for document content
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the query API over an in-memory store
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,

        /// Schemas, documents, and relation edges to seed the store with
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// Overrides the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Parse, validate, and compile a query, then print the SQL
    #[command(group(ArgGroup::new("input").required(true).args(["url", "json"])))]
    Explain {
        /// Field schemas, `{contentType: {field: type}}`
        #[arg(long)]
        schema: PathBuf,

        #[arg(long = "content-type")]
        content_type: String,

        /// URL query string, e.g. `filter[price]=gte.10&sort=-createdAt`
        #[arg(long)]
        url: Option<String>,

        /// JSON query body
        #[arg(long)]
        json: Option<String>,

        /// Optional configuration file for page-size and language limits
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explain_requires_one_input() {
        let ok = Cli::try_parse_from([
            "aeroquery",
            "explain",
            "--schema",
            "s.json",
            "--content-type",
            "article",
            "--url",
            "status=published",
        ]);
        assert!(ok.is_ok());

        let missing = Cli::try_parse_from(["aeroquery", "explain", "--schema", "s.json", "--content-type", "article"]);
        assert!(missing.is_err());

        let both = Cli::try_parse_from([
            "aeroquery",
            "explain",
            "--schema",
            "s.json",
            "--content-type",
            "article",
            "--url",
            "a=1",
            "--json",
            "{}",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["aeroquery", "serve"]).unwrap();
        match cli.command {
            Command::Serve { config, fixtures, port } => {
                assert_eq!(config, PathBuf::from("./aeroquery.json"));
                assert!(fixtures.is_none());
                assert!(port.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
