//! Command-line front end for handler contract inference.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-handlers [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! Generate YAML from the axum routers of a project:
//! ```bash
//! openapi-from-handlers ./my-api -o swagger.yaml
//! ```
//!
//! Generate JSON from a route manifest:
//! ```bash
//! openapi-from-handlers ./my-api --routes routes.yaml -f json -o swagger.json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_handlers::cli;

fn main() -> Result<()> {
    // Parse first so the verbose flag can set the log level
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("openapi-from-handlers starting...");

    let args = cli::parse_args_from_parsed(args)?;

    cli::run(args)?;

    info!("Document generation completed successfully");

    Ok(())
}
