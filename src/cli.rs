use crate::config::GeneratorConfig;
use crate::generator::Generator;
use crate::parser::ParsedFile;
use crate::routes::axum::AxumRouteProvider;
use crate::routes::manifest::ManifestRouteProvider;
use crate::routes::RouteProvider;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Handler contract inference - generate a Swagger document from Rust handler source
#[derive(Parser, Debug)]
#[command(name = "openapi-from-handlers")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Generator configuration (defaults to PROJECT_PATH/openapi-generator.yaml when present)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Route manifest (YAML or JSON); takes precedence over routes found in the source
    #[arg(short = 'r', long = "routes", value_name = "FILE")]
    pub routes_path: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, uses the configured output or stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!("Project path does not exist: {}", args.project_path.display());
    }

    if !args.project_path.is_dir() {
        anyhow::bail!("Project path is not a directory: {}", args.project_path.display());
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref config) = args.config_path {
        info!("Config file: {}", config.display());
    }
    if let Some(ref routes) = args.routes_path {
        info!("Route manifest: {}", routes.display());
    }

    Ok(args)
}

/// Picks the route source: an explicit manifest file, then routes listed in the
/// configuration, then the axum routers of the analysed crate.
pub fn route_provider(
    routes_path: Option<&Path>,
    config: &GeneratorConfig,
    files: &[ParsedFile],
) -> Result<Box<dyn RouteProvider>> {
    if let Some(path) = routes_path {
        info!("Reading routes from manifest {}", path.display());
        return Ok(Box::new(ManifestRouteProvider::from_file(path)?));
    }
    if !config.routes.is_empty() {
        info!("Reading {} routes from configuration", config.routes.len());
        return Ok(Box::new(ManifestRouteProvider::new(config.routes.clone())));
    }
    info!("Reading routes from axum routers");
    Ok(Box::new(AxumRouteProvider::new(files)))
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting document generation...");

    // Step 1: Load configuration
    let config = match &args.config_path {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::discover(&args.project_path)?,
    };

    // Step 2: Scan and parse the handler sources
    let generator = Generator::new(&config, &args.project_path);
    let files = generator.parse_sources()?;
    if files.is_empty() {
        warn!("No Rust files could be parsed under {}", generator.src_root().display());
    }

    // Step 3: Read routes and generate
    let provider = route_provider(args.routes_path.as_deref(), &config, &files)?;
    let generation = generator.run_with(&files, provider.as_ref())?;

    if generation.route_count == 0 {
        warn!("No routes found in the project");
    }

    // Step 4: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&generation.document)?,
        OutputFormat::Json => serialize_json(&generation.document)?,
    };

    // Step 5: Output to file or stdout
    let output = args
        .output_path
        .clone()
        .or_else(|| config.output.as_ref().map(|p| args.project_path.join(p)));
    if let Some(output_path) = &output {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Files parsed: {}", files.len());
    info!("  - Routes found: {}", generation.route_count);
    info!("  - Paths documented: {}", generation.document.paths.len());
    info!("  - Definitions: {}", generation.document.definitions.len());
    info!("  - Warnings: {}", generation.diagnostics.warning_count());

    Ok(())
}
