use crate::config::{GeneratorConfig, SharedSource};
use crate::error::Error;
use crate::pipeline::{generate, write_outputs};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;

/// Generate a TypeScript client, its types and an OpenAPI document from an Axum server's source
#[derive(Parser, Debug)]
#[command(name = "client-from-source")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Root of the server crate to scan
    #[arg(long = "server-root", value_name = "DIR")]
    pub server_root: Option<PathBuf>,

    /// Directory receiving the generated artifacts (under its `generated` subdirectory)
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// TOML configuration file; flags override its values
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Route registration file, relative to the server root (repeatable)
    #[arg(long = "route-file", value_name = "FILE")]
    pub route_files: Vec<PathBuf>,

    /// Secondary crate whose public types may appear in the API, as CRATE=DIR (repeatable)
    #[arg(long = "shared-source", value_name = "CRATE=DIR", value_parser = parse_shared_source)]
    pub shared_sources: Vec<SharedSource>,

    /// Emit the OpenAPI document
    #[arg(long = "emit-openapi", overrides_with = "no_openapi")]
    pub emit_openapi: bool,

    /// Skip the OpenAPI document
    #[arg(long = "no-openapi")]
    pub no_openapi: bool,

    /// Skip the YAML rendition of the OpenAPI document
    #[arg(long = "no-yaml")]
    pub no_yaml: bool,

    /// URL prefix of every client request
    #[arg(long = "api-prefix", value_name = "PREFIX")]
    pub api_prefix: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

fn parse_shared_source(value: &str) -> std::result::Result<SharedSource, String> {
    let (crate_name, root) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CRATE=DIR, got '{}'", value))?;
    if crate_name.is_empty() || root.is_empty() {
        return Err(format!("expected CRATE=DIR, got '{}'", value));
    }
    Ok(SharedSource {
        crate_name: crate_name.replace('-', "_"),
        root: PathBuf::from(root),
        files: Vec::new(),
    })
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if let Some(config) = &args.config {
        if !config.is_file() {
            anyhow::bail!("Config file does not exist: {}", config.display());
        }
    }

    if let Some(root) = &args.server_root {
        info!("Server root: {}", root.display());
    }
    if let Some(output) = &args.output_dir {
        info!("Output directory: {}", output.display());
    }
    Ok(args)
}

/// Builds the effective configuration: defaults, then the config file, then flags.
pub fn resolve_config(args: &CliArgs) -> Result<GeneratorConfig> {
    let mut config = match &args.config {
        Some(path) => GeneratorConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };

    if let Some(root) = &args.server_root {
        config.server_root = root.clone();
    }
    if let Some(output) = &args.output_dir {
        config.output_dir = output.clone();
    }
    if !args.route_files.is_empty() {
        config.route_files = args.route_files.clone();
    }
    config.shared_sources.extend(args.shared_sources.iter().cloned());
    if args.emit_openapi {
        config.emit_openapi = true;
    }
    if args.no_openapi {
        config.emit_openapi = false;
    }
    if args.no_yaml {
        config.emit_yaml = false;
    }
    if let Some(prefix) = &args.api_prefix {
        config.api_prefix = prefix.clone();
    }
    Ok(config)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    let config = resolve_config(&args)?;

    if !config.server_root.is_dir() {
        return Err(Error::SourceRootMissing(config.server_root.clone()).into());
    }

    info!("Generating client from {}", config.server_root.display());
    let output = generate(&config)?;
    let written = write_outputs(&output, &config)?;

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Endpoints: {}", output.endpoint_count);
    info!("  - Client bindings: {}", output.binding_count);
    info!("  - Types: {}", output.type_count);
    info!("  - Files written: {}", written.len());
    if output.endpoint_count == output.binding_count {
        info!("Endpoint/binding check passed");
    } else {
        warn!(
            "Endpoint/binding check failed: {} endpoints, {} bindings",
            output.endpoint_count, output.binding_count
        );
    }
    if !output.warnings.is_empty() {
        info!("{} warnings during generation", output.warnings.len());
    }

    Ok(())
}
