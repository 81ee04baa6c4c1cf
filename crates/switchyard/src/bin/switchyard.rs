//! Switchyard CLI
//!
//! Loads a route table (and optionally a settings file with variable type
//! declarations), dispatches a single request against it and prints the
//! response.
//!
//! Usage:
//!   switchyard --routes routes.yaml [--settings settings.yaml] GET /blog/42?draft=true

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use switchyard::{App, Request, RouteFile, Settings};

/// Switchyard - dispatch a request against a route table
#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Route table file (YAML)
    #[arg(short, long, env = "SWITCHYARD_ROUTES")]
    routes: String,

    /// Settings file with variable type declarations (YAML)
    #[arg(short, long, env = "SWITCHYARD_SETTINGS")]
    settings: Option<String>,

    /// Print the response as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output (debug logging for the router)
    #[arg(short, long)]
    verbose: bool,

    /// Request method
    method: String,

    /// Request target: path with optional query string
    target: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "info,switchyard=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = match &args.settings {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to load settings from {path}"))?,
        None => Settings::default(),
    };
    let encoding = settings.default_encoding.clone();
    let types = settings.into_registry().context("Invalid variable types")?;

    let routes = RouteFile::from_file(&args.routes)
        .with_context(|| format!("Failed to load routes from {}", args.routes))?
        .to_routes()?;
    let app = App::new(types, routes).context("Failed to compile routes")?;
    info!("Loaded {} top-level route(s) from {}", app.routes().len(), args.routes);

    let response = app
        .dispatch(Request::from_target(&args.method, &args.target))
        .with_context(|| format!("Dispatch of {} {} failed", args.method, args.target))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!(
        "{} {}",
        response.status.as_u16(),
        response.status.canonical_reason().unwrap_or_default()
    );
    if response.header("content-type").is_none() && !response.body.is_empty() {
        println!("content-type: text/plain; charset={encoding}");
    }
    for (name, value) in &response.headers {
        println!("{}: {}", name, String::from_utf8_lossy(value.as_bytes()));
    }
    println!();
    println!("{}", response.body);
    Ok(())
}
