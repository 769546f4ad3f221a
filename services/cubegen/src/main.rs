//! Data cube generator command line tool.
//!
//! Reads a generator request (YAML or JSON), runs the pipeline against the
//! configured store pool and prints the result document as JSON.

mod config;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::CubegenConfig;
use cube_gen::{CubeGenerator, CubeGeneratorRequest, LocalCubeGenerator};

#[derive(Parser, Debug)]
#[command(name = "cubegen")]
#[command(about = "Generate data cubes from gridded datasets")]
struct Args {
    /// Request file path
    #[arg(short, long)]
    request: PathBuf,

    /// Store pool configuration file path
    #[arg(short, long, env = "CUBEGEN_STORES")]
    stores: Option<PathBuf>,

    /// Describe the cube without generating it
    #[arg(long)]
    info: bool,

    /// Fail with an error instead of printing an error result
    #[arg(long)]
    raise_on_error: bool,

    /// Report progress (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = CubegenConfig::from_env();
    if let Some(stores) = args.stores {
        config.stores_path = stores;
    }
    if args.raise_on_error {
        config.generator.raise_on_error = true;
    }
    config.generator.verbosity = config.generator.verbosity.max(args.verbose);
    config.validate()?;

    info!(
        request = %args.request.display(),
        stores = %config.stores_path.display(),
        "Starting cube generator"
    );

    let pool = config.store_pool()?;
    info!(stores = ?pool.store_ids(), "Loaded store pool");

    let request = CubeGeneratorRequest::from_file(&args.request)?;
    let generator = LocalCubeGenerator::new(Arc::new(pool), config.generator.clone());

    let (document, status_code) = if args.info {
        let result = generator.cube_info(request)?;
        (serde_json::to_string_pretty(&result)?, result.status_code())
    } else {
        let result = generator.generate(request)?;
        (serde_json::to_string_pretty(&result)?, result.status_code())
    };
    println!("{}", document);

    if status_code >= 400 && status_code != 422 {
        anyhow::bail!("cube generation failed with status {}", status_code);
    }
    Ok(())
}
