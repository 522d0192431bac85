//! Command-line entry point for the AR packager.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ar_packager::activation::{issue_tokens, RedeemOutcome, SqliteStore};
use ar_packager::marker;
use ar_packager::executor::PROJECT_LOCK;
use ar_packager::pipeline::{acquire_locks, spawn_build};
use ar_packager::preflight;
use ar_packager::process::SystemRunner;
use ar_packager::{Assembler, ContentRequest, PackagerConfig, PipelineError, RequestDraft};

/// Package AR content and build it into an Android app
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Packager configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble the package and web bundle without building
    Package {
        /// Request file (TOML)
        request: PathBuf,
    },

    /// Assemble, patch, and build an APK
    Build {
        /// Request file (TOML)
        request: PathBuf,

        /// Skip the host toolchain check
        #[arg(long)]
        skip_preflight: bool,
    },

    /// Write the pattern file for a marker image
    Encode {
        image: PathBuf,

        /// Output path; defaults to the image path with a .patt extension
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Issue activation keys into the datastore
    Tokens {
        #[arg(value_name = "N")]
        count: u32,
    },

    /// Bind an activation key to a device
    Redeem { token: String, device: String },

    /// Check host tools
    Preflight,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let result = PackagerConfig::load(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Package { request } => package(&config, &request),
        Commands::Build {
            request,
            skip_preflight,
        } => build(config, &request, skip_preflight),
        Commands::Encode { image, output } => encode(&image, output),
        Commands::Tokens { count } => tokens(&config, count),
        Commands::Redeem { token, device } => redeem(&config, &token, &device),
        Commands::Preflight => check_host(&config),
    });

    if let Err(e) = result {
        match PipelineError::find(&e) {
            Some(PipelineError::BuildInProgress(name)) if name == PROJECT_LOCK => {
                tracing::error!("Another package is using the shared project; try again when it finishes")
            }
            Some(PipelineError::BuildInProgress(name)) => {
                tracing::error!("A build for '{}' is already running", name)
            }
            _ => tracing::error!("Command failed: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

fn setup_logging(verbose: u8, quiet: u8) {
    let log_level = match (verbose, quiet) {
        (0, 0) => "info",
        (1, 0) => "debug",
        (_, 0) => "trace",
        (0, 1) => "warn",
        (0, 2) => "error",
        (0, _) => "off",
        _ => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Parse a request file. Relative asset paths are taken from the file's
/// own directory.
fn load_request(path: &Path, config: &PackagerConfig) -> Result<ContentRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading request '{}'", path.display()))?;
    let mut draft: RequestDraft = toml::from_str(&text)
        .with_context(|| format!("parsing request '{}'", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let rebase = |p: &mut PathBuf| {
        if p.is_relative() {
            *p = base.join(&*p);
        }
    };
    rebase(&mut draft.cover);
    draft.images.iter_mut().for_each(rebase);
    draft.models.iter_mut().for_each(rebase);

    Ok(draft.validate(&config.app_id_prefix)?)
}

fn package(config: &PackagerConfig, request: &Path) -> Result<()> {
    let request = load_request(request, config)?;
    let _locks = acquire_locks(config, request.name())?;
    let store = SqliteStore::open(&config.datastore)?;
    let manifest = Assembler::new(config, &SystemRunner, &store).assemble(&request)?;

    for skipped in &manifest.skipped {
        println!("skipped {}: {}", skipped.base, skipped.reason);
    }
    println!(
        "packaged '{}' with {} marker(s) and {} key(s) at {}",
        manifest.name,
        manifest.entries.len(),
        manifest.tokens.len(),
        manifest.package_dir.display()
    );
    Ok(())
}

fn build(config: PackagerConfig, request: &Path, skip_preflight: bool) -> Result<()> {
    if !skip_preflight {
        preflight::check_host_tools()?;
    }
    let request = load_request(request, &config)?;
    let outcome = spawn_build(config, request)?
        .join()
        .map_err(|_| anyhow!("build thread panicked"))??;

    let artifact = &outcome.report.artifact;
    println!(
        "built {} ({} bytes, sha256 {}) using {} storage",
        artifact.path.display(),
        artifact.size,
        artifact.sha256,
        outcome.report.strategy
    );
    if let Some(keys) = &outcome.keys_file {
        println!("activation keys: {}", keys.display());
    }
    Ok(())
}

fn encode(image: &Path, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| image.with_extension("patt"));
    marker::encode(image)?.write_to(&output)?;
    println!("{}", output.display());
    Ok(())
}

fn tokens(config: &PackagerConfig, count: u32) -> Result<()> {
    let store = SqliteStore::open(&config.datastore)?;
    for token in issue_tokens(&store, count)? {
        println!("{}", token);
    }
    Ok(())
}

fn redeem(config: &PackagerConfig, token: &str, device: &str) -> Result<()> {
    let store = SqliteStore::open(&config.datastore)?;
    match store.redeem(token, device)? {
        RedeemOutcome::Redeemed => println!("activated"),
        RedeemOutcome::AlreadyOwned => println!("already active on this device"),
        RedeemOutcome::Taken => anyhow::bail!("key '{}' is bound to another device", token),
        RedeemOutcome::Unknown => anyhow::bail!("unknown key '{}'", token),
    }
    Ok(())
}

fn check_host(config: &PackagerConfig) -> Result<()> {
    for (tool, found) in preflight::optional_tools(config) {
        println!("{:<40} {}", tool, if found { "ok" } else { "missing (optional)" });
    }
    preflight::check_host_tools()?;
    println!("all required tools found");
    Ok(())
}
