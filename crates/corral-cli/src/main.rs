//! corral CLI - resolve application templates into manifests and reconcile them

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use corral_core::ArchiveFormat;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod display;
mod error;
mod exit_codes;
mod util;

use config::CorralConfig;
use error::Result;

#[derive(Parser)]
#[command(name = "corral")]
#[command(author = "Corral Contributors")]
#[command(version)]
#[command(about = "Template resolution and manifest reconciliation for Kubernetes", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: <config dir>/corral/config.yaml)
    #[arg(long, global = true, env = "CORRAL_CONFIG")]
    config: Option<PathBuf>,

    /// Template store directory, overrides the config file
    #[arg(long, global = true, env = "CORRAL_STORE")]
    store: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect templates in the local store
    Templates {
        #[command(subcommand)]
        command: TemplatesCommands,
    },

    /// Print the manifests an apps file resolves to
    Render {
        /// Apps file
        #[arg(short = 'f', long = "file")]
        file: PathBuf,

        /// Render only this app
        #[arg(long)]
        app: Option<String>,
    },

    /// Reconcile an apps file against the current cluster
    Apply {
        /// Apps file
        #[arg(short = 'f', long = "file")]
        file: PathBuf,

        /// Apps reconciled at once (default from config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// List every resource touched
        #[arg(short, long)]
        verbose: bool,
    },

    /// Mirror the remote template index once
    Sync,

    /// Reconcile continuously, watching and syncing templates
    Serve {
        /// Apps file, re-read every pass
        #[arg(short = 'f', long = "file")]
        file: PathBuf,

        /// Seconds between reconciliation passes
        #[arg(long, default_value_t = 60)]
        interval: u64,

        /// Apps reconciled at once (default from config)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Build a template package from a directory
    #[command(disable_version_flag = true)]
    Package {
        /// Template directory
        dir: PathBuf,

        /// Template name
        #[arg(long)]
        name: String,

        /// Template version, e.g. 1.2.0 or 1.2.0-beta
        #[arg(long)]
        version: String,

        /// Archive format
        #[arg(long, value_enum, default_value_t = Format::Tgz)]
        format: Format,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TemplatesCommands {
    /// List loaded templates
    List {
        /// Only this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Search templates by name
    Search {
        /// Part of the template name
        query: String,
    },

    /// Show one template
    #[command(disable_version_flag = true)]
    Show {
        /// Template name
        name: String,

        /// Version (default: latest)
        #[arg(long)]
        version: Option<String>,

        /// Category (default: apps)
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Zip,
    Tgz,
}

impl From<Format> for ArchiveFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Zip => ArchiveFormat::Zip,
            Format::Tgz => ArchiveFormat::TarGz,
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, store: Option<&Path>) -> Result<CorralConfig> {
    let mut config = CorralConfig::load(path)?;
    if let Some(store) = store {
        config.store.directory = store.to_path_buf();
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = || load_config(cli.config.as_deref(), cli.store.as_deref());

    match cli.command {
        Commands::Templates { command } => {
            let stores = util::open_stores(&config()?)?;
            match command {
                TemplatesCommands::List { category } => {
                    commands::templates::list(&stores, category.as_deref())
                }
                TemplatesCommands::Search { query } => commands::templates::search(&stores, &query),
                TemplatesCommands::Show {
                    name,
                    version,
                    category,
                } => commands::templates::show(
                    &stores,
                    &name,
                    version.as_deref(),
                    category.as_deref(),
                ),
            }
        }

        Commands::Render { file, app } => commands::render::run(&config()?, &file, app.as_deref()),

        Commands::Apply {
            file,
            concurrency,
            verbose,
        } => commands::apply::run(&config()?, &file, concurrency, verbose).await,

        Commands::Sync => commands::sync::run(&config()?).await,

        Commands::Serve {
            file,
            interval,
            concurrency,
        } => {
            let interval = Duration::from_secs(interval.max(1));
            commands::serve::run(&config()?, &file, interval, concurrency).await
        }

        Commands::Package {
            dir,
            name,
            version,
            format,
            output,
        } => commands::package::run(&dir, &name, &version, format.into(), output.as_deref()),
    }
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
