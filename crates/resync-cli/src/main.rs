//! Resync CLI - run and inspect a ResourceSync directory source
//!
//! This is the main entry point for users. It bootstraps a source over a
//! folder, streams its change feed, and dumps its snapshot.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "resync")]
#[command(author = "ResourceSync Source Contributors")]
#[command(version)]
#[command(about = "Expose a directory as a ResourceSync source", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the source configuration comes from.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder to expose (overrides the config file)
    #[arg(short, long)]
    folder: Option<PathBuf>,

    /// Base URI of the source (defaults to http://localhost:<port>)
    #[arg(short, long)]
    base_uri: Option<String>,

    /// Port used to derive the default base URI
    #[arg(short, long, default_value_t = resync_source::DEFAULT_PORT)]
    port: u16,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration in the given directory
    Init {
        /// Folder to expose (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Bootstrap the source and stream its change feed until Ctrl+C
    Serve {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Bootstrap the source and write its resource list as JSON
    Snapshot {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bootstrap the source and print random resources
    Random {
        #[command(flatten)]
        source: SourceArgs,

        /// Number of resources
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },

    /// Print the synthetic payload for a key
    Payload {
        /// Resource key
        key: String,

        /// Payload length in bytes
        #[arg(short, long)]
        length: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Serve { source } => commands::serve(&source).await,
        Commands::Snapshot { source, output } => commands::snapshot(&source, output.as_deref()),
        Commands::Random { source, count } => commands::random(&source, count),
        Commands::Payload { key, length } => commands::payload(&key, length),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
