//! CLI command implementations.

use crate::SourceArgs;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use resync_core::synthesize_payload;
use resync_source::{
    base_uri_for_port, ChangeRecord, DeliveryError, Source, SourceConfig, DEFAULT_PORT,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Resolves the configuration from a file and command-line overrides.
fn load_config(args: &SourceArgs) -> Result<SourceConfig> {
    let mut config = match (&args.config, &args.folder) {
        (Some(path), _) => SourceConfig::load(path)?,
        (None, Some(folder)) => SourceConfig::new(folder, base_uri_for_port(args.port)),
        (None, None) => return Err("either --config or --folder is required".into()),
    };

    if let Some(folder) = &args.folder {
        config.folder = folder.clone();
    }
    if let Some(base_uri) = &args.base_uri {
        config.base_uri = base_uri.clone();
    } else if args.port != DEFAULT_PORT {
        config.base_uri = base_uri_for_port(args.port);
    }

    Ok(config)
}

/// Builds the source and runs the startup walk behind a spinner.
fn bootstrap(args: &SourceArgs) -> Result<Arc<Source>> {
    let source = Arc::new(Source::new(load_config(args)?)?);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(format!("Indexing {}...", source.root().display()));

    let result = source.bootstrap()?;

    spinner.finish_and_clear();

    eprintln!(
        "{} Indexed {} files in {}ms",
        "✓".green(),
        result.files_indexed.to_string().cyan(),
        result.duration_ms
    );

    if !result.errors.is_empty() {
        eprintln!("\n{} files could not be read:", "⚠".yellow());
        for (file, error) in result.errors.iter().take(5) {
            eprintln!("  {} - {}", file.red(), error);
        }
        if result.errors.len() > 5 {
            eprintln!("  ... and {} more", result.errors.len() - 5);
        }
    }

    Ok(source)
}

/// Name of the file `init` writes into the folder. The leading dot keeps
/// the source from publishing its own configuration.
const CONFIG_FILE: &str = ".resync.json";

/// Write a default configuration file.
pub fn init(path: &Path) -> Result<()> {
    let config_path = path.join(CONFIG_FILE);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    let folder = fs::canonicalize(path)?;
    let config = SourceConfig::new(folder, base_uri_for_port(DEFAULT_PORT));
    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    println!("{} Wrote {}", "✓".green(), config_path.display());
    println!(
        "  Run {} to start the source",
        format!("resync serve --config {}", config_path.display()).cyan()
    );

    Ok(())
}

/// Bootstrap, then stream change records as JSON lines until Ctrl+C.
pub async fn serve(args: &SourceArgs) -> Result<()> {
    let source = bootstrap(args)?;

    source.subscribe(Arc::new(
        |record: &ChangeRecord| -> std::result::Result<(), DeliveryError> {
            let line =
                serde_json::to_string(record).map_err(|e| DeliveryError::new(e.to_string()))?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", line).map_err(|e| DeliveryError::new(e.to_string()))
        },
    ));

    let handle = source.watch()?;

    eprintln!("{} Serving {}", "✓".green(), source.base_uri().cyan());
    eprintln!("  Resource list:      {}", source.resource_list_uri());
    eprintln!("  Capability list:    {}", source.capability_list_uri());
    eprintln!("  Source description: {}", source.source_description_uri());
    eprintln!("  Press {} to stop", "Ctrl+C".cyan());

    tokio::signal::ctrl_c().await?;

    handle.shutdown();
    Ok(())
}

/// Bootstrap and dump the resource list.
pub fn snapshot(args: &SourceArgs, output: Option<&Path>) -> Result<()> {
    let source = bootstrap(args)?;
    let list = source.snapshot();
    let json = serde_json::to_string_pretty(&list)?;

    match output {
        Some(path) => {
            fs::write(path, json)?;
            eprintln!(
                "{} Wrote {} resources to {}",
                "✓".green(),
                list.count,
                path.display()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Bootstrap and print `count` random resources.
pub fn random(args: &SourceArgs, count: usize) -> Result<()> {
    let source = bootstrap(args)?;
    let resources = source.random(count);

    if resources.is_empty() {
        eprintln!("No resources in {}", source.root().display());
        return Ok(());
    }

    for resource in resources {
        println!("{}", serde_json::to_string(&resource)?);
    }
    Ok(())
}

/// Print the synthetic payload for `key`.
pub fn payload(key: &str, length: usize) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&synthesize_payload(key, length))?;
    stdout.flush()?;
    Ok(())
}
