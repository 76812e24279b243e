use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use filmlog::config::{default_config_path, Settings, SettingsStore, TomlSettingsStore};
use filmlog::feed::build_client;
use filmlog::sync::{run_sync, SyncOptions, SyncReport};
use filmlog::vault::FsVault;

/// Env var naming an alternative settings file.
const CONFIG_ENV: &str = "FILMLOG_CONFIG";

#[derive(Parser, Debug)]
#[command(
    name = "filmlog",
    version,
    about = "Merge a Letterboxd diary into a markdown note"
)]
struct Args {
    /// Settings file (default: ~/.config/filmlog/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the diary and add new entries to the note (default)
    Sync {
        /// Print the merged note instead of writing it
        #[arg(long)]
        dry_run: bool,

        /// Only consider the N most recent diary entries
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Change one setting
    Set { key: String, value: String },
    /// Print the settings file location
    Path,
}

fn config_path(args: &Args) -> Result<PathBuf> {
    if let Some(path) = &args.config {
        return Ok(path.clone());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    default_config_path().context("Failed to locate the settings file")
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "filmlog=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let store = TomlSettingsStore::new(config_path(&args)?);

    match args.command {
        None => sync(&store, SyncOptions::default()).await,
        Some(Command::Sync { dry_run, limit }) => {
            sync(&store, SyncOptions { dry_run, limit }).await
        }
        Some(Command::Config { action }) => configure(&store, action),
    }
}

async fn sync(store: &TomlSettingsStore, options: SyncOptions) -> Result<()> {
    let mut settings = store.load().with_context(|| {
        format!(
            "Failed to load settings from '{}'",
            store.path().display()
        )
    })?;
    settings.apply_env_overrides();

    let vault = FsVault::new(settings.vault_root()?);
    let client = build_client().context("Failed to create HTTP client")?;

    let report = run_sync(&settings, &client, &vault, store, &options).await?;
    print_report(&vault, &report);
    Ok(())
}

fn print_report(vault: &FsVault, report: &SyncReport) {
    if report.direction_changed {
        eprintln!(
            "Warning: sort direction changed since the last sync; entries already in the note keep their order."
        );
    }

    if let Some(preview) = &report.preview {
        println!("{preview}");
        eprintln!(
            "Dry run: {} new, {} already present. Nothing written.",
            report.added, report.duplicates
        );
        return;
    }

    let note = vault.root().join(&report.path);
    if report.written {
        let verb = if report.created { "Created" } else { "Updated" };
        println!(
            "{verb} {}: {} new, {} already present.",
            note.display(),
            report.added,
            report.duplicates
        );
    } else {
        println!("{} is up to date.", note.display());
    }
}

fn configure(store: &TomlSettingsStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", store.path().display());
        }
        ConfigAction::Show => {
            let mut settings = store.load()?;
            settings.apply_env_overrides();
            print!("{}", toml::to_string_pretty(&settings)?);
        }
        ConfigAction::Set { key, value } => {
            let mut settings: Settings = store.load()?;
            settings.set(&key, &value)?;
            store.save(&settings).with_context(|| {
                format!("Failed to save settings to '{}'", store.path().display())
            })?;
            println!("Set {key}.");
        }
    }
    Ok(())
}
