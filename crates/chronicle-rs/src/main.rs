//! Command-line inspector for saved chronicle histories.

use anyhow::{Context, bail};
use chronicle_rs::config::{ChronicleConfig, ResolvedProfile};
use chronicle_rs::history::{ContextWindowBuilder, PersistenceCodec, TrendAggregator};
use clap::{Parser, Subcommand};
use log::{debug, info};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Command-line options for the chronicle inspector.
#[derive(Parser)]
#[command(name = "chronicle", version)]
struct Cli {
    /// Optional path to a chronicle.json5 runtime override layer
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Tool profile whose settings apply
    #[arg(long, global = true)]
    profile: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the records of a saved history
    Show {
        file: PathBuf,
        /// Only print the newest N records
        #[arg(long)]
        last: Option<usize>,
    },
    /// Print the context window a saved history would produce
    Window {
        file: PathBuf,
        #[arg(long)]
        max_messages: Option<usize>,
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Print trend statistics over a saved history
    Trends {
        file: PathBuf,
        /// Numeric metadata field (defaults to trends.numeric_field)
        #[arg(long)]
        numeric: Option<String>,
        /// Categorical metadata field (defaults to trends.categorical_field)
        #[arg(long)]
        categorical: Option<String>,
    },
    /// Convert a legacy bare-array history into the versioned format
    Import {
        legacy: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Capacity for the imported store (defaults to the profile capacity)
        #[arg(long)]
        capacity: Option<usize>,
    },
}

#[derive(Serialize)]
struct WindowReport<T: Serialize> {
    dropped_for_budget: usize,
    total_chars: usize,
    messages: T,
}

/// Entry point for the chronicle inspector.
fn main() -> anyhow::Result<()> {
    chronicle_rs::init_logging();

    let cli = Cli::parse();
    info!(
        "starting chronicle (config_set={}, profile={})",
        cli.config.is_some(),
        cli.profile.as_deref().unwrap_or("default")
    );
    let config = load_config(cli.config.as_deref())?;
    let profile = config
        .resolve_profile(cli.profile.as_deref())
        .context("failed to resolve profile")?;
    let codec = PersistenceCodec::new()
        .with_pretty(config.persistence.pretty)
        .with_file_prefix(profile.file_prefix.clone());

    match cli.command {
        Command::Show { file, last } => {
            let store = codec.load(&file, None).with_context(|| load_hint(&file))?;
            let records = match last {
                Some(count) => store.tail(count),
                None => store.all(),
            };
            print_json(&records)
        }
        Command::Window {
            file,
            max_messages,
            max_chars,
        } => {
            let store = codec.load(&file, None).with_context(|| load_hint(&file))?;
            let window = window_builder(&profile, max_messages, max_chars)?.build(&store);
            print_json(&WindowReport {
                dropped_for_budget: window.dropped_for_budget(),
                total_chars: window.total_chars(),
                messages: window.to_messages(),
            })
        }
        Command::Trends {
            file,
            numeric,
            categorical,
        } => {
            let store = codec.load(&file, None).with_context(|| load_hint(&file))?;
            let aggregator = TrendAggregator::new()
                .with_numeric_field(numeric.or_else(|| config.trends.numeric_field.clone()))
                .with_categorical_field(
                    categorical.or_else(|| config.trends.categorical_field.clone()),
                );
            print_json(&aggregator.summarize(&store.all()))
        }
        Command::Import {
            legacy,
            out,
            capacity,
        } => {
            let capacity = capacity.unwrap_or(profile.history.capacity);
            let store = codec
                .load(&legacy, Some(capacity))
                .with_context(|| format!("failed to import {}", legacy.display()))?;
            codec
                .save(&store, &out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(
                "imported legacy history (records={}, capacity={}, out={})",
                store.len(),
                capacity,
                out.display()
            );
            print_json(&serde_json::json!({
                "session_id": store.session_id(),
                "records": store.len(),
                "capacity": capacity,
                "out": out.display().to_string(),
            }))
        }
    }
}

fn load_config(runtime: Option<&Path>) -> anyhow::Result<ChronicleConfig> {
    let cwd = std::env::current_dir().context("cwd")?;
    info!("loading layered config from cwd: {}", cwd.display());
    let mut options = chronicle_rs::config::LayeredConfigOptions::new(&cwd);
    if let Some(path) = runtime {
        options = options.with_runtime_path(path);
    }
    let layered = ChronicleConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

fn window_builder(
    profile: &ResolvedProfile,
    max_messages: Option<usize>,
    max_chars: Option<usize>,
) -> anyhow::Result<ContextWindowBuilder> {
    let window = &profile.history.window;
    let max_messages = max_messages.unwrap_or(window.max_messages);
    if max_messages == 0 {
        bail!("--max-messages must be greater than zero");
    }
    if max_chars == Some(0) {
        bail!("--max-chars must be greater than zero");
    }
    Ok(ContextWindowBuilder::new(max_messages)
        .with_max_chars(max_chars.or(window.max_chars))
        .with_system_prompt(window.system_prompt.clone()))
}

fn load_hint(path: &Path) -> String {
    format!(
        "failed to load {} (legacy files must be converted with `chronicle import` first)",
        path.display()
    )
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}
