//! transkit CLI - manage offline translation models and translate text
//!
//! Examples:
//!   transkit models --refresh
//!   transkit install en-es --variant lite
//!   transkit translate "Hello" --from auto --to es --variant lite
//!   transkit translate "Hello" --from en --to fr --online

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::watch;

use transkit_lib::downloads::{DownloadHandle, DownloadStatus, DownloadTask};
use transkit_lib::models::{lang_name, resolve_pairs, reverse_pair_id, split_pair_id, Variant};
use transkit_lib::paths::AppDirs;
use transkit_lib::translation::{LingvaClient, RemoteTranslator};
use transkit_lib::AppContext;

#[derive(Parser)]
#[command(
    name = "transkit",
    about = "Offline/online translation with downloadable model pairs",
    version = env!("CARGO_PKG_VERSION"),
    arg_required_else_help = true,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// App data directory (defaults to the platform data dir)
    #[arg(long, global = true, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List installable model pairs from the repository manifest
    Models {
        /// Ignore the 24h manifest cache
        #[arg(long)]
        refresh: bool,
    },

    /// List installed model pairs
    Installed,

    /// Download and install both directions of a pair
    Install {
        /// Pair id, e.g. en-es
        pair: String,

        #[arg(long, default_value = "lite")]
        variant: Variant,
    },

    /// Delete both directions of an installed pair
    Remove {
        pair: String,

        #[arg(long, default_value = "lite")]
        variant: Variant,
    },

    /// Translate text
    Translate {
        text: String,

        /// Source language code, or "auto"
        #[arg(long, default_value = "auto")]
        from: String,

        #[arg(long)]
        to: String,

        /// Use the online service instead of an installed model
        #[arg(long, conflicts_with = "variant")]
        online: bool,

        /// Installed model variant for offline translation
        #[arg(long)]
        variant: Option<Variant>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let dirs = match cli.data_dir {
        Some(path) => AppDirs::new(path),
        None => AppDirs::default_location()?,
    };

    let ctx = AppContext::new(dirs).context("failed to initialise app directories")?;
    run(&ctx, cli.command).await
}

async fn run(ctx: &AppContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Models { refresh } => {
            let models = if refresh {
                ctx.manifest.refresh().await?
            } else {
                ctx.manifest.get_available_models().await?
            };

            for pair in resolve_pairs(&models) {
                let (forward, reverse) = pair.ids();
                let installed = ctx.store.is_installed(forward, pair.variant())
                    && ctx.store.is_installed(reverse, pair.variant());
                println!(
                    "{:<5} {:<6} {:<32} {:>8.1} MB {}",
                    pair.variant(),
                    forward,
                    pair.display_name(),
                    (pair.forward.size + pair.reverse.size) as f64 / 1_048_576.0,
                    if installed { "[installed]" } else { "" }
                );
            }
        }

        Commands::Installed => {
            let pairs = ctx.store.installed_pairs()?;
            if pairs.is_empty() {
                println!("No model pairs installed");
            }
            for pair in pairs {
                let (forward, reverse) = pair.ids();
                let size = ctx.store.installed_size(forward, pair.variant())?
                    + ctx.store.installed_size(reverse, pair.variant())?;
                println!(
                    "{:<5} {} <-> {}  {:.1} MB",
                    pair.variant(),
                    forward,
                    reverse,
                    size as f64 / 1_048_576.0
                );
            }
            let usage = ctx.dirs.storage_usage();
            println!("Models on disk: {:.1} MB", usage.models as f64 / 1_048_576.0);
        }

        Commands::Install { pair, variant } => {
            let models = ctx.manifest.get_available_models().await?;
            let target = resolve_pairs(&models)
                .into_iter()
                .find(|p| {
                    let (forward, reverse) = p.ids();
                    p.variant() == variant && (forward == pair || reverse == pair)
                })
                .ok_or_else(|| anyhow!("no installable {} pair {} in the manifest", variant, pair))?;

            println!("Installing {} ({})", target.display_name(), variant);
            let (forward, reverse) = ctx.downloads.install_pair(&target);
            let (forward, reverse) = tokio::join!(watch_download(forward), watch_download(reverse));

            for task in [forward, reverse] {
                if task.status == DownloadStatus::Failed {
                    bail!(
                        "{} failed: {}",
                        task.model_id,
                        task.message.unwrap_or_default()
                    );
                }
            }
            println!("Installed {}", target.display_name());
        }

        Commands::Remove { pair, variant } => {
            let reverse = reverse_pair_id(&pair).ok_or_else(|| anyhow!("invalid pair id: {}", pair))?;
            ctx.store.remove(&pair, variant)?;
            ctx.store.remove(&reverse, variant)?;
            println!("Removed {} and {} ({})", pair, reverse, variant);
        }

        Commands::Translate {
            text,
            from,
            to,
            online,
            variant,
        } => translate(ctx, &text, &from, &to, online, variant).await?,
    }
    Ok(())
}

/// Print progress in 10% steps until the download ends
async fn watch_download(handle: DownloadHandle) -> DownloadTask {
    let mut rx: watch::Receiver<DownloadTask> = handle.progress();
    let label = format!("{} ({})", handle.model_id(), handle.variant());

    let printer = tokio::spawn(async move {
        let mut last_step = -1;
        while rx.changed().await.is_ok() {
            let task = rx.borrow_and_update().clone();
            let step = (task.percentage() / 10.0) as i32;
            match task.status {
                DownloadStatus::Downloading if step > last_step => {
                    last_step = step;
                    println!("  {} {:>3.0}%", label, task.percentage());
                }
                DownloadStatus::Extracting => println!("  {} extracting", label),
                _ => {}
            }
            if task.status.is_terminal() {
                break;
            }
        }
    });

    let result = handle.finish().await;
    printer.abort();
    result
}

async fn translate(
    ctx: &AppContext,
    text: &str,
    from: &str,
    to: &str,
    online: bool,
    variant: Option<Variant>,
) -> anyhow::Result<()> {
    if split_pair_id(&format!("{}-{}", from, to)).is_none() {
        bail!("invalid language codes: {} / {}", from, to);
    }
    log::info!("Translating {} -> {}", lang_name(from), lang_name(to));

    if online {
        let client = LingvaClient::new()?;
        println!("{}", client.translate(text, from, to).await?);
        return Ok(());
    }

    translate_offline(ctx, text, from, to, variant.unwrap_or(Variant::Lite)).await
}

#[cfg(feature = "native")]
async fn translate_offline(
    ctx: &AppContext,
    text: &str,
    from: &str,
    to: &str,
    variant: Variant,
) -> anyhow::Result<()> {
    use std::sync::Arc;
    use transkit_lib::engine::ffi::{FfiDetector, FfiEngine};
    use transkit_lib::translation::{TranslationMode, TranslationOrchestrator};

    let orchestrator = TranslationOrchestrator::new(
        Arc::new(LingvaClient::new()?),
        Arc::new(FfiDetector),
        FfiEngine,
        ctx.store.clone(),
    );
    let result = orchestrator
        .translate(text, from, to, TranslationMode::Offline(variant))
        .await;
    orchestrator.shutdown().await?;
    println!("{}", result?);
    Ok(())
}

#[cfg(not(feature = "native"))]
async fn translate_offline(
    _ctx: &AppContext,
    _text: &str,
    _from: &str,
    _to: &str,
    _variant: Variant,
) -> anyhow::Result<()> {
    bail!("offline engine unavailable: rebuild with `--features native` or pass --online")
}
