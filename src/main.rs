use clap::{Args, Parser, Subcommand};
use crawl_monitor::config::{ConfigLoader, MonitorConfig};
use crawl_monitor::control::{Action, ActionTable, CommandContext, ControlGateway, ControlPanel};
use crawl_monitor::poller::{Poller, PollerSettings, RefreshRequests, refresh_channel};
use crawl_monitor::source::{HttpSnapshotSource, SnapshotSource, build_client};
use crawl_monitor::status;
use indicatif::MultiProgress;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

#[derive(Parser)]
#[command(name = "crawl-monitor")]
#[command(version)]
#[command(about = "Live operator console for a background crawl job", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Path to the configuration file (JSON/YAML/TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the crawler admin API, overrides the config file
    #[arg(short, long)]
    url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the crawler and show live status. Type pause, resume or refresh on stdin.
    Watch {
        #[command(flatten)]
        target: Target,

        /// Disable the live status lines
        #[arg(short, long)]
        quiet: bool,
    },
    /// Fetch the current status once
    Status {
        #[command(flatten)]
        target: Target,

        /// Print the snapshot and derived status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask the crawler to pause
    Pause {
        #[command(flatten)]
        target: Target,
    },
    /// Ask the crawler to resume
    Resume {
        #[command(flatten)]
        target: Target,
    },
    /// Validate a configuration file
    Check {
        /// Path to the configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe { std::env::set_var("RUST_LOG", "info"); }
    }
    let cli = Cli::parse();
    let logger = env_logger::Builder::from_default_env().build();

    match cli.command {
        Commands::Watch { target, quiet } => {
            let multi = (!quiet).then(|| Arc::new(MultiProgress::new()));
            match &multi {
                Some(multi) => {
                    indicatif_log_bridge::LogWrapper::new((**multi).clone(), logger).try_init()?;
                }
                None => init_plain_logger(logger)?,
            }

            let config = resolve(&target)?;
            watch(config, multi).await?;
        }
        Commands::Status { target, json } => {
            init_plain_logger(logger)?;
            let config = resolve(&target)?;
            print_status(config, json).await?;
        }
        Commands::Pause { target } => {
            init_plain_logger(logger)?;
            let (gateway, _requests) = one_shot_gateway(&resolve(&target)?)?;
            let outcome = gateway.pause().await?;
            println!("✅ Pause accepted ({})", outcome.status);
        }
        Commands::Resume { target } => {
            init_plain_logger(logger)?;
            let (gateway, _requests) = one_shot_gateway(&resolve(&target)?)?;
            let outcome = gateway.resume().await?;
            println!("Resume sent ({})", outcome.status);
        }
        Commands::Check { config } => {
            init_plain_logger(logger)?;
            match ConfigLoader::load(&config) {
                Ok(cfg) => {
                    println!("✅ Config is valid:");
                    println!("   Name: {}", cfg.name);
                    println!("   Base URL: {}", cfg.base_url);
                    println!("   Poll interval: {}ms", cfg.poll_interval_ms);
                    println!("   Window: {} points", cfg.window);
                    println!("   Retries: {}", cfg.retry.max_retries);
                }
                Err(e) => {
                    eprintln!("❌ Config error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn init_plain_logger(logger: env_logger::Logger) -> anyhow::Result<()> {
    let level = logger.filter();
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);
    Ok(())
}

fn resolve(target: &Target) -> anyhow::Result<MonitorConfig> {
    let config = ConfigLoader::resolve(target.config.as_deref(), target.url.as_deref())?;
    log::debug!("Resolved config: {:?}", config);
    Ok(config)
}

/// Nothing polls in one-shot mode. The caller holds the returned requests
/// until the command finishes so the gateway's refresh lands in a live queue.
fn one_shot_gateway(config: &MonitorConfig) -> anyhow::Result<(ControlGateway, RefreshRequests)> {
    let client = build_client(config.request_timeout())?;
    let (refresh, requests) = refresh_channel();
    let gateway = ControlGateway::new(client, &config.base_url()?, ControlPanel::new(), refresh)?;
    Ok((gateway, requests))
}

async fn print_status(config: MonitorConfig, json: bool) -> anyhow::Result<()> {
    let client = build_client(config.request_timeout())?;
    let source = HttpSnapshotSource::new(client, &config.base_url()?)?;
    let snapshot = config.retry.run(|| source.fetch()).await?;
    let derived = status::derive(&snapshot);

    if json {
        let body = serde_json::json!({ "snapshot": snapshot, "status": derived });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("{} ({})", derived.label, derived.pause_label);
    println!("   Pending: {}", snapshot.pending);
    println!("   Crawled: {}", snapshot.crawled);
    println!("   Failed: {}", snapshot.failed);
    println!("   Media: {}", snapshot.media);
    println!(
        "   Pause: {} | Resume: {}",
        if derived.buttons.pause_enabled { "available" } else { "unavailable" },
        if derived.buttons.resume_enabled { "available" } else { "unavailable" },
    );
    Ok(())
}

async fn watch(config: MonitorConfig, multi: Option<Arc<MultiProgress>>) -> anyhow::Result<()> {
    log::info!("Watching {} at {}", config.name, config.base_url);

    let base = config.base_url()?;
    let client = build_client(config.request_timeout())?;
    let panel = ControlPanel::new();
    let (refresh, requests) = refresh_channel();

    let source = Arc::new(HttpSnapshotSource::new(client.clone(), &base)?);
    let poller = Arc::new(Poller::new(source, PollerSettings::from(&config), panel.clone()));
    let gateway = Arc::new(ControlGateway::new(client, &base, panel.clone(), refresh.clone())?);
    let ctx = CommandContext {
        gateway,
        panel,
        refresh,
    };
    let actions = Arc::new(ActionTable::default());

    let mut sinks = ConfigLoader::create_sinks(&config, multi)?;
    let mut views = BroadcastStream::new(poller.subscribe_applied());
    let poll_task = tokio::spawn(poller.clone().run(requests));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("Shutting down...");
                break;
            }
            Some(view) = views.next() => match view {
                Ok(view) => {
                    for sink in sinks.iter_mut() {
                        if let Err(e) = sink.write(&view).await {
                            log::error!("Failed to render view: {}", e);
                        }
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    log::warn!("Sinks fell behind; {} views dropped", missed);
                }
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Action>() {
                    Ok(action) => {
                        let actions = actions.clone();
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = actions.dispatch(action, ctx).await {
                                log::error!("{} failed: {}", action, e);
                            }
                        });
                    }
                    Err(e) => log::warn!("{} (expected pause, resume or refresh)", e),
                },
                Ok(None) => {
                    log::debug!("stdin closed; operator actions disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    log::warn!("Failed to read operator input: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    poll_task.abort();
    for sink in sinks.iter_mut() {
        sink.close().await?;
    }
    Ok(())
}
