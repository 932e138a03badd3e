//! # Bot Binary
//!
//! Process entry point: parses CLI args, loads configuration, wires the
//! stores, plugins, manager, pipeline, and chat client together, then runs
//! the update loop alongside a background cleanup ticker and the metrics
//! HTTP server until a shutdown signal arrives.
//!
//! Grounded on the gateway's own `main.rs` (`clap::Parser` args,
//! `tracing_subscriber` init, config load+validate, bind+serve).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use censor_bot::config::Config;
use censor_bot::metrics::PrometheusMetrics;
use censor_bot::pipeline::Pipeline;
use censor_bot::platform::{ChatClient, TelegramClient};
use censor_bot::server::create_server;
use censor_core::stores::violation::ViolationStore;
use censor_core::{MetricsSink, PluginManager};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Overrides `logging.level` from the configuration file.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let log_level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> censor_bot::error::Result<()> {
    let metrics = Arc::new(PrometheusMetrics::new());
    let metrics_sink: Arc<dyn MetricsSink> = Arc::clone(&metrics) as Arc<dyn MetricsSink>;

    let manager_config = config.manager_config()?;
    let manager = Arc::new(PluginManager::with_metrics(manager_config, metrics_sink));

    for (name, entry) in &config.censor.plugins {
        let core_entry: censor_core::PluginConfigEntry = entry.clone().into();
        let plugin = censor_core::create_plugin(name, &core_entry)?;
        manager.register(plugin, core_entry).await?;
    }
    manager.start_cleanup(CLEANUP_INTERVAL).await;

    let violations = Arc::new(ViolationStore::from_url(&config.storage.url)?);

    let pipeline = Pipeline::new(
        Arc::clone(&manager),
        violations,
        Arc::clone(&metrics),
        config.bot.admin_id,
        config.bot.ban_threshold,
    );

    let mut client = TelegramClient::new(config.telegram.token.clone())?;

    let addr: SocketAddr = config
        .http
        .address
        .parse()
        .map_err(|e| censor_bot::Error::Config(format!("invalid http.address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics server listening");
    let app = create_server(metrics, &config.http);
    let metrics_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await {
            tracing::error!(error = %e, "metrics server exited");
        }
    });

    tracing::info!("starting update loop");
    loop {
        tokio::select! {
            update = client.next_update() => {
                match update {
                    Ok(Some(update)) => {
                        if let Err(e) = pipeline.process(&client, update).await {
                            tracing::warn!(error = %e, "update processing failed");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "failed to fetch update"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    manager.stop_cleanup().await;
    metrics_server.abort();

    Ok(())
}
