use std::sync::Arc;

use clap::Parser;
use grader_core::{ActivityStore, GraderConfig};
use tokio::sync::broadcast;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use grader_server::http::{self, HttpState};
use grader_server::subsystems::recorder;

#[derive(Parser, Debug)]
#[command(author, version, about = "Activity grading server", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "grader.toml")]
    config: String,

    /// Path to a .jsonl file containing the activity data (overrides config)
    #[arg(long)]
    activities: Option<String>,

    /// The host for this web server (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// The port for this web server (overrides config)
    #[arg(long)]
    port: Option<u16>,
}

impl Args {
    fn apply(&self, config: &mut GraderConfig) {
        if let Some(path) = &self.activities {
            config.activities.path = path.clone();
        }
        if let Some(host) = &self.host {
            config.http.host = host.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let mut config = match GraderConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };
    args.apply(&mut config);

    // Init logging. stdout carries the submission records by default.
    let level: Directive = config
        .service
        .log_level
        .parse()
        .unwrap_or_else(|_| tracing::Level::INFO.into());
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level))
        .init();

    // The answer key must be complete and valid before serving anything
    let store = match ActivityStore::load(&config.activities.path) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(path = %config.activities.path, "Failed to load activities: {}", e);
            std::process::exit(1);
        }
    };

    let sink = match recorder::open_sink(&config.recorder.output).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(output = %config.recorder.output, "Failed to open record sink: {}", e);
            std::process::exit(1);
        }
    };

    let (record_queue, record_logger) =
        recorder::record_channel_from_config(&config.recorder, sink);
    let logger_task = tokio::spawn(record_logger.run());

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = Arc::new(HttpState {
        store: Arc::new(store),
        recorder: record_queue,
        config,
    });

    // The router owns the last producer handle; once it is dropped the
    // logger drains what is left and exits.
    let served = http::start_http_server(state, tx.subscribe()).await;

    if let Err(e) = logger_task.await {
        tracing::error!("Record logger task failed: {}", e);
    }

    served
}
