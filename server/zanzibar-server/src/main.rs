use clap::Parser;
use colored::Colorize;
use error_common::{log_error, Result, ServiceError};
use std::{env, net::SocketAddr};
use tracing::{info, Level};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use zanzibar_server::{
    config::{LogFormat, DEFAULT_CONFIG_FILE},
    create_app, Settings, ZanzibarServer,
};

/// Mini Zanzibar HTTP Server
#[derive(Parser, Debug)]
#[command(name = "zanzibar-server")]
#[command(about = "Relation-based access control HTTP API server")]
struct Args {
    /// Server bind address, overrides `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Server port, overrides `server.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Configuration file path; the extension may be omitted
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let result = run(args).await;
    if let Err(ref e) = result {
        log_error("zanzibar-server", e);
    }
    result
}

async fn run(args: Args) -> Result<()> {
    let mut settings = Settings::load(&args.config)
        .map_err(|e| ServiceError::ConfigError(format!("Failed to load {}: {e}", args.config)))?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    init_tracing(args.verbose, settings.logging.format);

    info!("🔐 {}", "Starting Mini Zanzibar HTTP Server".bright_cyan());
    info!("📋 Version: {}", env!("CARGO_PKG_VERSION").bright_white());
    info!(
        "⚙️  Check timeout: {}ms, max depth: {}",
        settings.engine.check_timeout_ms, settings.engine.max_depth
    );

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| {
            ServiceError::ConfigError(format!(
                "Invalid bind address {}:{}: {e}",
                settings.server.host, settings.server.port
            ))
        })?;

    let server = ZanzibarServer::new(settings)?;
    info!("👥 {} API client(s) configured", server.clients.len());
    let app = create_app(server);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::NetworkError(format!("Failed to bind to {addr}: {e}")))?;

    info!("🚀 {}", format!("Mini Zanzibar running on http://{addr}").bright_green());
    info!("📋 {}", format!("Health check available at: http://{addr}/health").bright_blue());
    info!("📋 {}", format!("API v1 available at: http://{addr}/api/v1").bright_blue());
    info!("📖 {}", format!("OpenAPI document at: http://{addr}/api-docs/openapi.json").bright_blue());

    // Peer addresses key the rate limiter for callers without an API key
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServiceError::ServerError(format!("HTTP server error: {e}")))?;

    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    // Check if we're in development or production
    let is_development =
        env::var("ZANZIBAR_ENV").unwrap_or_else(|_| "development".to_string()) == "development";
    let use_colors = env::var("NO_COLOR").is_err() && atty::is(atty::Stream::Stdout);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("zanzibar_server={level},zanzibar_core={level},tower_http=info").into()
    });

    if is_development && format == LogFormat::Pretty {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_colors)
                    .with_level(true),
            )
            .init();

        if use_colors {
            print_startup_banner();
        }
    } else {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .init();
    }
}

fn print_startup_banner() {
    println!("{}", "╔══════════════════════════════════════════════════════════════╗".bright_cyan());
    println!("{}", "║                       🔐 MINI ZANZIBAR                       ║".bright_cyan());
    println!("{}", "║               Relation-Based Access Control                  ║".bright_cyan());
    println!("{}", "╚══════════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}
