use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use echobin::config::MonitorConfig;
use echobin::telemetry::Telemetry;
use echobin::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Diagnostic HTTP echo service.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "ECHOBIN_ADDR", default_value = "0.0.0.0:8081")]
    addr: SocketAddr,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Seconds the monitoring sink gets to flush at shutdown.
    #[arg(long, default_value_t = 10)]
    flush_timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = MonitorConfig::from_env();
    let telemetry = Telemetry::from_config(&config).unwrap_or_else(|e| {
        warn!(error = %e, "monitoring sink unavailable, continuing without it");
        Telemetry::disabled()
    });

    info!(addr = %args.addr, "starting echobin");
    let result = Server::bind(args.addr).serve(echobin::app(telemetry.clone())).await;

    if let Err(e) = &result {
        let addr = args.addr.to_string();
        telemetry.capture_error(e, "Server failed to start", &[("addr", addr.as_str())], Default::default());
    }

    if !telemetry.flush(Duration::from_secs(args.flush_timeout_secs)).await {
        warn!("monitoring sink did not flush before the deadline");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
