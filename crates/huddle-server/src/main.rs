//! Huddle OTP verification server binary.
//!
//! # Usage
//!
//! ```bash
//! # Development: logs codes instead of dispatching SMS
//! huddle-server --bind 0.0.0.0:8080
//!
//! # Production: supply a stable token-signing secret
//! huddle-server --bind 0.0.0.0:8080 --secret <hex>
//! ```

use clap::Parser;
use huddle_core::SystemEnv;
use huddle_server::{LogSmsGateway, OtpService, router};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Huddle OTP verification service
#[derive(Parser, Debug)]
#[command(name = "huddle-server")]
#[command(about = "Huddle SMS one-time-password verification service")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Secret used to sign session tokens
    #[arg(long)]
    secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Huddle OTP service starting");
    tracing::info!("Binding to {}", args.bind);

    let secret = match args.secret {
        Some(secret) => secret.into_bytes(),
        None => {
            tracing::warn!("No token secret provided - using an ephemeral one");
            tracing::warn!("Issued session tokens will not survive a restart!");
            format!("{:032x}", rand::random::<u128>()).into_bytes()
        },
    };

    let service = OtpService::new(LogSmsGateway, SystemEnv, secret);
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
