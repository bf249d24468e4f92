use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tether_login::BootstrapConfig;

/// Creates an account on the auth service and seeds local credentials.
#[derive(Debug, Parser)]
#[command(name = "tether-login", version)]
struct Cli {
    /// Base URL of the auth service.
    #[arg(long, env = "TETHER_SERVER_URL", default_value = "http://localhost:3005")]
    server_url: String,

    /// Directory to write credentials into.
    #[arg(long, env = "TETHER_HOME_DIR", value_name = "DIR")]
    home: PathBuf,

    /// Attempts before giving up on an unreachable server.
    #[arg(long, default_value_t = 30)]
    probe_attempts: u32,

    /// Seconds between probes.
    #[arg(long, default_value_t = 1)]
    probe_backoff_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = BootstrapConfig {
        server_url: cli.server_url,
        home: cli.home,
        probe_attempts: cli.probe_attempts,
        probe_backoff: Duration::from_secs(cli.probe_backoff_secs),
    };

    tether_login::bootstrap(&config).await?;
    Ok(())
}
