use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tether_agent::AgentConfig;

/// Serves the agent protocol over stdin/stdout, one JSON value per line.
#[derive(Debug, Parser)]
#[command(name = "tether-agent", version)]
struct Cli {
    /// Directory holding `access.key` and `settings.json` from the
    /// credential bootstrap.
    #[arg(long, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Unit pace in milliseconds for simulated turn delays.
    #[arg(long, default_value_t = 100)]
    pace_ms: u64,

    /// Workspace root used when `newSession` does not supply one.
    #[arg(long, value_name = "DIR", default_value = "/workspace")]
    workspace: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AgentConfig {
        turn_pace: Duration::from_millis(cli.pace_ms),
        default_workspace: cli.workspace,
        credentials: None,
    };
    tether_agent::run_main(cli.home, config).await
}
