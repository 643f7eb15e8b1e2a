//! ReportDash DataStore MCP relay binary.
//!
//! Default mode relays MCP JSON-RPC between stdio and the DataStore API:
//!
//! ```bash
//! REPORTDASH_API_KEY=... reportdash-datastore-mcp
//! ```
//!
//! The `test` subcommand runs a human-readable connectivity check (do not
//! wire it into an MCP client; it prints prose to stdout):
//!
//! ```bash
//! REPORTDASH_API_KEY=... reportdash-datastore-mcp test
//! ```

use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;

use reportdash_datastore_mcp::config::Config;
use reportdash_datastore_mcp::relay::{self, RelayEngine};
use reportdash_datastore_mcp::wire::OutboundMessage;
use reportdash_datastore_mcp::{self_test, wire};

#[derive(Parser, Debug)]
#[command(name = "reportdash-datastore-mcp")]
#[command(about = "MCP stdio relay for the ReportDash DataStore HTTP API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable logging to stderr. Accepts a level (error, warn, info, debug,
    /// trace) or a RUST_LOG-style filter string.
    #[arg(long)]
    log: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Relay MCP JSON-RPC between stdio and the DataStore API (default)
    Serve,

    /// Run a human-readable connectivity check against the API
    Test,
}

fn setup_logging(filter: Option<&str>) {
    if let Some(filter) = filter {
        use tracing_subscriber::EnvFilter;
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Report a fatal configuration error and exit.
///
/// Stdout belongs to the MCP client, so even this diagnostic goes out as
/// one JSON-RPC error line (id null, nothing was read yet) before exit 1.
fn config_failure(message: String) -> ! {
    let fatal = OutboundMessage::error(Value::Null, -32600, message);
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(wire::encode(&fatal).as_bytes());
    let _ = stdout.flush();
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log.as_deref());

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => config_failure(error.to_string()),
    };

    match cli.command {
        None | Some(Command::Serve) => {
            tracing::debug!("Relaying stdio to {}", config.api_url);
            let engine = RelayEngine::new(config)?;
            relay::serve(engine, tokio::io::stdin(), tokio::io::stdout()).await?;
            tracing::debug!("Input closed, exiting");
        }
        Some(Command::Test) => {
            self_test::run(&config).await?;
        }
    }

    Ok(())
}
