//! Main entry point for the Burrow coordination server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use burrow_persistence::{Keyspace, LockService, RedbStore};
use burrow_server::config::{Configuration, Overrides};
use burrow_server::service::BurrowService;
use burrow_server::{cert, startup};

#[derive(Debug, Parser)]
#[command(name = "burrow", about = "Hierarchical key-value store and lock registry over gRPC")]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "conf/burrow.yml")]
    config: String,
    #[arg(long)]
    host: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    /// Database file path
    #[arg(long)]
    db: Option<String>,
    /// Static authentication token
    #[arg(long, env = "BURROW_TOKEN")]
    token: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print version information
    Version,
    /// Generate a self-signed CA and server certificate
    CertGen {
        /// Output directory for ca.pem, cert.pem and key.pem
        #[arg(long, default_value = "certs")]
        out_dir: PathBuf,
        /// DNS name or IP address the server certificate is valid for
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    if let Some(Command::Version) = args.command {
        println!("burrow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let overrides = Overrides {
        host: args.host,
        port: args.port,
        database_path: args.db,
        token: args.token,
    };
    let configuration = Configuration::new(&args.config, overrides)?;
    startup::init_logging(&configuration.log_level(), &configuration.log_format())?;

    if let Some(Command::CertGen { out_dir, host }) = args.command {
        return cert::generate(&out_dir, &host);
    }

    let store = Arc::new(RedbStore::open(configuration.database_path())?);
    let keyspace = Keyspace::new(Arc::clone(&store));
    let locks = Arc::new(LockService::new(store, configuration.default_lock_ttl()));
    let service = BurrowService::new(keyspace, locks);

    let shutdown = startup::wait_for_shutdown_signal().await;
    startup::serve(&configuration, service, shutdown).await?;

    info!("Shutdown complete");
    Ok(())
}
