use anyhow::Context;
use clap::Parser;
use ledger_core::chain::Ledger;
use ledger_storage::SledStore;
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "LEDGER_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,

    /// Data directory for sled
    #[arg(long, env = "LEDGER_DATA_DIR", default_value = "./data")]
    data_dir: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let store = SledStore::open(&args.data_dir)
        .with_context(|| format!("opening record store at {}", args.data_dir))?;
    let ledger = Ledger::load_or_bootstrap(Arc::new(store)).context("initializing ledger")?;
    info!(height = ledger.len(), valid = ledger.is_valid(), "ledger ready");

    let app = ledger_node::router(Arc::new(ledger));

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
