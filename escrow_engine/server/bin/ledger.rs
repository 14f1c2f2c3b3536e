//! Development ledger: serves an in-memory blob store, account map and log
//! feed so the other processes can run without a real chain.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use escrow_engine::ledger::MemoryLedger;
use escrow_server::config::LogArgs;
use escrow_server::proto::ledger_server::LedgerServer;
use escrow_server::service::LedgerEndpoint;
use tonic::transport::Server;
use tracing::info;

#[derive(Parser)]
#[command(name = "escrow-ledger", version, about = "In-memory development ledger")]
struct Cli {
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:50070")]
    listen: SocketAddr,

    /// Mint blob ids as tx1, tx2, ... instead of content hashes
    #[arg(long)]
    sequential_ids: bool,

    #[command(flatten)]
    log: LogArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = cli.log.init("ledger");

    let ledger = if cli.sequential_ids {
        MemoryLedger::with_sequential_ids()
    } else {
        MemoryLedger::new()
    };
    info!(addr = %cli.listen, sequential_ids = cli.sequential_ids, "development ledger listening");

    Server::builder()
        .add_service(LedgerServer::new(LedgerEndpoint::new(Arc::new(ledger))))
        .serve_with_shutdown(cli.listen, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    Ok(())
}
