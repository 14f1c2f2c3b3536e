//! Storage gateway server: encrypts documents, uploads the ciphertext and
//! escrows the key with the configured key-holders.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use escrow_engine::crypto::signing::Identity;
use escrow_engine::gateway::StorageGateway;
use escrow_server::config::{CallArgs, HolderSetArgs, LedgerArgs, LogArgs};
use escrow_server::proto::storage_gateway_server::StorageGatewayServer;
use escrow_server::service::GatewayEndpoint;
use tonic::transport::Server;
use tracing::info;

#[derive(Parser)]
#[command(name = "escrow-gateway", version, about = "Escrow storage gateway")]
struct Cli {
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:50060")]
    listen: SocketAddr,

    /// Operator keypair used to reconstruct document keys
    #[arg(long, env = "KEYPAIR_PATH", default_value = "operator-keypair.json")]
    keypair: PathBuf,

    #[command(flatten)]
    holders: HolderSetArgs,

    #[command(flatten)]
    call: CallArgs,

    #[command(flatten)]
    ledger: LedgerArgs,

    #[command(flatten)]
    log: LogArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = cli.log.init("gateway");

    let operator = Arc::new(
        Identity::load_or_create(&cli.keypair)
            .with_context(|| format!("loading keypair {}", cli.keypair.display()))?,
    );
    let orchestrator = Arc::new(cli.holders.orchestrator(&cli.call).context("configuring key-holders")?);
    let ledger = Arc::new(cli.ledger.connect()?);
    let gateway = Arc::new(StorageGateway::new(ledger, orchestrator.clone()));

    info!(
        addr = %cli.listen,
        holders = orchestrator.holder_count(),
        threshold = orchestrator.threshold(),
        operator = %operator.public_key_hex(),
        "storage gateway listening"
    );

    Server::builder()
        .add_service(StorageGatewayServer::new(GatewayEndpoint::new(gateway, operator)))
        .serve_with_shutdown(cli.listen, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    Ok(())
}
