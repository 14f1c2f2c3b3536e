//! Chain monitor: follows one governance group and retrieves each document
//! whose access proposal executes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use escrow_engine::crypto::signing::Identity;
use escrow_engine::gateway::StorageGateway;
use escrow_engine::monitor::{ChainMonitor, GatewayRetrieval, RetrievedDocument};
use escrow_server::config::{CallArgs, HolderSetArgs, LedgerArgs, LogArgs};
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "escrow-monitor", version, about = "Governance proposal monitor")]
struct Cli {
    /// Governance group address to follow
    #[arg(long, env = "GOVERNANCE_GROUP")]
    governance_group: String,

    /// Operator keypair; must be a member of the governance group
    #[arg(long, env = "KEYPAIR_PATH", default_value = "operator-keypair.json")]
    keypair: PathBuf,

    /// Write retrieved documents here, named by escrow id
    #[arg(long, env = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

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
    let _guard = cli.log.init("monitor");

    let operator = Arc::new(
        Identity::load_or_create(&cli.keypair)
            .with_context(|| format!("loading keypair {}", cli.keypair.display()))?,
    );
    let orchestrator = Arc::new(cli.holders.orchestrator(&cli.call).context("configuring key-holders")?);
    let ledger = Arc::new(cli.ledger.connect()?);
    let gateway = Arc::new(StorageGateway::new(ledger.clone(), orchestrator));

    let (sink, mut documents) = mpsc::unbounded_channel::<RetrievedDocument>();
    let handler = Arc::new(GatewayRetrieval::new(gateway, operator.clone()).with_sink(sink));
    let monitor = ChainMonitor::new(ledger, cli.governance_group.clone(), handler)
        .start()
        .await
        .context("subscribing to governance logs")?;
    info!(group = %cli.governance_group, operator = %operator.public_key_hex(), "monitor running");

    if let Some(dir) = &cli.output_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            Some(retrieved) = documents.recv() => {
                let Some(dir) = &cli.output_dir else { continue };
                let path = dir.join(format!("{}.bin", retrieved.escrow_id));
                match tokio::fs::write(&path, &retrieved.document).await {
                    Ok(()) => info!(escrow_id = %retrieved.escrow_id, path = %path.display(), "document written"),
                    Err(e) => error!(escrow_id = %retrieved.escrow_id, error = %e, "writing document failed"),
                }
            }
        }
    }

    monitor.shutdown().await;
    Ok(())
}
