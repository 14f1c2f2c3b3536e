//! Key-holder server: custodies one share per escrow id and releases it
//! only to signed, governance-approved requests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use escrow_engine::config::{DEFAULT_AUDIT_CAPACITY, DEFAULT_RETENTION_MONTHS, KeyHolderSettings};
use escrow_engine::crypto::signing::Identity;
use escrow_engine::keyholder::KeyHolderService;
use escrow_engine::vault::FileShareStore;
use escrow_server::config::{LedgerArgs, LogArgs};
use escrow_server::proto::key_holder_server::KeyHolderServer;
use escrow_server::service::KeyHolderEndpoint;
use tonic::transport::Server;
use tracing::info;

#[derive(Parser)]
#[command(name = "escrow-keyholder", version, about = "Escrow key-holder server")]
struct Cli {
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:50061")]
    listen: SocketAddr,

    /// Name used in logs and audit records
    #[arg(long, env = "HOLDER_LABEL", default_value = "keyholder")]
    label: String,

    /// Ed25519 keypair file, created on first start
    #[arg(long, env = "KEYPAIR_PATH", default_value = "keyholder-keypair.json")]
    keypair: PathBuf,

    /// Share record file
    #[arg(long, env = "SHARE_STORE_PATH", default_value = "keyholder-shares.json")]
    store: PathBuf,

    /// Epoch shares older than this many months are pruned
    #[arg(long, env = "KEY_RETENTION_MONTHS", default_value_t = DEFAULT_RETENTION_MONTHS)]
    retention_months: usize,

    #[arg(long, env = "AUDIT_CAPACITY", default_value_t = DEFAULT_AUDIT_CAPACITY)]
    audit_capacity: usize,

    #[command(flatten)]
    ledger: LedgerArgs,

    #[command(flatten)]
    log: LogArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = cli.log.init("keyholder");

    let identity = Arc::new(
        Identity::load_or_create(&cli.keypair)
            .with_context(|| format!("loading keypair {}", cli.keypair.display()))?,
    );
    let ledger = Arc::new(cli.ledger.connect()?);
    let store = Arc::new(FileShareStore::new(cli.store.clone()));

    let settings = KeyHolderSettings {
        label: cli.label.clone(),
        retention_months: cli.retention_months,
        audit_capacity: cli.audit_capacity,
    };
    let holder = KeyHolderService::open(settings, identity.clone(), ledger, store)
        .await
        .context("opening share store")?;

    info!(
        addr = %cli.listen,
        label = %cli.label,
        public_key = %identity.public_key_hex(),
        "key-holder listening"
    );

    Server::builder()
        .add_service(KeyHolderServer::new(KeyHolderEndpoint::new(Arc::new(holder))))
        .serve_with_shutdown(cli.listen, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    Ok(())
}
