//! Operator command line for the escrow engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use escrow_engine::crypto::seal;
use escrow_engine::crypto::signing::{Identity, parse_public_key_hex};
use escrow_engine::governance::{self, GovernanceGroup, Operator, ProposalAccount, ProposalStatus};
use escrow_engine::ledger::Ledger;
use escrow_engine::rotation::EpochRotation;
use escrow_engine::{EscrowId, ProposalRef};
use escrow_server::client::{ClientConfig, GatewayClient, RemoteLedger};
use escrow_server::config::{CallArgs, EpochHolderSetArgs, LedgerArgs, LogArgs};
use tracing::info;

#[derive(Parser)]
#[command(name = "escrow", version, about = "Escrow engine CLI")]
struct Cli {
    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Which proposal an access relies on.
#[derive(Args, Clone)]
struct ProposalArgs {
    /// Governance group address
    #[arg(long, env = "GOVERNANCE_GROUP")]
    group: String,

    /// Proposal transaction index within the group
    #[arg(long)]
    index: u64,
}

impl ProposalArgs {
    fn proposal(&self) -> ProposalRef {
        ProposalRef::new(self.group.clone(), self.index)
    }
}

#[derive(Args, Clone)]
struct GatewayArgs {
    #[arg(long, env = "GATEWAY_URL", default_value = "http://127.0.0.1:50060")]
    gateway_url: String,
}

impl GatewayArgs {
    fn connect(&self) -> anyhow::Result<GatewayClient> {
        Ok(GatewayClient::new(&ClientConfig::new(self.gateway_url.clone()))?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 keypair file
    Keygen {
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Sign an escrow id, proving control of a keypair
    Sign {
        #[arg(short, long, env = "KEYPAIR_PATH")]
        keypair: PathBuf,

        #[arg(short, long)]
        escrow_id: String,
    },

    /// Encrypt and escrow a document through the gateway
    Store {
        #[command(flatten)]
        gateway: GatewayArgs,

        #[arg(short, long)]
        file: PathBuf,
    },

    /// Retrieve a document through the gateway's operator identity
    Retrieve {
        #[command(flatten)]
        gateway: GatewayArgs,

        #[command(flatten)]
        proposal: ProposalArgs,

        #[arg(short, long)]
        escrow_id: String,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Retrieve a document sealed to your own key and open it locally
    RetrieveSealed {
        #[command(flatten)]
        gateway: GatewayArgs,

        #[command(flatten)]
        proposal: ProposalArgs,

        #[arg(short, long, env = "KEYPAIR_PATH")]
        keypair: PathBuf,

        #[arg(short, long)]
        escrow_id: String,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Mint and escrow this month's rotation secret
    RotateEpoch {
        #[command(flatten)]
        holders: EpochHolderSetArgs,

        #[command(flatten)]
        call: CallArgs,
    },

    /// Vote to approve an access proposal
    Approve(VoteArgs),

    /// Execute an approved access proposal
    Execute(VoteArgs),

    /// Vote to reject an access proposal
    Reject(VoteArgs),

    /// Development ledger fixtures
    #[command(subcommand)]
    Dev(DevCommands),
}

#[derive(Args)]
struct VoteArgs {
    #[command(flatten)]
    proposal: ProposalArgs,

    #[arg(short, long, env = "KEYPAIR_PATH")]
    keypair: PathBuf,

    #[command(flatten)]
    ledger: LedgerArgs,
}

#[derive(Subcommand)]
enum DevCommands {
    /// Write a governance group account
    CreateGroup {
        #[arg(long, env = "GOVERNANCE_GROUP")]
        group: String,

        /// Hex Ed25519 public keys of the members
        #[arg(long, value_delimiter = ',', required = true)]
        members: Vec<String>,

        /// Approvals required by the group
        #[arg(long, default_value_t = 1)]
        threshold: u16,

        #[command(flatten)]
        ledger: LedgerArgs,
    },

    /// Open an access proposal for an escrowed document
    CreateProposal {
        #[arg(long, env = "GOVERNANCE_GROUP")]
        group: String,

        #[arg(short, long)]
        escrow_id: String,

        #[command(flatten)]
        ledger: LedgerArgs,
    },

    /// Force a proposal's status
    SetStatus {
        #[command(flatten)]
        proposal: ProposalArgs,

        /// draft | active | approved | rejected | executing | executed | cancelled
        #[arg(long)]
        status: ProposalStatus,

        #[command(flatten)]
        ledger: LedgerArgs,
    },
}

fn load_identity(path: &Path) -> anyhow::Result<Arc<Identity>> {
    let identity = Identity::load(path).with_context(|| format!("loading keypair {}", path.display()))?;
    Ok(Arc::new(identity))
}

async fn write_output(out: Option<PathBuf>, data: &[u8]) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            tokio::fs::write(&path, data)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {} bytes to {}", data.len(), path.display());
        }
        None => println!("{}", String::from_utf8_lossy(data)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = cli.log.init("cli");

    match cli.command {
        Commands::Keygen { out } => {
            if out.exists() {
                bail!("{} already exists", out.display());
            }
            let identity = Identity::generate();
            identity.save(&out)?;
            println!("public key: {}", identity.public_key_hex());
        }

        Commands::Sign { keypair, escrow_id } => {
            let identity = load_identity(&keypair)?;
            let escrow_id: EscrowId = escrow_id.parse()?;
            println!("public key: {}", identity.public_key_hex());
            println!("signature:  {}", hex::encode(identity.sign_escrow_id(&escrow_id)));
        }

        Commands::Store { gateway, file } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let receipt = gateway.connect()?.store(data).await?;
            println!("escrow id: {}", receipt.escrow_id);
            println!("shares stored: {} (failed: {})", receipt.stored, receipt.failed);
        }

        Commands::Retrieve {
            gateway,
            proposal,
            escrow_id,
            out,
        } => {
            let escrow_id = EscrowId::document(escrow_id)?;
            let document = gateway.connect()?.retrieve(&escrow_id, &proposal.proposal()).await?;
            write_output(out, &document).await?;
        }

        Commands::RetrieveSealed {
            gateway,
            proposal,
            keypair,
            escrow_id,
            out,
        } => {
            let identity = load_identity(&keypair)?;
            let escrow_id = EscrowId::document(escrow_id)?;
            let sealed = gateway
                .connect()?
                .retrieve_sealed(&escrow_id, &proposal.proposal(), &identity.public_key())
                .await?;
            let document = seal::open(&sealed, &identity.public_key(), identity.signing_key())?;
            write_output(out, &document).await?;
        }

        Commands::RotateEpoch { holders, call } => {
            let orchestrator = Arc::new(holders.orchestrator(&call)?);
            let outcome = EpochRotation::new(orchestrator).rotate().await?;
            println!("epoch {} escrowed with {} key-holders", outcome.epoch, outcome.report.stored_count());
            for failure in &outcome.report.failed {
                println!("  {} failed: {}", failure.holder, failure.error);
            }
        }

        Commands::Approve(vote) => {
            let signature = operator(&vote)?.approve(&vote.proposal.proposal()).await?;
            println!("approved: {signature}");
        }

        Commands::Execute(vote) => {
            let signature = operator(&vote)?.execute(&vote.proposal.proposal()).await?;
            println!("executed: {signature}");
        }

        Commands::Reject(vote) => {
            let signature = operator(&vote)?.reject(&vote.proposal.proposal()).await?;
            println!("rejected: {signature}");
        }

        Commands::Dev(command) => run_dev(command).await?,
    }

    Ok(())
}

fn operator(vote: &VoteArgs) -> anyhow::Result<Operator> {
    let identity = load_identity(&vote.keypair)?;
    let ledger = Arc::new(vote.ledger.connect()?);
    Ok(Operator::new(identity, ledger))
}

async fn run_dev(command: DevCommands) -> anyhow::Result<()> {
    match command {
        DevCommands::CreateGroup {
            group,
            members,
            threshold,
            ledger,
        } => {
            let members = members
                .iter()
                .map(|m| parse_public_key_hex(m.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            let account = GovernanceGroup::new(&members, threshold);
            ledger.connect()?.put_account(&group, account.encode()?).await?;
            println!("group {group}: {} members, threshold {threshold}", members.len());
        }

        DevCommands::CreateProposal {
            group,
            escrow_id,
            ledger,
        } => {
            let escrow_id = EscrowId::document(escrow_id)?;
            let ledger = ledger.connect()?;
            let proposal = next_proposal(&ledger, &group).await?;

            let account = ProposalAccount::new(&proposal, ProposalStatus::Active);
            ledger.put_account(&proposal.proposal_address(), account.encode()?).await?;
            let event = ledger
                .append_log(
                    &group,
                    vec![
                        governance::PROPOSAL_CREATE_LOG.to_string(),
                        format!("Program log: transaction_index {}", proposal.transaction_index),
                    ],
                    Some(governance::creation_memo(&escrow_id)),
                    false,
                )
                .await?;
            info!(%escrow_id, sequence = event.sequence, "access proposal created");
            println!("proposal {} for {escrow_id}", proposal.transaction_index);
        }

        DevCommands::SetStatus {
            proposal,
            status,
            ledger,
        } => {
            let proposal = proposal.proposal();
            let account = ProposalAccount::new(&proposal, status);
            ledger
                .connect()?
                .put_account(&proposal.proposal_address(), account.encode()?)
                .await?;
            println!("proposal {} is now {status}", proposal.transaction_index);
        }
    }
    Ok(())
}

/// Bump the group's transaction counter and return the new proposal.
async fn next_proposal(ledger: &RemoteLedger, group: &str) -> anyhow::Result<ProposalRef> {
    let Some(data) = ledger.read_account_state(group).await? else {
        bail!("governance group {group} does not exist, run `escrow dev create-group` first");
    };
    let mut account = GovernanceGroup::decode(&data)?;
    account.transaction_index += 1;
    ledger.put_account(group, account.encode()?).await?;
    Ok(ProposalRef::new(group, account.transaction_index))
}
