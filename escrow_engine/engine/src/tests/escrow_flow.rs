use crate::crypto::{seal, signing::Identity};
use crate::error::EscrowError;
use crate::gateway::{APP_NAME, StorageGateway};
use crate::governance::ProposalStatus;
use crate::ledger::Ledger;
use crate::ledger::memory::MemoryLedger;
use crate::tests::{Cluster, GROUP};
use crate::types::{AccessProof, EpochId, EscrowId, ProposalRef};

const HELLO: &[u8] = br#"{"msg":"hello"}"#;

#[tokio::test]
async fn test_full_store_and_retrieve_flow() {
    let cluster = Cluster::with_ledger(4, MemoryLedger::with_sequential_ids()).await;
    let gateway = StorageGateway::new(cluster.ledger.clone(), cluster.orchestrator(cluster.dyn_holders(), 3));

    // Step 1: store
    let receipt = gateway.store(HELLO).await.unwrap();
    assert_eq!(receipt.escrow_id, EscrowId::document("tx1").unwrap());
    assert!(receipt.report.is_complete());
    let tags = cluster.ledger.blob_tags("tx1").unwrap();
    assert!(tags.iter().any(|t| t.name == "App-Name" && t.value == APP_NAME));

    // Step 2: governance approves the request
    let proposal = ProposalRef::new(GROUP, 1);
    cluster.set_proposal(&proposal, ProposalStatus::Executed);
    let proof = AccessProof::new(cluster.member.clone(), proposal);

    // Step 3: all holders up
    assert_eq!(gateway.retrieve(&receipt.escrow_id, &proof).await.unwrap(), HELLO);

    // Step 4: holder #4 down
    let degraded = StorageGateway::new(cluster.ledger.clone(), cluster.orchestrator(cluster.with_offline(&[3]), 3));
    assert_eq!(degraded.retrieve(&receipt.escrow_id, &proof).await.unwrap(), HELLO);

    // Step 5: holders #3 and #4 down
    let broken = StorageGateway::new(cluster.ledger.clone(), cluster.orchestrator(cluster.with_offline(&[2, 3]), 3));
    assert_eq!(
        broken.retrieve(&receipt.escrow_id, &proof).await.unwrap_err(),
        EscrowError::InsufficientShares { have: 2, need: 3 }
    );
}

#[tokio::test]
async fn test_ciphertext_on_ledger_is_not_plaintext() {
    let cluster = Cluster::with_ledger(3, MemoryLedger::with_sequential_ids()).await;
    let gateway = StorageGateway::new(cluster.ledger.clone(), cluster.orchestrator(cluster.dyn_holders(), 2));
    gateway.store(HELLO).await.unwrap();

    let blob = cluster.ledger.fetch_blob("tx1").await.unwrap().unwrap();
    assert_ne!(blob, HELLO);
    assert!(!blob.windows(5).any(|w| w == b"hello"));
}

#[tokio::test]
async fn test_ledger_failure_aborts_before_distribution() {
    let cluster = Cluster::new(3).await;
    let gateway = StorageGateway::new(cluster.ledger.clone(), cluster.orchestrator(cluster.dyn_holders(), 2));
    cluster.ledger.set_available(false);

    assert!(matches!(gateway.store(HELLO).await, Err(EscrowError::Ledger(_))));
    for holder in &cluster.holders {
        assert_eq!(holder.share_count().await, 0);
    }
}

#[tokio::test]
async fn test_store_with_too_few_holders_is_unrecoverable() {
    let cluster = Cluster::new(4).await;
    let gateway = StorageGateway::new(cluster.ledger.clone(), cluster.orchestrator(cluster.with_offline(&[0, 1]), 3));
    let err = gateway.store(HELLO).await.unwrap_err();
    assert!(matches!(err, EscrowError::DistributionFailed { stored: 2, required: 3, .. }));
    // the ciphertext is already on the ledger
    assert_eq!(cluster.ledger.blob_count(), 1);
}

#[tokio::test]
async fn test_retrieve_sealed_only_opens_for_requester() {
    let cluster = Cluster::new(3).await;
    let gateway = StorageGateway::new(cluster.ledger.clone(), cluster.orchestrator(cluster.dyn_holders(), 2));
    let receipt = gateway.store(HELLO).await.unwrap();

    let proposal = ProposalRef::new(GROUP, 3);
    cluster.set_proposal(&proposal, ProposalStatus::Executed);
    let proof = AccessProof::new(cluster.member.clone(), proposal);

    let requester = Identity::generate();
    let sealed = gateway
        .retrieve_sealed(&receipt.escrow_id, &proof, &requester.public_key())
        .await
        .unwrap();
    assert_eq!(seal::open(&sealed, &requester.public_key(), requester.signing_key()).unwrap(), HELLO);
    assert!(seal::open(&sealed, &cluster.member.public_key(), cluster.member.signing_key()).is_err());
}

#[tokio::test]
async fn test_retrieve_rejects_epoch_ids() {
    let cluster = Cluster::new(2).await;
    let gateway = StorageGateway::new(cluster.ledger.clone(), cluster.orchestrator(cluster.dyn_holders(), 2));
    let proof = AccessProof::new(cluster.member.clone(), ProposalRef::new(GROUP, 1));
    let epoch = EscrowId::epoch(EpochId::new(2025, 6).unwrap());
    assert!(matches!(gateway.retrieve(&epoch, &proof).await, Err(EscrowError::Validation(_))));
}
