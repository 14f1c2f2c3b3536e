use crate::audit::AuditEventType;
use crate::crypto::seal;
use crate::crypto::shamir::{self, Share};
use crate::error::EscrowError;
use crate::governance::ProposalStatus;
use crate::keyholder::KeyHolder;
use crate::tests::{Cluster, GROUP};
use crate::types::{EscrowId, ProposalRef, Secret};

async fn cluster_with_share() -> (Cluster, EscrowId, Share, ProposalRef) {
    let cluster = Cluster::new(1).await;
    let id = EscrowId::document("tx1").unwrap();
    let share = shamir::split(&Secret::generate(), 3, 2).unwrap().remove(0);
    cluster.holders[0].store_share(&id, &share).await.unwrap();
    let proposal = ProposalRef::new(GROUP, 7);
    (cluster, id, share, proposal)
}

#[tokio::test]
async fn test_executed_member_request_gets_sealed_share() {
    let (cluster, id, share, proposal) = cluster_with_share().await;
    cluster.set_proposal(&proposal, ProposalStatus::Executed);

    let request = cluster.member.access_request(&id, proposal);
    let sealed = cluster.holders[0].get_share(&request).await.unwrap();

    let opened = seal::open(&sealed, &cluster.member.public_key(), cluster.member.signing_key()).unwrap();
    assert_eq!(Share::from_bytes(&opened).unwrap(), share);

    let audit = cluster.holders[0].audit().recent(1);
    assert_eq!(audit[0].event_type, AuditEventType::ShareReleased);
    assert_eq!(audit[0].requester.as_deref(), Some(cluster.member.public_key_hex().as_str()));
}

#[tokio::test]
async fn test_tampered_signature_is_unauthorized() {
    let (cluster, id, _, proposal) = cluster_with_share().await;
    cluster.set_proposal(&proposal, ProposalStatus::Executed);

    let mut request = cluster.member.access_request(&id, proposal);
    request.signature[5] ^= 0xff;
    let err = cluster.holders[0].get_share(&request).await.unwrap_err();
    assert!(matches!(err, EscrowError::Unauthorized(_)));

    // a signature for another escrow id is just as bad
    let other = EscrowId::document("tx2").unwrap();
    let mut request = cluster.member.access_request(&id, ProposalRef::new(GROUP, 7));
    request.signature = cluster.member.sign_escrow_id(&other);
    assert!(matches!(
        cluster.holders[0].get_share(&request).await,
        Err(EscrowError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_missing_fields_are_validation_errors() {
    let (cluster, id, _, proposal) = cluster_with_share().await;
    let mut request = cluster.member.access_request(&id, proposal);
    request.requester_public_key.clear();
    assert!(matches!(
        cluster.holders[0].get_share(&request).await,
        Err(EscrowError::Validation(_))
    ));
}

#[tokio::test]
async fn test_unexecuted_proposal_is_forbidden() {
    let (cluster, id, _, proposal) = cluster_with_share().await;
    for status in [ProposalStatus::Active, ProposalStatus::Approved, ProposalStatus::Rejected] {
        cluster.set_proposal(&proposal, status);
        let request = cluster.member.access_request(&id, proposal.clone());
        let err = cluster.holders[0].get_share(&request).await.unwrap_err();
        assert!(matches!(err, EscrowError::Forbidden(_)), "{status}");
    }

    // no proposal account at all
    let request = cluster.member.access_request(&id, ProposalRef::new(GROUP, 99));
    assert!(matches!(
        cluster.holders[0].get_share(&request).await,
        Err(EscrowError::Forbidden(_))
    ));

    let denied = cluster.holders[0].audit().recent(1);
    assert_eq!(denied[0].event_type, AuditEventType::AccessDenied);
}

#[tokio::test]
async fn test_non_member_is_forbidden() {
    let (cluster, id, _, proposal) = cluster_with_share().await;
    cluster.set_proposal(&proposal, ProposalStatus::Executed);

    let request = cluster.outsider.access_request(&id, proposal);
    let err = cluster.holders[0].get_share(&request).await.unwrap_err();
    assert!(matches!(err, EscrowError::Forbidden(_)));
}

#[tokio::test]
async fn test_unknown_escrow_id_is_not_found() {
    let (cluster, _, _, proposal) = cluster_with_share().await;
    cluster.set_proposal(&proposal, ProposalStatus::Executed);

    let unknown = EscrowId::document("never-stored").unwrap();
    let request = cluster.member.access_request(&unknown, proposal);
    assert!(matches!(
        cluster.holders[0].get_share(&request).await,
        Err(EscrowError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_ledger_outage_is_a_ledger_error() {
    let (cluster, id, _, proposal) = cluster_with_share().await;
    cluster.set_proposal(&proposal, ProposalStatus::Executed);
    cluster.ledger.set_available(false);

    let request = cluster.member.access_request(&id, proposal);
    assert!(matches!(
        cluster.holders[0].get_share(&request).await,
        Err(EscrowError::Ledger(_))
    ));
    assert_eq!(cluster.holders[0].audit().recent(1)[0].event_type, AuditEventType::Error);
}

#[tokio::test]
async fn test_authorization_is_never_cached() {
    let (cluster, id, _, proposal) = cluster_with_share().await;
    cluster.set_proposal(&proposal, ProposalStatus::Executed);
    let request = cluster.member.access_request(&id, proposal.clone());
    assert!(cluster.holders[0].get_share(&request).await.is_ok());

    cluster.set_proposal(&proposal, ProposalStatus::Cancelled);
    assert!(matches!(
        cluster.holders[0].get_share(&request).await,
        Err(EscrowError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_sealed_store_only_opens_for_its_holder() {
    let cluster = Cluster::new(2).await;
    let id = EscrowId::document("tx1").unwrap();
    let share = shamir::split(&Secret::generate(), 2, 2).unwrap().remove(0);

    let sealed = seal::seal(&share.to_bytes(), &cluster.holders[0].public_key()).unwrap();
    cluster.holders[0].store_sealed_share(&id, &sealed).await.unwrap();
    assert!(cluster.holders[0].contains(&id).await);

    let err = cluster.holders[1].store_sealed_share(&id, &sealed).await.unwrap_err();
    assert!(matches!(err, EscrowError::Validation(_)));
    assert!(!cluster.holders[1].contains(&id).await);
}
