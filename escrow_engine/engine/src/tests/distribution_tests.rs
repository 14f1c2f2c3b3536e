use std::sync::Arc;
use std::time::Duration;

use crate::distribution::{CallPolicy, DistributionOrchestrator, RetryPolicy};
use crate::error::EscrowError;
use crate::governance::ProposalStatus;
use crate::keyholder::KeyHolder;
use crate::tests::{Cluster, FlakyHolder, GROUP, StalledHolder, fast_policy};
use crate::types::{AccessProof, EscrowId, ProposalRef, Secret};

fn proof(cluster: &Cluster) -> AccessProof {
    let proposal = ProposalRef::new(GROUP, 1);
    cluster.set_proposal(&proposal, ProposalStatus::Executed);
    AccessProof::new(cluster.member.clone(), proposal)
}

#[tokio::test]
async fn test_distribute_and_reconstruct_all_up() {
    let cluster = Cluster::new(4).await;
    let orchestrator = cluster.orchestrator(cluster.dyn_holders(), 3);
    let id = EscrowId::document("doc-1").unwrap();
    let secret = Secret::generate();

    let report = orchestrator.distribute(&id, &secret).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.stored_count(), 4);
    for holder in &cluster.holders {
        assert!(holder.contains(&id).await);
    }

    let recovered = orchestrator.reconstruct(&id, &proof(&cluster)).await.unwrap();
    assert_eq!(recovered, secret);
}

#[tokio::test]
async fn test_degraded_distribution_is_reported() {
    let cluster = Cluster::new(4).await;
    let orchestrator = cluster.orchestrator(cluster.with_offline(&[3]), 3);
    let id = EscrowId::document("doc-2").unwrap();

    let report = orchestrator.distribute(&id, &Secret::generate()).await.unwrap();
    assert!(report.is_degraded());
    assert_eq!(report.stored_count(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].holder, "holder-4");
    assert!(matches!(report.failed[0].error, EscrowError::Unavailable(_)));
}

#[tokio::test]
async fn test_sub_threshold_distribution_fails_after_all_calls() {
    let cluster = Cluster::new(4).await;
    let orchestrator = cluster.orchestrator(cluster.with_offline(&[2, 3]), 3);
    let id = EscrowId::document("doc-3").unwrap();

    let err = orchestrator.distribute(&id, &Secret::generate()).await.unwrap_err();
    assert_eq!(
        err,
        EscrowError::DistributionFailed {
            escrow_id: "doc-3".into(),
            stored: 2,
            required: 3,
        }
    );
    // the reachable holders were still called
    assert!(cluster.holders[0].contains(&id).await);
    assert!(cluster.holders[1].contains(&id).await);
}

#[tokio::test]
async fn test_reconstruct_tolerates_n_minus_t_down() {
    let cluster = Cluster::new(5).await;
    let id = EscrowId::document("doc-4").unwrap();
    let secret = Secret::generate();
    cluster
        .orchestrator(cluster.dyn_holders(), 3)
        .distribute(&id, &secret)
        .await
        .unwrap();

    let degraded = cluster.orchestrator(cluster.with_offline(&[0, 4]), 3);
    assert_eq!(degraded.reconstruct(&id, &proof(&cluster)).await.unwrap(), secret);

    let broken = cluster.orchestrator(cluster.with_offline(&[0, 1, 4]), 3);
    assert_eq!(
        broken.reconstruct(&id, &proof(&cluster)).await.unwrap_err(),
        EscrowError::InsufficientShares { have: 2, need: 3 }
    );
}

#[tokio::test]
async fn test_reconstruct_unknown_id_is_not_found() {
    let cluster = Cluster::new(3).await;
    let orchestrator = cluster.orchestrator(cluster.dyn_holders(), 2);
    let id = EscrowId::document("never-stored").unwrap();
    assert!(matches!(
        orchestrator.reconstruct(&id, &proof(&cluster)).await,
        Err(EscrowError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_reconstruct_without_governance_fails() {
    let cluster = Cluster::new(3).await;
    let orchestrator = cluster.orchestrator(cluster.dyn_holders(), 2);
    let id = EscrowId::document("doc-5").unwrap();
    orchestrator.distribute(&id, &Secret::generate()).await.unwrap();

    let pending = ProposalRef::new(GROUP, 2);
    cluster.set_proposal(&pending, ProposalStatus::Active);
    let proof = AccessProof::new(cluster.member.clone(), pending);
    assert_eq!(
        orchestrator.reconstruct(&id, &proof).await.unwrap_err(),
        EscrowError::InsufficientShares { have: 0, need: 2 }
    );
}

#[tokio::test]
async fn test_unavailable_is_retried() {
    let cluster = Cluster::new(2).await;
    let flaky = FlakyHolder::new(cluster.holders[0].clone(), 1, EscrowError::Unavailable("blip".into()));
    let holders: Vec<Arc<dyn KeyHolder>> = vec![flaky.clone() as Arc<dyn KeyHolder>, cluster.holders[1].clone()];
    let orchestrator = cluster.orchestrator(holders, 2);

    let id = EscrowId::document("doc-6").unwrap();
    let report = orchestrator.distribute(&id, &Secret::generate()).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(flaky.calls(), 2);
}

#[tokio::test]
async fn test_forbidden_is_not_retried() {
    let cluster = Cluster::new(3).await;
    let flaky = FlakyHolder::new(cluster.holders[0].clone(), 1, EscrowError::Forbidden("no".into()));
    let holders: Vec<Arc<dyn KeyHolder>> = vec![flaky.clone() as Arc<dyn KeyHolder>, cluster.holders[1].clone(), cluster.holders[2].clone()];
    let orchestrator = cluster.orchestrator(holders, 2);

    let id = EscrowId::document("doc-7").unwrap();
    let report = orchestrator.distribute(&id, &Secret::generate()).await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(flaky.calls(), 1);
}

#[tokio::test]
async fn test_stalled_holder_times_out() {
    let cluster = Cluster::new(2).await;
    let holders: Vec<Arc<dyn KeyHolder>> = vec![
        cluster.holders[0].clone() as Arc<dyn KeyHolder>,
        cluster.holders[1].clone(),
        Arc::new(StalledHolder),
    ];
    let policy = CallPolicy {
        timeout: Duration::from_millis(50),
        retry: RetryPolicy::none(),
    };
    let orchestrator = DistributionOrchestrator::new(holders, 2, policy).unwrap();

    let id = EscrowId::document("doc-8").unwrap();
    let report = orchestrator.distribute(&id, &Secret::generate()).await.unwrap();
    assert_eq!(report.failed[0].holder, "stalled");
    assert!(matches!(report.failed[0].error, EscrowError::Unavailable(_)));
}

#[test]
fn test_backoff_grows_and_caps() {
    let policy = RetryPolicy {
        max_attempts: 5,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(350),
        multiplier: 2.0,
    };
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
    assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(350));
}

#[tokio::test]
async fn test_orchestrator_rejects_bad_threshold() {
    let cluster = Cluster::new(3).await;
    assert!(DistributionOrchestrator::new(cluster.dyn_holders(), 1, fast_policy()).is_err());
    assert!(DistributionOrchestrator::new(cluster.dyn_holders(), 4, fast_policy()).is_err());
}
