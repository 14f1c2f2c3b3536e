use std::sync::Arc;

use crate::crypto::signing::Identity;
use crate::error::EscrowError;
use crate::governance::{
    self, GOVERNANCE_PROGRAM, GovernanceGroup, Instruction, Operator, ProposalAccount, ProposalStatus,
};
use crate::ledger::memory::MemoryLedger;
use crate::tests::{GROUP, set_proposal};
use crate::types::{EscrowId, ProposalRef};

#[test]
fn test_memo_parsing() {
    let id = EscrowId::document("Ab3_x-9").unwrap();
    let memo = governance::creation_memo(&id);
    assert_eq!(memo, "Requesting access to document: Ab3_x-9");
    assert_eq!(governance::parse_creation_memo(&memo), Some(id.clone()));

    // wrapped by the ledger's memo logger
    let wrapped = format!("Program log: Memo (len 38): \"{memo}\"");
    assert_eq!(governance::parse_creation_memo(&wrapped), Some(id));

    assert_eq!(governance::parse_creation_memo("Requesting access to document: "), None);
    assert_eq!(governance::parse_creation_memo("unrelated memo"), None);
}

#[test]
fn test_transaction_index_and_create_detection() {
    let logs: Vec<String> = vec![
        "Program invoke [1]".into(),
        "Program log: Instruction: ProposalCreate".into(),
        "Program log: transaction_index: 42".into(),
    ];
    assert!(governance::is_proposal_create(&logs));
    assert_eq!(governance::parse_transaction_index(&logs), Some(42));

    let other: Vec<String> = vec!["Program log: Instruction: ProposalApprove".into()];
    assert!(!governance::is_proposal_create(&other));
    assert_eq!(governance::parse_transaction_index(&other), None);
}

#[test]
fn test_proposal_address_is_deterministic() {
    let a = governance::proposal_address(GROUP, 1);
    assert_eq!(a, governance::proposal_address(GROUP, 1));
    assert_ne!(a, governance::proposal_address(GROUP, 2));
    assert_ne!(a, governance::proposal_address("another-group", 1));
    assert_eq!(a, ProposalRef::new(GROUP, 1).proposal_address());
}

#[test]
fn test_status_terminality_and_parsing() {
    for status in [ProposalStatus::Executed, ProposalStatus::Rejected, ProposalStatus::Cancelled] {
        assert!(status.is_terminal());
    }
    for status in [ProposalStatus::Draft, ProposalStatus::Active, ProposalStatus::Approved, ProposalStatus::Executing] {
        assert!(!status.is_terminal());
    }
    assert_eq!("Executed".parse::<ProposalStatus>().unwrap(), ProposalStatus::Executed);
    assert!("done".parse::<ProposalStatus>().is_err());
}

#[tokio::test]
async fn test_authorize_checks_group_and_status() {
    let ledger = MemoryLedger::new();
    let member = Identity::generate();
    ledger.put_account(GROUP, GovernanceGroup::new(&[member.public_key()], 1).encode().unwrap());

    let proposal = ProposalRef::new(GROUP, 3);
    set_proposal(&ledger, &proposal, ProposalStatus::Executed);
    governance::authorize(&ledger, &proposal, &member.public_key()).await.unwrap();

    // an account stored at the address but describing another proposal
    let foreign = ProposalAccount::new(&ProposalRef::new("elsewhere", 3), ProposalStatus::Executed);
    ledger.put_account(&proposal.proposal_address(), foreign.encode().unwrap());
    assert!(matches!(
        governance::authorize(&ledger, &proposal, &member.public_key()).await,
        Err(EscrowError::Forbidden(_))
    ));

    ledger.put_account(&proposal.proposal_address(), b"garbage".to_vec());
    assert!(matches!(
        governance::authorize(&ledger, &proposal, &member.public_key()).await,
        Err(EscrowError::Ledger(_))
    ));
}

#[tokio::test]
async fn test_operator_submits_signed_votes() {
    let ledger = Arc::new(MemoryLedger::new());
    let operator = Operator::new(Arc::new(Identity::generate()), ledger.clone());
    let proposal = ProposalRef::new(GROUP, 8);

    operator.approve(&proposal).await.unwrap();
    operator.execute(&proposal).await.unwrap();
    operator.reject(&proposal).await.unwrap();

    let submitted = ledger.instructions();
    assert_eq!(submitted.len(), 3);
    for instruction in &submitted {
        assert_eq!(instruction.program, GOVERNANCE_PROGRAM);
        instruction.verify().unwrap();
        assert_eq!(instruction.signer, operator.identity().public_key().as_bytes().to_vec());
    }
    assert_eq!(
        Instruction::decode(&submitted[1].data).unwrap(),
        Instruction::ProposalExecute {
            governance_group: GROUP.into(),
            transaction_index: 8,
        }
    );
}
