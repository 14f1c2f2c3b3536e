use std::sync::Arc;

use crate::config::KeyHolderSettings;
use crate::crypto::shamir;
use crate::crypto::signing::Identity;
use crate::error::EscrowError;
use crate::keyholder::{KeyHolder, KeyHolderService};
use crate::ledger::memory::MemoryLedger;
use crate::types::{EpochId, EscrowId, Secret};
use crate::vault::{FileShareStore, MemoryShareStore, ShareRecords, ShareStore};

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("holder-1.json");
    let ledger = Arc::new(MemoryLedger::new());
    let identity = Arc::new(Identity::generate());

    let shares = shamir::split(&Secret::generate(), 3, 2).unwrap();
    let doc = EscrowId::document("tx1").unwrap();
    let epoch = EscrowId::epoch(EpochId::new(2025, 1).unwrap());

    {
        let holder = KeyHolderService::open(
            KeyHolderSettings::new("holder-1"),
            identity.clone(),
            ledger.clone(),
            Arc::new(FileShareStore::new(&path)),
        )
        .await
        .unwrap();
        holder.store_share(&doc, &shares[0]).await.unwrap();
        holder.store_share(&epoch, &shares[1]).await.unwrap();
    }

    let reopened = KeyHolderService::open(
        KeyHolderSettings::new("holder-1"),
        identity,
        ledger,
        Arc::new(FileShareStore::new(&path)),
    )
    .await
    .unwrap();
    assert_eq!(reopened.share_count().await, 2);
    assert!(reopened.contains(&doc).await);
    assert!(reopened.contains(&epoch).await);

    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["documents"]["tx1"], shares[0].to_hex());
    assert_eq!(raw["epochs"]["2025-01"], shares[1].to_hex());
    assert!(!dir.path().join("holder-1.json.tmp").exists());
}

#[tokio::test]
async fn test_missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileShareStore::new(dir.path().join("nothing-here.json"));
    assert_eq!(store.load().await.unwrap(), ShareRecords::default());
}

#[tokio::test]
async fn test_corrupt_file_is_a_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, b"{not json").unwrap();
    let err = FileShareStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err, EscrowError::Persistence(_)));
}

#[tokio::test]
async fn test_failed_persist_leaves_state_unchanged() {
    let store = Arc::new(MemoryShareStore::new());
    let holder = KeyHolderService::open(
        KeyHolderSettings::new("holder-x"),
        Arc::new(Identity::generate()),
        Arc::new(MemoryLedger::new()),
        store.clone(),
    )
    .await
    .unwrap();

    let shares = shamir::split(&Secret::generate(), 2, 2).unwrap();
    let first = EscrowId::document("doc-a").unwrap();
    holder.store_share(&first, &shares[0]).await.unwrap();

    store.set_failing(true);
    let second = EscrowId::document("doc-b").unwrap();
    let err = holder.store_share(&second, &shares[1]).await.unwrap_err();
    assert!(matches!(err, EscrowError::Persistence(_)));
    assert!(!holder.contains(&second).await);
    assert_eq!(holder.share_count().await, 1);

    // the stored copy is untouched too
    let persisted = store.load().await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert!(persisted.contains(&first));
}

#[tokio::test]
async fn test_store_is_an_idempotent_upsert() {
    let holder = KeyHolderService::open(
        KeyHolderSettings::new("holder-y"),
        Arc::new(Identity::generate()),
        Arc::new(MemoryLedger::new()),
        Arc::new(MemoryShareStore::new()),
    )
    .await
    .unwrap();

    let id = EscrowId::document("doc-a").unwrap();
    let first = shamir::split(&Secret::generate(), 2, 2).unwrap();
    let second = shamir::split(&Secret::generate(), 2, 2).unwrap();
    holder.store_share(&id, &first[0]).await.unwrap();
    holder.store_share(&id, &first[0]).await.unwrap();
    holder.store_share(&id, &second[0]).await.unwrap();
    assert_eq!(holder.share_count().await, 1);
}

#[test]
fn test_prune_epochs_oldest_first() {
    let mut records = ShareRecords::default();
    let share = &shamir::split(&Secret::generate(), 2, 2).unwrap()[0];
    for month in [5, 1, 3, 2, 4] {
        records.insert(&EscrowId::epoch(EpochId::new(2025, month).unwrap()), share);
    }
    records.insert(&EscrowId::document("doc").unwrap(), share);

    let removed = records.prune_epochs(3);
    assert_eq!(
        removed,
        vec![EpochId::new(2025, 1).unwrap(), EpochId::new(2025, 2).unwrap()]
    );
    assert_eq!(records.epoch_ids().len(), 3);
    assert_eq!(records.documents.len(), 1, "documents are never pruned");
}

#[tokio::test]
async fn test_concurrent_stores_all_reach_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("holder-1.json");
    let ledger = Arc::new(MemoryLedger::new());
    let identity = Arc::new(Identity::generate());

    let holder = KeyHolderService::open(
        KeyHolderSettings::new("holder-1"),
        identity.clone(),
        ledger.clone(),
        Arc::new(FileShareStore::new(&path)),
    )
    .await
    .unwrap();

    let share = shamir::split(&Secret::generate(), 3, 2).unwrap().remove(0);
    let ids: Vec<EscrowId> = (0..50).map(|i| EscrowId::document(format!("doc{i}")).unwrap()).collect();
    let results = futures::future::join_all(ids.iter().map(|id| holder.store_share(id, &share))).await;
    assert!(results.iter().all(Result::is_ok));
    drop(holder);

    let reopened = KeyHolderService::open(
        KeyHolderSettings::new("holder-1"),
        identity,
        ledger,
        Arc::new(FileShareStore::new(&path)),
    )
    .await
    .unwrap();
    assert_eq!(reopened.share_count().await, 50);
    for id in &ids {
        assert!(reopened.contains(id).await, "{id} missing after reopen");
    }
}
