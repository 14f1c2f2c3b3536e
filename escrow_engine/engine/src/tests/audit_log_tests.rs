use crate::audit::{AuditEventType, AuditRecord, AuditTracker};

#[test]
fn test_audit_log_adds_and_retrieves() {
    let tracker = AuditTracker::new(10);

    tracker.log(AuditRecord::new(AuditEventType::ShareStored, "tx1", "share stored"));

    let recent = tracker.recent(1);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].escrow_id, "tx1");
    assert_eq!(recent[0].message, "share stored");
    assert_eq!(recent[0].event_type_label(), "STORE");
    assert!(chrono::DateTime::parse_from_rfc3339(&recent[0].timestamp).is_ok());
}

#[test]
fn test_audit_log_eviction() {
    let tracker = AuditTracker::new(3);

    for i in 0..5 {
        tracker.log(
            AuditRecord::new(AuditEventType::ShareReleased, format!("doc_{i}"), "released")
                .with_requester(format!("requester_{i}")),
        );
    }

    let recent = tracker.recent(5);
    assert_eq!(recent.len(), 3); // oldest two evicted
    assert_eq!(recent[0].escrow_id, "doc_4");
    assert_eq!(recent[2].escrow_id, "doc_2");
    assert_eq!(recent[2].requester.as_deref(), Some("requester_2"));
}

#[test]
fn test_audit_log_thread_safety() {
    let tracker = AuditTracker::new(100);

    std::thread::scope(|scope| {
        for i in 0..10 {
            let tracker = &tracker;
            scope.spawn(move || {
                tracker.log(AuditRecord::new(AuditEventType::AccessDenied, format!("thread_{i}"), "denied"));
            });
        }
    });

    assert_eq!(tracker.recent(10).len(), 10);
    assert_eq!(tracker.len(), 10);
}
