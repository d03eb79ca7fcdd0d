use async_trait::async_trait;
use chrono::NaiveDate;

use crate::invariants;
use crate::store::{toggle_installment, InstallmentStore, MemoryInstallmentStore, ToggleOutcome};
use crate::{Celebration, Installment, LoanError, RejectReason, Result};

fn schedule() -> Vec<Installment> {
    (1..=10u32)
        .map(|n| {
            let due = NaiveDate::from_ymd_opt(2025, n, 5).unwrap();
            Installment::new(format!("inst-{n}"), n, due)
        })
        .collect()
}

struct OfflineStore;

#[async_trait]
impl InstallmentStore for OfflineStore {
    async fn list(&self) -> Result<Vec<Installment>> {
        Err(LoanError::StoreUnavailable("connection reset".to_string()))
    }

    async fn set_paid(&self, _id: &str, _paid: bool) -> Result<()> {
        Err(LoanError::StoreUnavailable("connection reset".to_string()))
    }
}

#[tokio::test]
async fn test_paying_in_order_celebrates_and_completes() {
    let store = MemoryInstallmentStore::new(schedule());

    for n in 1..=9 {
        let outcome = toggle_installment(&store, &format!("inst-{n}"), true)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ToggleOutcome::Applied {
                paid: true,
                final_payoff: false,
                celebration: Some(Celebration::Payment),
                ..
            }
        ));
        invariants::assert_all(&store.list().await.unwrap());
    }

    let outcome = toggle_installment(&store, "inst-10", true).await.unwrap();
    assert_eq!(
        outcome,
        ToggleOutcome::Applied {
            id: "inst-10".to_string(),
            paid: true,
            final_payoff: true,
            celebration: Some(Celebration::Complete),
        }
    );
    assert!(store.list().await.unwrap().iter().all(|i| i.paid));
}

#[tokio::test]
async fn test_out_of_order_toggle_writes_nothing() {
    let store = MemoryInstallmentStore::new(schedule());
    let before = store.list().await.unwrap();

    let outcome = toggle_installment(&store, "inst-3", true).await.unwrap();
    assert_eq!(
        outcome,
        ToggleOutcome::Rejected {
            reason: RejectReason::OutOfOrder
        }
    );
    assert_eq!(store.list().await.unwrap(), before);
}

#[tokio::test]
async fn test_unpay_clears_paid_at_and_never_celebrates() {
    let store = MemoryInstallmentStore::new(schedule());
    toggle_installment(&store, "inst-1", true).await.unwrap();
    assert!(store.list().await.unwrap()[0].paid_at.is_some());

    let outcome = toggle_installment(&store, "inst-1", false).await.unwrap();
    assert!(matches!(
        outcome,
        ToggleOutcome::Applied {
            paid: false,
            celebration: None,
            ..
        }
    ));
    let first = &store.list().await.unwrap()[0];
    assert!(!first.paid);
    assert!(first.paid_at.is_none());
}

#[tokio::test]
async fn test_unknown_id_is_rejected() {
    let store = MemoryInstallmentStore::new(schedule());
    let outcome = toggle_installment(&store, "nope", true).await.unwrap();
    assert_eq!(
        outcome,
        ToggleOutcome::Rejected {
            reason: RejectReason::UnknownInstallment
        }
    );
}

#[tokio::test]
async fn test_corrupt_sequence_is_refused() {
    let mut installments = schedule();
    installments.remove(4);
    let store = MemoryInstallmentStore::new(installments);
    assert!(matches!(
        toggle_installment(&store, "inst-1", true).await,
        Err(LoanError::CorruptSequence { position: 4, .. })
    ));
}

#[tokio::test]
async fn test_store_failure_propagates() {
    assert_eq!(
        toggle_installment(&OfflineStore, "inst-1", true).await,
        Err(LoanError::StoreUnavailable("connection reset".to_string()))
    );
}

#[tokio::test]
async fn test_set_paid_is_compare_and_swap() {
    let store = MemoryInstallmentStore::new(schedule());
    store.set_paid("inst-1", true).await.unwrap();
    assert_eq!(
        store.set_paid("inst-1", true).await,
        Err(LoanError::StaleSnapshot("inst-1".to_string()))
    );
    assert_eq!(
        store.set_paid("ghost", true).await,
        Err(LoanError::UnknownInstallment("ghost".to_string()))
    );
}
