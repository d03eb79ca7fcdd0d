//! # Installment Store
//!
//! The durable side of the loan.  The store owns the records; the sequencer
//! only ever sees snapshots returned by [`InstallmentStore::list`].
//!
//! `set_paid` is a compare-and-swap on the paid flag: it applies only if the
//! stored flag differs from the requested one.  Paired with the sequencer's
//! no-op rejection this means a transition evaluated against a stale
//! snapshot fails with [`LoanError::StaleSnapshot`] instead of silently
//! re-applying.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{LoanError, Result};
use crate::sequencer;
use crate::types::{Celebration, Decision, Installment, RejectReason};

#[async_trait]
pub trait InstallmentStore: Send + Sync {
    /// All installments, ascending by sequence number.
    async fn list(&self) -> Result<Vec<Installment>>;

    /// Set the paid flag of one installment, stamping `paid_at` when paying
    /// and clearing it when unpaying.
    async fn set_paid(&self, id: &str, paid: bool) -> Result<()>;
}

/// Result of [`toggle_installment`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// The sequencer refused the transition; nothing was written.
    Rejected { reason: RejectReason },
    Applied {
        id: String,
        paid: bool,
        final_payoff: bool,
        celebration: Option<Celebration>,
    },
}

/// Read the current snapshot, check the transition, and persist it.
pub async fn toggle_installment(
    store: &dyn InstallmentStore,
    id: &str,
    paid: bool,
) -> Result<ToggleOutcome> {
    let snapshot = store.list().await?;
    sequencer::validate_sequence(&snapshot)?;

    let decision = match sequencer::position_of(&snapshot, id) {
        Some(index) => sequencer::evaluate_transition(&snapshot, index, paid),
        None => Decision::Rejected {
            reason: RejectReason::UnknownInstallment,
        },
    };

    let final_payoff = match decision {
        Decision::Rejected { reason } => {
            debug!("Transition of {id} to paid={paid} rejected: {reason:?}");
            return Ok(ToggleOutcome::Rejected { reason });
        }
        Decision::Accepted { final_payoff } => final_payoff,
    };

    store.set_paid(id, paid).await?;
    if final_payoff {
        info!("Installment {id} paid, loan settled");
    } else {
        info!("Installment {id} set to paid={paid}");
    }

    Ok(ToggleOutcome::Applied {
        id: id.to_string(),
        paid,
        final_payoff,
        celebration: Celebration::for_decision(decision, paid),
    })
}

/// In-memory [`InstallmentStore`].
#[derive(Debug, Default)]
pub struct MemoryInstallmentStore {
    installments: Mutex<Vec<Installment>>,
}

impl MemoryInstallmentStore {
    pub fn new(mut installments: Vec<Installment>) -> Self {
        installments.sort_by_key(|i| i.sequence_number);
        Self {
            installments: Mutex::new(installments),
        }
    }
}

#[async_trait]
impl InstallmentStore for MemoryInstallmentStore {
    async fn list(&self) -> Result<Vec<Installment>> {
        let installments = self
            .installments
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(installments.clone())
    }

    async fn set_paid(&self, id: &str, paid: bool) -> Result<()> {
        let mut installments = self
            .installments
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let installment = installments
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| LoanError::UnknownInstallment(id.to_string()))?;
        if installment.paid == paid {
            return Err(LoanError::StaleSnapshot(id.to_string()));
        }
        installment.mark(paid, Utc::now());
        Ok(())
    }
}
