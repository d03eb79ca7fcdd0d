//! # Payment Sequencer
//!
//! Pure decision logic over an ordered snapshot of installments.
//!
//! Installments are paid strictly in order and unpaid strictly in reverse
//! order, so at any time the paid installments form a prefix of the list.
//! Only two transitions are ever legal: paying the first unpaid installment
//! and unpaying the last paid one.
//!
//! Every function here takes the snapshot by reference, performs no I/O and
//! keeps no state between calls.  Positions are zero-based indices into the
//! snapshot; an out-of-range position is treated as "nothing to act on".

use chrono::NaiveDate;

use crate::errors::{LoanError, Result};
use crate::types::{Decision, Installment, InstallmentView, RejectReason};

/// Legal to pay `index` only if it is unpaid and every earlier installment is paid.
pub fn can_pay(installments: &[Installment], index: usize) -> bool {
    match installments.get(index) {
        Some(target) => !target.paid && installments[..index].iter().all(|i| i.paid),
        None => false,
    }
}

/// Legal to unpay `index` only if it is paid and every later installment is unpaid.
pub fn can_unpay(installments: &[Installment], index: usize) -> bool {
    match installments.get(index) {
        Some(target) => target.paid && installments[index + 1..].iter().all(|i| !i.paid),
        None => false,
    }
}

/// Decide whether setting `index` to `new_paid` is legal, and whether it
/// settles the loan.
pub fn evaluate_transition(installments: &[Installment], index: usize, new_paid: bool) -> Decision {
    let Some(target) = installments.get(index) else {
        return Decision::Rejected {
            reason: RejectReason::UnknownInstallment,
        };
    };

    if target.paid == new_paid {
        return Decision::Rejected {
            reason: RejectReason::NoOp,
        };
    }

    let legal = if new_paid {
        can_pay(installments, index)
    } else {
        can_unpay(installments, index)
    };
    if !legal {
        return Decision::Rejected {
            reason: RejectReason::OutOfOrder,
        };
    }

    // `can_pay` already guarantees every earlier installment is paid.
    Decision::Accepted {
        final_payoff: new_paid && index + 1 == installments.len(),
    }
}

/// Position of the installment with the given id.
pub fn position_of(installments: &[Installment], id: &str) -> Option<usize> {
    installments.iter().position(|i| i.id == id)
}

/// Check that sequence numbers run exactly `1..=N` in ascending order.
pub fn validate_sequence(installments: &[Installment]) -> Result<()> {
    for (position, installment) in installments.iter().enumerate() {
        let expected = position as u32 + 1;
        if installment.sequence_number != expected {
            return Err(LoanError::CorruptSequence {
                position,
                expected,
                found: installment.sequence_number,
            });
        }
    }
    Ok(())
}

/// Attach status and legality flags to every installment in one pass.
pub fn derive_views(installments: &[Installment], today: NaiveDate) -> Vec<InstallmentView> {
    let len = installments.len();

    // unpaid_after[i]: every installment after i is unpaid.
    let mut unpaid_after = vec![true; len];
    for i in (0..len.saturating_sub(1)).rev() {
        unpaid_after[i] = unpaid_after[i + 1] && !installments[i + 1].paid;
    }

    let mut paid_before = true;
    installments
        .iter()
        .enumerate()
        .map(|(i, installment)| {
            let view = InstallmentView {
                installment: installment.clone(),
                status: installment.status(today),
                can_pay: !installment.paid && paid_before,
                can_unpay: installment.paid && unpaid_after[i],
                is_last: i + 1 == len,
            };
            paid_before &= installment.paid;
            view
        })
        .collect()
}
