#![allow(dead_code)]

use crate::sequencer;
use crate::types::Installment;

/// Paid installments always form a prefix of the schedule.
pub fn assert_paid_prefix(installments: &[Installment]) {
    let first_unpaid = installments
        .iter()
        .position(|i| !i.paid)
        .unwrap_or(installments.len());
    assert!(
        installments[first_unpaid..].iter().all(|i| !i.paid),
        "paid installment found after unpaid position {first_unpaid}"
    );
}

/// `paid_at` is present exactly when `paid` is set.
pub fn assert_paid_at_consistent(installments: &[Installment]) {
    for i in installments {
        assert_eq!(
            i.paid,
            i.paid_at.is_some(),
            "installment {} has paid={} but paid_at={:?}",
            i.id,
            i.paid,
            i.paid_at
        );
    }
}

/// Sequence numbers run 1..=N.
pub fn assert_contiguous(installments: &[Installment]) {
    assert!(
        sequencer::validate_sequence(installments).is_ok(),
        "sequence numbers are not contiguous from 1"
    );
}

/// At most one installment is payable and at most one is unpayable.
pub fn assert_single_move_each_way(installments: &[Installment]) {
    let payable = (0..installments.len())
        .filter(|&i| sequencer::can_pay(installments, i))
        .count();
    let unpayable = (0..installments.len())
        .filter(|&i| sequencer::can_unpay(installments, i))
        .count();
    assert!(payable <= 1, "{payable} installments payable at once");
    assert!(unpayable <= 1, "{unpayable} installments unpayable at once");
}

pub fn assert_all(installments: &[Installment]) {
    assert_paid_prefix(installments);
    assert_paid_at_consistent(installments);
    assert_contiguous(installments);
    assert_single_move_each_way(installments);
}
