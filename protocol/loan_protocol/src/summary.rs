//! Loan totals and repayment progress.

use serde::{Deserialize, Serialize};

use crate::types::Installment;

/// Fixed terms of the loan, in integer cents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal_cents: i64,
    pub interest_cents: i64,
    pub installment_count: u32,
}

impl Default for LoanTerms {
    fn default() -> Self {
        Self {
            principal_cents: 500_000,
            interest_cents: 70_000,
            installment_count: 10,
        }
    }
}

impl LoanTerms {
    pub fn total_cents(&self) -> i64 {
        self.principal_cents + self.interest_cents
    }

    /// Amount of a single installment.  Zero when there are no installments.
    pub fn installment_cents(&self) -> i64 {
        if self.installment_count == 0 {
            return 0;
        }
        self.total_cents() / i64::from(self.installment_count)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoanSummary {
    pub principal_cents: i64,
    pub interest_cents: i64,
    pub total_cents: i64,
    pub installment_cents: i64,
    pub paid_count: usize,
    pub total_count: usize,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    /// Share of installments paid, `0.0..=100.0`.
    pub progress_percent: f64,
}

impl LoanSummary {
    pub fn compute(terms: &LoanTerms, installments: &[Installment]) -> Self {
        let paid_count = installments.iter().filter(|i| i.paid).count();
        let total_count = installments.len();
        let installment_cents = terms.installment_cents();

        let progress_percent = if total_count == 0 {
            0.0
        } else {
            paid_count as f64 * 100.0 / total_count as f64
        };

        Self {
            principal_cents: terms.principal_cents,
            interest_cents: terms.interest_cents,
            total_cents: terms.total_cents(),
            installment_cents,
            paid_count,
            total_count,
            paid_cents: paid_count as i64 * installment_cents,
            remaining_cents: (total_count - paid_count) as i64 * installment_cents,
            progress_percent,
        }
    }
}
