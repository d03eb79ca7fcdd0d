//! # Types
//!
//! Shared data structures used across the protocol modules.
//!
//! ## Paid state
//!
//! An [`Installment`] carries `paid` and `paid_at` together: `paid_at` is
//! present exactly when `paid` is true.  Use [`Installment::mark`] rather
//! than flipping the flag by hand.
//!
//! ## Derived status
//!
//! [`InstallmentStatus`] is never stored.  It is computed against a calendar
//! day supplied by the caller so the result is deterministic in tests:
//!
//! ```text
//! paid                 ──► Paid
//! unpaid, due < today  ──► Overdue
//! unpaid, otherwise    ──► Pending
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One scheduled repayment unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    /// Opaque identifier, stable for the record's lifetime.
    pub id: String,
    /// Position in the schedule, `1..=N`.  Assigned at provisioning time.
    pub sequence_number: u32,
    pub due_date: NaiveDate,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Installment {
    pub fn new(id: impl Into<String>, sequence_number: u32, due_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            sequence_number,
            due_date,
            paid: false,
            paid_at: None,
        }
    }

    pub fn status(&self, today: NaiveDate) -> InstallmentStatus {
        if self.paid {
            InstallmentStatus::Paid
        } else if self.due_date < today {
            InstallmentStatus::Overdue
        } else {
            InstallmentStatus::Pending
        }
    }

    /// Set the paid flag, stamping or clearing `paid_at` to match.
    pub fn mark(&mut self, paid: bool, now: DateTime<Utc>) {
        self.paid = paid;
        self.paid_at = paid.then_some(now);
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Paid,
    Pending,
    Overdue,
}

/// Why the sequencer refused a transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The target is not part of the snapshot.
    UnknownInstallment,
    /// The installment already has the requested paid value.
    NoOp,
    /// Paying would skip an unpaid earlier installment, or unpaying would
    /// leave a later installment paid.
    OutOfOrder,
}

/// Outcome of [`evaluate_transition`](crate::sequencer::evaluate_transition).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Rejected { reason: RejectReason },
    Accepted { final_payoff: bool },
}

/// Feedback variant chosen after a successful *pay* transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Celebration {
    /// A regular installment was paid.
    Payment,
    /// The final installment was paid; the loan is settled.
    Complete,
}

impl Celebration {
    /// Pick the celebration for an accepted transition to `new_paid`.
    /// Unpaying and rejected transitions never celebrate.
    pub fn for_decision(decision: Decision, new_paid: bool) -> Option<Self> {
        match decision {
            Decision::Accepted { final_payoff: true } if new_paid => Some(Celebration::Complete),
            Decision::Accepted { .. } if new_paid => Some(Celebration::Payment),
            _ => None,
        }
    }
}

/// An installment together with the legality flags derived from its snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentView {
    #[serde(flatten)]
    pub installment: Installment,
    pub status: InstallmentStatus,
    pub can_pay: bool,
    pub can_unpay: bool,
    pub is_last: bool,
}
