//! # Loan Protocol
//!
//! Decision logic for a fixed ten-installment personal loan between two
//! people, plus the PIN challenge that gates access to it.
//!
//! | Concern        | Module              | Entry point(s)                                   |
//! |----------------|---------------------|--------------------------------------------------|
//! | Data model     | [`types`]           | [`Installment`], [`Decision`], [`Celebration`]   |
//! | Ordering rules | [`sequencer`]       | `can_pay`, `can_unpay`, `evaluate_transition`    |
//! | Persistence    | [`store`]           | [`InstallmentStore`], [`toggle_installment`]     |
//! | Loan totals    | [`summary`]         | [`LoanSummary::compute`]                         |
//! | PIN input      | [`pin`]             | [`pin::normalize`], [`PinEntry`]                 |
//! | Session gate   | [`authenticator`]   | [`Authenticator::begin_session`], `submit`       |
//!
//! ## Architecture
//!
//! The sequencer is a pure function of the snapshot it is handed: it never
//! mutates records and performs no I/O.  Everything that talks to the outside
//! world (the installment table, the PIN verification round-trip, the
//! per-session marker) sits behind a trait so the backend can plug in SQLite
//! and HTTP while tests use the in-memory collaborators shipped here.

pub mod authenticator;
pub mod errors;
pub mod pin;
pub mod sequencer;
pub mod store;
pub mod summary;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_authenticator;
#[cfg(test)]
mod test_store;

pub use authenticator::{
    Authenticator, ChallengeError, ChallengeSnapshot, EntryOutcome, MemorySessionStore,
    PinVerifier, SessionStart, SessionStore, Verdict,
};
pub use errors::{AuthError, LoanError, Result, VerifyError};
pub use pin::{PinEntry, PIN_LENGTH};
pub use store::{toggle_installment, InstallmentStore, MemoryInstallmentStore, ToggleOutcome};
pub use summary::{LoanSummary, LoanTerms};
pub use types::{
    Celebration, Decision, Installment, InstallmentStatus, InstallmentView, RejectReason,
};
