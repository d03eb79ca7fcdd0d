//! # PIN Authenticator
//!
//! Gates a client session behind a six-digit PIN.
//!
//! ```text
//! Unauthenticated ──(verdict true)──► Authenticated   (terminal)
//!        ▲    │
//!        └────┘ (wrong PIN / verification unavailable: candidate cleared, error set)
//! ```
//!
//! ## Collaborators
//!
//! * [`PinVerifier`]: the verification round-trip.  Wrong PIN is `Ok(false)`;
//!   a transport failure is `Err(VerifyError)` and is reported separately as
//!   [`Verdict::Unavailable`].
//! * [`SessionStore`]: a key/value store scoped to one client session.  The
//!   `"authenticated"` marker written there lets [`Authenticator::begin_session`]
//!   skip the challenge for the rest of the session.
//!
//! ## In-flight slot
//!
//! Each authenticator owns exactly one submission slot.  A submission that
//! finds the slot taken fails with [`AuthError::SubmissionInFlight`] and is
//! never dispatched.  The slot is freed when the pending submission resolves,
//! whichever way it resolves, or when its future is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{AuthError, VerifyError};
use crate::pin::{self, PinEntry, PIN_LENGTH};

const AUTH_MARKER_KEY: &str = "authenticated";
const AUTH_MARKER_VALUE: &str = "true";

/// Verification round-trip for a complete candidate.
#[async_trait]
pub trait PinVerifier: Send + Sync {
    async fn verify(&self, code: &str) -> Result<bool, VerifyError>;
}

/// Key/value storage scoped to a single client session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
}

/// In-memory [`SessionStore`], lost when dropped.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStart {
    /// The session marker was already present; no challenge needed.
    Resumed,
    ChallengePresented,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    WrongPin,
    /// The verifier could not be reached; the PIN was not judged.
    Unavailable,
}

/// Error indicator shown on a re-armed challenge.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeError {
    WrongPin,
    Unavailable,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// Candidate updated; not enough digits to submit yet.
    Incomplete { digits: usize },
    /// A submission is pending; the input was ignored.
    Busy,
    /// The candidate reached six digits and was submitted.
    Submitted { verdict: Verdict },
}

/// Point-in-time view of the challenge for rendering.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSnapshot {
    pub authenticated: bool,
    pub digits_entered: usize,
    pub error: Option<ChallengeError>,
    pub busy: bool,
}

#[derive(Debug, Default)]
struct Challenge {
    entry: PinEntry,
    error: Option<ChallengeError>,
    authenticated: bool,
}

/// Releases the in-flight slot on drop.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Authenticator {
    verifier: Arc<dyn PinVerifier>,
    session: Arc<dyn SessionStore>,
    in_flight: AtomicBool,
    challenge: Mutex<Challenge>,
}

impl Authenticator {
    pub fn new(verifier: Arc<dyn PinVerifier>, session: Arc<dyn SessionStore>) -> Self {
        Self {
            verifier,
            session,
            in_flight: AtomicBool::new(false),
            challenge: Mutex::new(Challenge::default()),
        }
    }

    /// Resume an already-authenticated session, or present the challenge.
    pub async fn begin_session(&self) -> Result<SessionStart, AuthError> {
        if self.is_authenticated() {
            return Ok(SessionStart::Resumed);
        }

        let marker = self.session.get(AUTH_MARKER_KEY).await?;
        if marker.as_deref() == Some(AUTH_MARKER_VALUE) {
            self.challenge().authenticated = true;
            debug!("Session marker found, skipping PIN challenge");
            return Ok(SessionStart::Resumed);
        }
        Ok(SessionStart::ChallengePresented)
    }

    /// Submit a code for verification.
    ///
    /// The code is normalized first.  A normalized code that is not exactly
    /// [`PIN_LENGTH`] digits fails with [`AuthError::MalformedCode`] and never
    /// reaches the verifier.  Fails fast with [`AuthError::SubmissionInFlight`]
    /// if another submission is pending.
    pub async fn submit(&self, code: &str) -> Result<Verdict, AuthError> {
        if self.is_authenticated() {
            return Ok(Verdict::Accepted);
        }
        let code = pin::normalize(code);
        if code.len() != PIN_LENGTH {
            return Err(AuthError::MalformedCode {
                expected: PIN_LENGTH,
                found: code.len(),
            });
        }
        let _slot = self.claim_slot().ok_or(AuthError::SubmissionInFlight)?;
        self.dispatch(&code).await
    }

    /// Replace the candidate with free text; auto-submits at six digits.
    pub async fn enter(&self, raw: &str) -> Result<EntryOutcome, AuthError> {
        self.edit(|entry| entry.replace(raw)).await
    }

    /// Append one keypad digit; auto-submits at six digits.
    pub async fn press_digit(&self, digit: char) -> Result<EntryOutcome, AuthError> {
        self.edit(|entry| {
            entry.push_digit(digit);
        })
        .await
    }

    /// Remove the last keypad digit.  Ignored while a submission is pending.
    pub fn delete_last(&self) -> EntryOutcome {
        let mut challenge = self.challenge();
        if self.is_busy() {
            return EntryOutcome::Busy;
        }
        challenge.error = None;
        challenge.entry.delete_last();
        EntryOutcome::Incomplete {
            digits: challenge.entry.len(),
        }
    }

    pub fn snapshot(&self) -> ChallengeSnapshot {
        let challenge = self.challenge();
        ChallengeSnapshot {
            authenticated: challenge.authenticated,
            digits_entered: challenge.entry.len(),
            error: challenge.error,
            busy: self.is_busy(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.challenge().authenticated
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Apply `change` to a copy of the candidate and commit it only if it
    /// stays incomplete or the slot is claimed for it.  The busy check, the
    /// claim and the commit share one lock, so a rejected edit leaves the
    /// candidate untouched.
    async fn edit(&self, change: impl FnOnce(&mut PinEntry)) -> Result<EntryOutcome, AuthError> {
        let (_slot, code) = {
            let mut challenge = self.challenge();
            if challenge.authenticated {
                return Ok(EntryOutcome::Submitted {
                    verdict: Verdict::Accepted,
                });
            }
            if self.is_busy() {
                return Ok(EntryOutcome::Busy);
            }

            let mut candidate = challenge.entry.clone();
            change(&mut candidate);
            if !candidate.is_complete() {
                challenge.error = None;
                challenge.entry = candidate;
                return Ok(EntryOutcome::Incomplete {
                    digits: challenge.entry.len(),
                });
            }

            let Some(slot) = self.claim_slot() else {
                return Ok(EntryOutcome::Busy);
            };
            let code = candidate.as_str().to_string();
            challenge.error = None;
            challenge.entry = candidate;
            (slot, code)
        };

        let verdict = self.dispatch(&code).await?;
        Ok(EntryOutcome::Submitted { verdict })
    }

    /// Run one verification round-trip.  Caller must hold the slot.
    async fn dispatch(&self, code: &str) -> Result<Verdict, AuthError> {
        self.challenge().error = None;

        match self.verifier.verify(code).await {
            Ok(true) => {
                if let Err(e) = self.session.set(AUTH_MARKER_KEY, AUTH_MARKER_VALUE).await {
                    warn!("Could not persist session marker: {e}");
                    self.rearm(None);
                    return Err(e);
                }
                let mut challenge = self.challenge();
                challenge.authenticated = true;
                challenge.entry.clear();
                info!("PIN accepted, session authenticated");
                Ok(Verdict::Accepted)
            }
            Ok(false) => {
                debug!("PIN rejected");
                self.rearm(Some(ChallengeError::WrongPin));
                Ok(Verdict::WrongPin)
            }
            Err(e) => {
                warn!("{e}");
                self.rearm(Some(ChallengeError::Unavailable));
                Ok(Verdict::Unavailable)
            }
        }
    }

    fn rearm(&self, error: Option<ChallengeError>) {
        let mut challenge = self.challenge();
        challenge.entry.clear();
        challenge.error = error;
    }

    fn claim_slot(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    fn challenge(&self) -> MutexGuard<'_, Challenge> {
        self.challenge.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
