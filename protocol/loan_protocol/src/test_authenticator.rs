use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::authenticator::{
    Authenticator, ChallengeError, EntryOutcome, MemorySessionStore, PinVerifier, SessionStart,
    SessionStore, Verdict,
};
use crate::{AuthError, VerifyError};

const SECRET: &str = "654321";

/// Compares against a fixed secret and records every code it sees.
#[derive(Default)]
struct FixedVerifier {
    seen: Mutex<Vec<String>>,
    fail_transport: bool,
}

#[async_trait]
impl PinVerifier for FixedVerifier {
    async fn verify(&self, code: &str) -> Result<bool, VerifyError> {
        self.seen.lock().unwrap().push(code.to_string());
        if self.fail_transport {
            return Err(VerifyError("connection refused".to_string()));
        }
        Ok(code == SECRET)
    }
}

/// Blocks inside `verify` until released, so a submission can be held in flight.
#[derive(Default)]
struct GatedVerifier {
    calls: AtomicUsize,
    started: Notify,
    release: Notify,
}

#[async_trait]
impl PinVerifier for GatedVerifier {
    async fn verify(&self, code: &str) -> Result<bool, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(code == SECRET)
    }
}

struct BrokenSessionStore;

#[async_trait]
impl SessionStore for BrokenSessionStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, AuthError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), AuthError> {
        Err(AuthError::Session("disk full".to_string()))
    }
}

fn setup() -> (Authenticator, Arc<FixedVerifier>, Arc<MemorySessionStore>) {
    let verifier = Arc::new(FixedVerifier::default());
    let session = Arc::new(MemorySessionStore::new());
    let auth = Authenticator::new(verifier.clone(), session.clone());
    (auth, verifier, session)
}

#[tokio::test]
async fn test_fresh_session_presents_challenge() {
    let (auth, verifier, _) = setup();
    assert_eq!(
        auth.begin_session().await.unwrap(),
        SessionStart::ChallengePresented
    );
    assert!(!auth.is_authenticated());
    assert!(verifier.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_pin_then_right_pin() {
    let (auth, _, session) = setup();
    auth.begin_session().await.unwrap();

    let outcome = auth.enter("000000").await.unwrap();
    assert_eq!(
        outcome,
        EntryOutcome::Submitted {
            verdict: Verdict::WrongPin
        }
    );
    let snap = auth.snapshot();
    assert_eq!(snap.digits_entered, 0);
    assert_eq!(snap.error, Some(ChallengeError::WrongPin));
    assert!(!snap.authenticated);
    assert_eq!(session.get("authenticated").await.unwrap(), None);

    let outcome = auth.enter("654321").await.unwrap();
    assert_eq!(
        outcome,
        EntryOutcome::Submitted {
            verdict: Verdict::Accepted
        }
    );
    assert!(auth.is_authenticated());
    assert_eq!(auth.snapshot().error, None);
    assert_eq!(
        session.get("authenticated").await.unwrap().as_deref(),
        Some("true")
    );
}

#[tokio::test]
async fn test_marker_resumes_session_without_round_trip() {
    let (first, _, session) = setup();
    assert_eq!(first.submit(SECRET).await.unwrap(), Verdict::Accepted);

    let verifier = Arc::new(FixedVerifier::default());
    let second = Authenticator::new(verifier.clone(), session.clone());
    assert_eq!(second.begin_session().await.unwrap(), SessionStart::Resumed);
    assert!(second.is_authenticated());
    assert!(verifier.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_input_is_normalized_and_auto_submitted() {
    let (auth, verifier, _) = setup();

    assert_eq!(
        auth.enter("65a").await.unwrap(),
        EntryOutcome::Incomplete { digits: 2 }
    );
    assert!(verifier.seen.lock().unwrap().is_empty());

    auth.enter("12a3456789").await.unwrap();
    assert_eq!(*verifier.seen.lock().unwrap(), vec!["123456".to_string()]);
}

#[tokio::test]
async fn test_keypad_submits_on_sixth_digit() {
    let (auth, verifier, _) = setup();
    for d in "65432".chars() {
        assert!(matches!(
            auth.press_digit(d).await.unwrap(),
            EntryOutcome::Incomplete { .. }
        ));
    }
    assert_eq!(
        auth.delete_last(),
        EntryOutcome::Incomplete { digits: 4 }
    );
    auth.press_digit('3').await.unwrap();
    let outcome = auth.press_digit('1').await.unwrap();
    assert_eq!(
        outcome,
        EntryOutcome::Submitted {
            verdict: Verdict::WrongPin
        }
    );
    assert_eq!(*verifier.seen.lock().unwrap(), vec!["654331".to_string()]);
}

#[tokio::test]
async fn test_typing_clears_error_flag() {
    let (auth, _, _) = setup();
    auth.enter("111111").await.unwrap();
    assert_eq!(auth.snapshot().error, Some(ChallengeError::WrongPin));
    auth.press_digit('6').await.unwrap();
    assert_eq!(auth.snapshot().error, None);
}

#[tokio::test]
async fn test_transport_failure_is_distinct_from_wrong_pin() {
    let verifier = Arc::new(FixedVerifier {
        fail_transport: true,
        ..Default::default()
    });
    let auth = Authenticator::new(verifier, Arc::new(MemorySessionStore::new()));

    assert_eq!(auth.submit(SECRET).await.unwrap(), Verdict::Unavailable);
    let snap = auth.snapshot();
    assert_eq!(snap.error, Some(ChallengeError::Unavailable));
    assert!(!snap.authenticated);
    assert!(!snap.busy);
}

#[tokio::test]
async fn test_second_submission_is_not_dispatched_while_pending() {
    let verifier = Arc::new(GatedVerifier::default());
    let auth = Arc::new(Authenticator::new(
        verifier.clone(),
        Arc::new(MemorySessionStore::new()),
    ));

    let pending = {
        let auth = auth.clone();
        tokio::spawn(async move { auth.submit(SECRET).await })
    };
    verifier.started.notified().await;

    assert!(auth.is_busy());
    assert_eq!(
        auth.submit(SECRET).await,
        Err(AuthError::SubmissionInFlight)
    );
    assert_eq!(auth.enter("123456").await.unwrap(), EntryOutcome::Busy);
    assert_eq!(auth.delete_last(), EntryOutcome::Busy);
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);

    verifier.release.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), Verdict::Accepted);
    assert!(!auth.is_busy());
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropped_submission_frees_the_slot() {
    let verifier = Arc::new(GatedVerifier::default());
    let auth = Arc::new(Authenticator::new(
        verifier.clone(),
        Arc::new(MemorySessionStore::new()),
    ));

    let pending = {
        let auth = auth.clone();
        tokio::spawn(async move { auth.submit(SECRET).await })
    };
    verifier.started.notified().await;
    pending.abort();
    let _ = pending.await;

    assert!(!auth.is_busy());
    let retry = {
        let auth = auth.clone();
        tokio::spawn(async move { auth.submit(SECRET).await })
    };
    verifier.started.notified().await;
    verifier.release.notify_one();
    assert_eq!(retry.await.unwrap().unwrap(), Verdict::Accepted);
}

#[tokio::test]
async fn test_submit_after_authentication_skips_round_trip() {
    let (auth, verifier, _) = setup();
    auth.submit(SECRET).await.unwrap();
    assert_eq!(auth.submit("000000").await.unwrap(), Verdict::Accepted);
    assert_eq!(verifier.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_marker_write_failure_is_reported() {
    let auth = Authenticator::new(
        Arc::new(FixedVerifier::default()),
        Arc::new(BrokenSessionStore),
    );
    assert!(matches!(
        auth.submit(SECRET).await,
        Err(AuthError::Session(_))
    ));
    assert!(!auth.is_authenticated());
    assert!(!auth.is_busy());
}

#[tokio::test]
async fn test_short_code_never_reaches_verifier() {
    let (auth, verifier, _) = setup();

    assert_eq!(
        auth.submit("12").await,
        Err(AuthError::MalformedCode {
            expected: 6,
            found: 2
        })
    );
    assert_eq!(
        auth.submit("12a-34").await,
        Err(AuthError::MalformedCode {
            expected: 6,
            found: 4
        })
    );
    assert!(matches!(
        auth.submit("").await,
        Err(AuthError::MalformedCode { found: 0, .. })
    ));

    assert!(verifier.seen.lock().unwrap().is_empty());
    let snap = auth.snapshot();
    assert!(!snap.busy);
    assert_eq!(snap.error, None);
}

#[tokio::test]
async fn test_rejected_edit_leaves_candidate_untouched() {
    let verifier = Arc::new(GatedVerifier::default());
    let auth = Arc::new(Authenticator::new(
        verifier.clone(),
        Arc::new(MemorySessionStore::new()),
    ));
    for d in "65432".chars() {
        auth.press_digit(d).await.unwrap();
    }

    let pending = {
        let auth = auth.clone();
        tokio::spawn(async move { auth.submit(SECRET).await })
    };
    verifier.started.notified().await;

    assert_eq!(auth.press_digit('1').await.unwrap(), EntryOutcome::Busy);
    assert_eq!(auth.snapshot().digits_entered, 5);
    assert_eq!(auth.enter("999999").await.unwrap(), EntryOutcome::Busy);
    assert_eq!(auth.enter("9").await.unwrap(), EntryOutcome::Busy);
    assert_eq!(auth.delete_last(), EntryOutcome::Busy);
    assert_eq!(auth.snapshot().digits_entered, 5);
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);

    verifier.release.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), Verdict::Accepted);
    assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
}
