//! Per-client session registry.
//!
//! A session id maps to one cached [`Authenticator`] only while it holds
//! state that cannot be rebuilt from storage: digits typed so far, an error
//! flag, or a pending submission.  The `authenticated` marker itself lives
//! in `session_kv` and survives restarts, so authenticated and untouched
//! sessions are served by a transient authenticator and never cached.
//!
//! The cache is bounded by [`MAX_CACHED_SESSIONS`].  When it is full an
//! idle entry is evicted; if every entry has a submission in flight the
//! request fails with [`TrackerError::SessionCapacity`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use loan_protocol::{Authenticator, PinVerifier, SessionStart, SessionStore};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db::SqliteSessionStore;
use crate::errors::{Result, TrackerError};

const MAX_SESSION_ID_LEN: usize = 128;
pub const MAX_CACHED_SESSIONS: usize = 1024;

pub struct SessionRegistry {
    pool: SqlitePool,
    verifier: Arc<dyn PinVerifier>,
    capacity: usize,
    sessions: Mutex<HashMap<String, Arc<Authenticator>>>,
}

impl SessionRegistry {
    pub fn new(pool: SqlitePool, verifier: Arc<dyn PinVerifier>) -> Self {
        Self::with_capacity(pool, verifier, MAX_CACHED_SESSIONS)
    }

    pub fn with_capacity(
        pool: SqlitePool,
        verifier: Arc<dyn PinVerifier>,
        capacity: usize,
    ) -> Self {
        Self {
            pool,
            verifier,
            capacity: capacity.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The cached authenticator for `session_id`, created and cached on
    /// first use.  Use this only for requests that change the challenge.
    pub fn authenticator(&self, session_id: &str) -> Result<Arc<Authenticator>> {
        validate_session_id(session_id)?;

        let mut sessions = self.sessions();
        if let Some(auth) = sessions.get(session_id) {
            return Ok(auth.clone());
        }
        if sessions.len() >= self.capacity {
            let idle = sessions
                .iter()
                .find(|(_, auth)| !auth.is_busy())
                .map(|(id, _)| id.clone());
            match idle {
                Some(id) => {
                    debug!("Evicting idle session {id}");
                    sessions.remove(&id);
                }
                None => {
                    warn!("Session cache full ({} in flight)", sessions.len());
                    return Err(TrackerError::SessionCapacity);
                }
            }
        }

        debug!("New session {session_id}");
        let auth = Arc::new(self.build(session_id));
        sessions.insert(session_id.to_string(), auth.clone());
        Ok(auth)
    }

    /// The cached authenticator for `session_id` if there is one, otherwise
    /// a transient one that is not cached.
    pub fn lookup(&self, session_id: &str) -> Result<Arc<Authenticator>> {
        validate_session_id(session_id)?;
        let cached = self.sessions().get(session_id).cloned();
        Ok(cached.unwrap_or_else(|| Arc::new(self.build(session_id))))
    }

    /// Drop the cached entry for `session_id` once it holds nothing the
    /// session store cannot restore.
    pub fn release(&self, session_id: &str, auth: &Arc<Authenticator>) {
        let snap = auth.snapshot();
        let restorable =
            snap.authenticated || (snap.digits_entered == 0 && snap.error.is_none());
        if snap.busy || !restorable {
            return;
        }
        let mut sessions = self.sessions();
        if sessions
            .get(session_id)
            .is_some_and(|cached| Arc::ptr_eq(cached, auth))
        {
            sessions.remove(session_id);
        }
    }

    /// Fails with [`TrackerError::Unauthorized`] unless the session holds
    /// the authenticated marker.  Never adds to the cache.
    pub async fn require_authenticated(&self, session_id: &str) -> Result<()> {
        let auth = self.lookup(session_id)?;
        match auth.begin_session().await? {
            SessionStart::Resumed => Ok(()),
            SessionStart::ChallengePresented => Err(TrackerError::Unauthorized),
        }
    }

    #[cfg(test)]
    pub fn cached(&self) -> usize {
        self.sessions().len()
    }

    fn build(&self, session_id: &str) -> Authenticator {
        let store: Arc<dyn SessionStore> =
            Arc::new(SqliteSessionStore::new(self.pool.clone(), session_id));
        Authenticator::new(self.verifier.clone(), store)
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<Authenticator>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TrackerError::InvalidSession)
    }
}
