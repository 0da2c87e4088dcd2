//! Pending zk-email sessions.
//!
//! A session is created on initiation and taken exactly once when the proof
//! is submitted. Taking is a single remove under the write lock, so two
//! concurrent verifications of one id cannot both succeed. A session whose
//! verification fails is put back so the user can retry.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, SystemTime},
};

use alpha_common::{email_commitment, CommonError, Salt, SaltPolicy};
use ethers::types::Address;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error(transparent)]
    Salt(#[from] CommonError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSession {
    pub id: Uuid,
    pub owner_address: Address,
    pub email: String,
    pub email_commitment: [u8; 32],
    pub salt: Salt,
    pub created_at: SystemTime,
}

/// What the caller gets back from [`SessionRegistry::initiate`].
#[derive(Clone, Debug)]
pub struct SessionTicket {
    pub session_id: Uuid,
    pub email_commitment: [u8; 32],
    pub salt: Salt,
}

/// Backing map for pending sessions.
pub trait SessionStore: Send + Sync {
    fn get(&self, id: &Uuid) -> Option<PendingSession>;

    fn put(&self, session: PendingSession);

    /// Returns whether an entry was removed.
    fn delete_if_present(&self, id: &Uuid) -> bool;

    /// Remove and return in one step.
    fn take(&self, id: &Uuid) -> Option<PendingSession>;
}

/// Process-local store. Entries are lost on restart.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    ttl: Option<Duration>,
    sessions: Arc<RwLock<HashMap<Uuid, PendingSession>>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().expect("sessions poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_live(&self, session: &PendingSession, now: SystemTime) -> bool {
        match self.ttl {
            Some(ttl) => match now.duration_since(session.created_at) {
                Ok(age) => age <= ttl,
                Err(_) => true,
            },
            None => true,
        }
    }

    fn purge_locked(&self, sessions: &mut HashMap<Uuid, PendingSession>) {
        if self.ttl.is_none() {
            return;
        }
        let now = SystemTime::now();
        let before = sessions.len();
        sessions.retain(|_, session| self.is_live(session, now));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!("Purged {} expired zk-email sessions", purged);
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &Uuid) -> Option<PendingSession> {
        let guard = self.sessions.read().expect("sessions poisoned");
        guard
            .get(id)
            .filter(|session| self.is_live(session, SystemTime::now()))
            .cloned()
    }

    fn put(&self, session: PendingSession) {
        let mut guard = self.sessions.write().expect("sessions poisoned");
        self.purge_locked(&mut guard);
        guard.insert(session.id, session);
    }

    fn delete_if_present(&self, id: &Uuid) -> bool {
        let mut guard = self.sessions.write().expect("sessions poisoned");
        guard.remove(id).is_some()
    }

    fn take(&self, id: &Uuid) -> Option<PendingSession> {
        let mut guard = self.sessions.write().expect("sessions poisoned");
        self.purge_locked(&mut guard);
        guard.remove(id)
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    salt_policy: SaltPolicy,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>, salt_policy: SaltPolicy) -> Self {
        Self { store, salt_policy }
    }

    pub fn in_memory(ttl: Option<Duration>, salt_policy: SaltPolicy) -> Self {
        Self::new(Arc::new(InMemorySessionStore::new(ttl)), salt_policy)
    }

    pub fn salt_policy(&self) -> SaltPolicy {
        self.salt_policy
    }

    /// Open a session. Concurrent calls for the same email get distinct ids
    /// and therefore distinct commitments.
    pub fn initiate(
        &self,
        email: &str,
        owner_address: Address,
        salt: Option<&str>,
    ) -> Result<SessionTicket, SessionError> {
        let salt = self.salt_policy.resolve(salt)?;
        let id = Uuid::new_v4();
        let commitment = email_commitment(email, &id.to_string(), salt.as_str());

        self.store.put(PendingSession {
            id,
            owner_address,
            email: email.to_string(),
            email_commitment: commitment,
            salt: salt.clone(),
            created_at: SystemTime::now(),
        });
        debug!("Opened zk-email session {}", id);

        Ok(SessionTicket {
            session_id: id,
            email_commitment: commitment,
            salt,
        })
    }

    /// Take the session out of the registry. Unknown or malformed ids are
    /// `NotFound` and leave the registry untouched.
    pub fn consume(&self, session_id: &str) -> Result<PendingSession, SessionError> {
        let id = Uuid::parse_str(session_id).map_err(|_| SessionError::NotFound)?;
        self.store.take(&id).ok_or(SessionError::NotFound)
    }

    /// Put a consumed session back after a failed verification.
    pub fn restore(&self, session: PendingSession) {
        debug!("Restoring zk-email session {}", session.id);
        self.store.put(session);
    }

    pub fn get(&self, session_id: &Uuid) -> Option<PendingSession> {
        self.store.get(session_id)
    }

    pub fn discard(&self, session_id: &Uuid) -> bool {
        self.store.delete_if_present(session_id)
    }
}
