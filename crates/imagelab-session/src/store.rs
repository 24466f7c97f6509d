//! Keyed registry of live sessions with idle expiry.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::LabError;
use crate::file_store::FileName;
use crate::session::{Session, SessionId};

/// Shared handle to one session. Holding the lock serializes every
/// mutation of that session.
pub type SessionSlot = Arc<Mutex<Session>>;

/// All live sessions, keyed by id.
///
/// The map lock is only held to look up, insert or remove a slot; work on
/// a session happens under its own mutex.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
    ttl: Duration,
}

impl SessionStore {
    /// An empty store whose sessions expire after `ttl` of inactivity.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Idle time after which a session expires.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether `session` has been idle for at least the TTL at `now`.
    #[must_use]
    pub fn is_expired(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_access()) >= self.ttl
    }

    /// Register a new session.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::LockPoisoned`] if the map lock is poisoned.
    pub fn insert(&self, session: Session) -> Result<(), LabError> {
        let id = session.id();
        self.sessions
            .write()
            .map_err(|_| LabError::LockPoisoned)?
            .insert(id, Arc::new(Mutex::new(session)));
        Ok(())
    }

    /// Look up a session's slot.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::NotFound`] for unknown ids.
    pub fn get(&self, id: SessionId) -> Result<SessionSlot, LabError> {
        self.sessions
            .read()
            .map_err(|_| LabError::LockPoisoned)?
            .get(&id)
            .cloned()
            .ok_or(LabError::NotFound("session"))
    }

    /// Remove a session, returning its slot if it existed.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::LockPoisoned`] if the map lock is poisoned.
    pub fn remove(&self, id: SessionId) -> Result<Option<SessionSlot>, LabError> {
        Ok(self
            .sessions
            .write()
            .map_err(|_| LabError::LockPoisoned)?
            .remove(&id))
    }

    /// Remove every session idle for at least the TTL at `now` and return
    /// them so their files can be deleted.
    ///
    /// Sessions whose lock is currently held are in use and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::LockPoisoned`] if the map lock is poisoned.
    pub fn sweep_expired(&self, now: Instant) -> Result<Vec<Session>, LabError> {
        let mut sessions = self.sessions.write().map_err(|_| LabError::LockPoisoned)?;
        let mut expired = Vec::new();
        sessions.retain(|id, slot| match slot.try_lock() {
            Ok(session) if self.is_expired(&session, now) => {
                expired.push(session.clone());
                false
            }
            Ok(_) | Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(poisoned)) => {
                debug!(session = %id, "dropping poisoned session");
                expired.push(poisoned.into_inner().clone());
                false
            }
        });
        Ok(expired)
    }

    /// File names referenced by any live session.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::LockPoisoned`] if a lock is poisoned.
    pub fn referenced_files(&self) -> Result<HashSet<FileName>, LabError> {
        let sessions = self.sessions.read().map_err(|_| LabError::LockPoisoned)?;
        let mut names = HashSet::new();
        for slot in sessions.values() {
            let session = slot.lock().map_err(|_| LabError::LockPoisoned)?;
            for image in session.images() {
                names.extend(image.files().into_iter().cloned());
            }
        }
        Ok(names)
    }

    /// Number of live sessions.
    ///
    /// # Errors
    ///
    /// Returns [`LabError::LockPoisoned`] if the map lock is poisoned.
    pub fn len(&self) -> Result<usize, LabError> {
        Ok(self
            .sessions
            .read()
            .map_err(|_| LabError::LockPoisoned)?
            .len())
    }
}
