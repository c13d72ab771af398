//! Cooperative cancellation: one shared flag per job.
//!
//! A token is registered at admission. The worker hands it to the fetch
//! progress callback, which checks it on every invocation and asks the tool
//! to abort once it is set. Nothing here preempts a running fetch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::JobId;

/// Shared cancellation flag for one job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Registry of job id -> cancel token. Used by admission to create flags,
/// by workers to fetch them, and by cancel/delete paths.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: RwLock<HashMap<JobId, CancelToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) the flag for a job and return its token.
    pub fn register(&self, job_id: JobId) -> CancelToken {
        let token = CancelToken::new();
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id, token.clone());
        token
    }

    /// Token for a job, if registered.
    pub fn token(&self, job_id: &JobId) -> Option<CancelToken> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    /// Set the flag. Returns false if the job has no registered flag.
    pub fn request_cancel(&self, job_id: &JobId) -> bool {
        match self
            .tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_cancelled(&self, job_id: &JobId) -> bool {
        self.token(job_id).is_some_and(|t| t.is_cancelled())
    }

    /// Drop the flag (call when the job record is deleted).
    pub fn remove(&self, job_id: &JobId) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_shared_between_registry_and_holder() {
        let reg = CancellationRegistry::new();
        let id = JobId::new();
        let held = reg.register(id);
        assert!(!held.is_cancelled());

        assert!(reg.request_cancel(&id));
        assert!(held.is_cancelled());
        assert!(reg.is_cancelled(&id));
    }

    #[test]
    fn cancel_unknown_job_is_noop() {
        let reg = CancellationRegistry::new();
        assert!(!reg.request_cancel(&JobId::new()));
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_forgets_flag() {
        let reg = CancellationRegistry::new();
        let id = JobId::new();
        reg.register(id);
        reg.request_cancel(&id);
        reg.remove(&id);
        assert!(reg.token(&id).is_none());
        assert!(!reg.is_cancelled(&id));
    }

    #[test]
    fn tokens_are_independent() {
        let reg = CancellationRegistry::new();
        let a = JobId::new();
        let b = JobId::new();
        reg.register(a);
        let tb = reg.register(b);
        reg.request_cancel(&a);
        assert!(!tb.is_cancelled());
        assert_eq!(reg.len(), 2);
    }
}
