#![forbid(unsafe_code)]

use super::StoreError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Caller-owned cancellation signal. Stores check it before every statement of
/// a unit of work and also while SQLite runs a statement or waits on a lock; a
/// tripped token aborts the work and rolls back any open transaction.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Time left before the deadline; `None` when the token has no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn check(&self) -> Result<(), StoreError> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(observer.check().is_ok());
        token.cancel();
        assert!(observer.is_cancelled());
        assert!(matches!(observer.check(), Err(StoreError::Cancelled)));
    }

    #[test]
    fn elapsed_deadline_counts_as_cancelled() {
        let token = CancelToken::with_deadline(Instant::now());
        assert!(token.is_cancelled());

        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn remaining_tracks_the_deadline() {
        assert_eq!(CancelToken::new().remaining(), None);

        let expired = CancelToken::with_deadline(Instant::now());
        assert_eq!(expired.remaining(), Some(Duration::ZERO));

        let remaining = CancelToken::with_timeout(Duration::from_secs(60))
            .remaining()
            .expect("deadline is set");
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(30));
    }
}
