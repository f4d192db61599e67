//! Advisory cancellation for a running conversion.
//!
//! A [`CancelToken`] is checked by [`BatchStream`](crate::io::parquet::BatchStream)
//! before every pull. Once it trips, the stream yields a single [`Cancelled`]
//! error and stops; the driver still closes the reader afterwards.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Why a conversion stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancelled {
    #[error("conversion cancelled")]
    Cancelled,
    #[error("conversion deadline exceeded")]
    DeadlineExceeded,
}

/// Shared cancellation flag with an optional deadline.
///
/// Clones share the same flag, so a token handed to a conversion can be
/// tripped from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never trips on its own.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Same flag, with an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Same flag, with a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Trip the token for every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// `Ok(())` while the conversion may continue.
    ///
    /// # Errors
    /// Returns [`Cancelled`] once the token was tripped or its deadline passed.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(Cancelled::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Cancelled::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert_eq!(token.check(), Err(Cancelled::Cancelled));
    }

    #[test]
    fn past_deadline_trips() {
        let token = CancelToken::new().with_deadline(Instant::now());
        assert_eq!(token.check(), Err(Cancelled::DeadlineExceeded));
        assert!(CancelToken::new().with_timeout(Duration::from_secs(3600)).check().is_ok());
    }
}
