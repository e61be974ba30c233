//! Per-request execution context
//!
//! The engine never blocks or times out on its own. A `QueryContext` carries
//! the caller's cancellation flag and deadline through to the store, which
//! checks it before doing work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::errors::{StoreError, StoreResult};

/// Cancellation handle shared between the caller and in-flight store calls
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct QueryContext {
    request_id: Uuid,
    cancel: CancelHandle,
    deadline: Option<Instant>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel: CancelHandle::default(),
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Handle the caller keeps to cancel this request
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails when the request was cancelled or its deadline has passed.
    pub fn check(&self) -> StoreResult<()> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_passes() {
        assert!(QueryContext::new().check().is_ok());
    }

    #[test]
    fn test_cancel_through_handle() {
        let ctx = QueryContext::new();
        let handle = ctx.cancel_handle();
        handle.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.check(), Err(StoreError::Cancelled));
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = QueryContext::new().with_timeout(Duration::ZERO);
        assert_eq!(ctx.check(), Err(StoreError::DeadlineExceeded));

        let ctx = QueryContext::new().with_timeout(Duration::from_secs(60));
        assert!(ctx.check().is_ok());
    }
}
