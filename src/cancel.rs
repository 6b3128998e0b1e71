use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Owner side of a cancellation scope.
///
/// Every call to [`Scope::issue`] supersedes the tokens handed out before it, so
/// a late result from an older request fails [`ScopeToken::is_live`] and gets
/// dropped instead of overwriting newer state.
#[derive(Debug, Default)]
pub struct Scope {
    epoch: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct ScopeToken {
    epoch: Arc<AtomicU64>,
    issued: u64,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> ScopeToken {
        let issued = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        ScopeToken {
            epoch: Arc::clone(&self.epoch),
            issued,
        }
    }

    /// Invalidate every outstanding token without handing out a new one.
    pub fn cancel(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    pub fn owns(&self, token: &ScopeToken) -> bool {
        Arc::ptr_eq(&self.epoch, &token.epoch)
    }
}

impl ScopeToken {
    pub fn is_live(&self) -> bool {
        self.epoch.load(Ordering::Acquire) == self.issued
    }
}
