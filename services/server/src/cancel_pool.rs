//! §4.5 step 3 — single-session-per-user pre-emption. A process-wide
//! (not per-year-group — matches `original_source/ws_connection.go`'s
//! global `cancelPool`) map from user id to the live connection's cancel
//! handle.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// `CancellationToken` has no `PartialEq` — `original_source/ws_connection.go`
/// compares the stored cancel handle by pointer identity
/// (`cancelPool.CompareAndDelete(userID, &newCancel)`), so here each
/// registration is tagged with a generation id and that id stands in for
/// pointer identity.
pub struct CancelPool {
    handles: DashMap<String, (u64, CancellationToken)>,
    next_id: AtomicU64,
}

impl CancelPool {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a new cancellation token for `user_id`, pre-empting (by
    /// canceling) any prior token for that user. Returns the new token and
    /// the generation id to present back to `unregister`.
    pub fn register_and_preempt(&self, user_id: &str) -> (CancellationToken, u64) {
        let new_token = CancellationToken::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some((_, old_token)) = self.handles.remove(user_id) {
            old_token.cancel();
        }
        self.handles.insert(user_id.to_owned(), (id, new_token.clone()));
        (new_token, id)
    }

    /// Removes `user_id`'s entry only if it's still the registration `id`
    /// identifies — a session that was itself pre-empted must not clobber
    /// the newer session's registration during its own teardown.
    pub fn unregister(&self, user_id: &str, id: u64) {
        self.handles.remove_if(user_id, |_, (entry_id, _)| *entry_id == id);
    }
}

impl Default for CancelPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_a_second_session_cancels_the_first() {
        let pool = CancelPool::new();
        let (first, _first_id) = pool.register_and_preempt("alice");
        assert!(!first.is_cancelled());
        let (second, _second_id) = pool.register_and_preempt("alice");
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn unregister_is_a_noop_if_a_newer_session_already_replaced_it() {
        let pool = CancelPool::new();
        let (_first, first_id) = pool.register_and_preempt("alice");
        let (second, _second_id) = pool.register_and_preempt("alice");
        // first's teardown tries to unregister after being pre-empted.
        pool.unregister("alice", first_id);
        // second's registration must still be intact.
        let (third, _third_id) = pool.register_and_preempt("alice");
        assert!(second.is_cancelled());
        assert!(!third.is_cancelled());
    }

    #[test]
    fn unregister_removes_the_current_entry_without_canceling_it() {
        let pool = CancelPool::new();
        let (first, first_id) = pool.register_and_preempt("alice");
        pool.unregister("alice", first_id);
        assert!(!first.is_cancelled());
        let (second, _second_id) = pool.register_and_preempt("alice");
        assert!(!first.is_cancelled());
        assert!(!second.is_cancelled());
    }
}
