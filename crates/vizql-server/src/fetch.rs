//! Latest-wins fetch coordination
//!
//! Every change to a chart's inputs starts a new fetch. Fetches resolve in
//! any order, so each one carries a generation token and a result only
//! lands while its token is still the newest. A stale fetch resolving late
//! can never overwrite newer state.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

pub struct LatestFetch<T> {
    generation: AtomicU64,
    slot: Mutex<Option<(u64, T)>>,
}

impl<T> Default for LatestFetch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestFetch<T> {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            slot: Mutex::new(None),
        }
    }

    /// Start a fetch: bumps the generation and returns the token the
    /// eventual result must present.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Land a result. Returns false (and discards the value) when a newer
    /// fetch has started since `token` was issued, or when a newer result
    /// already landed.
    pub async fn complete(&self, token: u64, value: T) -> bool {
        if token != self.generation.load(Ordering::SeqCst) {
            return false;
        }
        let mut slot = self.slot.lock().await;
        match &*slot {
            Some((landed, _)) if *landed >= token => false,
            _ => {
                *slot = Some((token, value));
                true
            }
        }
    }

    pub async fn latest(&self) -> Option<T>
    where
        T: Clone,
    {
        self.slot.lock().await.as_ref().map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stale_result_never_overwrites_newer_state() {
        let fetch = LatestFetch::new();

        let first = fetch.begin();
        let second = fetch.begin();

        // The newer fetch resolves first.
        assert!(fetch.complete(second, "new").await);
        // The older fetch resolves late and must be dropped.
        assert!(!fetch.complete(first, "stale").await);

        assert_eq!(fetch.latest().await, Some("new"));
    }

    #[tokio::test]
    async fn test_in_order_resolution_lands() {
        let fetch = LatestFetch::new();
        let token = fetch.begin();
        assert!(fetch.complete(token, 42).await);
        assert_eq!(fetch.latest().await, Some(42));

        let token = fetch.begin();
        assert!(fetch.complete(token, 43).await);
        assert_eq!(fetch.latest().await, Some(43));
    }

    #[tokio::test]
    async fn test_token_expires_when_new_fetch_begins() {
        let fetch = LatestFetch::new();
        let old = fetch.begin();
        let _newer = fetch.begin();

        // No result has landed yet, but the old token is already stale.
        assert!(!fetch.complete(old, 1).await);
        assert_eq!(fetch.latest().await, None);
    }
}
