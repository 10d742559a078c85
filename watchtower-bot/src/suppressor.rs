use std::collections::HashMap;
use std::future::poll_fn;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::time::{DelayQueue, delay_queue::Key};

struct Entry {
    key: Key,
    deadline: Instant,
}

/// Per-player alert cooldown.
///
/// Each suppressed player owns one timer in a [`DelayQueue`]. Releasing or
/// re-suppressing a player cancels its old timer, so an outdated expiry can
/// never cut a newer cooldown short.
pub struct Suppressor {
    cooldown: Duration,
    entries: HashMap<String, Entry>,
    expiries: DelayQueue<String>,
}

impl Suppressor {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            entries: HashMap::new(),
            expiries: DelayQueue::new(),
        }
    }

    /// Start (or restart) the cooldown for `player`.
    pub fn suppress(&mut self, player: &str) {
        if let Some(old) = self.entries.remove(player) {
            self.expiries.remove(&old.key);
        }
        let key = self.expiries.insert(player.to_string(), self.cooldown);
        self.entries.insert(
            player.to_string(),
            Entry {
                key,
                deadline: Instant::now() + self.cooldown,
            },
        );
    }

    /// True while `player` is inside its cooldown window. An elapsed deadline
    /// counts as expired even if [`Self::next_expiry`] has not collected it yet.
    pub fn is_suppressed(&self, player: &str) -> bool {
        self.entries
            .get(player)
            .is_some_and(|entry| Instant::now() < entry.deadline)
    }

    /// Drop `player` immediately, e.g. when they leave the server. Returns
    /// whether they were suppressed; releasing an unknown player is a no-op.
    pub fn release(&mut self, player: &str) -> bool {
        match self.entries.remove(player) {
            Some(entry) => {
                self.expiries.remove(&entry.key);
                true
            }
            None => false,
        }
    }

    /// Wait for the next cooldown to elapse and return that player.
    ///
    /// Resolves to `None` straight away when nobody is suppressed, so callers
    /// in a `select!` loop should match on `Some`.
    pub async fn next_expiry(&mut self) -> Option<String> {
        let expired = poll_fn(|cx| self.expiries.poll_expired(cx)).await?;
        let player = expired.into_inner();
        self.entries.remove(&player);
        Some(player)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_suppressed_until_cooldown_elapses() {
        let mut suppressor = Suppressor::new(COOLDOWN);
        suppressor.suppress("Bob");
        assert!(suppressor.is_suppressed("Bob"));
        assert!(!suppressor.is_suppressed("Alice"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(suppressor.is_suppressed("Bob"));

        assert_eq!(suppressor.next_expiry().await.as_deref(), Some("Bob"));
        assert!(!suppressor.is_suppressed("Bob"));
        assert!(suppressor.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_counts_before_collection() {
        let mut suppressor = Suppressor::new(COOLDOWN);
        suppressor.suppress("Bob");

        tokio::time::advance(COOLDOWN).await;
        assert!(!suppressor.is_suppressed("Bob"));
        assert_eq!(suppressor.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_is_immediate_and_idempotent() {
        let mut suppressor = Suppressor::new(COOLDOWN);
        suppressor.suppress("Bob");

        assert!(suppressor.release("Bob"));
        assert!(!suppressor.is_suppressed("Bob"));
        assert!(!suppressor.release("Bob"));
        assert_eq!(suppressor.next_expiry().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_timer_does_not_cut_new_cooldown_short() {
        let mut suppressor = Suppressor::new(COOLDOWN);
        suppressor.suppress("Bob");

        // Bob leaves after 30s and is alerted again on rejoin.
        tokio::time::advance(Duration::from_secs(30)).await;
        suppressor.release("Bob");
        suppressor.suppress("Bob");

        // The first timer would have fired here.
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(suppressor.is_suppressed("Bob"));

        let expiry = tokio::time::timeout(Duration::from_secs(30), suppressor.next_expiry()).await;
        assert_eq!(expiry.unwrap().as_deref(), Some("Bob"));
        assert!(!suppressor.is_suppressed("Bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiries_come_out_in_deadline_order() {
        let mut suppressor = Suppressor::new(COOLDOWN);
        suppressor.suppress("Bob");
        tokio::time::advance(Duration::from_secs(10)).await;
        suppressor.suppress("Carol");

        assert_eq!(suppressor.next_expiry().await.as_deref(), Some("Bob"));
        assert!(suppressor.is_suppressed("Carol"));
        assert_eq!(suppressor.next_expiry().await.as_deref(), Some("Carol"));
    }
}
