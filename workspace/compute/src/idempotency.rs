use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::debug;

/// How long a processed SMS is remembered by default.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Derives the deduplication key of an SMS.
///
/// The key is the lowercase hex SHA-256 of the owner id, the card tail, the
/// amount, the merchant and the full SMS text concatenated in that order.
/// Missing parts contribute nothing. The amount is normalized so `100` and
/// `100.00` produce the same key.
pub fn idempotency_key(
    user_id: i32,
    card_last_four: Option<&str>,
    amount: Decimal,
    merchant: Option<&str>,
    raw_content: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_string());
    hasher.update(card_last_four.unwrap_or_default());
    hasher.update(amount.normalize().to_string());
    hasher.update(merchant.unwrap_or_default());
    hasher.update(raw_content);
    hex::encode(hasher.finalize())
}

/// In-process memory of recently processed idempotency keys.
///
/// Entries expire after the configured TTL. The database unique constraint
/// on `(transactions.user_id, transactions.idempotency_key)` stays the source of truth across
/// restarts; this only keeps concurrent deliveries of the same SMS from
/// racing each other.
#[derive(Clone, Debug)]
pub struct IdempotencyGuard {
    seen: Cache<String, ()>,
}

impl IdempotencyGuard {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            seen: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Records `key` and reports whether this call was the first to do so.
    ///
    /// Concurrent callers with the same key observe exactly one `true`.
    pub async fn check_and_set(&self, key: &str) -> bool {
        let fresh = self
            .seen
            .entry(key.to_string())
            .or_insert(())
            .await
            .is_fresh();
        debug!(key, fresh, "Idempotency check");
        fresh
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains_key(key)
    }

    /// Drops `key`, so a later delivery is processed again.
    pub async fn forget(&self, key: &str) {
        self.seen.invalidate(key).await;
    }
}

impl Default for IdempotencyGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, 100_000)
    }
}
