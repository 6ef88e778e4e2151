//! Exponential backoff schedule for the reconnection loop.

use std::time::Duration;

use tokio::sync::watch;

/// Max reconnect attempts per disconnection (spec §4.1).
pub const MAX_ATTEMPTS: u32 = 10;
const MAX_BACKOFF_SECS: u64 = 30;

/// `min(2^k seconds, 30s)` for attempt `k`, yielding
/// `1, 2, 4, 8, 16, 30, 30, 30, 30, 30` for `k = 0..9` (I7).
pub fn backoff_for_attempt(k: u32) -> Duration {
    let secs = 1u64.checked_shl(k).unwrap_or(u64::MAX).min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Sleeps for `duration`, but returns early (with `false`) if `cancel` fires.
/// Used so `Transport::close()` can cut a backoff wait short.
pub async fn cancellable_sleep(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.changed() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_matches_spec() {
        let expected = [1u64, 2, 4, 8, 16, 30, 30, 30, 30, 30];
        for (k, &secs) in expected.iter().enumerate() {
            assert_eq!(backoff_for_attempt(k as u32), Duration::from_secs(secs));
        }
    }

    #[tokio::test]
    async fn cancel_interrupts_sleep() {
        let (tx, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            cancellable_sleep(Duration::from_secs(30), &mut rx).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(true).unwrap();
        let completed_normally = handle.await.unwrap();
        assert!(!completed_normally);
    }
}
