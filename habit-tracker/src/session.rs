//! Sign-out

use crate::backend::RemoteStore;
use crate::cache::{LocalCache, LEGACY_STATE_KEY};
use crate::error::Result;
use crate::notify::{Notification, Notifier, SIGN_OUT_FAILED};
use tracing::{error, info, warn};

/// Clear every locally cached session value.
///
/// The legacy dashboard snapshot goes first, then everything else.
pub fn clear_local_session(cache: &dyn LocalCache) -> Result<()> {
    let legacy = cache.remove(LEGACY_STATE_KEY);
    if let Err(e) = &legacy {
        warn!(error = %e, "Failed to remove legacy dashboard cache");
    }
    cache.clear()?;
    legacy
}

/// Sign the user out.
///
/// Local data is cleared before the remote session is invalidated, so the
/// cache is empty when this returns whether or not the remote call worked.
/// A remote failure is reported to the user and returned.
pub async fn sign_out(
    cache: &dyn LocalCache,
    remote: &dyn RemoteStore,
    notifier: &dyn Notifier,
) -> Result<()> {
    if let Err(e) = clear_local_session(cache) {
        error!(error = %e, "Failed to clear local session cache");
    }

    match remote.sign_out().await {
        Ok(()) => {
            info!(backend = remote.id(), "Signed out");
            Ok(())
        }
        Err(e) => {
            error!(backend = remote.id(), error = %e, "Remote sign-out failed");
            notifier.notify(Notification::error(SIGN_OUT_FAILED));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockRemote, RemoteOp};
    use crate::cache::{MemoryCache, SESSION_TOKEN_KEY};
    use crate::notify::NotificationLog;

    fn populated_cache() -> MemoryCache {
        let cache = MemoryCache::new();
        cache.set(LEGACY_STATE_KEY, r#"{"habits":[]}"#).unwrap();
        cache.set(SESSION_TOKEN_KEY, "tok").unwrap();
        cache
    }

    #[tokio::test]
    async fn test_sign_out_clears_cache() {
        let cache = populated_cache();
        let remote = MockRemote::signed_in("user-1");
        let log = NotificationLog::new();

        sign_out(&cache, &remote, &log).await.unwrap();

        assert!(cache.get(LEGACY_STATE_KEY).unwrap().is_none());
        assert!(cache.get(SESSION_TOKEN_KEY).unwrap().is_none());
        assert!(!remote.is_signed_in());
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_sign_out_clears_cache_when_remote_fails() {
        let cache = populated_cache();
        let remote = MockRemote::signed_in("user-1").failing(RemoteOp::SignOut, "network down");
        let log = NotificationLog::new();

        let result = sign_out(&cache, &remote, &log).await;

        assert!(result.is_err());
        assert!(cache.get(LEGACY_STATE_KEY).unwrap().is_none());
        assert!(cache.get(SESSION_TOKEN_KEY).unwrap().is_none());
        assert_eq!(log.messages(), vec![SIGN_OUT_FAILED]);
    }

    #[tokio::test]
    async fn test_cache_cleared_before_remote_sign_out_completes() {
        let cache = populated_cache();
        let remote = MockRemote::signed_in("user-1").with_latency(std::time::Duration::from_millis(100));
        let log = NotificationLog::new();

        let probe = async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            (cache.get(LEGACY_STATE_KEY).unwrap(), remote.is_signed_in())
        };

        let (result, (legacy, still_signed_in)) = tokio::join!(sign_out(&cache, &remote, &log), probe);

        assert!(result.is_ok());
        assert!(legacy.is_none());
        assert!(still_signed_in);
    }
}
