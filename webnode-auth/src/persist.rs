//! Persistence hook invoked after a successful refresh.

use crate::credentials::CredentialSet;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Receives refreshed credentials so the host can store them durably.
///
/// `key` identifies the credential set (typically the owning node's id).
#[async_trait]
pub trait CredentialSink: Send + Sync {
    /// Persist the updated credential set.
    async fn persist(&self, key: &str, credentials: &CredentialSet) -> anyhow::Result<()>;
}

/// Type alias for shared sinks.
pub type BoxedSink = Arc<dyn CredentialSink>;

/// Sink that discards updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl CredentialSink for NoopSink {
    async fn persist(&self, _key: &str, _credentials: &CredentialSet) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Sink backed by a synchronous closure.
pub struct FnSink<F> {
    f: F,
}

impl<F> FnSink<F>
where
    F: Fn(&str, &CredentialSet) -> anyhow::Result<()> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> CredentialSink for FnSink<F>
where
    F: Fn(&str, &CredentialSet) -> anyhow::Result<()> + Send + Sync,
{
    async fn persist(&self, key: &str, credentials: &CredentialSet) -> anyhow::Result<()> {
        (self.f)(key, credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_fn_sink_receives_update() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sink = FnSink::new(move |key: &str, creds: &CredentialSet| {
            seen_clone
                .lock()
                .push((key.to_string(), creds.access_token.clone()));
            Ok(())
        });

        assert_ok!(sink.persist("node-1", &CredentialSet::new("NEW")).await);

        assert_eq!(
            *seen.lock(),
            vec![("node-1".to_string(), "NEW".to_string())]
        );
    }

    #[tokio::test]
    async fn test_noop_sink() {
        assert_ok!(NoopSink.persist("k", &CredentialSet::new("a")).await);
    }

    #[tokio::test]
    async fn test_fn_sink_error_propagates() {
        let sink = FnSink::new(|_: &str, _: &CredentialSet| Err(anyhow::anyhow!("disk full")));
        let err = tokio_test::assert_err!(sink.persist("k", &CredentialSet::new("a")).await);
        assert_eq!(err.to_string(), "disk full");
    }
}
