use std::time::Duration;

/// Connection-level settings for a [`crate::transport::BridgeTransport`].
///
/// Mirrors the teacher's small, explicit settings struct threaded through connection
/// construction: a builder-style setter API plus a sensible `Default`.
#[derive(Debug, Clone)]
pub struct BridgeConfiguration {
    pending_remove_threshold: usize,
    default_timeout: Option<Duration>,
}

impl Default for BridgeConfiguration {
    fn default() -> Self {
        Self {
            pending_remove_threshold: 64,
            default_timeout: None,
        }
    }
}

impl BridgeConfiguration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dropped handles the pending-remove buffer accumulates before the writer task
    /// flushes a `Remove` frame on its own initiative.
    #[must_use]
    pub fn with_pending_remove_threshold(mut self, threshold: usize) -> Self {
        self.pending_remove_threshold = threshold;
        self
    }

    #[must_use]
    pub fn pending_remove_threshold(&self) -> usize {
        self.pending_remove_threshold
    }

    /// Timeout applied by the convenience wrappers in [`crate::handle`] (`retrieve`/`apply`
    /// racing against `tokio::time::timeout`); the core transport has no built-in timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_threshold() {
        assert_eq!(BridgeConfiguration::default().pending_remove_threshold(), 64);
        assert_eq!(BridgeConfiguration::default().default_timeout(), None);
    }

    #[test]
    fn builder_overrides_apply() {
        let cfg = BridgeConfiguration::new()
            .with_pending_remove_threshold(8)
            .with_default_timeout(Duration::from_secs(5));
        assert_eq!(cfg.pending_remove_threshold(), 8);
        assert_eq!(cfg.default_timeout(), Some(Duration::from_secs(5)));
    }
}
