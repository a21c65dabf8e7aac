//! Ledger configuration parameters.

/// What a handle does when its own release hits an address the ledger
/// does not track.
///
/// Only handle-driven releases (drop, reassignment, arithmetic) consult the
/// policy. Direct calls to [`Ledger::release`](crate::Ledger::release)
/// always get the error back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Log the violation at `warn` level and carry on.
    #[default]
    Warn,
    /// Panic with the offending address.
    Panic,
}

/// Configuration for a [`Ledger`](crate::Ledger).
///
/// All values are fixed once the ledger is built.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Number of entries reserved up front.
    ///
    /// Default: 64. The table grows past this on demand.
    pub initial_capacity: usize,

    /// Reaction to a handle releasing an untracked address.
    pub release_policy: ReleasePolicy,
}

impl LedgerConfig {
    /// Default number of pre-reserved entries.
    pub const DEFAULT_INITIAL_CAPACITY: usize = 64;

    /// Create a config with default values.
    pub fn new() -> Self {
        Self {
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY,
            release_policy: ReleasePolicy::default(),
        }
    }

    /// Replace the release policy.
    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new()
    }
}
