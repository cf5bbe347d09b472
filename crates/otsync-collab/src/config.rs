use std::time::Duration;

/// Tunables for the sync core, all given fixed defaults by the spec but
/// exposed here so embedders and tests can override them (§9's Open
/// Question on the branch-switch delay is resolved by making it a field
/// here rather than a hardcoded literal).
#[derive(Clone, Debug)]
pub struct Config {
    /// Page size used when paging through a realtime collection's initial
    /// snapshot (§4.1).
    pub subscribe_batch_size: usize,
    /// How long the local-event coalescer waits for a paired delete+create
    /// before treating two events as unrelated (§4.2).
    pub coalesce_debounce: Duration,
    /// How long a branch switch waits, after unlinking, before relinking
    /// to the new branch (§8 S7).
    pub branch_switch_settle: Duration,
    /// Filename of the ignore-rules asset, read from the in-model asset
    /// tree rather than from disk.
    pub ignore_file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subscribe_batch_size: 256,
            coalesce_debounce: Duration::from_millis(10),
            branch_switch_settle: Duration::from_secs(1),
            ignore_file_name: ".pcignore".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.subscribe_batch_size, 256);
        assert_eq!(config.coalesce_debounce, Duration::from_millis(10));
        assert_eq!(config.branch_switch_settle, Duration::from_secs(1));
        assert_eq!(config.ignore_file_name, ".pcignore");
    }
}
