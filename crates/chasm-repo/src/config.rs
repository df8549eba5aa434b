/// Immutable repository configuration, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepoConfig {
    /// Maximum degree of parallelism for batch fan-out. `-1` means unbounded.
    pub max_dop: i32,
    /// Digest bytes consumed by the sharded-path prefix.
    pub prefix_len: usize,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            max_dop: -1,
            prefix_len: 2,
        }
    }
}

impl RepoConfig {
    /// Concurrency bound for a batch of `pending` items.
    ///
    /// Never exceeds the batch size and never drops below one.
    pub fn effective_dop(&self, pending: usize) -> usize {
        let bound = if self.max_dop < 0 {
            pending
        } else {
            self.max_dop as usize
        };
        bound.clamp(1, pending.max(1))
    }
}
