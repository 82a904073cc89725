/// Completion counter for one batch.
///
/// Owned by the batch aggregator, which is the only place completions are
/// counted. Workers report completion over a channel instead of touching this
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    total: usize,
    completed: usize,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self { total, completed: 0 }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Count one finished job.
    ///
    /// Returns `true` exactly once: on the call that makes `completed == total`.
    /// Completions past the total are ignored and logged.
    pub fn record_completion(&mut self) -> bool {
        if self.completed >= self.total {
            tracing::error!(
                "Completion reported after batch finished ({}/{})",
                self.completed,
                self.total
            );
            return false;
        }
        self.completed += 1;
        self.completed == self.total
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }

    /// Percentage complete, 0-100
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed * 100) / self.total) as u8
    }
}
