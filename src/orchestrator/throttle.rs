//! Character-boundary throttling of draft updates

/// Decides when the accumulated answer has grown enough to refresh the draft.
///
/// An update is due whenever a delta moves the accumulated length across a
/// multiple of `boundary` characters. A delta spanning several boundaries
/// still yields a single update.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    boundary: usize,
    prior_len: usize,
}

impl ProgressThrottle {
    /// A boundary of 0 disables updates
    pub fn new(boundary: usize) -> Self {
        Self {
            boundary,
            prior_len: 0,
        }
    }

    /// Record the new accumulated length and report whether an update is due
    pub fn observe(&mut self, current_len: usize) -> bool {
        let prior = std::mem::replace(&mut self.prior_len, current_len);
        if self.boundary == 0 {
            return false;
        }
        prior / self.boundary != current_len / self.boundary
    }
}
