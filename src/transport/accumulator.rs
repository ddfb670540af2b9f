//! Partial-response accumulation for the streaming protocol
//!
//! Folds `delta` fragments from the server into a running buffer that the
//! presentation layer renders as the in-progress agent response.
//!
//! # Accumulation Rules
//!
//! - **Deltas**: appended in arrival order, nothing else touches the buffer
//! - **Done**: clears the buffer exactly once per response cycle; the
//!   finalized text travels in the `done` frame itself, never out of here

/// Running buffer for an in-progress, not-yet-finalized agent response
#[derive(Debug, Clone, Default)]
pub struct ResponseAccumulator {
    text: String,
    /// Count of delta fragments folded into the current cycle
    delta_count: u64,
}

impl ResponseAccumulator {
    /// Create a new empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one delta fragment and return the accumulated text
    pub fn push_delta(&mut self, fragment: &str) -> &str {
        if !fragment.is_empty() {
            self.text.push_str(fragment);
            self.delta_count += 1;

            if self.delta_count % 20 == 0 {
                log::debug!(
                    "ResponseAccumulator: {} deltas, {} chars accumulated",
                    self.delta_count,
                    self.text.len()
                );
            }
        }
        &self.text
    }

    /// Clear the buffer at the `done` boundary
    pub fn clear(&mut self) {
        if self.delta_count > 0 {
            log::debug!(
                "ResponseAccumulator: cycle closed after {} deltas, {} chars",
                self.delta_count,
                self.text.len()
            );
        }
        self.text.clear();
        self.delta_count = 0;
    }

    /// The accumulated text so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether any fragment has been folded into the current cycle
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Count of delta fragments in the current cycle
    pub fn delta_count(&self) -> u64 {
        self.delta_count
    }
}
