//! Session diagnostics
//!
//! Tracks advisory cost estimates, error history and frame counters for the
//! running session. Nothing here is part of the conversation transcript;
//! `estimate` frames land here and nowhere else.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum number of cost estimates to retain
const MAX_ESTIMATE_HISTORY: usize = 50;

/// Maximum number of errors to retain
const MAX_ERROR_HISTORY: usize = 20;

/// One advisory cost estimate reported by the server
#[derive(Debug, Clone, Serialize)]
pub struct CostEstimate {
    pub model: Option<String>,
    pub input_tokens: Option<u64>,
    pub estimated_cost_usd: Option<f64>,
    /// When the estimate was received
    pub at: DateTime<Utc>,
}

/// Record of an error surfaced during the session
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Summary view for the presentation layer
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticsSummary {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub turns_sent: u64,
    pub turns_received: u64,
    pub last_estimate: Option<CostEstimate>,
    pub last_error: Option<ErrorRecord>,
}

/// Bounded diagnostic state owned by the session coordinator
#[derive(Debug, Default)]
pub struct Diagnostics {
    estimates: VecDeque<CostEstimate>,
    errors: VecDeque<ErrorRecord>,
    frames_received: u64,
    frames_dropped: u64,
    turns_sent: u64,
    turns_received: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one advisory cost estimate
    pub fn record_estimate(
        &mut self,
        model: Option<String>,
        input_tokens: Option<u64>,
        estimated_cost_usd: Option<f64>,
    ) {
        log::info!(
            "Cost estimate: model={:?}, input_tokens={:?}, estimated_cost_usd={:?}",
            model,
            input_tokens,
            estimated_cost_usd
        );

        self.estimates.push_back(CostEstimate {
            model,
            input_tokens,
            estimated_cost_usd,
            at: Utc::now(),
        });
        while self.estimates.len() > MAX_ESTIMATE_HISTORY {
            self.estimates.pop_front();
        }
    }

    /// Record one surfaced error
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push_back(ErrorRecord {
            message: message.into(),
            at: Utc::now(),
        });
        while self.errors.len() > MAX_ERROR_HISTORY {
            self.errors.pop_front();
        }
    }

    pub fn frame_received(&mut self) {
        self.frames_received += 1;
    }

    pub fn frame_dropped(&mut self) {
        self.frames_dropped += 1;
    }

    pub fn turn_sent(&mut self) {
        self.turns_sent += 1;
    }

    pub fn turn_received(&mut self) {
        self.turns_received += 1;
    }

    /// Snapshot for the presentation layer
    pub fn summary(&self) -> DiagnosticsSummary {
        DiagnosticsSummary {
            frames_received: self.frames_received,
            frames_dropped: self.frames_dropped,
            turns_sent: self.turns_sent,
            turns_received: self.turns_received,
            last_estimate: self.estimates.back().cloned(),
            last_error: self.errors.back().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_diagnostics_summary() {
        let diag = Diagnostics::new();
        let summary = diag.summary();
        assert_eq!(summary.frames_received, 0);
        assert!(summary.last_estimate.is_none());
        assert!(summary.last_error.is_none());
    }

    #[test]
    fn test_estimate_history_is_bounded() {
        let mut diag = Diagnostics::new();
        for i in 0..(MAX_ESTIMATE_HISTORY + 10) {
            diag.record_estimate(Some(format!("model-{}", i)), Some(i as u64), None);
        }
        assert_eq!(diag.estimates.len(), MAX_ESTIMATE_HISTORY);
        // The newest estimate survives
        assert_eq!(
            diag.summary().last_estimate.unwrap().model.as_deref(),
            Some(format!("model-{}", MAX_ESTIMATE_HISTORY + 9).as_str())
        );
    }

    #[test]
    fn test_error_history_is_bounded() {
        let mut diag = Diagnostics::new();
        for i in 0..(MAX_ERROR_HISTORY + 5) {
            diag.record_error(format!("error {}", i));
        }
        assert_eq!(diag.errors.len(), MAX_ERROR_HISTORY);
    }

    #[test]
    fn test_counters() {
        let mut diag = Diagnostics::new();
        diag.frame_received();
        diag.frame_received();
        diag.frame_dropped();
        diag.turn_sent();
        diag.turn_received();

        let summary = diag.summary();
        assert_eq!(summary.frames_received, 2);
        assert_eq!(summary.frames_dropped, 1);
        assert_eq!(summary.turns_sent, 1);
        assert_eq!(summary.turns_received, 1);
    }
}
