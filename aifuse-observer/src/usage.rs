//! Token usage aggregation per provider and model.

use aifuse_core::error::AiError;
use aifuse_core::event::{FunctionEvent, FunctionObserver, FunctionResult};
use aifuse_core::types::{ModelInformation, Usage};
use async_trait::async_trait;
use dashmap::DashMap;

/// Usage totals for one provider/model pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSummary {
    pub calls: u64,
    pub failed_calls: u64,
    pub usage: Usage,
}

/// Observer that sums up token usage from `finished` events.
///
/// Successful calls add their reported usage, failed and aborted calls
/// only bump `failed_calls`.
#[derive(Debug, Default)]
pub struct UsageTracker {
    totals: DashMap<ModelInformation, UsageSummary>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals for one model, if it has been called
    pub fn summary(&self, model: &ModelInformation) -> Option<UsageSummary> {
        self.totals.get(model).map(|entry| *entry.value())
    }

    /// Totals across every model
    pub fn total(&self) -> UsageSummary {
        self.totals
            .iter()
            .fold(UsageSummary::default(), |mut total, entry| {
                total.calls += entry.calls;
                total.failed_calls += entry.failed_calls;
                total.usage.add(&entry.usage);
                total
            })
    }

    pub fn models(&self) -> Vec<ModelInformation> {
        self.totals.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn reset(&self) {
        self.totals.clear();
    }
}

#[async_trait]
impl FunctionObserver for UsageTracker {
    async fn on_function_event(&self, event: &FunctionEvent) -> Result<(), AiError> {
        let Some(result) = &event.result else {
            return Ok(());
        };

        let mut summary = self
            .totals
            .entry(event.metadata.model.clone())
            .or_default();
        summary.calls += 1;
        match result {
            FunctionResult::Success { usage, .. } => {
                if let Some(usage) = usage {
                    summary.usage.add(usage);
                }
            }
            FunctionResult::Error { .. } | FunctionResult::Abort => summary.failed_calls += 1,
        }
        Ok(())
    }
}
