// src/core/cost.rs — Cost accounting over the ledger
//
// All money is fixed-point micro-USD (1e-6 USD) in a u64. Summing many small
// entries stays exact: 1,000 entries of $0.0001 total exactly $0.10.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Fixed-point USD amount in micro-dollars.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CostUsd(u64);

impl CostUsd {
    pub const ZERO: CostUsd = CostUsd(0);

    pub fn from_micro(micro: u64) -> Self {
        CostUsd(micro)
    }

    pub fn micro(&self) -> u64 {
        self.0
    }

    /// Lossy conversion for display only; never fed back into arithmetic.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl std::ops::Add for CostUsd {
    type Output = CostUsd;
    fn add(self, rhs: CostUsd) -> CostUsd {
        CostUsd(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for CostUsd {
    fn sum<I: Iterator<Item = CostUsd>>(iter: I) -> CostUsd {
        iter.fold(CostUsd::ZERO, |a, b| a + b)
    }
}

impl std::fmt::Display for CostUsd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}.{:06}", self.0 / 1_000_000, self.0 % 1_000_000)
    }
}

/// Cost of one step: `tokens * rate_per_1k / 1000`, computed in integer micro-USD.
pub fn step_cost(tokens_used: u32, rate_per_1k: CostUsd) -> CostUsd {
    CostUsd(tokens_used as u64 * rate_per_1k.micro() / 1_000)
}

/// One immutable ledger row per completed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLedgerEntry {
    pub run_id: String,
    pub step_id: String,
    pub cost: CostUsd,
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger with pure aggregations. No state beyond the entries.
#[derive(Default)]
pub struct CostAccountant {
    entries: RwLock<Vec<CostLedgerEntry>>,
}

impl CostAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: CostLedgerEntry) {
        if let Ok(mut entries) = self.entries.write() {
            // Ledger rows are write-once; a replayed step id is a no-op.
            if entries.iter().any(|e| e.step_id == entry.step_id) {
                return;
            }
            entries.push(entry);
        }
    }

    pub fn total(&self, run_id: &str) -> CostUsd {
        self.fold(|e| e.run_id == run_id)
    }

    /// Total across all runs for the current UTC day.
    pub fn daily(&self) -> CostUsd {
        let today = Utc::now().date_naive();
        self.fold(|e| e.created_at.date_naive() == today)
    }

    /// Total across all runs for the current UTC month.
    pub fn monthly(&self) -> CostUsd {
        let now = Utc::now();
        self.fold(|e| e.created_at.year() == now.year() && e.created_at.month() == now.month())
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    fn fold(&self, pred: impl Fn(&CostLedgerEntry) -> bool) -> CostUsd {
        self.entries
            .read()
            .map(|entries| entries.iter().filter(|e| pred(e)).map(|e| e.cost).sum())
            .unwrap_or(CostUsd::ZERO)
    }
}
