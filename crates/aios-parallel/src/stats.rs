//! Execution counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::mode::ParallelMode;

/// Lock-free counters shared by concurrent executions
#[derive(Debug, Default)]
pub struct ParallelStats {
    executions: AtomicU64,
    consensus_agreements: AtomicU64,
    fallbacks_used: AtomicU64,
}

impl ParallelStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_execution(&self, mode: ParallelMode) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("aios_parallel_executions_total", "mode" => mode.as_str()).increment(1);
    }

    pub fn record_consensus(&self) {
        self.consensus_agreements.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("aios_parallel_consensus_agreements_total").increment(1);
    }

    pub fn record_fallback(&self) {
        self.fallbacks_used.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("aios_parallel_fallbacks_total").increment(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::new(
            self.executions.load(Ordering::Relaxed),
            self.consensus_agreements.load(Ordering::Relaxed),
            self.fallbacks_used.load(Ordering::Relaxed),
        )
    }
}

/// Point-in-time copy of the counters with derived rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub executions: u64,
    pub consensus_agreements: u64,
    pub fallbacks_used: u64,
    pub consensus_rate: f64,
    pub fallback_rate: f64,
}

impl StatsSnapshot {
    fn new(executions: u64, consensus_agreements: u64, fallbacks_used: u64) -> Self {
        let rate = |count: u64| {
            if executions == 0 {
                0.0
            } else {
                count as f64 / executions as f64
            }
        };
        Self {
            executions,
            consensus_agreements,
            fallbacks_used,
            consensus_rate: rate(consensus_agreements),
            fallback_rate: rate(fallbacks_used),
        }
    }

    /// Export in Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP aios_parallel_executions_total Total parallel executions\n");
        output.push_str("# TYPE aios_parallel_executions_total counter\n");
        output.push_str(&format!("aios_parallel_executions_total {}\n", self.executions));

        output.push_str("# HELP aios_parallel_consensus_agreements_total Consensus executions whose outputs agreed\n");
        output.push_str("# TYPE aios_parallel_consensus_agreements_total counter\n");
        output.push_str(&format!(
            "aios_parallel_consensus_agreements_total {}\n",
            self.consensus_agreements
        ));

        output.push_str("# HELP aios_parallel_fallbacks_total Executions answered by the secondary after the primary failed\n");
        output.push_str("# TYPE aios_parallel_fallbacks_total counter\n");
        output.push_str(&format!("aios_parallel_fallbacks_total {}\n", self.fallbacks_used));

        output.push_str("# HELP aios_parallel_consensus_rate Share of executions reaching consensus\n");
        output.push_str("# TYPE aios_parallel_consensus_rate gauge\n");
        output.push_str(&format!("aios_parallel_consensus_rate {:.4}\n", self.consensus_rate));

        output.push_str("# HELP aios_parallel_fallback_rate Share of executions using the fallback\n");
        output.push_str("# TYPE aios_parallel_fallback_rate gauge\n");
        output.push_str(&format!("aios_parallel_fallback_rate {:.4}\n", self.fallback_rate));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_without_executions() {
        let snapshot = ParallelStats::new().snapshot();
        assert_eq!(snapshot.executions, 0);
        assert_eq!(snapshot.consensus_rate, 0.0);
        assert_eq!(snapshot.fallback_rate, 0.0);
    }

    #[test]
    fn test_rates() {
        let stats = ParallelStats::new();
        for _ in 0..4 {
            stats.record_execution(ParallelMode::Consensus);
        }
        stats.record_consensus();
        stats.record_fallback();
        stats.record_fallback();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.consensus_rate, 0.25);
        assert_eq!(snapshot.fallback_rate, 0.5);
    }

    #[test]
    fn test_prometheus_export() {
        let stats = ParallelStats::new();
        stats.record_execution(ParallelMode::Fallback);
        stats.record_fallback();

        let text = stats.snapshot().to_prometheus();
        assert!(text.contains("aios_parallel_executions_total 1\n"));
        assert!(text.contains("aios_parallel_fallbacks_total 1\n"));
        assert!(text.contains("aios_parallel_fallback_rate 1.0000\n"));
        assert!(text.contains("# TYPE aios_parallel_consensus_rate gauge"));
    }
}
