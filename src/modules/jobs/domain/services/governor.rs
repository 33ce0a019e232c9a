//! Memory-driven concurrency governor
//!
//! Between batches the scheduler reports how many rows it has processed. Every
//! `sample_every` rows the governor reads resident memory and may lower the
//! concurrency budget or stop the run. The budget only ever goes down.

use crate::{log_info, log_warn};
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Source of the current process's resident memory
#[cfg_attr(test, mockall::automock)]
pub trait MemorySampler: Send + Sync {
    /// Resident set size in MB, `None` when it cannot be measured
    fn resident_mb(&self) -> Option<f64>;
}

/// Reads this process's resident set through `sysinfo`
pub struct SysinfoSampler {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for SysinfoSampler {
    fn resident_mb(&self) -> Option<f64> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        // memory() is in bytes
        system
            .process(pid)
            .map(|process| process.memory() as f64 / (1024.0 * 1024.0))
    }
}

/// Resident-memory limits in MB, ascending
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryThresholds {
    pub reduce_mb: f64,
    pub minimal_mb: f64,
    pub abort_mb: f64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            reduce_mb: 420.0,
            minimal_mb: 460.0,
            abort_mb: 490.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GovernorTier {
    Default,
    Reduced,
    Minimal,
    Abort,
}

/// What the scheduler must do before its next batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GovernorDecision {
    Continue,
    /// Replace the client with one of this concurrency
    Reduce(usize),
    Abort { resident_mb: f64 },
}

pub const REDUCED_CONCURRENCY: usize = 2;
pub const MINIMAL_CONCURRENCY: usize = 1;

pub struct ConcurrencyGovernor {
    sampler: Arc<dyn MemorySampler>,
    thresholds: MemoryThresholds,
    tier: GovernorTier,
    budget: usize,
    sample_every: usize,
    last_sampled_at: Option<usize>,
}

impl ConcurrencyGovernor {
    pub fn new(
        sampler: Arc<dyn MemorySampler>,
        thresholds: MemoryThresholds,
        initial_concurrency: usize,
        sample_every: usize,
    ) -> Self {
        Self {
            sampler,
            thresholds,
            tier: GovernorTier::Default,
            budget: initial_concurrency.max(1),
            sample_every: sample_every.max(1),
            last_sampled_at: None,
        }
    }

    pub fn tier(&self) -> GovernorTier {
        self.tier
    }

    /// Current concurrency budget
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Decide before the next batch, given the rows processed so far.
    pub fn observe(&mut self, processed: usize) -> GovernorDecision {
        if self.tier == GovernorTier::Abort {
            return GovernorDecision::Abort { resident_mb: 0.0 };
        }

        if let Some(last) = self.last_sampled_at {
            if processed.saturating_sub(last) < self.sample_every {
                return GovernorDecision::Continue;
            }
        }
        self.last_sampled_at = Some(processed);

        let Some(resident_mb) = self.sampler.resident_mb() else {
            return GovernorDecision::Continue;
        };

        if resident_mb > self.thresholds.abort_mb {
            log_warn!(
                "[memory] abort after {} rows: {:.1} MB > {} MB",
                processed,
                resident_mb,
                self.thresholds.abort_mb
            );
            self.tier = GovernorTier::Abort;
            return GovernorDecision::Abort { resident_mb };
        }

        if resident_mb > self.thresholds.minimal_mb && self.budget > MINIMAL_CONCURRENCY {
            return self.lower(GovernorTier::Minimal, MINIMAL_CONCURRENCY, resident_mb);
        }

        if resident_mb > self.thresholds.reduce_mb && self.budget > REDUCED_CONCURRENCY {
            return self.lower(GovernorTier::Reduced, REDUCED_CONCURRENCY, resident_mb);
        }

        GovernorDecision::Continue
    }

    fn lower(&mut self, tier: GovernorTier, budget: usize, resident_mb: f64) -> GovernorDecision {
        self.tier = self.tier.max(tier);
        self.budget = budget;
        log_info!(
            "[memory] concurrency reduced to {} ({:.1} MB)",
            budget,
            resident_mb
        );
        GovernorDecision::Reduce(budget)
    }
}
