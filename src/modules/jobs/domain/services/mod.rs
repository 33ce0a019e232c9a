pub mod governor;
pub mod selection;

pub use governor::{
    ConcurrencyGovernor, GovernorDecision, GovernorTier, MemorySampler, MemoryThresholds,
    SysinfoSampler,
};
pub use selection::{select_phase2, Phase2Selection};
