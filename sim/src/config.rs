use crate::{error::SimError, framework::FatalPolicy};

/// The config for [`crate::Pipeline`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Full clock period. The clock is high for the first half.
    pub clock_period_ns: u64,
    /// What to do when a stage raises a fatal error
    pub fatal_policy: FatalPolicy,
    /// Upper bound of delta cycles spent settling a single instant
    pub max_deltas: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            clock_period_ns: 10,
            fatal_policy: FatalPolicy::Halt,
            max_deltas: 1000,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.clock_period_ns < 2 || self.clock_period_ns % 2 != 0 {
            return Err(SimError::InvalidClockPeriod(self.clock_period_ns));
        }
        Ok(())
    }

    pub fn half_period(&self) -> u64 {
        self.clock_period_ns / 2
    }

    pub fn with_policy(mut self, policy: FatalPolicy) -> Self {
        self.fatal_policy = policy;
        self
    }
}
