//! A small event-driven simulation framework.
//!
//! Hardware is modelled as processes connected by signals. A process declares
//! which signals it is sensitive to; whenever a committed value change hits
//! that set the scheduler evaluates the process again. All changes caused by a
//! clock event are settled in zero simulated time before the clock moves on.
mod kernel;
mod signal;

pub use kernel::{FatalPolicy, RunSummary, Scheduler};
pub use signal::{Change, Lane, Signal, SignalId, SignalPool, SignalValue, Slot, Value};

use crate::error::SimError;

/// When a process is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sensitivity {
    /// Only on a low to high transition of one bit signal (a clocked process).
    PosEdge(SignalId),
    /// On any value change of any of the listed signals, within the same
    /// simulated instant (a combinational process).
    Change(Vec<SignalId>),
}

/// A set of processes driven by one scheduler.
///
/// Processes are addressed by `Key`. When several processes are triggered in
/// the same delta cycle they run in ascending key order.
pub trait ProcessSet {
    type Key: Copy + Ord + std::fmt::Debug;

    /// Every process and what it is sensitive to.
    fn processes(&self) -> Vec<(Self::Key, Sensitivity)>;

    /// Evaluate one process. It reads committed values from `signals` and
    /// writes pending ones.
    fn run(&mut self, key: Self::Key, signals: &mut SignalPool) -> Result<(), SimError>;
}
