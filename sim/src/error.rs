use thiserror::Error;

/// Errors raised while simulating.
///
/// The first four are the fatal conditions a stage can detect. Whether the
/// scheduler stops on them is decided by [`crate::FatalPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// The program counter has advanced past the end of the program.
    #[error("IF stage: pc {pc} out of bounds (program has {len} instructions)")]
    FetchOutOfBounds { pc: usize, len: usize },
    /// A load/store (or harness) address is not inside data memory.
    #[error("EX stage: memory access at {addr:#x} out of bounds (memory has {size} words)")]
    MemoryOutOfBounds { addr: u32, size: usize },
    #[error("EX stage: unsupported opcode {0:#04x}")]
    UnsupportedOpcode(u32),
    #[error("EX stage: unsupported funct code {0:#04x}")]
    UnsupportedFunct(u32),

    #[error("invalid clock period {0} ns (must be even and at least 2)")]
    InvalidClockPeriod(u64),
    /// Signals kept changing without settling.
    #[error("signals did not settle after {max_deltas} delta cycles at {now} ns")]
    DeltaLimitExceeded { now: u64, max_deltas: u32 },
    #[error("simulation already halted: {0}")]
    Halted(Box<SimError>),
    #[error("no signal named `{0}`")]
    UnknownSignal(String),
    #[error("trace output failed: {0}")]
    Trace(String),
}
