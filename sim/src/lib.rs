//! Cycle-level simulator of a three-stage MIPS-subset pipeline.
//!
//! Fetch, decode and execute are processes connected by signals and driven by
//! an event scheduler (see [`framework`]). [`Pipeline`] puts them together.
//!
//! ```no_run
//! use mips_sim::{program, Pipeline, SimConfig};
//!
//! let mut pipe = Pipeline::new(program::demo(), SimConfig::default()).unwrap();
//! for (i, v) in program::DEMO_REGISTERS {
//!     pipe.set_reg(i, v);
//! }
//! let _ = pipe.run(1000);
//! println!("R3 = {:?}", pipe.get_reg(3));
//! ```
mod config;
mod error;
pub mod framework;
pub mod isa;
mod pipeline;
pub mod program;
pub mod stages;
pub mod state;
pub mod trace;
mod utils;

pub use config::SimConfig;
pub use error::SimError;
pub use framework::{FatalPolicy, RunSummary};
pub use isa::Instruction;
pub use pipeline::Pipeline;
pub use trace::{TraceRecorder, VcdRecorder, DEFAULT_TRACED};
pub use utils::{format_regs, mem_changes, mem_diff, paint, GRAY, GRN, GRNB, RED};

/// Default simulated time of one run in ns.
pub const DEFAULT_RUN_NS: u64 = 1000;
