//! The three pipeline stages and the wiring between them.
//!
//! ```text
//!            if_id_instruction          id_ex_* fields
//!   Fetch ----------------------> Decode ----------------> Execute
//!     ^         fetch_pc                  pc_current          |
//!     |                                                       |
//!     +------------------ branch_taken, pc_next --------------+
//! ```
//!
//! Fetch is clocked. Decode and Execute are combinational and settle within
//! the instant of the rising edge that fetched the instruction.
mod decode;
mod execute;
mod fetch;

pub use decode::{DecodeStage, DecodedFields};
pub use execute::{branch_target, jump_target, ExecOutput, ExecuteStage};
pub use fetch::FetchStage;

use crate::{
    error::SimError,
    framework::{ProcessSet, Sensitivity, Signal, SignalPool},
    isa::Instruction,
    state::ArchState,
};

/// Identifies a stage. The declaration order is the evaluation order when
/// several stages are triggered in the same delta cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Fetch,
    Decode,
    Execute,
}

/// Every signal of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Wires {
    pub clock: Signal<bool>,
    pub instruction: Signal<Instruction>,
    pub fetch_pc: Signal<u32>,
    pub fields: DecodedFields<Signal<u32>>,
    pub pc_current: Signal<u32>,
    pub pc_next: Signal<u32>,
    pub branch_taken: Signal<bool>,
    pub result: Signal<u32>,
}

impl Wires {
    /// The fetched instruction and `pc_current` are buffers: each fetch is
    /// an event for decode, and each decode one for execute, even when the
    /// word or its address repeat.
    pub fn new(signals: &mut SignalPool) -> Self {
        Self {
            clock: signals.add("clock", false),
            instruction: signals.add_buffer("if_id_instruction", Instruction::default()),
            fetch_pc: signals.add("fetch_pc", 0),
            fields: DecodedFields::new(signals),
            pc_current: signals.add_buffer("pc_current", 0),
            pc_next: signals.add("pc_next", 0),
            branch_taken: signals.add("branch_taken", false),
            result: signals.add("execution_result", 0),
        }
    }
}

/// The stages of one pipeline, connected through [`Wires`].
#[derive(Debug)]
pub struct Stages {
    pub fetch: FetchStage,
    pub decode: DecodeStage,
    pub execute: ExecuteStage,
}

impl Stages {
    pub fn new(wires: &Wires, program: Vec<Instruction>, state: ArchState) -> Self {
        Self {
            fetch: FetchStage {
                clk: wires.clock,
                branch_taken: wires.branch_taken,
                pc_next: wires.pc_next,
                instruction_out: wires.instruction,
                pc_out: wires.fetch_pc,
                program,
                pc: 0,
                fetched: 0,
            },
            decode: DecodeStage {
                instruction_in: wires.instruction,
                pc_in: wires.fetch_pc,
                fields_out: wires.fields,
                pc_out: wires.pc_current,
            },
            execute: ExecuteStage {
                fields_in: wires.fields,
                pc_in: wires.pc_current,
                result: wires.result,
                pc_next: wires.pc_next,
                branch_taken: wires.branch_taken,
                state,
                executed: 0,
            },
        }
    }
}

impl ProcessSet for Stages {
    type Key = Stage;

    fn processes(&self) -> Vec<(Stage, Sensitivity)> {
        vec![
            (Stage::Fetch, self.fetch.sensitivity()),
            (Stage::Decode, self.decode.sensitivity()),
            (Stage::Execute, self.execute.sensitivity()),
        ]
    }

    fn run(&mut self, key: Stage, signals: &mut SignalPool) -> Result<(), SimError> {
        match key {
            Stage::Fetch => self.fetch.fetch(signals),
            Stage::Decode => {
                self.decode.decode(signals);
                Ok(())
            }
            Stage::Execute => self.execute.run(signals),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let mut signals = SignalPool::default();
        let w = Wires::new(&mut signals);
        for name in [
            "clock",
            "if_id_instruction",
            "fetch_pc",
            "id_ex_opcode",
            "id_ex_immediate",
            "pc_current",
            "pc_next",
            "branch_taken",
            "execution_result",
        ] {
            assert!(signals.find(name).is_some(), "{name}");
        }
        assert_eq!(signals.find("execution_result"), Some(w.result.id()));
        assert_eq!(signals.len(), 14);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Fetch < Stage::Decode);
        assert!(Stage::Decode < Stage::Execute);
    }
}
