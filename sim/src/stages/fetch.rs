use crate::{
    error::SimError,
    framework::{Sensitivity, Signal, SignalPool},
    isa::{Instruction, INST_BYTES},
};

/// Instruction fetch. Holds the program and the index of the next
/// instruction; the only clocked stage.
#[derive(Debug)]
pub struct FetchStage {
    pub(crate) clk: Signal<bool>,
    pub(crate) branch_taken: Signal<bool>,
    pub(crate) pc_next: Signal<u32>,
    pub(crate) instruction_out: Signal<Instruction>,
    pub(crate) pc_out: Signal<u32>,
    pub(crate) program: Vec<Instruction>,
    /// index of the next instruction to fetch
    pub(crate) pc: usize,
    pub(crate) fetched: u64,
}

impl FetchStage {
    pub fn sensitivity(&self) -> Sensitivity {
        Sensitivity::PosEdge(self.clk.id())
    }

    /// Fetch on a rising edge. A branch resolved by execute in the previous
    /// cycle redirects the pc first.
    pub fn fetch(&mut self, signals: &mut SignalPool) -> Result<(), SimError> {
        if signals.read(self.branch_taken) {
            let target = signals.read(self.pc_next);
            tracing::debug!("redirect fetch to {:#x}", target);
            self.pc = (target / INST_BYTES) as usize;
        }
        let Some(inst) = self.program.get(self.pc).copied() else {
            return Err(SimError::FetchOutOfBounds {
                pc: self.pc,
                len: self.program.len(),
            });
        };
        let addr = (self.pc as u32).wrapping_mul(INST_BYTES);
        tracing::debug!("fetch {:#x}: {}", addr, inst);
        signals.write(self.instruction_out, inst);
        signals.write(self.pc_out, addr);
        self.pc += 1;
        self.fetched += 1;
        Ok(())
    }

    pub fn program(&self) -> &[Instruction] {
        &self.program
    }
}
