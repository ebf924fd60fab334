use super::decode::DecodedFields;
use crate::{
    error::SimError,
    framework::{Sensitivity, Signal, SignalPool},
    isa::{alu_compute, op_code::*, sign_extend16},
    state::ArchState,
};

/// Output signals of the execute stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutput {
    pub result: u32,
    pub pc_next: u32,
    pub branch_taken: bool,
}

/// Target of a taken BEQ/BNE.
pub fn branch_target(curr_pc: u32, immediate: u32) -> u32 {
    let offset = (sign_extend16(immediate) as u32) << 2;
    curr_pc.wrapping_add(offset).wrapping_sub(4)
}

/// Target of J: the region of the next instruction plus the word index.
pub fn jump_target(curr_pc: u32, immediate: u32) -> u32 {
    (curr_pc.wrapping_add(4) & 0xF000_0000) | (immediate << 2)
}

fn effective_addr(base: u32, immediate: u32) -> u32 {
    base.wrapping_add(sign_extend16(immediate) as u32)
}

/// Execute stage. The only owner of the register file and data memory.
#[derive(Debug)]
pub struct ExecuteStage {
    pub(crate) fields_in: DecodedFields<Signal<u32>>,
    pub(crate) pc_in: Signal<u32>,
    pub(crate) result: Signal<u32>,
    pub(crate) pc_next: Signal<u32>,
    pub(crate) branch_taken: Signal<bool>,
    pub(crate) state: ArchState,
    pub(crate) executed: u64,
}

impl ExecuteStage {
    pub fn sensitivity(&self) -> Sensitivity {
        let mut ids = self.fields_in.ids().to_vec();
        ids.push(self.pc_in.id());
        Sensitivity::Change(ids)
    }

    /// Execute one instruction against the architectural state.
    ///
    /// `out` is reset to the defaults (`result = 0`, `pc_next = curr_pc`, no
    /// branch) first and keeps them if an error is returned. Register and
    /// memory writes happen here, before the caller publishes `out`.
    ///
    /// R-type results are only reported in `out.result`; they are never
    /// written back to `rd`.
    pub fn execute(
        &mut self,
        f: &DecodedFields,
        curr_pc: u32,
        out: &mut ExecOutput,
    ) -> Result<(), SimError> {
        *out = ExecOutput {
            result: 0,
            pc_next: curr_pc,
            branch_taken: false,
        };
        self.executed += 1;
        let op1 = self.state.read_reg(f.rs);
        let op2 = self.state.read_reg(f.rt);

        match f.opcode {
            RTYPE => {
                out.result =
                    alu_compute(op1, op2, f.funct).ok_or(SimError::UnsupportedFunct(f.funct))?;
            }
            ADDI => {
                let res = effective_addr(op1, f.immediate);
                self.state.write_reg(f.rt, res);
                out.result = res;
            }
            LW => {
                let addr = effective_addr(op1, f.immediate);
                let res = self.state.mem().read(addr)?;
                self.state.write_reg(f.rt, res);
                out.result = res;
            }
            SW => {
                let addr = effective_addr(op1, f.immediate);
                self.state.mem_mut().write(addr, op2)?;
                tracing::info!("store: mem[{:#x}] = {:#x}", addr, op2);
            }
            BEQ | BNE => {
                if (op1 == op2) == (f.opcode == BEQ) {
                    out.branch_taken = true;
                    out.pc_next = branch_target(curr_pc, f.immediate);
                }
            }
            J => {
                out.pc_next = jump_target(curr_pc, f.immediate);
                out.branch_taken = true;
            }
            op => return Err(SimError::UnsupportedOpcode(op)),
        }
        Ok(())
    }

    /// The process body: read the decoded fields, execute, publish outputs.
    /// Outputs are published even when execution fails.
    pub fn run(&mut self, signals: &mut SignalPool) -> Result<(), SimError> {
        let fields = self.fields_in.read(signals);
        let curr_pc = signals.read(self.pc_in);
        let mut out = ExecOutput::default();
        let r = self.execute(&fields, curr_pc, &mut out);
        if r.is_ok() {
            tracing::debug!(
                "execute {:#x}: {} -> result {:#x}, pc_next {:#x}, taken {}",
                curr_pc,
                fields.mnemonic().unwrap_or("?"),
                out.result,
                out.pc_next,
                out.branch_taken
            );
        }
        signals.write(self.result, out.result);
        signals.write(self.pc_next, out.pc_next);
        signals.write(self.branch_taken, out.branch_taken);
        r
    }

    pub fn state(&self) -> &ArchState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ArchState {
        &mut self.state
    }
}
