//! Architectural state owned by the execute stage.

use crate::{
    error::SimError,
    isa::{MEM_WORDS, NUM_REGS},
};

/// We use a 32-bit integer array of length 32 to represent the register file.
pub type RegFile = [u32; NUM_REGS];

/// Word-addressed data memory. An address is an index into the word array,
/// it is never scaled by the word size.
#[derive(Clone, PartialEq, Eq)]
pub struct DataMemory {
    words: Box<[u32; MEM_WORDS]>,
}

impl Default for DataMemory {
    fn default() -> Self {
        Self {
            words: Box::new([0; MEM_WORDS]),
        }
    }
}

impl std::fmt::Debug for DataMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.words.iter().filter(|w| **w != 0).count();
        write!(f, "DataMemory({} non-zero words)", used)
    }
}

impl DataMemory {
    fn check(addr: u32) -> Result<usize, SimError> {
        let index = addr as usize;
        if index < MEM_WORDS {
            Ok(index)
        } else {
            Err(SimError::MemoryOutOfBounds {
                addr,
                size: MEM_WORDS,
            })
        }
    }

    pub fn read(&self, addr: u32) -> Result<u32, SimError> {
        Ok(self.words[Self::check(addr)?])
    }

    /// Store `value` at `addr`. Memory is left untouched on error.
    pub fn write(&mut self, addr: u32, value: u32) -> Result<(), SimError> {
        self.words[Self::check(addr)?] = value;
        Ok(())
    }

    pub fn words(&self) -> &[u32; MEM_WORDS] {
        &self.words
    }
}

/// Register file plus data memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchState {
    pub(crate) regs: RegFile,
    pub(crate) mem: DataMemory,
}

impl ArchState {
    /// Read a register. Register 0 reads whatever was last written to it.
    pub fn reg(&self, index: usize) -> Option<u32> {
        self.regs.get(index).copied()
    }

    /// Harness-side register write. Index 0 and indices past the file are
    /// silently ignored, unlike writes made by instructions.
    pub fn set_reg(&mut self, index: usize, value: u32) {
        if index > 0 && index < NUM_REGS {
            self.regs[index] = value;
        }
    }

    /// Register write performed by an instruction. The `rt`/`rd` fields are
    /// five bits wide, wider values wrap into the file.
    pub(crate) fn write_reg(&mut self, index: u32, value: u32) {
        let index = index as usize % NUM_REGS;
        tracing::info!("write back: r{} = {:#x}", index, value);
        self.regs[index] = value;
    }

    /// Register read performed by an instruction, see [`ArchState::write_reg`].
    pub(crate) fn read_reg(&self, index: u32) -> u32 {
        self.regs[index as usize % NUM_REGS]
    }

    pub fn regs(&self) -> &RegFile {
        &self.regs
    }

    pub fn mem(&self) -> &DataMemory {
        &self.mem
    }

    pub(crate) fn mem_mut(&mut self) -> &mut DataMemory {
        &mut self.mem
    }
}
