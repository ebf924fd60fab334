use crate::{
    framework::{Sensitivity, Signal, SignalId, SignalPool},
    isa::{pack_immediate, Instruction},
};

/// Fields handed from decode to execute. The same shape is used for the
/// values (`DecodedFields`) and for the signals carrying them
/// (`DecodedFields<Signal<u32>>`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFields<T = u32> {
    pub opcode: T,
    pub rs: T,
    pub rt: T,
    pub rd: T,
    pub shamt: T,
    pub funct: T,
    pub immediate: T,
}

impl From<Instruction> for DecodedFields {
    fn from(inst: Instruction) -> Self {
        Self {
            opcode: inst.opcode,
            rs: inst.rs,
            rt: inst.rt,
            rd: inst.rd,
            shamt: inst.shamt,
            funct: inst.funct,
            immediate: pack_immediate(inst.rt, inst.rd),
        }
    }
}

impl DecodedFields {
    pub fn mnemonic(&self) -> Option<&'static str> {
        Instruction::new(
            self.opcode,
            self.rs,
            self.rt,
            self.rd,
            self.shamt,
            self.funct,
        )
        .mnemonic()
    }
}

impl DecodedFields<Signal<u32>> {
    pub fn new(signals: &mut SignalPool) -> Self {
        Self {
            opcode: signals.add("id_ex_opcode", 0),
            rs: signals.add("id_ex_rs", 0),
            rt: signals.add("id_ex_rt", 0),
            rd: signals.add("id_ex_rd", 0),
            shamt: signals.add("id_ex_shamt", 0),
            funct: signals.add("id_ex_funct", 0),
            immediate: signals.add("id_ex_immediate", 0),
        }
    }

    pub fn read(&self, signals: &SignalPool) -> DecodedFields {
        DecodedFields {
            opcode: signals.read(self.opcode),
            rs: signals.read(self.rs),
            rt: signals.read(self.rt),
            rd: signals.read(self.rd),
            shamt: signals.read(self.shamt),
            funct: signals.read(self.funct),
            immediate: signals.read(self.immediate),
        }
    }

    pub fn write(&self, signals: &mut SignalPool, fields: &DecodedFields) {
        signals.write(self.opcode, fields.opcode);
        signals.write(self.rs, fields.rs);
        signals.write(self.rt, fields.rt);
        signals.write(self.rd, fields.rd);
        signals.write(self.shamt, fields.shamt);
        signals.write(self.funct, fields.funct);
        signals.write(self.immediate, fields.immediate);
    }

    pub fn ids(&self) -> [SignalId; 7] {
        [
            self.opcode.id(),
            self.rs.id(),
            self.rt.id(),
            self.rd.id(),
            self.shamt.id(),
            self.funct.id(),
            self.immediate.id(),
        ]
    }
}

/// Instruction decode. Stateless: it splits the fetched instruction into
/// fields and forwards the address it was fetched from.
#[derive(Debug)]
pub struct DecodeStage {
    pub(crate) instruction_in: Signal<Instruction>,
    pub(crate) pc_in: Signal<u32>,
    pub(crate) fields_out: DecodedFields<Signal<u32>>,
    pub(crate) pc_out: Signal<u32>,
}

impl DecodeStage {
    pub fn sensitivity(&self) -> Sensitivity {
        Sensitivity::Change(vec![self.instruction_in.id(), self.pc_in.id()])
    }

    pub fn decode(&self, signals: &mut SignalPool) {
        let inst = signals.read(self.instruction_in);
        let pc = signals.read(self.pc_in);
        tracing::trace!("decode {:#x}: {}", pc, inst);
        self.fields_out.write(signals, &DecodedFields::from(inst));
        signals.write(self.pc_out, pc);
    }
}
