//! Instruction set of the MIPS subset understood by the pipeline.

macro_rules! define_code {
    {
        @mod $modname:ident;
        @type $typ:ty;
        $( $cname:ident = $cval:expr; )*
    } => {
        pub mod $modname {
            $(pub const $cname : $typ = $cval; )*
            #[allow(unused)]
            pub fn name_of(code: $typ) -> &'static str {
                match code {
                    $($cname => stringify!($cname), )*
                    _ => "no name"
                }
            }
        }
    };
}

define_code! {
    @mod op_code;
    @type u32;
    RTYPE = 0x00;
    J = 0x02;
    BEQ = 0x04;
    BNE = 0x05;
    ADDI = 0x08;
    LW = 0x23;
    SW = 0x2b;
}

define_code! {
    @mod funct_code;
    @type u32;
    ADD = 0x20;
    SUB = 0x22;
    AND = 0x24;
    OR = 0x25;
    SLT = 0x2a;
}

/// Number of general purpose registers.
pub const NUM_REGS: usize = 32;
/// Number of words in data memory.
pub const MEM_WORDS: usize = 1024;
/// Size of one instruction when the program counter is seen as an address.
pub const INST_BYTES: u32 = 4;

/// A single instruction. Every field is kept as a full word even though
/// only the low bits are meaningful.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub opcode: u32,
    pub rs: u32,
    pub rt: u32,
    pub rd: u32,
    pub shamt: u32,
    pub funct: u32,
}

impl Instruction {
    pub const fn new(opcode: u32, rs: u32, rt: u32, rd: u32, shamt: u32, funct: u32) -> Self {
        Self {
            opcode,
            rs,
            rt,
            rd,
            shamt,
            funct,
        }
    }

    /// Build an R-type instruction `funct rd, rs, rt`.
    pub const fn rtype(funct: u32, rd: u32, rs: u32, rt: u32) -> Self {
        Self::new(op_code::RTYPE, rs, rt, rd, 0, funct)
    }

    /// Whether every field fits in its encoding width.
    pub fn fits_encoding(&self) -> bool {
        self.opcode < 64
            && self.rs < 32
            && self.rt < 32
            && self.rd < 32
            && self.shamt < 32
            && self.funct < 64
    }

    /// Pack the fields into the classic 32-bit R-format word. Only used to
    /// give traces a single value per instruction.
    pub fn encode(&self) -> u32 {
        (self.opcode & 0x3f) << 26
            | (self.rs & 0x1f) << 21
            | (self.rt & 0x1f) << 16
            | (self.rd & 0x1f) << 11
            | (self.shamt & 0x1f) << 6
            | (self.funct & 0x3f)
    }

    /// Mnemonic of the instruction, if it is one the execute stage knows.
    pub fn mnemonic(&self) -> Option<&'static str> {
        let name = if self.opcode == op_code::RTYPE {
            funct_code::name_of(self.funct)
        } else {
            op_code::name_of(self.opcode)
        };
        (name != "no name").then_some(name)
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Opcode: {:#x}, RS: {}, RT: {}, RD: {}, Shamt: {}, Funct: {:#x}",
            self.opcode, self.rs, self.rt, self.rd, self.shamt, self.funct
        )
    }
}

/// The immediate synthesized by the decode stage. This is not the standard
/// MIPS immediate field: `rt` lands in the upper half and `rd` in the lower.
pub fn pack_immediate(rt: u32, rd: u32) -> u32 {
    (rt << 16) | rd
}

/// Widen the low 16 bits of `value` as a signed quantity. Bits above 15 are
/// kept as they are when bit 15 is clear.
pub fn sign_extend16(value: u32) -> i32 {
    if value & 0x8000 != 0 {
        (value | 0xFFFF_0000) as i32
    } else {
        value as i32
    }
}

/// R-type ALU. Returns `None` for a funct code without defined behavior.
pub fn alu_compute(op1: u32, op2: u32, funct: u32) -> Option<u32> {
    use funct_code::*;
    match funct {
        ADD => Some(op1.wrapping_add(op2)),
        SUB => Some(op1.wrapping_sub(op2)),
        AND => Some(op1 & op2),
        OR => Some(op1 | op2),
        SLT => Some(((op1 as i32) < (op2 as i32)) as u32),
        _ => None,
    }
}
