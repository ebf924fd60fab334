//! Program sources: the built-in demo and a plain text format.
//!
//! The text format has one instruction per line written as its six raw
//! fields, `opcode rs rt rd shamt funct`, in decimal or `0x` hex. Fields may
//! be separated by commas, `#` starts a comment.
use anyhow::{bail, Context, Result};
use pest::Parser;
use pest_derive::Parser;

use crate::isa::{funct_code, op_code, Instruction};

#[derive(Parser)]
#[grammar = "src/program.pest"] // relative to the package root
struct ProgramParser;

/// Registers preloaded for the demo program.
pub const DEMO_REGISTERS: [(usize, u32); 3] = [(1, 10), (2, 20), (3, 30)];

/// `ADD R3, R1, R2; LW R4, 4(R1); SW R5, 8(R1)`
///
/// The memory instructions keep their offset in `funct`, where the decode
/// stage does not look for it, so they end up addressing far outside memory.
pub fn demo() -> Vec<Instruction> {
    vec![
        Instruction::rtype(funct_code::ADD, 3, 1, 2),
        Instruction::new(op_code::LW, 1, 4, 0, 0, 4),
        Instruction::new(op_code::SW, 1, 5, 0, 0, 8),
    ]
}

fn parse_number(s: &str) -> Result<u32> {
    let r = match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    r.with_context(|| format!("`{}` is not a 32-bit number", s))
}

/// Parse a program in the text format.
pub fn parse_program(src: &str) -> Result<Vec<Instruction>> {
    let main = ProgramParser::parse(Rule::main, src)
        .context("fail to parse program")?
        .next()
        .context("empty parse tree")?;

    let mut program = Vec::new();
    for pair in main.into_inner().filter(|p| p.as_rule() == Rule::inst) {
        let (line, _) = pair.as_span().start_pos().line_col();
        let fields = pair
            .into_inner()
            .map(|p| parse_number(p.as_str()))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("line {}", line))?;
        let [opcode, rs, rt, rd, shamt, funct] = fields[..] else {
            bail!("line {}: expected 6 fields, found {}", line, fields.len());
        };
        let inst = Instruction::new(opcode, rs, rt, rd, shamt, funct);
        if !inst.fits_encoding() {
            bail!("line {}: field out of range ({})", line, inst);
        }
        program.push(inst);
    }
    tracing::debug!("parsed {} instructions", program.len());
    Ok(program)
}

/// Read and parse a program file.
pub fn load_program(path: impl AsRef<std::path::Path>) -> Result<Vec<Instruction>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read file `{}`", path.display()))?;
    parse_program(&content).with_context(|| format!("invalid program `{}`", path.display()))
}
