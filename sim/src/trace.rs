//! Waveform export. Recorders only observe committed signal changes, nothing
//! flows back into the simulation.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use crate::framework::{SignalId, Value};

/// Signals traced by default: the ones worth looking at in a waveform viewer.
pub const DEFAULT_TRACED: [&str; 5] = [
    "clock",
    "pc_current",
    "pc_next",
    "branch_taken",
    "execution_result",
];

/// A signal declared to a recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceVar {
    pub id: SignalId,
    pub name: &'static str,
    pub initial: Value,
}

pub trait TraceRecorder {
    /// Called once, before any change, with the traced signals and their
    /// values at `time_ns`.
    fn declare(&mut self, time_ns: u64, vars: &[TraceVar]) -> io::Result<()>;
    fn record_change(&mut self, time_ns: u64, id: SignalId, value: Value) -> io::Result<()>;
    fn finalize(&mut self, time_ns: u64) -> io::Result<()>;
}

/// Writes a Value Change Dump with a 1 ns timescale.
#[derive(Debug)]
pub struct VcdRecorder<W: Write> {
    out: W,
    codes: BTreeMap<SignalId, String>,
    last_time: Option<u64>,
}

impl VcdRecorder<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

/// Short identifier made of printable ASCII characters, as VCD requires.
fn id_code(mut n: usize) -> String {
    let mut code = String::new();
    loop {
        code.push((b'!' + (n % 94) as u8) as char);
        n /= 94;
        if n == 0 {
            break;
        }
    }
    code
}

fn format_value(value: Value, code: &str) -> String {
    match value {
        Value::Bit(b) => format!("{}{}", b as u8, code),
        Value::Word(w) => format!("b{:b} {}", w, code),
        Value::Inst(inst) => format!("b{:b} {}", inst.encode(), code),
    }
}

impl<W: Write> VcdRecorder<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            codes: BTreeMap::new(),
            last_time: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn stamp(&mut self, time_ns: u64) -> io::Result<()> {
        if self.last_time != Some(time_ns) {
            writeln!(self.out, "#{}", time_ns)?;
            self.last_time = Some(time_ns);
        }
        Ok(())
    }
}

impl<W: Write> TraceRecorder for VcdRecorder<W> {
    fn declare(&mut self, time_ns: u64, vars: &[TraceVar]) -> io::Result<()> {
        writeln!(self.out, "$version {} {} $end", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))?;
        writeln!(self.out, "$timescale 1ns $end")?;
        writeln!(self.out, "$scope module pipeline $end")?;
        for (i, var) in vars.iter().enumerate() {
            let code = id_code(i);
            writeln!(
                self.out,
                "$var wire {} {} {} $end",
                var.initial.width(),
                code,
                var.name
            )?;
            self.codes.insert(var.id, code);
        }
        writeln!(self.out, "$upscope $end")?;
        writeln!(self.out, "$enddefinitions $end")?;

        self.stamp(time_ns)?;
        writeln!(self.out, "$dumpvars")?;
        for var in vars {
            let line = format_value(var.initial, &self.codes[&var.id]);
            writeln!(self.out, "{}", line)?;
        }
        writeln!(self.out, "$end")
    }

    fn record_change(&mut self, time_ns: u64, id: SignalId, value: Value) -> io::Result<()> {
        let Some(code) = self.codes.get(&id) else {
            return Ok(());
        };
        let line = format_value(value, code);
        self.stamp(time_ns)?;
        writeln!(self.out, "{}", line)
    }

    fn finalize(&mut self, time_ns: u64) -> io::Result<()> {
        self.stamp(time_ns)?;
        self.out.flush()
    }
}
