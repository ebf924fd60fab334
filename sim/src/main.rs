use std::{fs::File, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use binutils::{clap, verbose};
use clap::Parser;
use mips_sim::{
    format_regs, mem_diff, paint, program, FatalPolicy, Pipeline, SimConfig, SimError,
    VcdRecorder, DEFAULT_RUN_NS, GRAY, GRNB, RED,
};

fn parse_word(s: &str) -> Result<u32, String> {
    let r = match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse::<u32>().ok().or_else(|| s.parse::<i32>().ok().map(|v| v as u32)),
    };
    r.ok_or_else(|| format!("`{}` is not a 32-bit value", s))
}

fn parse_reg(s: &str) -> Result<(usize, u32), String> {
    let (idx, val) = s
        .split_once('=')
        .ok_or_else(|| format!("expected IDX=VAL, got `{}`", s))?;
    let idx = idx
        .trim()
        .trim_start_matches(['r', 'R'])
        .parse()
        .map_err(|e| format!("bad register index `{}`: {}", idx, e))?;
    Ok((idx, parse_word(val.trim())?))
}

// Three-stage MIPS-subset pipeline simulator
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    styles = binutils::get_styles(),
)]
struct Args {
    /// Program file, one `opcode rs rt rd shamt funct` line per instruction
    ///
    /// Runs the built-in demo program (with R1=10, R2=20, R3=30) when
    /// omitted.
    program: Option<PathBuf>,

    /// Preload a register, e.g. `--reg 1=10` (repeatable)
    #[arg(long = "reg", value_name = "IDX=VAL", value_parser = parse_reg)]
    regs: Vec<(usize, u32)>,

    /// Simulated time to run, in ns
    #[arg(short, long, default_value_t = DEFAULT_RUN_NS)]
    time: u64,

    /// Clock period in ns
    #[arg(long, default_value_t = SimConfig::default().clock_period_ns)]
    period: u64,

    /// Report fatal errors and keep simulating instead of halting
    #[arg(short, long)]
    keep_going: bool,

    /// Write a VCD waveform of the main pipeline signals
    #[arg(long, value_name = "PATH")]
    vcd: Option<PathBuf>,

    /// Number of registers shown before and after the run
    #[arg(long, default_value_t = 8)]
    dump: usize,

    /// Write logs to this file as JSON lines instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    verbose: verbose::Verbosity,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let log_file = match &args.log_file {
        Some(path) => Some(
            File::create(path)
                .with_context(|| format!("could not create file `{}`", path.display()))?,
        ),
        None => None,
    };
    binutils::logging_setup(
        binutils::verbose_level_to_trace(args.verbose.log_level()),
        log_file,
    );

    let (prog, regs) = match &args.program {
        Some(path) => (program::load_program(path)?, args.regs.clone()),
        None if args.regs.is_empty() => (program::demo(), program::DEMO_REGISTERS.to_vec()),
        None => (program::demo(), args.regs.clone()),
    };

    let config = SimConfig {
        clock_period_ns: args.period,
        fatal_policy: if args.keep_going {
            FatalPolicy::Report
        } else {
            FatalPolicy::Halt
        },
        ..Default::default()
    };
    let mut pipe = Pipeline::new(prog, config)?;
    for (idx, val) in regs {
        if idx == 0 || idx >= mips_sim::isa::NUM_REGS {
            tracing::warn!("register R{} is not writable, ignored", idx);
        }
        pipe.set_reg(idx, val);
    }
    if let Some(path) = &args.vcd {
        let vcd = VcdRecorder::create(path)
            .with_context(|| format!("could not create file `{}`", path.display()))?;
        pipe.attach_trace(Box::new(vcd))?;
    }

    println!("{}", paint(GRNB, "Initial register values:"));
    print!("{}", format_regs(pipe.regs(), args.dump));
    let mem_before = pipe.memory().clone();

    let outcome = pipe.run(args.time);
    pipe.finish_trace()?;

    println!("{}", paint(GRNB, "Final register values:"));
    print!("{}", format_regs(pipe.regs(), args.dump));
    mem_diff(&mem_before, pipe.memory());

    let failed = match &outcome {
        Ok(summary) => {
            if !summary.errors.is_empty() {
                println!(
                    "{}",
                    paint(
                        GRAY,
                        format_args!(
                            "{} errors reported, {} repeats suppressed",
                            summary.errors.len(),
                            summary.repeated
                        )
                    )
                );
            }
            summary
                .errors
                .iter()
                .any(|e| !matches!(e, SimError::FetchOutOfBounds { .. }))
        }
        // running off the end of the program is how every program stops
        Err(e @ SimError::FetchOutOfBounds { .. }) => {
            println!("{}", paint(GRAY, format_args!("halted: {}", e)));
            false
        }
        Err(e) => {
            println!("{}", paint(RED, format_args!("halted: {}", e)));
            true
        }
    };
    println!("Simulation completed at {} ns", pipe.now_ns());

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reg() {
        assert_eq!(parse_reg("1=10"), Ok((1, 10)));
        assert_eq!(parse_reg("R31 = 0xff"), Ok((31, 0xff)));
        assert_eq!(parse_reg("2=-1"), Ok((2, u32::MAX)));
        assert!(parse_reg("1").is_err());
        assert!(parse_reg("x=1").is_err());
        assert!(parse_reg("1=abc").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from(["mipsim", "--reg", "1=5", "--reg", "2=6", "-k"]).unwrap();
        assert!(args.program.is_none());
        assert_eq!(args.regs, vec![(1, 5), (2, 6)]);
        assert!(args.keep_going);
        assert_eq!(args.time, DEFAULT_RUN_NS);
        assert_eq!(args.period, 10);
    }
}
