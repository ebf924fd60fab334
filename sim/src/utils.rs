use binutils::clap::builder::styling::{AnsiColor, Effects, Style};

use crate::{isa::MEM_WORDS, state::DataMemory};

pub const GRN: Style = AnsiColor::Green.on_default();
pub const GRNB: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
pub const RED: Style = AnsiColor::Red.on_default();
pub const GRAY: Style = AnsiColor::BrightBlack.on_default();

pub fn paint(style: Style, text: impl std::fmt::Display) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// One `R{i}: {value}` line per register, for the first `n` registers.
pub fn format_regs(regs: &[u32], n: usize) -> String {
    let mut s = String::new();
    for (i, v) in regs.iter().enumerate().take(n) {
        s.push_str(&format!("R{}: {}\n", i, v));
    }
    s
}

/// Words that differ between two memory images, as (address, old, new).
pub fn mem_changes(left: &DataMemory, right: &DataMemory) -> Vec<(usize, u32, u32)> {
    let (l, r) = (left.words(), right.words());
    (0..MEM_WORDS)
        .filter(|&i| l[i] != r[i])
        .map(|i| (i, l[i], r[i]))
        .collect()
}

pub fn mem_diff(left: &DataMemory, right: &DataMemory) {
    for (addr, old, new) in mem_changes(left, right) {
        println!(
            "{}: {} -> {}",
            paint(GRAY, format_args!("{:#06x}", addr)),
            paint(RED, format_args!("{:#010x}", old)),
            paint(GRN, format_args!("{:#010x}", new))
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_regs() {
        let mut regs = [0u32; 32];
        regs[1] = 10;
        regs[3] = 30;
        let s = format_regs(&regs, 4);
        assert_eq!(s, "R0: 0\nR1: 10\nR2: 0\nR3: 30\n");
        assert_eq!(format_regs(&regs, 100).lines().count(), 32);
    }

    #[test]
    fn test_mem_changes() {
        let before = DataMemory::default();
        let mut after = before.clone();
        after.write(3, 7).unwrap();
        after.write(1023, 1).unwrap();
        assert_eq!(mem_changes(&before, &after), vec![(3, 0, 7), (1023, 0, 1)]);
        assert!(mem_changes(&after, &after).is_empty());
    }
}
