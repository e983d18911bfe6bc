//! The human readable state dump written for both the
//! [`internal chipset`](super::InternalChipSet) and the
//! [`external`](super::ChipSet) one.
//! The scheduler prints this when execution halts on an error, so the dump
//! leads with the program counter context.

use std::fmt::{self, Write};

use once_cell::sync::Lazy;

use crate::{
    definitions::{cpu, memory},
    timer::{TimedWorker, TimerCallback},
};

use super::{ChipSet, InternalChipSet};

impl<W, S> fmt::Display for ChipSet<W, S>
where
    W: TimedWorker,
    S: TimerCallback,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chipset())
    }
}

/// opcodes shown per memory dump row
const HEX_PRINT_STEP: usize = 8;

/// the row width of a single dump line
const ROW_WIDTH: usize = HEX_PRINT_STEP * memory::opcodes::SIZE;

/// The filler line standing in for a run of all zero rows. Precomputed once,
/// as the width depends on the row layout above.
static ZERO_FILLER: Lazy<String> = Lazy::new(|| {
    let zeros = format!("{:04X}", 0);
    // a full row is HEX_PRINT_STEP opcodes with single spaces in between
    let width = HEX_PRINT_STEP * (zeros.len() + 1) - 1;
    let pad = " ".repeat((width - 2 * zeros.len() - 3) / 2);
    format!("{}{}...{}{}", zeros, pad, pad, zeros)
});

/// will render the ram as opcode rows, collapsing runs of zero rows
fn opcode_rows(ram: &[u8]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let mut filler_pending = false;

    for start in (0..ram.len()).step_by(ROW_WIDTH) {
        let end = (start + ROW_WIDTH).min(ram.len());
        let chunk = &ram[start..end];

        if chunk.iter().all(|&byte| byte == 0) {
            filler_pending = true;
            continue;
        }

        if filler_pending {
            writeln!(out, "\t\t{}", &*ZERO_FILLER)?;
            filler_pending = false;
        }

        write!(out, "\t\t{:#06X} - {:#06X} :", start, end - 1)?;
        for pair in chunk.chunks(memory::opcodes::SIZE) {
            write!(out, " {:02X}{:02X}", pair[0], pair.get(1).unwrap_or(&0))?;
        }
        writeln!(out)?;
    }

    if filler_pending {
        writeln!(out, "\t\t{}", &*ZERO_FILLER)?;
    }

    Ok(out)
}

/// will render a register style slice as a single hex row
fn hex_row<T: fmt::UpperHex + Copy>(data: &[T]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write!(out, "\t\t")?;
    for value in data {
        write!(out, "{:#06X} ", *value)?;
    }
    Ok(out.trim_end().to_string())
}

/// will render the keyboard as a down state row
fn key_row(keys: &[bool]) -> String {
    let mut out = String::from("\t\t");
    for &key in keys {
        out.push(if key { '#' } else { '.' });
        out.push(' ');
    }
    out.trim_end().to_string()
}

impl fmt::Display for InternalChipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the stack is padded up to its capacity so the dump width is stable
        let mut stack = [0; cpu::stack::SIZE];
        stack[0..self.stack.len()].copy_from_slice(&self.stack);

        let ram = self
            .memory
            .read_range(0, memory::SIZE)
            .map_err(|_| fmt::Error)?;

        write!(
            f,
            "Chipset {{\n\
                \tProgram Name :\n\t\t{}\n\
                \tProgram Counter :\n\t\t{:#06X}\n\
                \tIndex Register :\n\t\t{:#06X}\n\
                \tStack Depth :\n\t\t{}\n\
                \tRegisters :\n{}\n\
                \tStack :\n{}\n\
                \tKeyboard :\n{}\n\
                \tMemory :\n{}\
            }}",
            self.name,
            self.registers.pc(),
            self.registers.i(),
            self.stack.len(),
            hex_row(self.registers.as_slice())?,
            hex_row(&stack[..])?,
            key_row(self.get_keyboard_read().get_keys()),
            opcode_rows(ram)?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::get_default_chip;

    #[test]
    fn test_dump_leads_with_the_counter() {
        let chip = get_default_chip();
        let dump = format!("{}", chip);

        assert!(dump.contains("Program Counter :\n\t\t0x0200"));
        assert!(dump.contains("Stack Depth :\n\t\t0"));
    }

    #[test]
    fn test_zero_runs_are_collapsed() {
        let chip = get_default_chip();
        let dump = format!("{}", chip);

        // the empty space between the font and the program collapses into
        // one filler line
        assert!(dump.contains("..."));
        // 4 KiB of ram would be 256 full rows, the dump stays far below
        assert!(dump.lines().count() < 120);
    }
}
