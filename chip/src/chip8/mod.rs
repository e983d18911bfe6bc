//! The full machine implementation, from the state over the per opcode
//! semantics to a human readable state dump.
mod chipset;
mod opcodes;
mod print;

/// reexport chipset structs and data for simpler usage
pub use chipset::*;
