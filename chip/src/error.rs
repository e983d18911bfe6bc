use std::io;

use thiserror::Error;

use crate::opcode::Opcode;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum ProcessError {
    #[error("Invalid memory access '{0}'.")]
    Memory(#[from] MemoryError),
    #[error("Invalid opcode state '{0}'.")]
    Opcode(#[from] OpcodeError),
    #[error("Invalid stack state '{0}'.")]
    Stack(#[from] StackError),
    #[error("No font glyph exists for the value {0:#04X}.")]
    FontOutOfRange(u8),
    #[error("There is no valid chipset initialized.")]
    UninitializedChipset,
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum MemoryError {
    #[error("The address {0:#05X} lies outside of the addressable ram.")]
    AddressOutOfRange(usize),
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum OpcodeError {
    #[error("Machine code routines are not supported {0:#06X}.")]
    Unsupported(Opcode),
    #[error("An unknown opcode was used {0:#06X}.")]
    Unknown(Opcode),
}

#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum StackError {
    #[error("Stack is full!")]
    Full,
    #[error("Stack is empty!")]
    Empty,
}

#[derive(Error, Debug)]
pub enum RomError {
    #[error("A program of {size} bytes does not fit the {max} byte program region.")]
    TooLarge { size: usize, max: usize },
    #[error("Unable to read the program image: {0}")]
    Io(#[from] io::Error),
}
