//! Program containers and loading.

use std::{fs, path::Path};

use crate::{definitions::memory::program, RomError};

/// A program image, bounded to the program region of the ram.
///
/// The bytes are loaded contiguously at the start of the program region,
/// there is no header and no byte swapping.
#[derive(Clone)]
pub struct Rom {
    /// The rom name
    name: String,
    /// The raw program bytes stored as a u8 slice on the heap
    data: Box<[u8]>,
}

impl Rom {
    /// Will wrap raw program bytes, rejecting images larger than the
    /// program region.
    pub fn new(name: &str, data: Vec<u8>) -> Result<Self, RomError> {
        if data.len() > program::SIZE {
            return Err(RomError::TooLarge {
                size: data.len(),
                max: program::SIZE,
            });
        }

        Ok(Rom {
            name: name.to_string(),
            data: data.into_boxed_slice(),
        })
    }

    /// Will read a program image from disk; the file stem becomes the name.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RomError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("unnamed");
        let data = fs::read(path)?;

        Rom::new(name, data)
    }

    /// Will return a slice of the program bytes
    pub fn get_data(&self) -> &[u8] {
        &self.data
    }

    /// Will return the name of the rom.
    pub fn get_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_to_program_region() {
        // exactly filling the region is fine
        let rom = Rom::new("full", vec![0; 0xCA0]);
        assert!(rom.is_ok());

        // one byte more is not
        let rom = Rom::new("overfull", vec![0; 0xCA1]);
        assert!(matches!(
            rom,
            Err(RomError::TooLarge {
                size: 0xCA1,
                max: 0xCA0
            })
        ));
    }

    #[test]
    fn test_keeps_bytes_and_name() {
        let rom = Rom::new("pong", vec![0x12, 0x00]).unwrap();

        assert_eq!("pong", rom.get_name());
        assert_eq!(&[0x12, 0x00], rom.get_data());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join("chip8-vip-rom-test.ch8");
        fs::write(&path, [0x00u8, 0xE0, 0x12, 0x00]).unwrap();

        let rom = Rom::from_file(&path).unwrap();
        assert_eq!("chip8-vip-rom-test", rom.get_name());
        assert_eq!(&[0x00, 0xE0, 0x12, 0x00], rom.get_data());

        fs::remove_file(&path).unwrap();
    }
}
