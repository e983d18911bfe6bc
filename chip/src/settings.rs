//! The construction time configuration of the machine.
//!
//! Most incompatibilities between programs trace back to a handful of
//! behaviours that drifted between the original COSMAC VIP interpreter and
//! later reimplementations. Each of those behaviours is a toggle here, and
//! the default is always the original machine.

use crate::definitions::cpu;

/// The recognised option set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Instruction cycles per second the scheduler aims for.
    pub cpu_hz: u32,
    /// `8XY1`/`8XY2`/`8XY3` clear `VF` after the operation.
    pub or_and_xor_resets_vf: bool,
    /// `FX55`/`FX65` leave `I` pointing past the copied registers.
    pub fx55_fx65_increments_i: bool,
    /// `8XY6`/`8XYE` shift `VY` into `VX` instead of shifting `VX` in place.
    pub shift_uses_vy: bool,
    /// `DXYN` clips sprite pixels past the screen edge instead of wrapping
    /// them around to the opposite side.
    pub dxyn_clip_else_wrap: bool,
    /// Step over opcodes the decoder does not recognise instead of halting.
    pub skip_unknown_opcodes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cpu_hz: cpu::HERTZ,
            or_and_xor_resets_vf: true,
            fx55_fx65_increments_i: true,
            shift_uses_vy: true,
            dxyn_clip_else_wrap: true,
            skip_unknown_opcodes: false,
        }
    }
}
