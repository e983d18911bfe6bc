//! The per opcode semantics written for this [`chipset`](super::InternalChipSet).
//! This implementation was split up into this file for smaller file sizes and
//! higher cohesion.

use tinyvec::ArrayVec;

use crate::{
    definitions::display::{self, fontset, framebuffer},
    opcode::*,
    OpcodeError, ProcessError,
};

use super::InternalChipSet;

impl ChipOpcodes for InternalChipSet {
    fn zero(&mut self, ops: Zero) -> Result<(ProgramCounterStep, Operation), ProcessError> {
        match ops {
            Zero::Clear => {
                // 00E0
                // clear display
                self.memory.clear_framebuffer();
                Ok((ProgramCounterStep::Next, Operation::Draw))
            }
            Zero::Return => {
                // 00EE
                // return from subroutine => pop from stack
                let pc = self.pop_stack()?;
                Ok((ProgramCounterStep::Jump(pc), Operation::None))
            }
            Zero::System(nnn) => {
                // 0NNN
                // machine code routines only existed on the original
                // hardware, they halt the interpreter
                Err(OpcodeError::Unsupported(nnn as Opcode).into())
            }
        }
    }

    fn one(&self, One { nnn }: One) -> Result<ProgramCounterStep, ProcessError> {
        // 1NNN
        // Jumps to address NNN.
        Ok(ProgramCounterStep::Jump(nnn))
    }

    fn two(&mut self, Two { nnn }: Two) -> Result<ProgramCounterStep, ProcessError> {
        // 2NNN
        // Calls subroutine at NNN. The pushed address already points past
        // the call, so a later return resumes at the following instruction.
        self.push_stack(self.registers.pc() + ProgramCounterStep::Next.step())?;
        Ok(ProgramCounterStep::Jump(nnn))
    }

    fn three(&self, Three { x, nn }: Three) -> Result<ProgramCounterStep, ProcessError> {
        // 3XNN
        // Skips the next instruction if VX equals NN.
        Ok(ProgramCounterStep::cond(self.registers[x] == nn))
    }

    fn four(&self, Four { x, nn }: Four) -> Result<ProgramCounterStep, ProcessError> {
        // 4XNN
        // Skips the next instruction if VX doesn't equal NN.
        Ok(ProgramCounterStep::cond(self.registers[x] != nn))
    }

    fn five(&self, Five { x, y }: Five) -> Result<ProgramCounterStep, ProcessError> {
        // 5XY0
        // Skips the next instruction if VX equals VY.
        Ok(ProgramCounterStep::cond(
            self.registers[x] == self.registers[y],
        ))
    }

    fn six(&mut self, Six { x, nn }: Six) -> Result<ProgramCounterStep, ProcessError> {
        // 6XNN
        // Sets VX to NN.
        self.registers[x] = nn;
        Ok(ProgramCounterStep::Next)
    }

    fn seven(&mut self, Seven { x, nn }: Seven) -> Result<ProgramCounterStep, ProcessError> {
        // 7XNN
        // Adds NN to VX, letting the result wrap. The carry flag is not
        // changed.
        self.registers[x] = self.registers[x].wrapping_add(nn);
        Ok(ProgramCounterStep::Next)
    }

    fn eight(&mut self, Eight { ops, x, y }: Eight) -> Result<ProgramCounterStep, ProcessError> {
        match ops {
            EightOpcode::Zero => {
                // 8XY0
                // Sets VX to the value of VY.
                self.registers[x] = self.registers[y];
            }
            EightOpcode::One => {
                // 8XY1
                // Sets VX to VX or VY. The original machine clears the flag
                // register on the way.
                self.registers[x] = self.registers[x] | self.registers[y];
                if self.settings.or_and_xor_resets_vf {
                    self.registers.set_flag(false);
                }
            }
            EightOpcode::Two => {
                // 8XY2
                // Sets VX to VX and VY.
                self.registers[x] = self.registers[x] & self.registers[y];
                if self.settings.or_and_xor_resets_vf {
                    self.registers.set_flag(false);
                }
            }
            EightOpcode::Three => {
                // 8XY3
                // Sets VX to VX xor VY.
                self.registers[x] = self.registers[x] ^ self.registers[y];
                if self.settings.or_and_xor_resets_vf {
                    self.registers.set_flag(false);
                }
            }
            EightOpcode::Four => {
                // 8XY4
                // Adds VY to VX. VF is set to 1 when there's a carry, and to
                // 0 when there isn't. VF is written after the sum.
                let (res, carry) = self.registers[x].overflowing_add(self.registers[y]);
                self.registers[x] = res;
                self.registers.set_flag(carry);
            }
            EightOpcode::Five => {
                // 8XY5
                // VY is subtracted from VX. VF is set to 0 when there's a
                // borrow, and 1 when there isn't.
                let (res, borrow) = self.registers[x].overflowing_sub(self.registers[y]);
                self.registers[x] = res;
                self.registers.set_flag(!borrow);
            }
            EightOpcode::Six => {
                // 8XY6
                // Shifts right by one, VF holds the dropped bit. The
                // original machine shifts VY into VX, later ones shift VX in
                // place.
                let src = if self.settings.shift_uses_vy {
                    self.registers[y]
                } else {
                    self.registers[x]
                };
                self.registers[x] = src >> 1;
                self.registers.set_flag(src & 1 == 1);
            }
            EightOpcode::Seven => {
                // 8XY7
                // Sets VX to VY minus VX. VF is set to 0 when there's a
                // borrow, and 1 when there isn't.
                let (res, borrow) = self.registers[y].overflowing_sub(self.registers[x]);
                self.registers[x] = res;
                self.registers.set_flag(!borrow);
            }
            EightOpcode::E => {
                // 8XYE
                // Shifts left by one, VF holds the dropped bit.
                let src = if self.settings.shift_uses_vy {
                    self.registers[y]
                } else {
                    self.registers[x]
                };
                self.registers[x] = src << 1;
                self.registers.set_flag(src & 0x80 == 0x80);
            }
        }

        Ok(ProgramCounterStep::Next)
    }

    fn nine(&self, Nine { x, y }: Nine) -> Result<ProgramCounterStep, ProcessError> {
        // 9XY0
        // Skips the next instruction if VX doesn't equal VY.
        Ok(ProgramCounterStep::cond(
            self.registers[x] != self.registers[y],
        ))
    }

    fn a(&mut self, A { nnn }: A) -> Result<ProgramCounterStep, ProcessError> {
        // ANNN
        // Sets I to the address NNN.
        self.registers.set_i(nnn);
        Ok(ProgramCounterStep::Next)
    }

    fn b(&self, B { nnn }: B) -> Result<ProgramCounterStep, ProcessError> {
        // BNNN
        // Jumps to the address NNN plus V0, wrapped to the 12 bit address
        // space.
        let v0 = self.registers[0] as usize;
        Ok(ProgramCounterStep::Jump(
            (nnn + v0) & OPCODE_MASK_0FFF as usize,
        ))
    }

    fn c(&mut self, C { x, nn }: C) -> Result<ProgramCounterStep, ProcessError> {
        // CXNN
        // Sets VX to a random byte masked with NN.
        //
        // using a fill_bytes call here, as the RngCore trait does not
        // support a plain random u8.
        let mut rand: [u8; 1] = [0];
        self.rng.fill_bytes(&mut rand);
        self.registers[x] = nn & rand[0];
        Ok(ProgramCounterStep::Next)
    }

    fn d(&mut self, D { x, y, n }: D) -> Result<(ProgramCounterStep, Operation), ProcessError> {
        // DXYN
        // Draws the N row sprite at I to the coordinates (VX, VY). The rows
        // are xored onto the screen, VF reports whether any set pixel was
        // erased. The start coordinates wrap, pixels running past the edge
        // are clipped (or wrapped, depending on the configuration).
        let index = self.registers.i();
        let origin_x = self.registers[x] as usize % display::WIDTH;
        let origin_y = self.registers[y] as usize % display::HEIGHT;

        // the rows are copied out so the framebuffer below stays writable
        let mut rows: ArrayVec<[u8; 15]> = ArrayVec::new();
        rows.extend_from_slice(self.memory.read_range(index, n)?);

        let mut collision = false;

        for (row, byte) in rows.iter().enumerate() {
            let mut py = origin_y + row;
            if py >= display::HEIGHT {
                if self.settings.dxyn_clip_else_wrap {
                    break;
                }
                py %= display::HEIGHT;
            }

            for bit in 0..8 {
                let mut px = origin_x + bit;
                if px >= display::WIDTH {
                    if self.settings.dxyn_clip_else_wrap {
                        break;
                    }
                    px %= display::WIDTH;
                }

                if byte & (0x80 >> bit) == 0 {
                    continue;
                }

                let address = framebuffer::LOCATION + py * framebuffer::BYTES_PER_ROW + px / 8;
                let mask = 0x80 >> (px % 8);
                let current = self.memory.read8(address)?;

                if current & mask != 0 {
                    collision = true;
                }
                self.memory.write8(address, current ^ mask)?;
            }
        }

        self.registers.set_flag(collision);
        Ok((ProgramCounterStep::Next, Operation::Draw))
    }

    fn e(&self, E { ops, x }: E) -> Result<ProgramCounterStep, ProcessError> {
        let key = (self.registers[x] & 0x0F) as usize;
        let is_down = self.get_keyboard_read().is_down(key);

        let skip = match ops {
            EOpcode::Pressed => {
                // EX9E
                // Skips the next instruction if the key stored in VX is
                // pressed.
                is_down
            }
            EOpcode::NotPressed => {
                // EXA1
                // Skips the next instruction if the key stored in VX isn't
                // pressed.
                !is_down
            }
        };
        Ok(ProgramCounterStep::cond(skip))
    }

    fn f(&mut self, F { ops, x }: F) -> Result<(ProgramCounterStep, Operation), ProcessError> {
        let mut op = Operation::None;
        let mut pcs = ProgramCounterStep::Next;

        match ops {
            FOpcode::GetDelayTimer => {
                // FX07
                // Sets VX to the value of the delay timer.
                self.registers[x] = self.get_delay_timer();
            }
            FOpcode::AwaitKeyRelease => {
                // FX0A
                // Halts execution until a full key press has been observed.
                // The completion runs before the next fetch, once the
                // scheduler has seen a release arrive in the latch.
                let callback_after_release = move |chip: &mut Self| {
                    let key = chip
                        .get_keyboard_write()
                        .take_released()
                        .expect("the wait completion requires a latched key release");
                    chip.registers[x] = key as u8;
                    // move the counter past the waiting instruction
                    chip.step(ProgramCounterStep::Next);
                };

                op = Operation::Wait;
                // don't move the counter until the completion has run
                pcs = ProgramCounterStep::None;

                // discard a stale release so only an event from after this
                // point finishes the wait
                let _ = self.get_keyboard_write().take_released();

                self.preprocessor = Some(Box::new(callback_after_release));
            }
            FOpcode::SetDelayTimer => {
                // FX15
                // Sets the delay timer to VX.
                self.delay_timer.set_value(self.registers[x]);
            }
            FOpcode::SetSoundTimer => {
                // FX18
                // Sets the sound timer to VX.
                self.sound_timer.set_value(self.registers[x]);
            }
            FOpcode::AddVxToI => {
                // FX1E
                // Adds VX to I. VF is not affected.
                let i = self.registers.i();
                self.registers
                    .set_i((i + self.registers[x] as usize) & OPCODE_MASK_FFFF as usize);
            }
            FOpcode::SetIToSprite => {
                // FX29
                // Sets I to the location of the font glyph for the low
                // nibble of VX.
                let glyph = (self.registers[x] & 0x0F) as usize;
                let address = fontset::LOCATION + glyph * fontset::CHAR_HEIGHT;

                if address + fontset::CHAR_HEIGHT > fontset::LOCATION + fontset::FONTSET.len() {
                    return Err(ProcessError::FontOutOfRange(self.registers[x]));
                }

                self.registers.set_i(address);
            }
            FOpcode::StoreBCD => {
                // FX33
                // Stores the decimal digits of VX at I, I+1 and I+2, the
                // hundreds first.
                let i = self.registers.i();
                let r = self.registers[x];

                self.memory.write8(i, r / 100)?;
                self.memory.write8(i + 1, r / 10 % 10)?;
                self.memory.write8(i + 2, r % 10)?;
            }
            FOpcode::StoreV0ToVx => {
                // FX55
                // Stores V0 to VX (including VX) in memory starting at
                // address I. The original machine leaves I pointing past the
                // copied registers, later ones leave it untouched.
                let i = self.registers.i();
                for offset in 0..=x {
                    self.memory.write8(i + offset, self.registers[offset])?;
                }

                if self.settings.fx55_fx65_increments_i {
                    self.registers.set_i(i + x + 1);
                }
            }
            FOpcode::FillV0ToVx => {
                // FX65
                // Fills V0 to VX (including VX) with values from memory
                // starting at address I. Same I handling as FX55.
                let i = self.registers.i();
                for offset in 0..=x {
                    self.registers[offset] = self.memory.read8(i + offset)?;
                }

                if self.settings.fx55_fx65_increments_i {
                    self.registers.set_i(i + x + 1);
                }
            }
        }
        Ok((pcs, op))
    }
}
