//! Abstractions over the keyboard and display collaborators.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::definitions::keyboard;

/// The trait the rasteriser implements to receive the screen content.
pub trait DisplayCommands {
    /// Will present the packed framebuffer, 8 pixels per byte with the most
    /// significant bit leftmost, 8 bytes per row.
    fn display<M: AsRef<[u8]>>(&mut self, buffer: M);
}

/// The trait the key scanning collaborator implements.
pub trait KeyboardCommands {
    /// Will write a single key state into the latch.
    fn set_key(&mut self, key: usize, to: bool);
    /// True while the latch holds an unconsumed key release.
    fn was_released(&self) -> bool;
    /// Hands out the latch shared with the machine.
    fn get_keyboard(&mut self) -> Arc<RwLock<Keyboard>>;
}

/// The sixteen key latch together with the slot holding the most recent key
/// release.
///
/// Input is done with a hex keyboard that has 16 keys ranging `0-F`. Three
/// opcodes touch it: two skip on the current down state of a single key, the
/// third suspends execution until a full press has been observed. The
/// release slot exists for that third one: it is latched on every down to up
/// transition and consumed by the waiting instruction.
#[derive(Default, Debug)]
pub struct Keyboard {
    keys: [bool; keyboard::SIZE],
    last_released: Option<usize>,
}

impl Keyboard {
    /// Will initiate a new keyboard
    pub fn new() -> Self {
        Keyboard::default()
    }

    /// Will set the given key to a state; a down to up transition is latched
    /// as the last release.
    pub fn set_key(&mut self, key: usize, to: bool) {
        log::debug!("key {:#03X} - state {}", key, to);

        // check if the key state has changed or not
        if self.keys[key] == to {
            return;
        }

        if !to {
            self.last_released = Some(key);
        }

        self.keys[key] = to;
    }

    pub fn press(&mut self, key: usize) {
        self.set_key(key, true);
    }

    pub fn release(&mut self, key: usize) {
        self.set_key(key, false);
    }

    pub fn is_down(&self, key: usize) -> bool {
        self.keys[key]
    }

    /// Will overwrite the whole latch, latching any key that flipped from
    /// down to up.
    pub fn set_mult(&mut self, keys: &[bool; keyboard::SIZE]) {
        for key in 0..keyboard::SIZE {
            if self.keys[key] && !keys[key] {
                self.last_released = Some(key);
            }
        }
        self.keys.copy_from_slice(keys);
    }

    /// Will get all the keys
    pub fn get_keys(&self) -> &[bool] {
        &self.keys
    }

    /// True while an unconsumed release is latched.
    pub fn was_released(&self) -> bool {
        self.last_released.is_some()
    }

    /// Consumes and returns the latched release.
    pub fn take_released(&mut self) -> Option<usize> {
        self.last_released.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_down_state() {
        let mut keyboard = Keyboard::new();

        assert!(!keyboard.is_down(0x7));
        keyboard.press(0x7);
        assert!(keyboard.is_down(0x7));
        keyboard.release(0x7);
        assert!(!keyboard.is_down(0x7));
    }

    #[test]
    fn test_release_is_latched_and_consumed() {
        let mut keyboard = Keyboard::new();

        // a press alone latches nothing
        keyboard.press(0x7);
        assert!(!keyboard.was_released());

        keyboard.release(0x7);
        assert!(keyboard.was_released());

        assert_eq!(Some(0x7), keyboard.take_released());
        assert!(!keyboard.was_released());
        assert_eq!(None, keyboard.take_released());
    }

    #[test]
    fn test_repeated_state_does_not_latch() {
        let mut keyboard = Keyboard::new();

        // releasing an up key is not a transition
        keyboard.release(0x3);
        assert!(!keyboard.was_released());
    }

    #[test]
    fn test_bulk_updates_latch_transitions() {
        let mut keyboard = Keyboard::new();
        keyboard.press(0x2);

        let mut keys = [false; 16];
        keys[0x5] = true;
        keyboard.set_mult(&keys);

        assert!(keyboard.is_down(0x5));
        assert!(!keyboard.is_down(0x2));
        assert_eq!(Some(0x2), keyboard.take_released());
    }
}
