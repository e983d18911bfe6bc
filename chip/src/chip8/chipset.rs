//! The machine state and its stepping logic.

use std::{convert::TryFrom, sync::Arc, time::Duration};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rand::RngCore;
use tinyvec::ArrayVec;

use crate::{
    definitions::{cpu, keyboard, timer},
    devices::Keyboard,
    memory::Memory,
    opcode::{
        ChipOpcodePreProcessHandler, ChipOpcodes, Opcode, Opcodes, Operation, ProgramCounter,
        ProgramCounterStep,
    },
    registers::Registers,
    resources::Rom,
    settings::Settings,
    timer::{NoCallback, TimedWorker, Timer, TimerCallback, TimerValue},
    OpcodeError, ProcessError, StackError,
};

/// The chipset struct containing the machine state and the timers.
/// The struct has been split up into two instances to simplify the
/// implementation: the wrapper only exists to keep the timer workers alive
/// for as long as the machine runs.
pub struct ChipSet<W, S>
where
    W: TimedWorker,
    S: TimerCallback,
{
    /// The actual machine implementation.
    chipset: InternalChipSet,
    /// Holds the delay timer worker so it is not dropped early.
    _delay_timer: Timer<W, u8, NoCallback>,
    /// Holds the sound timer worker, including the tone hooks.
    _sound_timer: Timer<W, u8, S>,
}

impl<W, S> ChipSet<W, S>
where
    W: TimedWorker,
    S: TimerCallback + 'static,
{
    /// Creates a machine from the given rom, owning its keyboard.
    pub fn new(rom: Rom, settings: Settings) -> Self {
        Self::with_keyboard(rom, settings, Arc::new(RwLock::new(Keyboard::new())))
    }

    /// Creates a machine sharing the keyboard latch with the host.
    pub fn with_keyboard(
        rom: Rom,
        settings: Settings,
        keyboard: Arc<RwLock<Keyboard>>,
    ) -> Self {
        let (delay_timer, delay_value) = Timer::new(0, Duration::from_millis(timer::INTERVAL));
        let (sound_timer, sound_value) =
            Timer::with_callback(0, Duration::from_millis(timer::INTERVAL), S::new());
        let chipset = InternalChipSet::new(rom, settings, delay_value, sound_value, keyboard);

        Self {
            chipset,
            _delay_timer: delay_timer,
            _sound_timer: sound_timer,
        }
    }

    /// Will run one fetch / decode / execute cycle.
    /// Returns the operation that has to be run by the caller.
    pub fn step(&mut self) -> Result<Operation, ProcessError> {
        self.chipset.next()
    }

    /// Will borrow the packed framebuffer for presentation.
    pub fn framebuffer(&self) -> &[u8] {
        self.chipset.framebuffer()
    }

    /// Will set the given key state in the keyboard latch.
    pub fn set_key(&mut self, key: usize, to: bool) {
        self.chipset.set_key(key, to);
    }

    /// Will write the whole keyboard state into the latch.
    pub fn set_keyboard(&mut self, keys: &[bool; keyboard::SIZE]) {
        self.chipset.set_keyboard(keys);
    }

    /// will return the sound timer
    pub fn get_sound_timer(&self) -> u8 {
        self.chipset.get_sound_timer()
    }

    /// will return the delay timer
    pub fn get_delay_timer(&self) -> u8 {
        self.chipset.get_delay_timer()
    }

    /// Get a reference to the chip set's internals.
    pub(super) fn chipset(&self) -> &InternalChipSet {
        &self.chipset
    }
}

/// The InternalChipSet struct represents the current state of the machine:
/// the ram, the register file, the call stack and the device plumbing.
pub(super) struct InternalChipSet {
    /// name of the loaded program
    pub(super) name: String,
    /// The ram, with the font at the bottom and the packed framebuffer at
    /// the top.
    pub(super) memory: Memory,
    /// The data registers, the address register `I` and the program
    /// counter.
    pub(super) registers: Registers,
    /// The return addresses of the active subroutine calls. The capacity
    /// bounds the nesting depth to 16 levels.
    pub(super) stack: ArrayVec<[usize; cpu::stack::SIZE]>,
    /// Counts down at 60 Hz, until it reaches 0. Programs time their events
    /// with it.
    pub(super) delay_timer: TimerValue<u8>,
    /// Counts down at 60 Hz, until it reaches 0. A beeping sound plays
    /// while its value is nonzero.
    pub(super) sound_timer: TimerValue<u8>,
    /// The latch shared with the key scanning collaborator.
    pub(super) keyboard: Arc<RwLock<Keyboard>>,
    /// The random number generator backing `CXNN`. Boxed so tests can swap
    /// in a deterministic one.
    pub(super) rng: Box<dyn RngCore + Send>,
    /// The stored completion of a suspended key wait; runs before the next
    /// fetch.
    pub(super) preprocessor: Option<Box<dyn FnOnce(&mut Self) + Send>>,
    /// The quirk configuration the machine was built with.
    pub(super) settings: Settings,
}

impl InternalChipSet {
    /// will create a new chipset object
    pub fn new(
        rom: Rom,
        settings: Settings,
        delay_timer: TimerValue<u8>,
        sound_timer: TimerValue<u8>,
        keyboard: Arc<RwLock<Keyboard>>,
    ) -> Self {
        let mut memory = Memory::new();
        memory.load_rom(&rom);

        Self {
            name: rom.get_name().to_string(),
            memory,
            registers: Registers::new(),
            stack: ArrayVec::new(),
            delay_timer,
            sound_timer,
            keyboard,
            rng: Box::new(rand::rngs::OsRng {}),
            preprocessor: None,
            settings,
        }
    }

    /// Will read the two instruction bytes at the program counter.
    pub fn fetch(&self) -> Result<Opcode, ProcessError> {
        Ok(self.memory.read16(self.registers.pc())?)
    }

    /// Will advance the program by a single cycle: finish a pending key
    /// wait, fetch, decode and execute.
    pub fn next(&mut self) -> Result<Operation, ProcessError> {
        self.preprocess();

        let opcode = self.fetch()?;

        match Opcodes::try_from(opcode) {
            Ok(ops) => self.calc(ops),
            Err(OpcodeError::Unknown(_)) if self.settings.skip_unknown_opcodes => {
                self.step(ProgramCounterStep::Next);
                Ok(Operation::None)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub(super) fn get_keyboard_write(&mut self) -> RwLockWriteGuard<Keyboard> {
        self.keyboard.write()
    }

    pub(super) fn get_keyboard_read(&self) -> RwLockReadGuard<Keyboard> {
        self.keyboard.read()
    }

    /// Will write the whole keyboard state into the latch.
    pub fn set_keyboard(&mut self, keys: &[bool; keyboard::SIZE]) {
        self.get_keyboard_write().set_mult(keys);
    }

    /// Will set the value of the given key
    pub fn set_key(&mut self, key: usize, to: bool) {
        self.get_keyboard_write().set_key(key, to)
    }

    /// will return the sound timer
    pub fn get_sound_timer(&self) -> u8 {
        self.sound_timer.get_value()
    }

    /// will return the delay timer
    pub fn get_delay_timer(&self) -> u8 {
        self.delay_timer.get_value()
    }

    /// Will borrow the packed framebuffer region.
    pub fn framebuffer(&self) -> &[u8] {
        self.memory.framebuffer()
    }

    /// Will push the given return address onto the stack.
    pub fn push_stack(&mut self, pointer: usize) -> Result<(), StackError> {
        if self.stack.len() == self.stack.capacity() {
            Err(StackError::Full)
        } else {
            self.stack.push(pointer);
            Ok(())
        }
    }

    /// Will pop the most recent return address from the stack.
    pub fn pop_stack(&mut self) -> Result<usize, StackError> {
        self.stack.pop().ok_or(StackError::Empty)
    }
}

impl ProgramCounter for InternalChipSet {
    fn step(&mut self, step: ProgramCounterStep) {
        let pc = if let ProgramCounterStep::Jump(_) = step {
            step.step()
        } else {
            self.registers.pc() + step.step()
        };
        self.registers.set_pc(pc);
    }
}

impl ChipOpcodePreProcessHandler for InternalChipSet {
    fn preprocess(&mut self) {
        if let Some(func) = self.preprocessor.take() {
            func(self);
        }
    }
}
