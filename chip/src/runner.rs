//! The scheduler driving the machine against its collaborators.
//!
//! Handles the per cycle work: gating on a pending key wait, stepping the
//! machine and handing the framebuffer to the display whenever a draw was
//! requested. The timers run on their own worker threads, so the only rate
//! the scheduler paces is the instruction rate.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use crate::{
    chip8::ChipSet,
    devices::{DisplayCommands, KeyboardCommands},
    opcode::Operation,
    resources::Rom,
    settings::Settings,
    timer::{TimedWorker, TimerCallback},
    ProcessError,
};

/// A collection of all the important interfaces.
/// Is primarily used to simplify the crate api.
pub struct Controller<D, K, W, S>
where
    D: DisplayCommands,
    K: KeyboardCommands,
    W: TimedWorker,
    S: TimerCallback,
{
    /// The display adapter, so that it can be driven during execution.
    display: D,
    /// The keyboard adapter, so that key events can be registered and read.
    keyboard: K,
    /// The all important machine implementation.
    chipset: Option<ChipSet<W, S>>,
    /// The operation the last cycle requested.
    operation: Operation,
    /// The configuration handed to every machine built by this controller.
    settings: Settings,
}

impl<D, K, W, S> Controller<D, K, W, S>
where
    D: DisplayCommands,
    K: KeyboardCommands,
    W: TimedWorker,
    S: TimerCallback,
{
    /// Creates a new controller with the default configuration.
    pub fn new(dis: D, key: K) -> Self {
        Self::with_settings(dis, key, Settings::default())
    }

    /// Creates a new controller with the given configuration.
    pub fn with_settings(dis: D, key: K, settings: Settings) -> Self {
        Controller {
            display: dis,
            keyboard: key,
            chipset: None,
            operation: Operation::None,
            settings,
        }
    }

    /// Get a reference to the controller's chipset.
    pub fn chipset(&self) -> &Option<ChipSet<W, S>> {
        &self.chipset
    }

    /// Get a mutable reference to the controller's chipset.
    pub fn chipset_mut(&mut self) -> Option<&mut ChipSet<W, S>> {
        self.chipset.as_mut()
    }

    /// Boots a machine for the given rom, sharing the keyboard latch.
    pub fn set_rom(&mut self, rom: Rom) {
        let chipset = ChipSet::with_keyboard(rom, self.settings, self.keyboard.get_keyboard());
        self.chipset = Some(chipset);
        self.operation = Operation::None;
    }

    /// Removes the rom and resets to the empty state.
    pub fn remove_rom(&mut self) {
        self.chipset = None;
        self.operation = Operation::None;
    }

    /// Get a mutable reference to the controller's keyboard.
    pub fn keyboard(&mut self) -> &mut K {
        &mut self.keyboard
    }

    /// Get a reference to the controller's display.
    pub fn display(&self) -> &D {
        &self.display
    }

    /// Get the controller's last operation.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Get the controller's configuration.
    pub fn settings(&self) -> Settings {
        self.settings
    }
}

/// The single cycle entry point, to be called at the configured cpu rate.
///
/// A pending key wait suspends the machine without blocking: the cycle is
/// simply skipped until the host has fed a key release into the latch. On
/// an execution error the machine state is logged before the error is
/// handed up.
pub fn run<D, K, W, S>(
    Controller {
        display,
        keyboard,
        chipset,
        operation,
        ..
    }: &mut Controller<D, K, W, S>,
) -> Result<(), ProcessError>
where
    D: DisplayCommands,
    K: KeyboardCommands,
    W: TimedWorker,
    S: TimerCallback,
{
    // Checks if the last operation was a wait and if processing can
    // continue.
    if *operation == Operation::Wait && !keyboard.was_released() {
        return Ok(());
    }

    // Extract the chip from the chipset option
    let chip = chipset.as_mut().ok_or(ProcessError::UninitializedChipset)?;

    // run chip
    *operation = match chip.step() {
        Ok(operation) => operation,
        Err(err) => {
            log::error!("execution halted: {}\n{}", err, chip);
            return Err(err);
        }
    };

    // Checks if we can redraw the screen after this or not.
    if *operation == Operation::Draw {
        /* draw the screen */
        display.display(chip.framebuffer());
    }

    Ok(())
}

/// Drives the machine at the configured cpu rate until `quit` is raised.
///
/// `pump` runs before every cycle so the host can feed pending key events
/// into the latch. The quit flag also terminates a pending key wait, as the
/// wait never blocks the thread.
pub fn run_until_quit<D, K, W, S, P>(
    controller: &mut Controller<D, K, W, S>,
    quit: &AtomicBool,
    mut pump: P,
) -> Result<(), ProcessError>
where
    D: DisplayCommands,
    K: KeyboardCommands,
    W: TimedWorker,
    S: TimerCallback,
    P: FnMut(&mut K),
{
    let rate = controller.settings.cpu_hz.max(1);
    let tick = Duration::from_micros(1_000_000 / u64::from(rate));

    while !quit.load(Ordering::Relaxed) {
        let begin = Instant::now();

        pump(&mut controller.keyboard);
        run(controller)?;

        // sleep away the rest of the cycle
        if let Some(remainder) = tick.checked_sub(begin.elapsed()) {
            thread::sleep(remainder);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::RwLock;

    use super::*;
    use crate::{
        devices::Keyboard,
        timer::{NoCallback, Worker},
    };

    #[mockall::automock]
    trait InternalDCommands {
        fn display(&self);
    }

    struct DisplayAdapter<M>
    where
        M: InternalDCommands,
    {
        da: M,
    }

    impl<MD> DisplayCommands for DisplayAdapter<MD>
    where
        MD: InternalDCommands,
    {
        fn display<M: AsRef<[u8]>>(&mut self, _buffer: M) {
            self.da.display()
        }
    }

    /// A keyboard adapter backed by the real latch, so the tests can inject
    /// events the way a host would.
    struct KeyboardAdapter {
        keyboard: Arc<RwLock<Keyboard>>,
    }

    impl KeyboardAdapter {
        fn new() -> Self {
            Self {
                keyboard: Arc::new(RwLock::new(Keyboard::new())),
            }
        }
    }

    impl KeyboardCommands for KeyboardAdapter {
        fn set_key(&mut self, key: usize, to: bool) {
            self.keyboard.write().set_key(key, to);
        }

        fn was_released(&self) -> bool {
            self.keyboard.read().was_released()
        }

        fn get_keyboard(&mut self) -> Arc<RwLock<Keyboard>> {
            self.keyboard.clone()
        }
    }

    fn controller_with_display(
        times: usize,
    ) -> Controller<DisplayAdapter<MockInternalDCommands>, KeyboardAdapter, Worker, NoCallback>
    {
        let mut mock_display = MockInternalDCommands::new();
        mock_display.expect_display().times(times).return_const(());
        let da = DisplayAdapter { da: mock_display };

        Controller::new(da, KeyboardAdapter::new())
    }

    #[test]
    fn test_run_without_rom() {
        let mut controller = controller_with_display(0);

        assert_eq!(Err(ProcessError::UninitializedChipset), run(&mut controller));
    }

    #[test]
    fn test_run_draws_on_clear() {
        let mut controller = controller_with_display(1);

        // clear the screen, then loop in place
        let rom = Rom::new("clear", vec![0x00, 0xE0, 0x12, 0x02]).unwrap();
        controller.set_rom(rom);

        assert_eq!(Ok(()), run(&mut controller));
        assert_eq!(Operation::Draw, controller.operation());

        // the jump does not redraw
        assert_eq!(Ok(()), run(&mut controller));
        assert_eq!(Operation::None, controller.operation());
    }

    #[test]
    fn test_wait_gates_until_a_release() {
        let mut controller = controller_with_display(1);

        // wait for a key, then clear the screen
        let rom = Rom::new("wait", vec![0xF1, 0x0A, 0x00, 0xE0]).unwrap();
        controller.set_rom(rom);

        // the wait is entered
        assert_eq!(Ok(()), run(&mut controller));
        assert_eq!(Operation::Wait, controller.operation());

        // nothing arrived, the machine is not stepped
        assert_eq!(Ok(()), run(&mut controller));
        assert_eq!(Operation::Wait, controller.operation());

        // a press alone does not finish the wait
        controller.keyboard().set_key(0x7, true);
        assert_eq!(Ok(()), run(&mut controller));
        assert_eq!(Operation::Wait, controller.operation());

        // the release does: the wait completes and the clear runs
        controller.keyboard().set_key(0x7, false);
        assert_eq!(Ok(()), run(&mut controller));
        assert_eq!(Operation::Draw, controller.operation());
    }

    #[test]
    fn test_halt_is_reported() {
        let mut controller = controller_with_display(0);

        // a machine code call is not supported
        let rom = Rom::new("syscall", vec![0x02, 0x34]).unwrap();
        controller.set_rom(rom);

        assert!(run(&mut controller).is_err());
    }
}
