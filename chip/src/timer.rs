//! The countdown timers of the machine.
//!
//! Both the delay and the sound timer drain at 60 Hz on a worker thread,
//! independent of the instruction rate. The machine reads and writes the
//! values through shared [`TimerValue`] handles.

use std::{
    sync::{
        mpsc::{self, RecvTimeoutError, SyncSender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use num_traits as num;
use parking_lot::{Mutex, RwLock};

/// The hooks a timer drives while it drains.
///
/// The sound collaborator implements this: the tone plays while ticks keep
/// arriving and stops when the timer hits zero.
pub trait TimerCallback: Send + 'static {
    /// Creates a new callback instance.
    fn new() -> Self;
    /// Called on every tick that finds the timer above zero.
    fn on_tick(&mut self);
    /// Called on the tick that drains the timer to zero.
    fn on_zero(&mut self);
}

/// An abstraction over the internal timer, so that
/// different worker implementations can be used.
pub trait TimedWorker {
    /// Will create the respective worker.
    fn new() -> Self;
    /// Will run the callback every interval.
    fn start<T>(&mut self, callback: T, interval: Duration)
    where
        T: Send + FnMut() + 'static;
    /// Will stop the timed worker
    fn stop(&mut self);
    /// Will check if the worker is currently working
    fn is_alive(&self) -> bool;
}

/// Empty implementation (default where there is no callback)
pub struct NoCallback;

impl TimerCallback for NoCallback {
    fn new() -> Self {
        Self {}
    }
    fn on_tick(&mut self) {}
    fn on_zero(&mut self) {}
}

/// The clonable value holder of the timer.
#[derive(Clone)]
pub struct TimerValue<V> {
    /// will store the value of the timer.
    value: Arc<RwLock<V>>,
}

impl<V: num::Unsigned + Copy> TimerValue<V> {
    /// Kept private so the only way to obtain a handle is through
    /// [`Timer::new`] or [`Timer::with_callback`].
    fn new(value: Arc<RwLock<V>>) -> Self {
        Self { value }
    }

    /// Setter for the internal value.
    pub fn set_value(&mut self, value: V) {
        let mut val = self.value.write();

        *val = value;
    }

    /// Getter for the internal value.
    pub fn get_value(&self) -> V {
        *self.value.read()
    }
}

/// A timer counting down to zero from any unsigned value.
pub struct Timer<W, V, S>
where
    W: TimedWorker,
    V: num::Unsigned,
    S: TimerCallback,
{
    /// will store the value of the timer
    value: Arc<RwLock<V>>,
    /// The worker draining the value at the configured interval.
    _worker: W,
    /// The optional hooks run while the timer drains.
    callback: Arc<Mutex<Option<S>>>,
}

impl<W, V> Timer<W, V, NoCallback>
where
    W: TimedWorker,
    V: num::Unsigned + std::cmp::PartialOrd<V> + Send + Sync + Copy + 'static,
{
    /// generates the default timer.
    pub fn new(value: V, interval: Duration) -> (Self, TimerValue<V>) {
        Self::internal_new(value, interval)
    }
}

impl<W, V, S> Timer<W, V, S>
where
    W: TimedWorker,
    V: num::Unsigned + std::cmp::PartialOrd<V> + Send + Sync + Copy + 'static,
    S: TimerCallback,
{
    /// Will actually generate the timer.
    /// This function has been abstracted out for simplicity.
    fn internal_new(value: V, interval: Duration) -> (Self, TimerValue<V>) {
        let cb: Arc<Mutex<Option<S>>> = Arc::new(Mutex::new(None));
        let mut worker = W::new();

        let value = Arc::new(RwLock::new(value));
        let rw_value = value.clone();
        let ccb = cb.clone();

        let func = move || {
            let mut cvalue = rw_value.write();

            let value = *cvalue;

            if value > V::zero() {
                // This lock is uncontended outside of callback setup.
                let mut lock = ccb.lock();

                if let Some(callback_handler) = lock.as_mut() {
                    callback_handler.on_tick();
                }

                *cvalue = value - V::one();

                if *cvalue == V::zero() {
                    if let Some(callback_handler) = lock.as_mut() {
                        callback_handler.on_zero();
                    }
                }
            }
        };

        worker.start(func, interval);

        (
            Self {
                value: value.clone(),
                _worker: worker,
                callback: cb,
            },
            TimerValue::new(value),
        )
    }

    /// Will create a new timer with the given drain hooks.
    pub fn with_callback(value: V, interval: Duration, handler: S) -> (Self, TimerValue<V>) {
        let (timer, value) = Self::internal_new(value, interval);
        {
            let mut lock = timer.callback.lock();
            *lock = Some(handler);
        }
        (timer, value)
    }

    /// The setter for the timer value.
    pub fn set_value(&mut self, value: V) {
        let mut val = self.value.write();

        *val = value;
    }

    /// The getter for the timer value at this current moment.
    pub fn get_value(&self) -> V {
        *self.value.read()
    }
}

/// Is the internal worker, that exists on the
/// second thread.
pub struct Worker {
    /// Contains the actual thread, that is running.
    thread: Option<JoinHandle<()>>,
    /// Contains the sync sender used to gracefully shutdown the thread.
    shutdown: Option<SyncSender<()>>,
    /// Counts the actual threads used (this is never more than 2, but
    /// is simple to use.) It uses an `()` so that it doesn't use
    /// up too much memory.
    alive: Arc<()>,
}

impl TimedWorker for Worker {
    /// Will initialize the new worker.
    fn new() -> Self {
        Self {
            thread: None,
            shutdown: None,
            alive: Arc::new(()),
        }
    }

    /// Will start the worker that will run the callback function
    /// every interval.
    /// Attention the timer assumes the callback will finish
    /// calculating faster than the interval.
    fn start<T>(&mut self, mut callback: T, interval: Duration)
    where
        T: Send + FnMut() + 'static,
    {
        // stop any action around
        self.stop();

        let (send, recv) = mpsc::sync_channel::<()>(1);
        let alive = self.alive.clone();
        let thread = thread::spawn(move || {
            // this is to count the references, as it will not actually
            // be used `_` is used in front of the name.
            let _alive = alive;
            let mut timeout = interval;

            while let Err(RecvTimeoutError::Timeout) = recv.recv_timeout(timeout) {
                let start = Instant::now();

                // run the callback function
                callback();

                // remove the time the callback took from the next wait
                let duration = start.elapsed();

                timeout = if interval <= duration {
                    Duration::from_secs(0)
                } else {
                    interval - duration
                };
            }
        });

        self.thread = Some(thread);
        self.shutdown = Some(send);
    }

    /// Will stop the worker.
    fn stop(&mut self) {
        // Will stop the worker, in two steps one by sending an empty message
        // and second by dropping the only sender for the given receiver.
        if let Some(sender) = self.shutdown.take() {
            sender
                .send(())
                .expect("This thread should be running here, but is not... Investigate.");
        }
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .expect("Something went wrong with joining the worker thread.")
        }
    }

    /// Checks if the thread is alive.
    fn is_alive(&self) -> bool {
        // This is okay as there can ever only be a single second thread
        // around, so a reference count change right during function
        // execution is rare.
        Arc::strong_count(&self.alive) > 1
    }
}

impl Drop for Worker {
    /// Will drop the worker
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::definitions::timer;

    #[test]
    fn test_timer_drains_to_zero() {
        let (mut timer, _): (Timer<Worker, u8, NoCallback>, _) =
            Timer::new(timer::HERTZ, Duration::from_millis(timer::INTERVAL));
        assert!(timer._worker.is_alive());

        std::thread::sleep(Duration::from_secs(1));
        assert_eq!(timer.get_value(), 0);

        timer._worker.stop();
        assert!(!timer._worker.is_alive());
    }

    #[test]
    fn test_value_handle_is_shared() {
        let (timer, mut value): (Timer<Worker, u8, NoCallback>, _) =
            Timer::new(0, Duration::from_millis(timer::INTERVAL));

        value.set_value(42);
        // both views observe the same state until the worker drains it
        assert!(timer.get_value() <= 42);
        assert!(value.get_value() <= 42);
    }

    static TICKED: AtomicUsize = AtomicUsize::new(0);
    static ZEROED: AtomicBool = AtomicBool::new(false);

    struct CountingCallback;

    impl TimerCallback for CountingCallback {
        fn new() -> Self {
            Self
        }

        fn on_tick(&mut self) {
            TICKED.fetch_add(1, Ordering::SeqCst);
        }

        fn on_zero(&mut self) {
            ZEROED.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_callback_runs_while_draining() {
        let (timer, _): (Timer<Worker, u8, CountingCallback>, _) =
            Timer::with_callback(5, Duration::from_millis(10), CountingCallback::new());

        std::thread::sleep(Duration::from_millis(300));

        assert_eq!(timer.get_value(), 0);
        assert_eq!(5, TICKED.load(Ordering::SeqCst));
        assert!(ZEROED.load(Ordering::SeqCst));
    }
}
