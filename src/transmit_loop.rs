use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::enttec::encode_send_dmx;
use crate::transport::{DmxTransport, TransportError, WriteCompletion};
use crate::universe::Universe;

/// Locks a mutex even if another thread panicked while holding it.
/// All guarded state stays consistent between statements, so it is safe to keep using it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counters of the transmit loop since it has been created.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmitStats {
    /// Frames the transport reported as fully drained.
    pub frames_sent: u64,
    /// Ticks that were dropped because the transport wasn't writable or still busy.
    pub ticks_skipped: u64,
    /// Writes the transport reported as failed.
    pub write_failures: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopPhase {
    /// No timer is scheduled.
    Idle,
    /// The timer fires every interval.
    Running,
}

pub(crate) struct LoopState<E> {
    phase: LoopPhase,
    /// Incremented on every start. A timer only ticks while its generation is the current one.
    generation: u64,
    write_in_flight: bool,
    active_timers: usize,
    fault: Option<TransportError<E>>,
    stats: TransmitStats,
}

impl<E> LoopState<E> {
    fn is_current(&self, generation: u64) -> bool {
        self.phase == LoopPhase::Running && self.generation == generation
    }
}

/// State shared between the loop, its timer thread and the write completions.
pub(crate) struct LoopShared<E> {
    state: Mutex<LoopState<E>>,
    wake: Condvar,
    /// Held by a tick from its state check until the transport accepted the frame.
    dispatch: Mutex<()>,
}

impl<E> LoopShared<E> {
    fn new() -> Self {
        Self {
            state: Mutex::new(LoopState {
                phase: LoopPhase::Idle,
                generation: 0,
                write_in_flight: false,
                active_timers: 0,
                fault: None,
                stats: TransmitStats::default(),
            }),
            wake: Condvar::new(),
            dispatch: Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoopState<E>> {
        lock(&self.state)
    }

    pub(crate) fn release_write(&self) {
        self.state().write_in_flight = false;
    }

    /// Blocks until the deadline passed. Returns false as soon as the generation got stopped.
    fn wait_until(&self, generation: u64, deadline: Instant) -> bool {
        let mut state = self.state();

        loop {
            if !state.is_current(generation) {
                return false;
            }

            let now = Instant::now();
            if now >= deadline {
                return true;
            }

            state = match self.wake.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl<E: core::fmt::Display> LoopShared<E> {
    pub(crate) fn finish_write(&self, result: Result<(), E>) {
        let mut state = self.state();
        state.write_in_flight = false;

        let error = match result {
            Ok(()) => {
                state.stats.frames_sent += 1;
                return;
            },
            Err(error) => error,
        };

        tracing::error!("writing dmx frame failed, stopping transmission: {error}");
        state.stats.write_failures += 1;
        state.phase = LoopPhase::Idle;

        if let Some(unreported) = state.fault.replace(TransportError::WriteFailure(error)) {
            tracing::warn!("replacing unreported transport fault: {unreported}");
        }

        drop(state);
        self.wake.notify_all();
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum TickOutcome {
    Dispatched,
    Skipped,
    Cancelled,
}

struct Ticker<T: DmxTransport> {
    shared: Arc<LoopShared<T::DriverError>>,
    transport: Arc<Mutex<T>>,
    universe: Arc<Mutex<Universe>>,
}

impl<T: DmxTransport> Clone for Ticker<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            transport: Arc::clone(&self.transport),
            universe: Arc::clone(&self.universe),
        }
    }
}

impl<T: DmxTransport> Ticker<T> {
    fn tick(&self, generation: u64) -> TickOutcome {
        let _dispatch = lock(&self.shared.dispatch);
        let writable = lock(&self.transport).is_writable();

        {
            let mut state = self.shared.state();
            if !state.is_current(generation) {
                return TickOutcome::Cancelled;
            }

            if !writable || state.write_in_flight {
                state.stats.ticks_skipped += 1;
                tracing::trace!(
                    writable,
                    write_in_flight = state.write_in_flight,
                    "skipping dmx tick"
                );
                return TickOutcome::Skipped;
            }

            state.write_in_flight = true;
        }

        // the universe lock makes sure a batch update is either fully in the frame or not at all
        let frame = encode_send_dmx(&lock(&self.universe));
        let completion = WriteCompletion::new(Arc::clone(&self.shared));

        tracing::trace!(length = frame.len(), "dispatching dmx frame");
        lock(&self.transport).write(frame, completion);

        TickOutcome::Dispatched
    }

    fn run(self, generation: u64, interval: Duration) {
        let mut next_tick = Instant::now().checked_add(interval);

        while let Some(deadline) = next_tick {
            if !self.shared.wait_until(generation, deadline) {
                break;
            }

            self.tick(generation);

            let now = Instant::now();
            next_tick = deadline.checked_add(interval).and_then(|next| {
                if next <= now {
                    // missed ticks are dropped instead of being sent in a burst
                    now.checked_add(interval)
                } else {
                    Some(next)
                }
            });
        }

        let mut state = self.shared.state();
        state.active_timers -= 1;
        if next_tick.is_none() && state.is_current(generation) {
            tracing::error!(?interval, "transmit interval can't be scheduled, stopping transmission");
            state.phase = LoopPhase::Idle;
        }

        tracing::trace!(generation, "transmit timer exited");
    }
}

/// Periodically frames the universe and hands it to the transport.
///
/// At most one write is in flight at any time. Ticks that find the transport busy or not
/// writable are dropped, the next tick carries the current universe anyway.
pub struct TransmitLoop<T: DmxTransport> {
    ticker: Ticker<T>,
    interval: Duration,
    timer: Option<JoinHandle<()>>,
}

impl<T: DmxTransport> TransmitLoop<T> {
    /// Creates an idle loop. Nothing is sent before [TransmitLoop::start] is called.
    pub fn new(transport: T, universe: Arc<Mutex<Universe>>, interval: Duration) -> Self {
        Self {
            ticker: Ticker {
                shared: Arc::new(LoopShared::new()),
                transport: Arc::new(Mutex::new(transport)),
                universe,
            },
            interval,
            timer: None,
        }
    }

    fn shared(&self) -> &LoopShared<T::DriverError> {
        &self.ticker.shared
    }

    /// Moves the loop into the running phase and returns the new generation.
    /// Returns None if it was already running.
    fn begin_run(&self) -> Option<u64> {
        let mut state = self.shared().state();
        if state.phase == LoopPhase::Running {
            return None;
        }

        state.phase = LoopPhase::Running;
        state.generation += 1;
        state.active_timers += 1;

        Some(state.generation)
    }

    /// Starts the periodic transmission.
    ///
    /// Returns `Ok(false)` without doing anything if the loop is already running.
    /// Fails if the timer thread couldn't be spawned.
    pub fn start(&mut self) -> std::io::Result<bool> {
        let Some(generation) = self.begin_run() else {
            return Ok(false);
        };

        let ticker = self.ticker.clone();
        let interval = self.interval;
        let spawn_result = thread::Builder::new()
            .name("dmx-transmit".into())
            .spawn(move || ticker.run(generation, interval));

        match spawn_result {
            Ok(timer) => {
                // a timer of a previous run notices the new generation and exits by itself
                self.timer = Some(timer);
                tracing::info!(interval_us = interval.as_micros() as u64, "dmx transmission started");
                Ok(true)
            },
            Err(error) => {
                let mut state = self.shared().state();
                state.active_timers -= 1;
                if state.generation == generation {
                    state.phase = LoopPhase::Idle;
                }

                Err(error)
            },
        }
    }

    /// Stops the periodic transmission. Returns false if the loop wasn't running.
    ///
    /// No frame is handed to the transport after this returns. A write that was already
    /// dispatched may still complete. If a tick is handing a frame to the transport right now,
    /// this blocks until [DmxTransport::write] returned, which is the whole write for
    /// transports that write synchronously.
    pub fn stop(&mut self) -> bool {
        {
            let mut state = self.shared().state();
            if state.phase == LoopPhase::Idle {
                return false;
            }

            state.phase = LoopPhase::Idle;
        }

        self.shared().wake.notify_all();
        // wait for a tick that is handing a frame to the transport right now
        drop(lock(&self.shared().dispatch));

        tracing::info!("dmx transmission stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.shared().state().phase == LoopPhase::Running
    }

    pub fn phase(&self) -> LoopPhase {
        self.shared().state().phase
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> TransmitStats {
        self.shared().state().stats
    }

    /// Returns whether a frame was handed to the transport that hasn't been drained yet.
    pub fn is_write_in_flight(&self) -> bool {
        self.shared().state().write_in_flight
    }

    /// Returns the amount of timer threads that haven't exited yet.
    pub fn active_timers(&self) -> usize {
        self.shared().state().active_timers
    }

    /// Takes the last write failure. Every failure is only returned once.
    pub fn take_fault(&self) -> Option<TransportError<T::DriverError>> {
        self.shared().state().fault.take()
    }

    /// Stops the loop and closes the transport.
    pub fn close_transport(&mut self) -> Result<(), T::DriverError> {
        self.stop();
        lock(&self.ticker.transport).close()
    }
}

impl<T: DmxTransport> Drop for TransmitLoop<T> {
    fn drop(&mut self) {
        self.stop();

        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                tracing::error!("dmx transmit timer panicked");
            }
        }
    }
}
