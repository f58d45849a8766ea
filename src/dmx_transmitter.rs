use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::consts::DEFAULT_DMX_SPEED;
use crate::transmit_loop::{lock, TransmitLoop, TransmitStats};
use crate::transport::{DmxTransport, TransportError};
use crate::universe::{Universe, UniverseError};

/// How often the universe gets sent to the widget.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateRate {
    /// Frames per second. The interval is one second divided by this value.
    Hz(u32),
    /// Time between two frames.
    Interval(Duration),
}

impl UpdateRate {
    /// The interval between two ticks. None if the rate can't be scheduled, either because the
    /// interval is zero or because it is too long to be added to the current time.
    pub fn interval(&self) -> Option<Duration> {
        let interval = match *self {
            UpdateRate::Hz(0) => return None,
            UpdateRate::Hz(hz) => Duration::from_nanos(1_000_000_000 / hz as u64),
            UpdateRate::Interval(interval) => interval,
        };

        if interval.is_zero() || Instant::now().checked_add(interval).is_none() {
            return None;
        }

        Some(interval)
    }
}

#[derive(Debug)]
pub struct DmxTransmitterConfig {
    pub update_rate: UpdateRate,
}

impl Default for DmxTransmitterConfig {
    fn default() -> Self {
        Self {
            update_rate: UpdateRate::Hz(DEFAULT_DMX_SPEED),
        }
    }
}

#[derive(Debug)]
pub enum DmxTransmitterError<E> {
    /// The configured update rate results in a zero or unschedulable interval.
    InvalidUpdateRate(UpdateRate),
    /// The timer thread couldn't be spawned.
    TimerUnavailable(std::io::Error),
    /// An error raised by the transport.
    Transport(TransportError<E>),
}

impl<E: core::fmt::Display> core::fmt::Display for DmxTransmitterError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DmxTransmitterError::InvalidUpdateRate(update_rate) => {
                write!(f, "update rate {update_rate:?} can't be scheduled")
            },
            DmxTransmitterError::TimerUnavailable(error) => {
                write!(f, "couldn't spawn the transmit timer: {error}")
            },
            DmxTransmitterError::Transport(error) => error.fmt(f),
        }
    }
}

impl<E: core::fmt::Display + core::fmt::Debug> std::error::Error for DmxTransmitterError<E> {}

impl<E> From<TransportError<E>> for DmxTransmitterError<E> {
    fn from(value: TransportError<E>) -> Self {
        Self::Transport(value)
    }
}

/// Keeps a DMX512 universe and continuously sends it to an ENTTEC DMX USB PRO compatible widget.
///
/// Channel updates are validated and applied immediately. They show up on the wire with the next
/// tick of the transmit loop.
pub struct DmxTransmitter<T: DmxTransport> {
    universe: Arc<Mutex<Universe>>,
    transmit_loop: TransmitLoop<T>,
}

impl<T: DmxTransport> DmxTransmitter<T> {
    /// Creates a transmitter on top of an opened transport. The transmitter starts idle.
    pub fn new(
        transport: T,
        config: &DmxTransmitterConfig,
    ) -> Result<Self, DmxTransmitterError<T::DriverError>> {
        let interval = config
            .update_rate
            .interval()
            .ok_or(DmxTransmitterError::InvalidUpdateRate(config.update_rate))?;

        let universe = Arc::new(Mutex::new(Universe::new()));
        let transmit_loop = TransmitLoop::new(transport, Arc::clone(&universe), interval);

        tracing::debug!(interval_us = interval.as_micros() as u64, "dmx transmitter created");

        Ok(Self {
            universe,
            transmit_loop,
        })
    }

    /// Starts sending the universe periodically. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<(), DmxTransmitterError<T::DriverError>> {
        self.transmit_loop
            .start()
            .map_err(DmxTransmitterError::TimerUnavailable)?;

        Ok(())
    }

    /// Stops sending the universe. Does nothing if it isn't running.
    pub fn stop(&mut self) {
        self.transmit_loop.stop();
    }

    pub fn is_running(&self) -> bool {
        self.transmit_loop.is_running()
    }

    /// Sets all channels to 0.
    pub fn blackout(&self) {
        lock(&self.universe).blackout();
    }

    /// Sets all channels to 255.
    pub fn full_on(&self) {
        lock(&self.universe).full_on();
    }

    /// Sets a channel between 1 and 512 to a value between 0 and 255.
    pub fn set_channel(&self, channel: u16, value: u16) -> Result<(), UniverseError> {
        lock(&self.universe).set_channel(channel, value)
    }

    /// Sets multiple channels at once. If one pair is out of range, nothing is changed.
    pub fn set_channels(&self, channel_value_pairs: &[(u16, u16)]) -> Result<(), UniverseError> {
        lock(&self.universe).set_channels(channel_value_pairs)
    }

    /// Sets every channel to the same value.
    pub fn set_all_channels(&self, value: u16) -> Result<(), UniverseError> {
        lock(&self.universe).set_all_channels(value)
    }

    pub fn get_channel(&self, channel: u16) -> Result<u8, UniverseError> {
        lock(&self.universe).get_channel(channel)
    }

    /// A copy of the channels 1 to 512.
    pub fn channels(&self) -> [u8; 512] {
        let mut channels = [0u8; 512];
        channels.copy_from_slice(lock(&self.universe).channels());

        channels
    }

    pub fn interval(&self) -> Duration {
        self.transmit_loop.interval()
    }

    pub fn stats(&self) -> TransmitStats {
        self.transmit_loop.stats()
    }

    /// Returns the write failure that stopped the transmission, if there was one.
    /// It is only returned once. Call [DmxTransmitter::start] to try again, a transport that is
    /// still broken reports the next failed write the same way.
    pub fn take_transport_error(&self) -> Option<TransportError<T::DriverError>> {
        self.transmit_loop.take_fault()
    }

    /// Stops the transmission and closes the transport.
    pub fn close(mut self) -> Result<(), DmxTransmitterError<T::DriverError>> {
        self.transmit_loop
            .close_transport()
            .map_err(TransportError::CloseFailure)?;

        tracing::info!("dmx transmitter closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockError, MockHandle, MockTransport};
    use std::thread;

    fn create_transmitter(update_rate: UpdateRate) -> (DmxTransmitter<MockTransport>, MockHandle) {
        let (transport, handle) = MockTransport::new(true);
        let transmitter =
            DmxTransmitter::new(transport, &DmxTransmitterConfig { update_rate }).unwrap();

        (transmitter, handle)
    }

    #[test]
    fn test_update_rate_interval() {
        assert_eq!(
            DmxTransmitterConfig::default().update_rate.interval(),
            Some(Duration::from_nanos(33_333_333))
        );
        assert_eq!(
            UpdateRate::Hz(40).interval(),
            Some(Duration::from_millis(25))
        );
        assert_eq!(
            UpdateRate::Interval(Duration::from_millis(20)).interval(),
            Some(Duration::from_millis(20))
        );
        assert_eq!(UpdateRate::Hz(0).interval(), None);
        assert_eq!(UpdateRate::Interval(Duration::ZERO).interval(), None);
        assert_eq!(UpdateRate::Interval(Duration::MAX).interval(), None);
    }

    #[test]
    fn test_unschedulable_interval_is_rejected() {
        let (transport, handle) = MockTransport::new(true);
        let result = DmxTransmitter::new(
            transport,
            &DmxTransmitterConfig {
                update_rate: UpdateRate::Interval(Duration::MAX),
            },
        );

        assert!(matches!(
            result,
            Err(DmxTransmitterError::InvalidUpdateRate(UpdateRate::Interval(
                Duration::MAX
            )))
        ));
        assert_eq!(handle.frame_count(), 0);
    }

    #[test]
    fn test_invalid_update_rate() {
        let (transport, _) = MockTransport::new(true);
        let result = DmxTransmitter::new(
            transport,
            &DmxTransmitterConfig {
                update_rate: UpdateRate::Hz(0),
            },
        );

        assert!(matches!(
            result,
            Err(DmxTransmitterError::InvalidUpdateRate(UpdateRate::Hz(0)))
        ));
    }

    #[test]
    fn test_channel_operations() {
        let (transmitter, handle) = create_transmitter(UpdateRate::Hz(30));

        transmitter.set_channel(1, 10).unwrap();
        assert_eq!(transmitter.get_channel(1).unwrap(), 10);

        transmitter.set_channels(&[(1, 20), (999, 5)]).unwrap_err();
        assert_eq!(transmitter.get_channel(1).unwrap(), 10);

        transmitter.full_on();
        assert!(transmitter.channels().iter().all(|&value| value == 255));

        transmitter.blackout();
        assert!(transmitter.channels().iter().all(|&value| value == 0));

        transmitter.set_all_channels(256).unwrap_err();
        transmitter.get_channel(0).unwrap_err();

        // nothing is sent before start
        assert!(!transmitter.is_running());
        assert_eq!(handle.frame_count(), 0);
    }

    #[test]
    fn test_transmits_universe() {
        let (mut transmitter, handle) =
            create_transmitter(UpdateRate::Interval(Duration::from_millis(5)));

        transmitter.set_channel(1, 10).unwrap();
        transmitter.start().unwrap();
        transmitter.start().unwrap();
        thread::sleep(Duration::from_millis(60));
        transmitter.stop();

        assert!(transmitter.stats().frames_sent >= 1);

        let frame = handle.last_frame().unwrap();
        assert_eq!(frame.len(), 518);
        assert_eq!(&frame[..6], &[0x7E, 0x06, 0x01, 0x02, 0x00, 0x0A]);
        assert_eq!(frame[517], 0xE7);
    }

    #[test]
    fn test_write_failure_is_reported_once() {
        let (transport, handle) = MockTransport::new(false);
        let mut transmitter = DmxTransmitter::new(
            transport,
            &DmxTransmitterConfig {
                update_rate: UpdateRate::Interval(Duration::from_millis(2)),
            },
        )
        .unwrap();

        transmitter.start().unwrap();
        while handle.pending_count() == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        handle.complete_next(Err(MockError("device gone")));

        assert!(!transmitter.is_running());
        let error = transmitter.take_transport_error().unwrap();
        assert_eq!(
            error.to_string(),
            "writing to the transport failed: mock error: device gone"
        );
        assert!(transmitter.take_transport_error().is_none());

        // nothing else gets written against the broken transport
        thread::sleep(Duration::from_millis(20));
        assert_eq!(handle.frame_count(), 1);
    }

    #[test]
    fn test_close() {
        let (mut transmitter, handle) = create_transmitter(UpdateRate::Hz(100));

        transmitter.start().unwrap();
        transmitter.close().unwrap();

        assert!(handle.closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_close_failure() {
        let (transmitter, handle) = create_transmitter(UpdateRate::Hz(100));
        handle.closed.store(true, std::sync::atomic::Ordering::SeqCst);

        assert!(matches!(
            transmitter.close(),
            Err(DmxTransmitterError::Transport(TransportError::CloseFailure(
                MockError("already closed")
            )))
        ));
    }
}
