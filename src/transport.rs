use std::sync::Arc;

use crate::enttec::EnttecFrame;
use crate::transmit_loop::LoopShared;

/// Errors reported by a transport.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError<E> {
    /// The transport couldn't be opened. No frames can be sent.
    OpenFailure(E),
    /// A written frame couldn't be drained. The transmit loop stopped because of it.
    WriteFailure(E),
    /// The transport couldn't be closed cleanly.
    CloseFailure(E),
}

impl<E> TransportError<E> {
    /// The driver specific error.
    pub fn driver_error(&self) -> &E {
        match self {
            TransportError::OpenFailure(error)
            | TransportError::WriteFailure(error)
            | TransportError::CloseFailure(error) => error,
        }
    }
}

impl<E: core::fmt::Display> core::fmt::Display for TransportError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportError::OpenFailure(error) => write!(f, "opening the transport failed: {error}"),
            TransportError::WriteFailure(error) => {
                write!(f, "writing to the transport failed: {error}")
            },
            TransportError::CloseFailure(error) => {
                write!(f, "closing the transport failed: {error}")
            },
        }
    }
}

impl<E: core::fmt::Display + core::fmt::Debug> std::error::Error for TransportError<E> {}

/// Trait for the link to the widget, usually a serial port running at 250000 baud.
///
/// Writes are asynchronous. The transmit loop won't issue another write before the transport
/// reported the previous one through its [WriteCompletion].
pub trait DmxTransport: Send + 'static {
    /// The driver specific error.
    type DriverError: core::fmt::Display + core::fmt::Debug + Send + 'static;

    /// Returns whether the transport can accept a frame right now.
    fn is_writable(&self) -> bool;

    /// Starts writing a frame.
    ///
    /// The transport has to call [WriteCompletion::complete] once the frame is fully drained or
    /// the write failed. This may happen before this method returns.
    fn write(&mut self, frame: EnttecFrame, completion: WriteCompletion<Self::DriverError>);

    /// Closes the transport. It won't be writable afterwards.
    fn close(&mut self) -> Result<(), Self::DriverError>;
}

/// Handle that reports the outcome of a single write back to the transmit loop.
///
/// Dropping it without calling [WriteCompletion::complete] releases the loop as if the write
/// succeeded, so a careless transport can't stall transmission forever.
#[must_use = "the transmit loop won't send again until the write is completed"]
pub struct WriteCompletion<E> {
    shared: Option<Arc<LoopShared<E>>>,
}

impl<E: core::fmt::Display> WriteCompletion<E> {
    pub(crate) fn new(shared: Arc<LoopShared<E>>) -> Self {
        Self {
            shared: Some(shared),
        }
    }

    /// Reports whether the frame was drained successfully.
    pub fn complete(mut self, result: Result<(), E>) {
        if let Some(shared) = self.shared.take() {
            shared.finish_write(result);
        }
    }
}

impl<E> Drop for WriteCompletion<E> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            tracing::warn!("write completion dropped without a result, releasing the transmit loop");
            shared.release_write();
        }
    }
}
