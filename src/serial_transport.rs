use std::io::Write;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serialport::{DataBits, ErrorKind, FlowControl, Parity, StopBits};

use crate::consts::DMX_BAUD;
use crate::dmx_transmitter::{DmxTransmitter, DmxTransmitterConfig, DmxTransmitterError};
use crate::enttec::EnttecFrame;
use crate::transport::{DmxTransport, TransportError, WriteCompletion};

/// Upper bound for writing a single frame before the port is considered broken.
const WRITE_TIMEOUT_MILLIS: u64 = 1000;

struct WriteJob {
    frame: EnttecFrame,
    completion: WriteCompletion<serialport::Error>,
}

/// Transport for ENTTEC DMX USB PRO compatible widgets connected to a serial port.
///
/// Frames are written and flushed on a dedicated writer thread, so [DmxTransport::write] never
/// blocks the transmit loop. A failed write is reported through its completion only, the next
/// frame is tried again on the same port.
pub struct SerialTransport {
    jobs: Option<Sender<WriteJob>>,
    writer: Option<JoinHandle<()>>,
}

impl SerialTransport {
    /// Opens the serial port at `path` with 250000 baud, 8 data bits, no parity and 2 stop bits.
    pub fn open(path: &str) -> Result<Self, serialport::Error> {
        let port = serialport::new(path, DMX_BAUD)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(WRITE_TIMEOUT_MILLIS))
            .open()?;

        let transport = Self::with_port(port)?;
        tracing::info!(path, "serial port opened");

        Ok(transport)
    }

    fn with_port<W: Write + Send + 'static>(port: W) -> std::io::Result<Self> {
        let (jobs, job_receiver) = mpsc::channel();
        let writer = thread::Builder::new()
            .name("dmx-serial-writer".into())
            .spawn(move || run_writer(port, job_receiver))?;

        Ok(Self {
            jobs: Some(jobs),
            writer: Some(writer),
        })
    }
}

fn run_writer<W: Write>(mut port: W, jobs: Receiver<WriteJob>) {
    for WriteJob { frame, completion } in jobs {
        let result = port
            .write_all(&frame)
            .and_then(|_| port.flush())
            .map_err(serialport::Error::from);

        if let Err(error) = &result {
            tracing::debug!("writing frame to serial port failed: {error}");
        }

        completion.complete(result);
    }
}

impl DmxTransport for SerialTransport {
    type DriverError = serialport::Error;

    fn is_writable(&self) -> bool {
        self.jobs.is_some()
    }

    fn write(&mut self, frame: EnttecFrame, completion: WriteCompletion<serialport::Error>) {
        let Some(jobs) = &self.jobs else {
            completion.complete(Err(serialport::Error::new(
                ErrorKind::NoDevice,
                "serial transport is closed",
            )));
            return;
        };

        if let Err(mpsc::SendError(job)) = jobs.send(WriteJob { frame, completion }) {
            job.completion.complete(Err(serialport::Error::new(
                ErrorKind::NoDevice,
                "serial writer stopped",
            )));
        }
    }

    fn close(&mut self) -> Result<(), serialport::Error> {
        // the writer drains the queued frames and exits once the sender is gone
        drop(self.jobs.take());

        match self.writer.take() {
            Some(writer) => writer.join().or(Err(serialport::Error::new(
                ErrorKind::Unknown,
                "serial writer panicked",
            ))),
            None => Ok(()),
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::error!("closing serial transport failed: {error}");
        }
    }
}

impl DmxTransmitter<SerialTransport> {
    /// Opens the widget at `path` and immediately starts transmitting the (blacked out) universe.
    pub fn open(
        path: &str,
        config: &DmxTransmitterConfig,
    ) -> Result<Self, DmxTransmitterError<serialport::Error>> {
        let transport = SerialTransport::open(path).map_err(TransportError::OpenFailure)?;
        let mut transmitter = DmxTransmitter::new(transport, config)?;
        transmitter.start()?;

        Ok(transmitter)
    }
}
