//! Rust library for continuously transmitting a DMX512 (ANSI E1.11) universe through ENTTEC DMX
//! USB PRO compatible widgets by using interchangeable transports. The universe and the widget
//! message encoder are no-std as well as no-alloc, the transmit loop requires `std`.
//!
//! Please refer to the
//! [DMX USB PRO api](https://cdn.enttec.com/pdf/assets/70304/70304_DMX_USB_PRO_API.pdf)
//! published by ENTTEC for the wire format.
//!
//! DMX512 has no persistent state on the wire. A fixture that stops receiving frames assumes
//! loss of signal, that's why the universe is resent on a fixed interval even if nothing changed.
//!
//! # Usage
//! With the `serialport` feature a widget is opened and started by
//! `DmxTransmitter::open("/dev/ttyUSB0", &DmxTransmitterConfig::default())`.
//! Any other link to the widget can be used by implementing [transport::DmxTransport].
//!
//! ```rust
//! use enttec_dmx::dmx_transmitter::{DmxTransmitter, DmxTransmitterConfig, UpdateRate};
//! use enttec_dmx::enttec::EnttecFrame;
//! use enttec_dmx::transport::{DmxTransport, WriteCompletion};
//!
//! /// Prints channel 1 of every frame instead of sending it.
//! struct PrintTransport;
//!
//! impl DmxTransport for PrintTransport {
//!     type DriverError = std::io::Error;
//!
//!     fn is_writable(&self) -> bool {
//!         true
//!     }
//!
//!     fn write(&mut self, frame: EnttecFrame, completion: WriteCompletion<std::io::Error>) {
//!         // header (4 bytes) and start code come first
//!         println!("channel 1 is at {}", frame[5]);
//!         completion.complete(Ok(()));
//!     }
//!
//!     fn close(&mut self) -> Result<(), std::io::Error> {
//!         Ok(())
//!     }
//! }
//!
//! let mut transmitter = DmxTransmitter::new(
//!     PrintTransport,
//!     &DmxTransmitterConfig {
//!         update_rate: UpdateRate::Hz(40),
//!     },
//! )
//! .unwrap();
//! transmitter.start().unwrap();
//!
//! // Dimmer of the first fixture to full, color to orange.
//! transmitter
//!     .set_channels(&[(1, 255), (2, 255), (3, 128), (4, 0)])
//!     .unwrap();
//!
//! // Out of range values are rejected and nothing is changed.
//! assert!(transmitter.set_channel(513, 10).is_err());
//!
//! std::thread::sleep(std::time::Duration::from_millis(100));
//! transmitter.blackout();
//!
//! if let Some(error) = transmitter.take_transport_error() {
//!     println!("transmission stopped: {error}");
//! }
//!
//! transmitter.close().unwrap();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod consts;
/// Module for continuously sending a universe over a transport.
#[cfg(feature = "std")]
pub mod dmx_transmitter;
/// Encoder for ENTTEC DMX USB PRO widget messages.
pub mod enttec;
mod layouts;
/// Serial port transport for real widgets.
#[cfg(feature = "serialport")]
#[cfg_attr(docsrs, doc(cfg(feature = "serialport")))]
pub mod serial_transport;
/// The periodic single-flight scheduler behind the transmitter.
#[cfg(feature = "std")]
pub mod transmit_loop;
/// Module for implementing links to the widget.
#[cfg(feature = "std")]
pub mod transport;
pub mod universe;
