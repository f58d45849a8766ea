//! Encoder for the host to widget messages of the ENTTEC DMX USB PRO api.
//!
//! Every message is framed as
//! `0x7E | label | data length (u16, little endian) | data | 0xE7`.
//!
//! See the [DMX USB PRO api](https://cdn.enttec.com/pdf/assets/70304/70304_DMX_USB_PRO_API.pdf)
//! for more information.

use crate::consts::{
    ENTTEC_PRO_HEADER_SIZE, ENTTEC_PRO_MAX_DATA_SIZE, ENTTEC_PRO_MAX_MESSAGE_SIZE,
    ENTTEC_PRO_MESSAGE_END, ENTTEC_PRO_MESSAGE_START,
};
use crate::layouts::enttec_message_layout;
use crate::universe::Universe;

/// A complete widget message ready to be written to the serial port.
pub type EnttecFrame = heapless::Vec<u8, ENTTEC_PRO_MAX_MESSAGE_SIZE>;

/// Message labels of the DMX USB PRO api.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum WidgetLabel {
    ReprogramFirmware = 0x01,
    ProgramFlashPage = 0x02,
    GetWidgetParameters = 0x03,
    SetWidgetParameters = 0x04,
    /// Sent by the widget when it received a dmx package.
    ReceivedDmxPacket = 0x05,
    /// Send a dmx package. The data is the start code followed by up to 512 channels.
    OutputOnlySendDmx = 0x06,
    SendRdmPacket = 0x07,
    ReceiveDmxOnChange = 0x08,
    /// Sent by the widget when a received dmx package changed.
    ReceivedDmxChangeOfState = 0x09,
    GetWidgetSerialNumber = 0x0A,
    SendRdmDiscoveryRequest = 0x0B,
}

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnttecError {
    /// The data doesn't fit into a single widget message. Contains the rejected length.
    DataTooLarge(usize),
}

impl core::fmt::Display for EnttecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EnttecError::DataTooLarge(length) => write!(
                f,
                "{length} data bytes exceed the widget message limit of {ENTTEC_PRO_MAX_DATA_SIZE}"
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EnttecError {}

/// Frames arbitrary data into a widget message with the given label.
pub fn encode_message(label: WidgetLabel, data: &[u8]) -> Result<EnttecFrame, EnttecError> {
    if data.len() > ENTTEC_PRO_MAX_DATA_SIZE {
        return Err(EnttecError::DataTooLarge(data.len()));
    }

    // header + data + end delimiter
    let message_length = ENTTEC_PRO_HEADER_SIZE + data.len() + 1;
    let mut frame = EnttecFrame::new();
    frame
        .resize(message_length, 0)
        .or(Err(EnttecError::DataTooLarge(data.len())))?;

    let mut memory_view = enttec_message_layout::View::new(&mut frame[..]);
    memory_view
        .start_delimiter_mut()
        .write(ENTTEC_PRO_MESSAGE_START);
    memory_view.label_mut().write(label as u8);
    memory_view.data_length_mut().write(data.len() as u16);

    let data_and_end_delimiter = memory_view.data_and_end_delimiter_mut();
    data_and_end_delimiter[..data.len()].copy_from_slice(data);
    data_and_end_delimiter[data.len()] = ENTTEC_PRO_MESSAGE_END;

    Ok(frame)
}

/// Frames the whole universe into an "Output Only Send DMX Packet" message.
///
/// The result is always 518 bytes long: the 4 byte header, the start code, 512 channels and the
/// end delimiter.
pub fn encode_send_dmx(universe: &Universe) -> EnttecFrame {
    // 513 bytes always fit into the 600 byte data limit
    encode_message(WidgetLabel::OutputOnlySendDmx, universe.as_package()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::ENTTEC_PRO_DMX_MESSAGE_SIZE;

    #[test]
    fn test_encode_send_dmx_layout() {
        let mut universe = Universe::new();
        universe.set_channel(1, 10).unwrap();

        let frame = encode_send_dmx(&universe);

        assert_eq!(frame.len(), ENTTEC_PRO_DMX_MESSAGE_SIZE);
        assert_eq!(frame.len(), 518);
        assert_eq!(&frame[..6], &[0x7E, 0x06, 0x01, 0x02, 0x00, 0x0A]);
        assert!(frame[6..517].iter().all(|&byte| byte == 0));
        assert_eq!(frame[517], 0xE7);
    }

    #[test]
    fn test_encode_send_dmx_channel_order() {
        let mut universe = Universe::new();
        universe.set_all_channels(255).unwrap();
        universe.set_channels(&[(2, 1), (512, 2)]).unwrap();

        let frame = encode_send_dmx(&universe);

        // channel n sits at offset n + 4
        assert_eq!(frame[4], 0x00);
        assert_eq!(frame[5], 255);
        assert_eq!(frame[6], 1);
        assert_eq!(frame[516], 2);
        assert_eq!(frame[517], 0xE7);
    }

    #[test]
    fn test_encode_message() {
        let frame = encode_message(WidgetLabel::GetWidgetSerialNumber, &[]).unwrap();
        assert_eq!(&frame[..], &[0x7E, 0x0A, 0x00, 0x00, 0xE7]);

        let frame = encode_message(WidgetLabel::GetWidgetParameters, &[0x00, 0x00]).unwrap();
        assert_eq!(&frame[..], &[0x7E, 0x03, 0x02, 0x00, 0x00, 0x00, 0xE7]);
    }

    #[test]
    fn test_encode_message_too_large() {
        assert_eq!(
            encode_message(WidgetLabel::OutputOnlySendDmx, &[0u8; 601]),
            Err(EnttecError::DataTooLarge(601))
        );

        let frame = encode_message(WidgetLabel::SendRdmPacket, &[0u8; 600]).unwrap();
        assert_eq!(frame.len(), 605);
        assert_eq!(frame[1], 0x07);
        assert_eq!(&frame[2..4], &[0x58, 0x02]);
    }
}
