pub const DMX_NULL_START: u8 = 0x00;
/// start code + 512 byte package
pub const DMX_MAX_PACKAGE_SIZE: usize = 513;
pub const DMX_CHANNEL_COUNT: u16 = 512;
pub const DMX_MAX_VALUE: u16 = 255;

pub const DMX_BAUD: u32 = 250_000;

/// Refresh rate of the universe in Hz if nothing else is configured.
pub const DEFAULT_DMX_SPEED: u32 = 30;

pub const ENTTEC_PRO_MESSAGE_START: u8 = 0x7E;
pub const ENTTEC_PRO_MESSAGE_END: u8 = 0xE7;
/// Start delimiter, label and two length bytes.
pub const ENTTEC_PRO_HEADER_SIZE: usize = 4;
/// Maximum amount of data bytes a widget message can carry.
pub const ENTTEC_PRO_MAX_DATA_SIZE: usize = 600;
pub const ENTTEC_PRO_MAX_MESSAGE_SIZE: usize =
    ENTTEC_PRO_HEADER_SIZE + ENTTEC_PRO_MAX_DATA_SIZE + 1;
/// A send dmx message: header, start code, 512 channels and the end delimiter.
pub const ENTTEC_PRO_DMX_MESSAGE_SIZE: usize =
    ENTTEC_PRO_HEADER_SIZE + DMX_MAX_PACKAGE_SIZE + 1;
