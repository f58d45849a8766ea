use crate::consts::{DMX_CHANNEL_COUNT, DMX_MAX_PACKAGE_SIZE, DMX_MAX_VALUE, DMX_NULL_START};

/// The part of a channel update that violated its bounds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeSubject {
    /// The channel number wasn't between 1 and 512.
    Channel,
    /// The channel value wasn't between 0 and 255.
    Value,
}

impl RangeSubject {
    /// The inclusive bounds that apply to this subject.
    pub fn bounds(&self) -> (u16, u16) {
        match self {
            RangeSubject::Channel => (1, DMX_CHANNEL_COUNT),
            RangeSubject::Value => (0, DMX_MAX_VALUE),
        }
    }
}

/// Raised when a channel number or value is out of bounds. The universe stays untouched.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UniverseError {
    OutOfRange {
        /// Whether the channel or the value was rejected.
        subject: RangeSubject,
        /// The rejected number.
        received: u16,
    },
}

impl UniverseError {
    fn channel(received: u16) -> Self {
        Self::OutOfRange {
            subject: RangeSubject::Channel,
            received,
        }
    }

    fn value(received: u16) -> Self {
        Self::OutOfRange {
            subject: RangeSubject::Value,
            received,
        }
    }
}

impl core::fmt::Display for UniverseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UniverseError::OutOfRange { subject, received } => {
                let (lower, upper) = subject.bounds();
                let name = match subject {
                    RangeSubject::Channel => "Channel",
                    RangeSubject::Value => "Value",
                };

                write!(
                    f,
                    "{name} out of bounds: \"{received}\" is not in range [{lower};{upper}]."
                )
            },
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UniverseError {}

#[inline]
fn validate_channel(channel: u16) -> Result<usize, UniverseError> {
    if !(1..=DMX_CHANNEL_COUNT).contains(&channel) {
        return Err(UniverseError::channel(channel));
    }

    Ok(channel as usize)
}

#[inline]
fn validate_value(value: u16) -> Result<u8, UniverseError> {
    u8::try_from(value).or(Err(UniverseError::value(value)))
}

/// One DMX512 universe. The first slot holds the start code, slots 1 to 512 hold the channels.
///
/// The start code is always `0x00` and can't be changed by any channel operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Universe {
    slots: [u8; DMX_MAX_PACKAGE_SIZE],
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl Universe {
    /// Creates a universe with all channels set to zero.
    pub const fn new() -> Self {
        Self {
            slots: [DMX_NULL_START; DMX_MAX_PACKAGE_SIZE],
        }
    }

    /// Sets a single channel. The channel has to be between 1 and 512, the value between 0 and 255.
    pub fn set_channel(&mut self, channel: u16, value: u16) -> Result<(), UniverseError> {
        let index = validate_channel(channel)?;
        self.slots[index] = validate_value(value)?;

        Ok(())
    }

    /// Sets multiple channels at once.
    ///
    /// Every pair is validated before the first slot is written, so either all pairs get applied
    /// or none. If a channel occurs multiple times the last value wins.
    pub fn set_channels(&mut self, channel_value_pairs: &[(u16, u16)]) -> Result<(), UniverseError> {
        for &(channel, value) in channel_value_pairs {
            validate_channel(channel)?;
            validate_value(value)?;
        }

        for &(channel, value) in channel_value_pairs {
            self.slots[channel as usize] = value as u8;
        }

        Ok(())
    }

    /// Sets every channel to the same value. The start code is left alone.
    pub fn set_all_channels(&mut self, value: u16) -> Result<(), UniverseError> {
        let value = validate_value(value)?;
        self.slots[1..].fill(value);

        Ok(())
    }

    /// Returns the value of a channel between 1 and 512.
    pub fn get_channel(&self, channel: u16) -> Result<u8, UniverseError> {
        Ok(self.slots[validate_channel(channel)?])
    }

    pub fn blackout(&mut self) {
        self.slots[1..].fill(0);
    }

    pub fn full_on(&mut self) {
        self.slots[1..].fill(u8::MAX);
    }

    pub fn start_code(&self) -> u8 {
        self.slots[0]
    }

    /// The channel values 1 to 512.
    pub fn channels(&self) -> &[u8] {
        &self.slots[1..]
    }

    /// The start code followed by all 512 channels, the way it is put on the wire.
    pub fn as_package(&self) -> &[u8; DMX_MAX_PACKAGE_SIZE] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out_of_channel_range(received: u16) -> UniverseError {
        UniverseError::OutOfRange {
            subject: RangeSubject::Channel,
            received,
        }
    }

    #[test]
    fn test_set_and_get_every_channel() {
        let mut universe = Universe::new();

        for channel in 1..=512u16 {
            let value = channel % 256;
            universe.set_channel(channel, value).unwrap();
            assert_eq!(universe.get_channel(channel).unwrap(), value as u8);
        }

        universe.set_channel(1, 0).unwrap();
        universe.set_channel(512, 255).unwrap();
        assert_eq!(universe.get_channel(1).unwrap(), 0);
        assert_eq!(universe.get_channel(512).unwrap(), 255);
        assert_eq!(universe.start_code(), 0x00);
    }

    #[test]
    fn test_set_channel_out_of_range() {
        let mut universe = Universe::new();
        universe.set_channel(7, 42).unwrap();
        let before = universe.clone();

        assert_eq!(universe.set_channel(0, 5), Err(out_of_channel_range(0)));
        assert_eq!(universe.set_channel(513, 5), Err(out_of_channel_range(513)));
        assert_eq!(
            universe.set_channel(7, 256),
            Err(UniverseError::OutOfRange {
                subject: RangeSubject::Value,
                received: 256,
            })
        );

        assert_eq!(universe, before);
    }

    #[test]
    fn test_get_channel_out_of_range() {
        let universe = Universe::new();

        assert_eq!(universe.get_channel(0), Err(out_of_channel_range(0)));
        assert_eq!(universe.get_channel(513), Err(out_of_channel_range(513)));
    }

    #[test]
    fn test_set_channels_is_atomic() {
        let mut universe = Universe::new();
        universe.set_channel(1, 3).unwrap();

        assert_eq!(
            universe.set_channels(&[(1, 10), (999, 5)]),
            Err(out_of_channel_range(999))
        );
        assert_eq!(universe.get_channel(1).unwrap(), 3);

        universe.set_channels(&[(2, 20), (3, 300)]).unwrap_err();
        assert_eq!(universe.get_channel(2).unwrap(), 0);
    }

    #[test]
    fn test_set_channels_last_pair_wins() {
        let mut universe = Universe::new();

        universe
            .set_channels(&[(1, 10), (512, 20), (1, 30)])
            .unwrap();

        assert_eq!(universe.get_channel(1).unwrap(), 30);
        assert_eq!(universe.get_channel(512).unwrap(), 20);
    }

    #[test]
    fn test_set_all_channels_keeps_start_code() {
        let mut universe = Universe::new();
        universe.set_all_channels(255).unwrap();

        for channel in 1..=512 {
            assert_eq!(universe.get_channel(channel).unwrap(), 255);
        }
        assert_eq!(universe.start_code(), 0x00);
        assert_eq!(universe.as_package()[0], 0x00);

        universe.set_all_channels(256).unwrap_err();
        assert!(universe.channels().iter().all(|&value| value == 255));
    }

    #[test]
    fn test_blackout_and_full_on() {
        let mut universe = Universe::new();

        universe.full_on();
        assert!(universe.channels().iter().all(|&value| value == 255));
        assert_eq!(universe.start_code(), 0x00);

        universe.blackout();
        assert!(universe.channels().iter().all(|&value| value == 0));
        assert_eq!(universe.channels().len(), 512);
    }

    #[test]
    fn test_error_display() {
        let mut universe = Universe::new();

        let error = universe.set_channel(999, 1).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Channel out of bounds: \"999\" is not in range [1;512]."
        );

        let error = universe.set_all_channels(300).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Value out of bounds: \"300\" is not in range [0;255]."
        );
    }
}
