//! Configuration structs for a ranging exchange
//!
//! This module houses the datastructures that control how the initiator
//! addresses its poll frames, which response frames it accepts, and which
//! radio parameters the distance estimation has to account for.

use crate::{mac, Error};
use num_enum::{IntoPrimitive, TryFromPrimitive};


#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// The bitrate at which frames are exchanged
pub enum BitRate {
    /// 110 kilobits per second.
    /// This is an unofficial extension from decawave.
    Kbps110 = 0b00,
    /// 850 kilobits per second.
    Kbps850 = 0b01,
    /// 6.8 megabits per second.
    Kbps6800 = 0b10,
}

impl Default for BitRate {
    fn default() -> Self {
        BitRate::Kbps6800
    }
}

impl BitRate {
    /// Scales the carrier integrator into a frequency offset in Hertz
    ///
    /// The carrier recovery loop integrates more samples at 110 kbps, which
    /// changes the scaling.
    pub fn freq_offset_multiplier(&self) -> f64 {
        match self {
            BitRate::Kbps110 => 998.4e6 / 2.0 / 8192.0 / 131072.0,
            BitRate::Kbps850 | BitRate::Kbps6800 => 998.4e6 / 2.0 / 1024.0 / 131072.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// The PRF value
pub enum PulseRepetitionFrequency {
    /// 16 megahertz
    Mhz16 = 0b01,
    /// 64 megahertz
    Mhz64 = 0b10,
}

impl Default for PulseRepetitionFrequency {
    fn default() -> Self {
        PulseRepetitionFrequency::Mhz64
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
/// All the available UWB channels.
///
/// Converts from and into the channel number:
///
/// ``` rust
/// use core::convert::TryFrom;
/// use ss_twr::configs::UwbChannel;
///
/// assert_eq!(UwbChannel::try_from(5).ok(), Some(UwbChannel::Channel5));
/// assert!(UwbChannel::try_from(6).is_err());
/// ```
pub enum UwbChannel {
    /// Channel 1
    /// - Center frequency: 3494.4 Mhz
    /// - Bandwidth: 499.2 Mhz
    Channel1 = 1,
    /// Channel 2
    /// - Center frequency: 3993.6 Mhz
    /// - Bandwidth: 499.2 Mhz
    Channel2 = 2,
    /// Channel 3
    /// - Center frequency: 4492.8 Mhz
    /// - Bandwidth: 499.2 Mhz
    Channel3 = 3,
    /// Channel 4
    /// - Center frequency: 3993.6 Mhz
    /// - Bandwidth: 1331.2 Mhz
    Channel4 = 4,
    /// Channel 5
    /// - Center frequency: 6489.6 Mhz
    /// - Bandwidth: 499.2 Mhz
    Channel5 = 5,
    /// Channel 7
    /// - Center frequency: 6489.6 Mhz
    /// - Bandwidth: 1081.6 Mhz
    Channel7 = 7,
}

impl Default for UwbChannel {
    fn default() -> Self {
        UwbChannel::Channel5
    }
}

impl UwbChannel {
    /// The center frequency of the channel in Hertz
    pub fn center_frequency_hz(&self) -> f64 {
        match self {
            UwbChannel::Channel1 => 3494.4e6,
            UwbChannel::Channel2 | UwbChannel::Channel4 => 3993.6e6,
            UwbChannel::Channel3 => 4492.8e6,
            UwbChannel::Channel5 | UwbChannel::Channel7 => 6489.6e6,
        }
    }

    /// Converts a frequency offset in Hertz into parts per million
    ///
    /// The sign is inverted: a positive carrier offset means the remote clock
    /// runs slow relative to the local one.
    pub fn hertz_to_ppm_multiplier(&self) -> f64 {
        -1.0e6 / self.center_frequency_hz()
    }
}


/// Function codes carried in the last byte of the common header
#[derive(Copy, Clone, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FunctionCode {
    /// Ranging poll, sent by the initiator
    Poll = 0xE0,
    /// Ranging response, sent by the responder
    Response = 0xE1,
}


/// Addressing of one of the two frame kinds
///
/// The anchor index replaces the low byte of some of these fields before each
/// transmission. See [`RangingConfig`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameAddressing {
    /// IEEE 802.15.4 frame control (data frame, 16-bit addressing)
    pub frame_control: u16,
    /// The PAN identifier field
    ///
    /// Responders put their own identifier here.
    pub pan_id: mac::PanId,
    /// Destination short address
    pub destination: mac::ShortAddress,
    /// Source short address
    pub source: mac::ShortAddress,
    /// Function code
    pub function_code: FunctionCode,
}

impl FrameAddressing {
    /// The poll frame as sent by this initiator
    pub fn poll() -> Self {
        FrameAddressing {
            frame_control: 0x8841,
            pan_id: mac::PanId(0x0100),
            destination: mac::ShortAddress(0x2000),
            source: mac::ShortAddress(0x1000),
            function_code: FunctionCode::Poll,
        }
    }

    /// The response frame as expected from a responder
    pub fn response() -> Self {
        FrameAddressing {
            frame_control: 0x8841,
            pan_id: mac::PanId(0x0200),
            destination: mac::ShortAddress(0x1000),
            source: mac::ShortAddress(0x2000),
            function_code: FunctionCode::Response,
        }
    }
}


/// Ranging configuration
///
/// The defaults match a DWM1001 initiator polling eight responders on channel
/// 5 at 64 MHz PRF.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RangingConfig {
    /// Addressing of outgoing polls
    ///
    /// The anchor index replaces the low byte of the destination address.
    pub poll: FrameAddressing,
    /// Addressing of accepted responses
    ///
    /// The anchor index replaces the low byte of the PAN identifier and the
    /// low byte of the source address.
    pub response: FrameAddressing,
    /// The channel that both nodes use
    pub channel: UwbChannel,
    /// The PRF that both nodes use
    pub pulse_repetition_frequency: PulseRepetitionFrequency,
    /// The bitrate that both nodes use
    pub bitrate: BitRate,
    /// The number of responders that are polled round-robin
    pub destination_count: u8,
    /// Delay between two ranging cycles, in milliseconds
    pub cycle_delay_ms: u32,
    /// Speed of light in air, in metres per second
    pub speed_of_light: f64,
}

impl Default for RangingConfig {
    fn default() -> Self {
        RangingConfig {
            poll: FrameAddressing::poll(),
            response: FrameAddressing::response(),
            channel: Default::default(),
            pulse_repetition_frequency: Default::default(),
            bitrate: Default::default(),
            destination_count: 8,
            cycle_delay_ms: 100,
            speed_of_light: 299_702_547.0,
        }
    }
}

impl RangingConfig {
    /// Checks that the configuration can be used for ranging
    pub fn validate<E>(&self) -> Result<(), Error<E>> {
        if self.destination_count == 0 {
            return Err(Error::InvalidConfiguration);
        }
        if !(self.speed_of_light > 0.0) {
            return Err(Error::InvalidConfiguration);
        }

        Ok(())
    }
}
