//! The radio that the ranging exchange runs on
//!
//! The exchange doesn't talk to registers itself. Everything it needs from
//! the transceiver is expressed by the [`Radio`] trait, which can be
//! implemented on top of a DW1000 driver, or by a fake radio in tests.

use core::ops::{BitOr, BitOrAssign};


/// A set of event flags in the radio's status register
///
/// The bit positions are those of the DW1000 `SYS_STATUS` register.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u32);

impl Status {
    /// TX Frame Sent
    pub const TXFRS: Status = Status(1 << 7);
    /// RX PHY Header Error
    pub const RXPHE: Status = Status(1 << 12);
    /// RX FCS Good
    pub const RXFCG: Status = Status(1 << 14);
    /// RX FCS Error
    pub const RXFCE: Status = Status(1 << 15);
    /// RX Reed-Solomon Frame Sync Loss
    pub const RXRFSL: Status = Status(1 << 16);
    /// RX Frame Wait Timeout
    pub const RXRFTO: Status = Status(1 << 17);
    /// Leading Edge Detection Error
    pub const LDEERR: Status = Status(1 << 18);
    /// Preamble Detection Timeout
    pub const RXPTO: Status = Status(1 << 21);
    /// Receive SFD Timeout
    pub const RXSFDTO: Status = Status(1 << 26);
    /// Auto Frame Filtering Rejection
    pub const AFFREJ: Status = Status(1 << 29);

    /// All receive timeout events
    pub const ALL_RX_TO: Status = Status(Self::RXRFTO.0 | Self::RXPTO.0);

    /// All receive error events
    pub const ALL_RX_ERR: Status = Status(
        Self::RXPHE.0
            | Self::RXFCE.0
            | Self::RXRFSL.0
            | Self::RXSFDTO.0
            | Self::AFFREJ.0
            | Self::LDEERR.0,
    );

    /// Returns whether any of the flags in `other` is set
    pub fn intersects(&self, other: Status) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns whether all of the flags in `other` are set
    pub fn contains(&self, other: Status) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Status {
    type Output = Status;

    fn bitor(self, rhs: Status) -> Status {
        Status(self.0 | rhs.0)
    }
}

impl BitOrAssign for Status {
    fn bitor_assign(&mut self, rhs: Status) {
        self.0 |= rhs.0;
    }
}


/// What the receiver reported after a poll was sent
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// A frame with a good checksum was received
    FrameReceived {
        /// The frame length, including checksum
        len: usize,
    },

    /// The receiver timed out
    Timeout,

    /// The receiver reported an error (checksum, PHY header, ...)
    Error,
}

impl Outcome {
    /// Classifies a status register value
    ///
    /// Returns `None`, if none of the relevant events has happened yet. A good
    /// frame takes precedence over timeout and error events.
    pub fn from_status(status: Status, frame_len: usize) -> Option<Self> {
        if status.intersects(Status::RXFCG) {
            Some(Outcome::FrameReceived { len: frame_len })
        } else if status.intersects(Status::ALL_RX_TO) {
            Some(Outcome::Timeout)
        } else if status.intersects(Status::ALL_RX_ERR) {
            Some(Outcome::Error)
        } else {
            None
        }
    }
}


/// The capabilities of the radio that the initiator needs
///
/// Methods that talk to the hardware can fail with `Self::Error`, which
/// typically wraps an SPI error.
pub trait Radio {
    /// An error that occured while talking to the radio
    type Error;

    /// Starts transmitting a frame
    ///
    /// `frame` includes the room for the checksum that the radio appends. If
    /// `expect_response` is set, the receiver is enabled automatically once
    /// the frame has been sent.
    fn transmit(&mut self, frame: &[u8], expect_response: bool) -> Result<(), Self::Error>;

    /// Checks whether the receiver has finished
    ///
    /// Returns `nb::Error::WouldBlock`, if nothing has happened yet. This
    /// method does not block; the exchange polls it until it returns an
    /// outcome or its timer runs out.
    fn wait_outcome(&mut self) -> nb::Result<Outcome, Self::Error>;

    /// Reads the low 32 bits of the poll TX and response RX time stamps
    fn read_local_timestamps(&mut self) -> Result<(u32, u32), Self::Error>;

    /// Reads the carrier integrator of the last reception
    ///
    /// This is the raw measurement of the frequency offset between the remote
    /// and the local clock.
    fn read_carrier_integrator(&mut self) -> Result<i32, Self::Error>;

    /// Copies the received frame into `buffer`
    ///
    /// `buffer` is exactly as long as the frame length reported in
    /// [`Outcome::FrameReceived`].
    fn read_frame(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Clears event flags in the status register
    fn clear_status(&mut self, flags: Status) -> Result<(), Self::Error>;

    /// Resets the receiver
    ///
    /// Required after a receive timeout or error, to reinitialize leading
    /// edge detection.
    fn reset_receiver(&mut self) -> Result<(), Self::Error>;
}
