//! Forwarding of ranging results to a telemetry consumer
//!
//! Results are serialized into a fixed 24-byte [`ResultRecord`] and sent as
//! MIN frames over a byte-oriented [`Transport`], typically a UART. The MIN
//! framing is the one of the Microcontroller Interconnect Network protocol,
//! without its transport layer (no acknowledgements, no retransmission):
//!
//! ``` text
//! AA AA AA | id | len | payload | CRC-32 (4, big-endian) | 55
//! ```
//!
//! Everything between the start-of-frame bytes and the end-of-frame byte is
//! byte-stuffed: after two consecutive `AA` bytes, a `55` is inserted, so the
//! receiver never sees a start-of-frame sequence inside a frame.

use core::fmt;

use crc::{Crc, Digest, CRC_32_ISO_HDLC};
use serde::{Deserialize, Serialize};

use crate::exchange::RangingResult;


/// Length of a serialized [`ResultRecord`]
pub const RECORD_LEN: usize = 24;

/// MIN start-of-frame byte, sent three times
pub const HEADER_BYTE: u8 = 0xAA;

/// MIN stuff byte, inserted after two header bytes in a frame body
pub const STUFF_BYTE: u8 = 0x55;

/// MIN end-of-frame byte
pub const EOF_BYTE: u8 = 0x55;

/// Largest payload a MIN frame can carry
pub const MAX_PAYLOAD: usize = 255;

/// The MIN id of the first frame that is sent
pub const FIRST_MIN_ID: u8 = 0x81;

/// Number of bytes a frame takes up on the wire, not counting stuff bytes
pub const fn on_wire_size(payload_len: usize) -> usize {
    payload_len + 10
}

/// Transport space that must be available before a frame is sent
///
/// One byte more than [`on_wire_size`], matching the bound MIN checks against
/// before transmitting.
pub const fn required_space(payload_len: usize) -> usize {
    payload_len + 11
}

/// The CRC-32 used by MIN (reflected, polynomial 0xEDB88320)
pub static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);


/// A byte-oriented channel to the telemetry consumer
pub trait Transport {
    /// An error that occured while sending
    type Error;

    /// Sends the bytes of one frame
    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Returns how many bytes can be sent without blocking
    fn available_space(&self) -> usize;

    /// Returns the current time in milliseconds
    fn now_millis(&self) -> u32;
}


/// The wire layout of a ranging result
///
/// The layout matches a C struct of three `uint16` and two `double` fields
/// with natural alignment, which is what existing consumers unpack: three
/// little-endian 16-bit fields, two zero padding bytes, and two little-endian
/// IEEE 754 doubles.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[repr(C)]
pub struct ResultRecord {
    /// The responder id
    pub id: u16,
    /// Destination address of the response
    pub destination: u16,
    /// Source address of the response
    pub source: u16,
    padding: u16,
    /// Distance in metres, without range bias correction
    pub distance: f64,
    /// Distance in metres, with range bias correction
    pub corrected_distance: f64,
}

impl ResultRecord {
    /// Serializes the record
    pub fn encode(&self) -> Result<[u8; RECORD_LEN], ssmarshal::Error> {
        let mut buf = [0; RECORD_LEN];
        ssmarshal::serialize(&mut buf, self)?;
        Ok(buf)
    }

    /// Deserializes a record
    pub fn decode(bytes: &[u8]) -> Result<Self, ssmarshal::Error> {
        let (record, _) = ssmarshal::deserialize::<Self>(bytes)?;
        Ok(record)
    }
}

impl From<&RangingResult> for ResultRecord {
    fn from(result: &RangingResult) -> Self {
        ResultRecord {
            id: result.id,
            destination: result.destination,
            source: result.source,
            padding: 0,
            distance: result.distance,
            corrected_distance: result.corrected_distance,
        }
    }
}


/// Writes a MIN frame into a buffer, inserting stuff bytes as needed
struct FrameWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
    header_countdown: u8,
    crc: Digest<'static, u32>,
}

impl<'b> FrameWriter<'b> {
    fn new(buf: &'b mut [u8]) -> Self {
        FrameWriter {
            buf,
            len: 0,
            header_countdown: 2,
            crc: CRC32.digest(),
        }
    }

    fn raw(&mut self, byte: u8) -> Result<(), BufferTooSmall> {
        let slot = self.buf.get_mut(self.len).ok_or(BufferTooSmall)?;
        *slot = byte;
        self.len += 1;
        Ok(())
    }

    fn stuffed(&mut self, byte: u8, checksummed: bool) -> Result<(), BufferTooSmall> {
        if checksummed {
            self.crc.update(&[byte]);
        }
        self.raw(byte)?;

        if byte == HEADER_BYTE {
            self.header_countdown -= 1;
            if self.header_countdown == 0 {
                self.raw(STUFF_BYTE)?;
                self.header_countdown = 2;
            }
        } else {
            self.header_countdown = 2;
        }

        Ok(())
    }
}

/// The buffer passed to [`encode_frame`] is too small
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BufferTooSmall;

/// Encodes a MIN frame with the given id and payload
///
/// Only the low 6 bits of `min_id` are used. Returns the number of bytes
/// written to `buf`, or an error if the frame doesn't fit into `buf` or the
/// payload is longer than [`MAX_PAYLOAD`].
pub fn encode_frame(min_id: u8, payload: &[u8], buf: &mut [u8]) -> Result<usize, BufferTooSmall> {
    if payload.len() > MAX_PAYLOAD {
        return Err(BufferTooSmall);
    }

    let mut writer = FrameWriter::new(buf);

    for _ in 0..3 {
        writer.raw(HEADER_BYTE)?;
    }

    writer.stuffed(min_id & 0x3f, true)?;
    writer.stuffed(payload.len() as u8, true)?;
    for &byte in payload {
        writer.stuffed(byte, true)?;
    }

    let checksum = writer.crc.clone().finalize();
    for &byte in &checksum.to_be_bytes() {
        writer.stuffed(byte, false)?;
    }

    writer.raw(EOF_BYTE)?;

    Ok(writer.len)
}


/// An error that can occur when forwarding a result
pub enum SendError<E> {
    /// The transport doesn't have enough space for the frame
    ///
    /// The frame was dropped.
    NoSpace {
        /// Bytes the frame needs
        required: usize,
        /// Bytes the transport has available
        available: usize,
    },

    /// The transport failed to send the frame
    Transport(E),

    /// The record could not be serialized
    Ssmarshal(ssmarshal::Error),

    /// The frame didn't fit into the encoding buffer
    BufferTooSmall,
}

impl<E> From<ssmarshal::Error> for SendError<E> {
    fn from(error: ssmarshal::Error) -> Self {
        SendError::Ssmarshal(error)
    }
}

impl<E> From<BufferTooSmall> for SendError<E> {
    fn from(_: BufferTooSmall) -> Self {
        SendError::BufferTooSmall
    }
}

// Can't be derived without putting requirements on `E` that the other
// variants don't need.
impl<E> fmt::Debug for SendError<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SendError::NoSpace { required, available } => write!(
                f,
                "NoSpace {{ required: {:?}, available: {:?} }}",
                required, available,
            ),
            SendError::Transport(error) => write!(f, "Transport({:?})", error),
            SendError::Ssmarshal(error) => write!(f, "Ssmarshal({:?})", error),
            SendError::BufferTooSmall => write!(f, "BufferTooSmall"),
        }
    }
}


/// Sends ranging results as MIN frames
pub struct Telemetry<T> {
    transport: T,
    min_id: u8,
    last_sent_millis: Option<u32>,
}

impl<T> Telemetry<T>
where
    T: Transport,
{
    /// Creates a new instance of `Telemetry`
    pub fn new(transport: T) -> Self {
        Telemetry {
            transport,
            min_id: FIRST_MIN_ID,
            last_sent_millis: None,
        }
    }

    /// Sends one result
    ///
    /// The MIN id advances with every attempt, whether it succeeds or not.
    pub fn send(&mut self, result: &RangingResult) -> Result<(), SendError<T::Error>> {
        let min_id = self.min_id;
        self.min_id = self.min_id.wrapping_add(1);

        let payload = ResultRecord::from(result).encode()?;

        let required = required_space(payload.len());
        let available = self.transport.available_space();
        if available < required {
            return Err(SendError::NoSpace {
                required,
                available,
            });
        }

        // Worst case: every second body byte is followed by a stuff byte.
        let mut buf = [0; 3 + (2 + RECORD_LEN + 4) * 3 / 2 + 1];
        let len = encode_frame(min_id, &payload, &mut buf)?;

        self.transport
            .send(&buf[..len])
            .map_err(SendError::Transport)?;

        self.last_sent_millis = Some(self.transport.now_millis());

        Ok(())
    }

    /// The transport time at which the last frame was sent
    pub fn last_sent_millis(&self) -> Option<u32> {
        self.last_sent_millis
    }

    /// The MIN id the next frame will be sent with, before masking
    pub fn next_min_id(&self) -> u8 {
        self.min_id
    }

    /// Gives access to the transport
    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Releases the transport
    pub fn free(self) -> T {
        self.transport
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;

    fn result() -> RangingResult {
        RangingResult {
            id: 0x0203,
            destination: 0x1000,
            source: 0x2003,
            distance: 1.5,
            corrected_distance: 1.25,
        }
    }

    #[test]
    fn record_has_c_layout() {
        let bytes = ResultRecord::from(&result()).encode().unwrap();

        assert_eq!(&bytes[0..2], &[0x03, 0x02][..]);
        assert_eq!(&bytes[2..4], &[0x00, 0x10][..]);
        assert_eq!(&bytes[4..6], &[0x03, 0x20][..]);
        assert_eq!(&bytes[6..8], &[0x00, 0x00][..]);
        assert_eq!(&bytes[8..16], &1.5f64.to_le_bytes()[..]);
        assert_eq!(&bytes[16..24], &1.25f64.to_le_bytes()[..]);
    }

    #[test]
    fn record_decodes() {
        let record = ResultRecord::from(&result());
        let bytes = record.encode().unwrap();

        assert_eq!(ResultRecord::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn crc_check_value() {
        assert_eq!(CRC32.checksum(b"123456789"), 0xCBF4_3926);

        let mut digest = CRC32.digest();
        for &b in b"123456789" {
            digest.update(&[b]);
        }
        assert_eq!(digest.finalize(), 0xCBF4_3926);
    }

    #[test]
    fn frame_layout() {
        let mut buf = [0; 32];
        let len = encode_frame(0x81, &[0x01, 0x02], &mut buf).unwrap();

        let checksum = CRC32.checksum(&[0x01, 0x02, 0x01, 0x02]).to_be_bytes();

        // No stuffing needed, unless the checksum happens to contain AA AA
        assert!(!checksum.windows(2).any(|w| w == [0xAA, 0xAA]));
        assert_eq!(len, 12);
        assert_eq!(len, on_wire_size(2));
        assert_eq!(&buf[..5], &[0xAA, 0xAA, 0xAA, 0x01, 0x02][..]);
        assert_eq!(&buf[5..7], &[0x01, 0x02][..]);
        assert_eq!(&buf[7..11], &checksum[..]);
        assert_eq!(buf[11], EOF_BYTE);
        assert_eq!(buf[12], 0);
    }

    #[test]
    fn header_bytes_in_body_are_stuffed() {
        let mut buf = [0; 32];
        let len = encode_frame(0x00, &[0xAA, 0xAA, 0xAA], &mut buf).unwrap();

        // id, len, then AA AA 55 AA
        assert_eq!(&buf[3..9], &[0x00, 0x03, 0xAA, 0xAA, 0x55, 0xAA][..]);
        assert_eq!(len, 14);
        assert_eq!(len, on_wire_size(3) + 1);
    }

    #[test]
    fn small_buffer_is_reported() {
        let mut buf = [0; 8];
        assert_eq!(encode_frame(0, &[0; 4], &mut buf), Err(BufferTooSmall));
    }

    #[test]
    fn results_are_framed_and_sent() {
        let mut telemetry = Telemetry::new(FakeTransport::new(512, 42));

        telemetry.send(&result()).unwrap();
        assert_eq!(telemetry.last_sent_millis(), Some(42));
        assert_eq!(telemetry.next_min_id(), 0x82);

        let transport = telemetry.free();
        let sent = &transport.sent;
        assert_eq!(transport.frames, 1);
        assert_eq!(&sent[..3], &[0xAA, 0xAA, 0xAA][..]);
        // 0x81 is masked to its low 6 bits
        assert_eq!(sent[3], 0x01);
        assert_eq!(sent[4], RECORD_LEN as u8);
        assert_eq!(sent.last(), Some(&EOF_BYTE));
        assert!(sent.len() >= on_wire_size(RECORD_LEN));

        // Without stuff bytes, the frame is exactly as long as announced
        let stuffed = sent.windows(3).filter(|w| *w == [0xAA, 0xAA, 0x55]).count();
        assert_eq!(sent.len() - stuffed, on_wire_size(RECORD_LEN));
    }

    #[test]
    fn no_space_drops_frame_but_advances_id() {
        let mut telemetry = Telemetry::new(FakeTransport::new(required_space(RECORD_LEN) - 1, 0));

        match telemetry.send(&result()) {
            Err(SendError::NoSpace { required, available }) => {
                assert_eq!(required, 35);
                assert_eq!(available, 34);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(telemetry.next_min_id(), 0x82);
        assert_eq!(telemetry.last_sent_millis(), None);
        assert!(telemetry.transport().sent.is_empty());
    }
}
