//! Encoding and decoding of the ranging frames
//!
//! Both frames are IEEE 802.15.4 data frames with 16-bit addressing. Their
//! first 10 bytes are common:
//!
//! | Offset | Field               | Width |
//! |--------|---------------------|-------|
//! | 0      | frame control       | 2     |
//! | 2      | sequence number     | 1     |
//! | 3      | PAN id              | 2     |
//! | 5      | destination address | 2     |
//! | 7      | source address      | 2     |
//! | 9      | function code       | 1     |
//!
//! The poll frame carries no payload. The response frame adds the time the
//! poll was received (offset 10) and the time the response was sent (offset
//! 14), both as the low 32 bits of the responder's device time. Each frame
//! ends with a 2-byte checksum that is appended by the radio.
//!
//! All multi-byte fields are little-endian.

use core::mem::size_of;

use crate::{
    configs::FrameAddressing,
    time::Timestamp,
};


/// Length of the header that both frames share
pub const COMMON_LEN: usize = 10;

/// Length of the checksum that the radio appends to every frame
pub const CHECKSUM_LEN: usize = 2;

/// Length of the poll frame, including checksum
pub const POLL_LEN: usize = COMMON_LEN + CHECKSUM_LEN;

/// Length of the response frame, including checksum
pub const RESPONSE_LEN: usize = COMMON_LEN + 4 + 4 + CHECKSUM_LEN;

/// Capacity of the receive buffer
///
/// Frames that are reported as longer than this are never read.
pub const RX_BUFFER_LEN: usize = RESPONSE_LEN;


/// Implemented for the integer types that frame fields can have
///
/// The least significant byte is always at the lowest address.
pub trait FieldValue: Copy {
    /// Reads the value from exactly `size_of::<Self>()` bytes
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Writes the value into exactly `size_of::<Self>()` bytes
    fn write_le_slice(self, bytes: &mut [u8]);
}

/// Internal macro used to implement `FieldValue`
macro_rules! impl_field_value {
    ($($ty:ty,)*) => {
        $(
            impl FieldValue for $ty {
                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut val = 0;

                    for (i, &b) in bytes.iter().enumerate() {
                        val |= (b as $ty) << (i * 8);
                    }

                    val
                }

                fn write_le_slice(self, bytes: &mut [u8]) {
                    for (i, b) in bytes.iter_mut().enumerate() {
                        *b = (self >> (i * 8)) as u8;
                    }
                }
            }
        )*
    }
}

impl_field_value! {
    u8,
    u16,
    u32,
}


/// A field at a fixed position within a frame
pub trait Field {
    /// The type of the field's value
    type Value: FieldValue;

    /// Offset of the field's first byte from the start of the frame
    const OFFSET: usize;

    /// Number of bytes that the field occupies
    const LEN: usize = size_of::<Self::Value>();

    /// Reads the field from a frame
    ///
    /// The frame must be at least `OFFSET + LEN` bytes long.
    fn read(frame: &[u8]) -> Self::Value {
        Self::Value::from_le_slice(&frame[Self::OFFSET..Self::OFFSET + Self::LEN])
    }

    /// Writes the field into a frame
    ///
    /// The frame must be at least `OFFSET + LEN` bytes long.
    fn write(frame: &mut [u8], value: Self::Value) {
        value.write_le_slice(&mut frame[Self::OFFSET..Self::OFFSET + Self::LEN])
    }
}

/// Generates field implementations
macro_rules! impl_fields {
    (
        $(
            $name:ident, $offset:expr, $ty:ty; #[$doc:meta]
        )*
    ) => {
        $(
            #[$doc]
            #[allow(non_camel_case_types)]
            pub struct $name;

            impl Field for $name {
                type Value = $ty;
                const OFFSET: usize = $offset;
            }
        )*
    }
}

// All fields of both frames. Each line follows the syntax:
// <name>, <offset>, <type>; /// <doc>
impl_fields! {
    FRAME_CONTROL,     0,  u16; /// Frame control
    SEQUENCE,          2,  u8;  /// Sequence number
    PAN_ID,            3,  u16; /// PAN id, or responder id in responses
    DESTINATION,       5,  u16; /// Destination short address
    SOURCE,            7,  u16; /// Source short address
    FUNCTION_CODE,     9,  u8;  /// Function code
    POLL_RX_TIME,     10,  u32; /// Poll reception time (response only)
    RESPONSE_TX_TIME, 14,  u32; /// Response transmission time (response only)
}


/// Replaces the low byte of a 16-bit field with the anchor index
fn with_anchor(value: u16, anchor: u8) -> u16 {
    (value & 0xff00) | anchor as u16
}


/// The header that both frames share
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommonHeader {
    /// Frame control
    pub frame_control: u16,
    /// Sequence number
    pub sequence: u8,
    /// PAN id, or responder id in responses
    pub pan_id: u16,
    /// Destination short address
    pub destination: u16,
    /// Source short address
    pub source: u16,
    /// Function code
    pub function_code: u8,
}

impl CommonHeader {
    /// Creates the header of the poll that addresses the given anchor
    ///
    /// The anchor index replaces the low byte of the destination address.
    pub fn poll(addressing: &FrameAddressing, sequence: u8, anchor: u8) -> Self {
        CommonHeader {
            frame_control: addressing.frame_control,
            sequence,
            pan_id: addressing.pan_id.0,
            destination: with_anchor(addressing.destination.0, anchor),
            source: addressing.source.0,
            function_code: addressing.function_code.into(),
        }
    }

    /// Creates the header a response from the given anchor must have
    ///
    /// The anchor index replaces the low bytes of the responder id and of the
    /// source address. The sequence number is zero, as it is not compared.
    pub fn response(addressing: &FrameAddressing, anchor: u8) -> Self {
        CommonHeader {
            frame_control: addressing.frame_control,
            sequence: 0,
            pan_id: with_anchor(addressing.pan_id.0, anchor),
            destination: addressing.destination.0,
            source: with_anchor(addressing.source.0, anchor),
            function_code: addressing.function_code.into(),
        }
    }

    /// Reads the header from the start of a frame
    ///
    /// The frame must be at least [`COMMON_LEN`] bytes long.
    pub fn read(frame: &[u8]) -> Self {
        CommonHeader {
            frame_control: FRAME_CONTROL::read(frame),
            sequence: SEQUENCE::read(frame),
            pan_id: PAN_ID::read(frame),
            destination: DESTINATION::read(frame),
            source: SOURCE::read(frame),
            function_code: FUNCTION_CODE::read(frame),
        }
    }

    /// Writes the header to the start of a frame
    ///
    /// The frame must be at least [`COMMON_LEN`] bytes long.
    pub fn write(&self, frame: &mut [u8]) {
        FRAME_CONTROL::write(frame, self.frame_control);
        SEQUENCE::write(frame, self.sequence);
        PAN_ID::write(frame, self.pan_id);
        DESTINATION::write(frame, self.destination);
        SOURCE::write(frame, self.source);
        FUNCTION_CODE::write(frame, self.function_code);
    }
}


/// An encoded poll frame
///
/// The buffer includes room for the checksum, as the radio expects the full
/// frame length.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollFrame([u8; POLL_LEN]);

impl PollFrame {
    /// Encodes a poll addressed to the given anchor
    pub fn encode(addressing: &FrameAddressing, sequence: u8, anchor: u8) -> Self {
        let mut buf = [0; POLL_LEN];
        CommonHeader::poll(addressing, sequence, anchor).write(&mut buf);
        PollFrame(buf)
    }

    /// The application data of the frame, without checksum
    pub fn payload(&self) -> &[u8] {
        &self.0[..COMMON_LEN]
    }

    /// The whole frame, including the space for the checksum
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}


/// The header an accepted response must have
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResponseTemplate([u8; COMMON_LEN]);

impl ResponseTemplate {
    /// Creates the template for responses from the given anchor
    pub fn new(addressing: &FrameAddressing, anchor: u8) -> Self {
        Self::from_header(&CommonHeader::response(addressing, anchor))
    }

    /// Creates a template from an explicit header
    ///
    /// The header's sequence number is ignored.
    pub fn from_header(header: &CommonHeader) -> Self {
        let mut buf = [0; COMMON_LEN];
        header.write(&mut buf);
        buf[SEQUENCE::OFFSET] = 0;
        ResponseTemplate(buf)
    }

    /// Checks whether a frame starts with this template
    ///
    /// The sequence number is not compared.
    pub fn matches(&self, frame: &[u8]) -> bool {
        if frame.len() < COMMON_LEN {
            return false;
        }

        let mut header = [0; COMMON_LEN];
        header.copy_from_slice(&frame[..COMMON_LEN]);
        header[SEQUENCE::OFFSET] = 0;

        header == self.0
    }

    /// The raw header bytes, with a zero sequence number
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}


/// A response frame, as sent by a responder
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResponseFrame {
    /// The frame header
    pub header: CommonHeader,
    /// When the responder received the poll, in responder time
    pub poll_rx_time: Timestamp,
    /// When the responder sent the response, in responder time
    pub response_tx_time: Timestamp,
}

impl ResponseFrame {
    /// Encodes the frame, leaving room for the checksum
    pub fn encode(&self) -> [u8; RESPONSE_LEN] {
        let mut buf = [0; RESPONSE_LEN];
        self.header.write(&mut buf);
        POLL_RX_TIME::write(&mut buf, self.poll_rx_time.value());
        RESPONSE_TX_TIME::write(&mut buf, self.response_tx_time.value());
        buf
    }
}


/// The fields of a response that ranging needs
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResponseFields {
    /// The responder id
    pub id: u16,
    /// Destination address of the response
    pub destination: u16,
    /// Source address of the response
    pub source: u16,
    /// When the responder received the poll, in responder time
    pub poll_rx_time: Timestamp,
    /// When the responder sent the response, in responder time
    pub response_tx_time: Timestamp,
}


/// Why a received frame was dropped
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rejected {
    /// The frame doesn't fit into the receive buffer and was not read
    Oversized {
        /// The frame length reported by the radio
        len: usize,
    },

    /// The frame is shorter than a response, including its checksum
    Truncated {
        /// The frame length reported by the radio
        len: usize,
    },

    /// The frame header doesn't match the expected response
    HeaderMismatch,
}

/// Checks a reported frame length before anything is read from the radio
///
/// `len` includes the checksum. Anything shorter than a full response would
/// have its checksum bytes decoded as time stamp data.
pub fn check_length(len: usize) -> Result<(), Rejected> {
    if len > RX_BUFFER_LEN {
        return Err(Rejected::Oversized { len });
    }
    if len < RESPONSE_LEN {
        return Err(Rejected::Truncated { len });
    }

    Ok(())
}

/// Decodes a received response
///
/// `frame` holds the bytes read from the radio; its length is the frame
/// length the radio reported. The sequence number is not checked.
pub fn decode_response(
    frame: &[u8],
    template: &ResponseTemplate,
) -> Result<ResponseFields, Rejected> {
    check_length(frame.len())?;

    if !template.matches(frame) {
        return Err(Rejected::HeaderMismatch);
    }

    Ok(ResponseFields {
        id: PAN_ID::read(frame),
        destination: DESTINATION::read(frame),
        source: SOURCE::read(frame),
        poll_rx_time: Timestamp::new(POLL_RX_TIME::read(frame)),
        response_tx_time: Timestamp::new(RESPONSE_TX_TIME::read(frame)),
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac;

    fn response(header: CommonHeader, poll_rx: u32, response_tx: u32) -> ResponseFrame {
        ResponseFrame {
            header,
            poll_rx_time: Timestamp::new(poll_rx),
            response_tx_time: Timestamp::new(response_tx),
        }
    }

    #[test]
    fn poll_has_expected_layout() {
        let poll = PollFrame::encode(&FrameAddressing::poll(), 0x17, 3);

        assert_eq!(
            poll.payload(),
            &[0x41, 0x88, 0x17, 0x00, 0x01, 0x03, 0x20, 0x00, 0x10, 0xE0][..]
        );
        assert_eq!(poll.as_bytes().len(), POLL_LEN);
        assert_eq!(&poll.as_bytes()[COMMON_LEN..], &[0, 0][..]);
    }

    #[test]
    fn response_template_has_expected_layout() {
        let template = ResponseTemplate::new(&FrameAddressing::response(), 5);

        assert_eq!(
            template.as_bytes(),
            &[0x41, 0x88, 0x00, 0x05, 0x02, 0x00, 0x10, 0x05, 0x20, 0xE1][..]
        );
    }

    #[test]
    fn fields_are_little_endian() {
        let mut buf = [0; RESPONSE_LEN];
        POLL_RX_TIME::write(&mut buf, 0x1234_5678);
        DESTINATION::write(&mut buf, 0xABCD);

        assert_eq!(&buf[10..14], &[0x78, 0x56, 0x34, 0x12][..]);
        assert_eq!(&buf[5..7], &[0xCD, 0xAB][..]);
        assert_eq!(POLL_RX_TIME::read(&buf), 0x1234_5678);
        assert_eq!(DESTINATION::read(&buf), 0xABCD);
    }

    #[test]
    fn response_round_trip_at_boundaries() {
        for &(word, stamp) in &[(0x0000u16, 0x0000_0000u32), (0xFFFF, 0xFFFF_FFFF), (0x00FF, 0x8000_0001)] {
            let header = CommonHeader {
                frame_control: 0x8841,
                sequence: 0xFF,
                pan_id: word,
                destination: word,
                source: word,
                function_code: 0xE1,
            };
            let template = ResponseTemplate::from_header(&header);
            let frame = response(header, stamp, !stamp).encode();

            let fields = decode_response(&frame, &template).unwrap();
            assert_eq!(
                fields,
                ResponseFields {
                    id: word,
                    destination: word,
                    source: word,
                    poll_rx_time: Timestamp::new(stamp),
                    response_tx_time: Timestamp::new(!stamp),
                }
            );
        }
    }

    #[test]
    fn sequence_number_is_ignored() {
        let addressing = FrameAddressing::response();
        let template = ResponseTemplate::new(&addressing, 2);

        for sequence in 0..=255u8 {
            let mut header = CommonHeader::response(&addressing, 2);
            header.sequence = sequence;
            let frame = response(header, 1, 2).encode();

            assert!(decode_response(&frame, &template).is_ok());
        }
    }

    #[test]
    fn any_changed_header_byte_is_rejected() {
        let addressing = FrameAddressing::response();
        let template = ResponseTemplate::new(&addressing, 1);
        let frame = response(CommonHeader::response(&addressing, 1), 10, 20).encode();

        for index in (0..COMMON_LEN).filter(|&i| i != SEQUENCE::OFFSET) {
            for &flip in &[0x01u8, 0x80, 0xFF] {
                let mut corrupted = frame;
                corrupted[index] ^= flip;

                assert_eq!(
                    decode_response(&corrupted, &template),
                    Err(Rejected::HeaderMismatch),
                    "byte {} flipped with {:#04x}",
                    index,
                    flip,
                );
            }
        }
    }

    #[test]
    fn response_from_other_anchor_is_rejected() {
        let addressing = FrameAddressing::response();
        let frame = response(CommonHeader::response(&addressing, 3), 10, 20).encode();

        assert!(decode_response(&frame, &ResponseTemplate::new(&addressing, 3)).is_ok());
        assert_eq!(
            decode_response(&frame, &ResponseTemplate::new(&addressing, 4)),
            Err(Rejected::HeaderMismatch)
        );
    }

    #[test]
    fn poll_frame_is_not_a_response() {
        let poll = PollFrame::encode(&FrameAddressing::poll(), 0, 0);
        let mut frame = [0; RESPONSE_LEN];
        frame[..POLL_LEN].copy_from_slice(poll.as_bytes());

        assert_eq!(
            decode_response(&frame, &ResponseTemplate::new(&FrameAddressing::response(), 0)),
            Err(Rejected::HeaderMismatch)
        );
    }

    #[test]
    fn length_is_bounded() {
        assert_eq!(check_length(RX_BUFFER_LEN + 1), Err(Rejected::Oversized { len: 21 }));
        assert_eq!(check_length(127), Err(Rejected::Oversized { len: 127 }));
        assert_eq!(check_length(19), Err(Rejected::Truncated { len: 19 }));
        assert_eq!(check_length(18), Err(Rejected::Truncated { len: 18 }));
        assert_eq!(check_length(0), Err(Rejected::Truncated { len: 0 }));
        assert!(check_length(RESPONSE_LEN).is_ok());
    }

    #[test]
    fn checksum_is_never_decoded_as_timestamp() {
        let addressing = FrameAddressing::response();
        let template = ResponseTemplate::new(&addressing, 0);

        // 16 data bytes, followed by the checksum
        let mut frame = [0; 18];
        CommonHeader::response(&addressing, 0).write(&mut frame);
        POLL_RX_TIME::write(&mut frame, 0x1111_1111);
        frame[14..16].copy_from_slice(&[0x22, 0x22]);
        frame[16..18].copy_from_slice(&[0xDE, 0xAD]);

        assert_eq!(
            decode_response(&frame, &template),
            Err(Rejected::Truncated { len: 18 })
        );
    }

    #[test]
    fn anchor_replaces_low_byte_only() {
        let addressing = FrameAddressing {
            destination: mac::ShortAddress(0x20FF),
            ..FrameAddressing::poll()
        };

        let header = CommonHeader::poll(&addressing, 0, 7);
        assert_eq!(header.destination, 0x2007);
        assert_eq!(header.source, 0x1000);
        assert_eq!(header.pan_id, 0x0100);
    }
}
