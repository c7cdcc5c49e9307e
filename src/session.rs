//! State that persists between ranging cycles

use core::num::Wrapping;


/// The number of responders that are polled in round-robin fashion, unless
/// configured otherwise
pub const DESTINATION_NB: u8 = 8;


/// Sequence number and destination cursor of an initiator
///
/// The anchor index is not stored. It is always derived from the current
/// sequence number, so the two can't drift apart.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SessionState {
    seq: Wrapping<u8>,
    destination_count: u8,
}

impl SessionState {
    /// Creates a session that starts at sequence number 0
    ///
    /// A `destination_count` of zero is treated as one.
    pub fn new(destination_count: u8) -> Self {
        SessionState {
            seq: Wrapping(0),
            destination_count: destination_count.max(1),
        }
    }

    /// The sequence number of the next poll
    pub fn sequence(&self) -> u8 {
        self.seq.0
    }

    /// The index of the anchor that the next poll addresses
    pub fn anchor_index(&self) -> u8 {
        self.seq.0 % self.destination_count
    }

    /// The number of anchors that are cycled through
    pub fn destination_count(&self) -> u8 {
        self.destination_count
    }

    /// Moves on to the next sequence number
    ///
    /// Must be called exactly once per ranging cycle, whatever its outcome.
    pub fn advance(&mut self) {
        self.seq += Wrapping(1);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::new(DESTINATION_NB)
    }
}
