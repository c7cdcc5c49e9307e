//! Time-related types based on the low 32 bits of the DW1000's system time


/// Duration of one device time unit, in seconds
///
/// The system clock runs at 499.2 MHz * 128, so one unit is about 15.65 ps.
pub const DWT_TIME_UNITS: f64 = 1.0 / 499.2e6 / 128.0;


/// Represents an instant in time, truncated to 32 bits
///
/// The high byte of each 40-bit time stamp is discarded. This is acceptable
/// as long as the two time stamps that are compared are never more than 2^32
/// device time units apart (about 67 ms).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct Timestamp(u32);

impl Timestamp {
    /// Creates a new instance of `Timestamp` from its raw 32-bit value
    pub fn new(value: u32) -> Self {
        Timestamp(value)
    }

    /// Returns the raw 32-bit timestamp
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the amount of time passed between the two `Timestamp`s
    ///
    /// Assumes that `&self` represents a later time than the argument
    /// `earlier`. The subtraction wraps around, so a counter overflow between
    /// the two time stamps is handled correctly.
    ///
    /// # Example
    ///
    /// ``` rust
    /// use ss_twr::time::Timestamp;
    ///
    /// let earlier = Timestamp::new(0xffff_fff0);
    /// let later   = Timestamp::new(0x0000_0010);
    ///
    /// assert_eq!(later.duration_since(earlier).value(), 0x20);
    /// ```
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration(self.0.wrapping_sub(earlier.0))
    }
}


/// A duration between two 32-bit time stamps, in device time units
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct Duration(u32);

impl Duration {
    /// Creates a new instance of `Duration`
    pub fn new(value: u32) -> Self {
        Duration(value)
    }

    /// Returns the raw number of device time units
    pub fn value(&self) -> u32 {
        self.0
    }
}
