//! Implementation of single-sided two-way ranging
//!
//! The initiator sends a poll and records when it left (`T1`). The responder
//! records when the poll arrived (`T2`), and replies with a response that
//! carries `T2` and the time the response is sent (`T3`). The initiator
//! records when the response arrives (`T4`).
//!
//! ``` text
//! initiator            responder
//!     |                    |
//!  T1 |-----_____          |
//!     |          ----->    | T2
//!     |                    |
//!     |          _____-----| T3
//!  T4 |<-----              |
//! ```
//!
//! The time of flight is half the difference between the initiator's round
//! trip (`T4 - T1`) and the responder's reply time (`T3 - T2`). The reply
//! time is measured with the responder's clock, so it is scaled by the clock
//! offset between the two nodes before it is subtracted. Without that
//! correction, the error grows with the reply time and the clock drift.
//!
//! Please note that the result still needs a range bias correction, see the
//! [`range_bias`] module.
//!
//! [`range_bias`]: ../range_bias/index.html

use crate::{
    configs::{BitRate, PulseRepetitionFrequency, UwbChannel},
    range_bias::RangeBias,
    time::{Duration, Timestamp, DWT_TIME_UNITS},
};


/// The four time stamps of one exchange
///
/// `poll_tx` and `response_rx` are in initiator time, `poll_rx` and
/// `response_tx` in responder time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamps {
    /// When the poll was sent
    pub poll_tx: Timestamp,
    /// When the poll was received
    pub poll_rx: Timestamp,
    /// When the response was sent
    pub response_tx: Timestamp,
    /// When the response was received
    pub response_rx: Timestamp,
}

impl Timestamps {
    /// The initiator's round-trip time
    pub fn round_trip_initiator(&self) -> Duration {
        self.response_rx.duration_since(self.poll_tx)
    }

    /// The responder's reply time
    pub fn round_trip_responder(&self) -> Duration {
        self.response_tx.duration_since(self.poll_rx)
    }
}


/// Parameters of the distance estimation that don't change between cycles
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimatorConfig {
    /// The channel of the exchange, used for the bias lookup
    pub channel: UwbChannel,
    /// The PRF of the exchange, used for the bias lookup
    pub pulse_repetition_frequency: PulseRepetitionFrequency,
    /// Seconds per device time unit
    pub time_unit: f64,
    /// Speed of light in metres per second
    pub speed_of_light: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            channel: Default::default(),
            pulse_repetition_frequency: Default::default(),
            time_unit: DWT_TIME_UNITS,
            speed_of_light: 299_702_547.0,
        }
    }
}


/// The result of a distance estimation
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Estimate {
    /// Time of flight in seconds
    pub time_of_flight: f64,
    /// Distance in metres, without range bias correction
    pub distance: f64,
    /// Distance in metres, with range bias correction
    pub corrected_distance: f64,
}


/// Computes the clock offset ratio from the carrier integrator
///
/// The result is the relative rate difference between the remote and the
/// local clock, e.g. `1e-5` for 10 ppm.
pub fn clock_offset_ratio(carrier_integrator: i32, channel: UwbChannel, bitrate: BitRate) -> f64 {
    carrier_integrator as f64
        * (bitrate.freq_offset_multiplier() * channel.hertz_to_ppm_multiplier() / 1.0e6)
}

/// Computes the time of flight in seconds
///
/// Both round trips are computed with wrapping 32-bit arithmetic, so a
/// counter overflow in the middle of the exchange doesn't matter.
pub fn time_of_flight(timestamps: &Timestamps, clock_offset_ratio: f64, time_unit: f64) -> f64 {
    let rtd_init = timestamps.round_trip_initiator().value() as f64;
    let rtd_resp = timestamps.round_trip_responder().value() as f64;

    ((rtd_init - rtd_resp * (1.0 - clock_offset_ratio)) / 2.0) * time_unit
}

/// Computes the distance to the responder
pub fn estimate<B>(
    timestamps: &Timestamps,
    clock_offset_ratio: f64,
    bias: &B,
    config: &EstimatorConfig,
) -> Estimate
where
    B: RangeBias + ?Sized,
{
    let time_of_flight = time_of_flight(timestamps, clock_offset_ratio, config.time_unit);
    let distance = time_of_flight * config.speed_of_light;

    let range_bias = bias.range_bias(
        config.channel,
        distance,
        config.pulse_repetition_frequency,
    );

    Estimate {
        time_of_flight,
        distance,
        corrected_distance: distance - range_bias,
    }
}
