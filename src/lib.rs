//! Single-sided two-way ranging for UWB transceivers
//!
//! This crate implements the initiator side of single-sided two-way ranging
//! (SS-TWR), as used with the Decawave DW1000 and the DWM1001 module. The
//! initiator polls a number of responders in turn, and computes the distance
//! to each of them from the time stamps in their response.
//!
//! The crate doesn't talk to hardware. Everything it needs from the
//! transceiver is expressed by the [`Radio`] trait; results are forwarded to
//! a [`Transport`], typically a UART.
//!
//! The main entry point is [`RangingExchange`]:
//!
//! - [`RangingExchange::run_cycle`] runs one poll/response round trip.
//! - [`RangingExchange::run`] runs cycles until cancelled, and forwards every
//!   result to [`Telemetry`].
//!
//! Debug output is available through [defmt], if the `defmt` feature is
//! enabled.
//!
//! [`Radio`]: radio/trait.Radio.html
//! [`Transport`]: telemetry/trait.Transport.html
//! [`Telemetry`]: telemetry/struct.Telemetry.html
//! [`RangingExchange`]: exchange/struct.RangingExchange.html
//! [`RangingExchange::run_cycle`]: exchange/struct.RangingExchange.html#method.run_cycle
//! [`RangingExchange::run`]: exchange/struct.RangingExchange.html#method.run
//! [defmt]: https://crates.io/crates/defmt


#![no_std]

#![deny(missing_docs)]


#[macro_use]
pub mod macros;

pub mod configs;
pub mod exchange;
pub mod frame;
pub mod radio;
pub mod range_bias;
pub mod ranging;
pub mod session;
pub mod telemetry;
pub mod time;

mod error;

#[cfg(test)]
mod testing;


pub use ieee802154::mac;

pub use crate::{
    configs::RangingConfig,
    error::Error,
    exchange::{CancelToken, Cycle, RangingExchange, RangingResult},
    radio::{Outcome, Radio, Status},
    range_bias::{CalibrationTable, NoBias, RangeBias},
    session::SessionState,
    telemetry::{Telemetry, Transport},
};
