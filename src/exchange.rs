//! The initiator side of a single-sided two-way ranging exchange
//!
//! [`RangingExchange`] drives one poll/response round trip per call to
//! [`RangingExchange::run_cycle`]:
//!
//! ``` text
//! Idle -> Polling -> AwaitingOutcome -> Completed
//!                                    -> TimedOut
//!                                    -> Errored
//!                                    -> Cancelled
//! ```
//!
//! Each cycle starts from `Idle` again. A missing or corrupted response is
//! not an error: the receiver is reset and the cycle is reported as
//! [`Cycle::TimedOut`] or [`Cycle::Errored`]. Only failures of the radio
//! itself are returned as [`Error`].

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::{blocking::delay::DelayMs, timer::CountDown};

use crate::{
    configs::RangingConfig,
    frame::{self, PollFrame, Rejected, ResponseTemplate, RX_BUFFER_LEN},
    macros::WaitError,
    radio::{Outcome, Radio, Status},
    range_bias::RangeBias,
    ranging::{self, EstimatorConfig, Timestamps},
    session::SessionState,
    telemetry::{SendError, Telemetry, Transport},
    time::{Timestamp, DWT_TIME_UNITS},
    Error,
};


/// Signals a ranging exchange to stop
///
/// The flag is typically shared with an interrupt handler, which sets it.
#[derive(Clone, Copy, Debug)]
pub struct CancelToken<'a>(&'a AtomicBool);

impl<'a> CancelToken<'a> {
    /// Creates a token that is controlled by `flag`
    pub fn new(flag: &'a AtomicBool) -> Self {
        CancelToken(flag)
    }

    /// Indicates whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Requests cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release)
    }
}


/// Where a ranging exchange is in its cycle
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExchangeState {
    /// No cycle has been started, or the next one is about to start
    Idle,
    /// The poll is being handed to the radio
    Polling,
    /// Waiting for the receiver to report an outcome
    AwaitingOutcome,
    /// A frame was received, whether or not it was accepted
    Completed,
    /// No response arrived in time
    TimedOut,
    /// The receiver reported an error
    Errored,
    /// The wait was cancelled
    Cancelled,
}


/// A computed distance to one responder
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangingResult {
    /// The responder id, from the PAN id field of the response
    pub id: u16,
    /// Destination address of the response
    pub destination: u16,
    /// Source address of the response
    pub source: u16,
    /// Distance in metres, without range bias correction
    pub distance: f64,
    /// Distance in metres, with range bias correction
    pub corrected_distance: f64,
}


/// The outcome of one ranging cycle
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cycle {
    /// A response was accepted and a distance computed
    Completed(RangingResult),
    /// A frame was received, but dropped
    Rejected(Rejected),
    /// No response arrived in time
    TimedOut,
    /// The receiver reported an error
    Errored,
    /// The wait for the response was cancelled
    Cancelled,
}


/// Per-outcome cycle counts
///
/// All counts wrap around on overflow.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counters {
    /// Cycles in which a poll was handed to the radio
    ///
    /// Advances together with the sequence number, also when the radio
    /// reports a failure while transmitting.
    pub cycles: u32,
    /// Cycles that produced a result
    pub completed: u32,
    /// Cycles whose frame was dropped
    pub rejected: u32,
    /// Cycles without a response
    pub timed_out: u32,
    /// Cycles with a receive error
    pub errored: u32,
    /// Cycles that were cancelled
    pub cancelled: u32,
    /// Results that could not be forwarded to telemetry
    pub telemetry_failed: u32,
}

impl Counters {
    fn record(&mut self, cycle: &Cycle) {
        let counter = match cycle {
            Cycle::Completed(_) => &mut self.completed,
            Cycle::Rejected(_) => &mut self.rejected,
            Cycle::TimedOut => &mut self.timed_out,
            Cycle::Errored => &mut self.errored,
            Cycle::Cancelled => &mut self.cancelled,
        };
        *counter = counter.wrapping_add(1);
    }
}


/// Drives single-sided two-way ranging exchanges as the initiator
///
/// `TIMER` bounds the wait for each response; it is started with
/// `rx_timeout` at the beginning of every wait.
pub struct RangingExchange<R, B, TIMER>
where
    TIMER: CountDown,
{
    radio: R,
    bias: B,
    timer: TIMER,
    rx_timeout: TIMER::Time,
    config: RangingConfig,
    estimator: EstimatorConfig,
    session: SessionState,
    rx_buffer: [u8; RX_BUFFER_LEN],
    state: ExchangeState,
    counters: Counters,
}

impl<R, B, TIMER> RangingExchange<R, B, TIMER>
where
    R: Radio,
    B: RangeBias,
    TIMER: CountDown,
    TIMER::Time: Clone,
{
    /// Creates a new exchange
    ///
    /// Returns [`Error::InvalidConfiguration`], if `config` can't be used.
    pub fn new(
        radio: R,
        bias: B,
        timer: TIMER,
        rx_timeout: TIMER::Time,
        config: RangingConfig,
    ) -> Result<Self, Error<R::Error>> {
        config.validate()?;

        let estimator = EstimatorConfig {
            channel: config.channel,
            pulse_repetition_frequency: config.pulse_repetition_frequency,
            time_unit: DWT_TIME_UNITS,
            speed_of_light: config.speed_of_light,
        };

        Ok(RangingExchange {
            radio,
            bias,
            timer,
            rx_timeout,
            config,
            estimator,
            session: SessionState::new(config.destination_count),
            rx_buffer: [0; RX_BUFFER_LEN],
            state: ExchangeState::Idle,
            counters: Counters::default(),
        })
    }

    /// Runs one ranging cycle
    ///
    /// Sends a poll to the next anchor and waits for its response, until the
    /// timer runs out or `cancel` is triggered. The sequence number advances
    /// once the poll has been handed to the radio, whatever the outcome.
    ///
    /// If the radio fails, the error is returned and the state is left where
    /// the failure occured.
    pub fn run_cycle(&mut self, cancel: &CancelToken) -> Result<Cycle, Error<R::Error>> {
        self.state = ExchangeState::Idle;

        let sequence = self.session.sequence();
        let anchor = self.session.anchor_index();
        let poll = PollFrame::encode(&self.config.poll, sequence, anchor);
        let template = ResponseTemplate::new(&self.config.response, anchor);

        self.state = ExchangeState::Polling;
        self.radio
            .clear_status(Status::TXFRS)
            .map_err(Error::Radio)?;
        let sent = self.radio.transmit(poll.as_bytes(), true);
        self.session.advance();
        self.counters.cycles = self.counters.cycles.wrapping_add(1);
        sent.map_err(Error::Radio)?;

        debug!("poll sent: seq {}, anchor {}", sequence, anchor);

        self.state = ExchangeState::AwaitingOutcome;
        self.timer.start(self.rx_timeout.clone());
        let outcome = block_cancellable!(&mut self.timer, cancel, self.radio.wait_outcome());

        let cycle = match outcome {
            Ok(Outcome::FrameReceived { len }) => {
                self.state = ExchangeState::Completed;
                self.receive(len, &template)?
            }
            Ok(Outcome::Timeout) | Err(WaitError::Timeout) => {
                warn!("no response from anchor {}", anchor);
                self.state = ExchangeState::TimedOut;
                self.recover()?;
                Cycle::TimedOut
            }
            Ok(Outcome::Error) => {
                warn!("receive error, anchor {}", anchor);
                self.state = ExchangeState::Errored;
                self.recover()?;
                Cycle::Errored
            }
            Err(WaitError::Cancelled) => {
                debug!("cancelled while waiting for anchor {}", anchor);
                self.state = ExchangeState::Cancelled;
                self.radio.reset_receiver().map_err(Error::Radio)?;
                Cycle::Cancelled
            }
            Err(WaitError::Other(error)) => return Err(Error::Radio(error)),
        };

        self.counters.record(&cycle);

        Ok(cycle)
    }

    /// Runs ranging cycles until `cancel` is triggered
    ///
    /// Every result is forwarded to `telemetry`. A result that can't be
    /// forwarded is counted and dropped. Between two cycles, `delay` waits for
    /// the configured inter-cycle delay.
    ///
    /// Returns `Ok(())` once cancelled, or the first radio failure.
    pub fn run<T, D>(
        &mut self,
        telemetry: &mut Telemetry<T>,
        delay: &mut D,
        cancel: &CancelToken,
    ) -> Result<(), Error<R::Error>>
    where
        T: Transport,
        D: DelayMs<u32>,
    {
        while !cancel.is_cancelled() {
            match self.run_cycle(cancel)? {
                Cycle::Completed(result) => {
                    if let Err(error) = telemetry.send(&result) {
                        self.counters.telemetry_failed =
                            self.counters.telemetry_failed.wrapping_add(1);

                        match error {
                            SendError::NoSpace { required, available } => {
                                warn!("telemetry: need {} bytes, {} available", required, available);
                            }
                            _ => {
                                warn!("telemetry: failed to send result");
                            }
                        }
                    }
                }
                Cycle::Cancelled => break,
                _ => (),
            }

            delay.delay_ms(self.config.cycle_delay_ms);
        }

        Ok(())
    }

    /// Handles a good frame reported by the receiver
    fn receive(
        &mut self,
        len: usize,
        template: &ResponseTemplate,
    ) -> Result<Cycle, Error<R::Error>> {
        self.radio
            .clear_status(Status::RXFCG)
            .map_err(Error::Radio)?;

        // Nothing is read from the radio, unless the frame fits.
        if let Err(reason) = frame::check_length(len) {
            warn!("frame dropped: {}", reason);
            return Ok(Cycle::Rejected(reason));
        }

        self.rx_buffer = [0; RX_BUFFER_LEN];
        self.radio
            .read_frame(&mut self.rx_buffer[..len])
            .map_err(Error::Radio)?;

        let fields = match frame::decode_response(&self.rx_buffer[..len], template) {
            Ok(fields) => fields,
            Err(reason) => {
                warn!("frame dropped: {}", reason);
                return Ok(Cycle::Rejected(reason));
            }
        };

        let (poll_tx, response_rx) = self
            .radio
            .read_local_timestamps()
            .map_err(Error::Radio)?;
        let carrier_integrator = self
            .radio
            .read_carrier_integrator()
            .map_err(Error::Radio)?;

        let timestamps = Timestamps {
            poll_tx: Timestamp::new(poll_tx),
            poll_rx: fields.poll_rx_time,
            response_tx: fields.response_tx_time,
            response_rx: Timestamp::new(response_rx),
        };
        let clock_offset_ratio = ranging::clock_offset_ratio(
            carrier_integrator,
            self.config.channel,
            self.config.bitrate,
        );
        let estimate = ranging::estimate(
            &timestamps,
            clock_offset_ratio,
            &self.bias,
            &self.estimator,
        );

        debug!(
            "distance to {}: {} m ({} m corrected)",
            fields.id,
            estimate.distance,
            estimate.corrected_distance,
        );

        Ok(Cycle::Completed(RangingResult {
            id: fields.id,
            destination: fields.destination,
            source: fields.source,
            distance: estimate.distance,
            corrected_distance: estimate.corrected_distance,
        }))
    }

    /// Clears the receive events and resets the receiver
    fn recover(&mut self) -> Result<(), Error<R::Error>> {
        self.radio
            .clear_status(Status::ALL_RX_TO | Status::ALL_RX_ERR)
            .map_err(Error::Radio)?;
        self.radio.reset_receiver().map_err(Error::Radio)
    }

    /// The state the last cycle left the exchange in
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Outcome counts since the exchange was created
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// The sequence number and anchor of the next cycle
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// The configuration the exchange was created with
    pub fn config(&self) -> &RangingConfig {
        &self.config
    }

    /// Gives access to the radio
    pub fn radio(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Releases the radio, range bias and timer
    pub fn release(self) -> (R, B, TIMER) {
        (self.radio, self.bias, self.timer)
    }
}
