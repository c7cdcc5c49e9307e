//! Fake components that the tests drive the exchange with

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::{blocking::delay::DelayMs, timer::CountDown};

use crate::{
    configs::FrameAddressing,
    frame::{CommonHeader, ResponseFrame, POLL_LEN, RESPONSE_LEN, RX_BUFFER_LEN},
    radio::{Outcome, Radio, Status},
    telemetry::Transport,
    time::Timestamp,
};


/// Compares two floats with an absolute tolerance
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    let d = a - b;
    d < eps && d > -eps
}


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FakeError;


/// How the fake radio reacts to a poll
#[derive(Clone, Copy, Debug)]
pub enum Behaviour {
    /// Answers like a responder would, for whichever anchor was polled
    Respond,
    /// Reports `frame` with the given length
    Frame(usize),
    /// Reports a receive timeout
    Timeout,
    /// Reports a receive error
    Error,
    /// Never reports anything
    Silent,
}


pub struct FakeRadio {
    pub behaviour: Behaviour,
    /// `WouldBlock`s before the outcome is reported
    pub wait_polls: u32,
    pub local_timestamps: (u32, u32),
    pub poll_rx_time: u32,
    pub response_tx_time: u32,
    pub carrier_integrator: i32,
    pub fail_transmit: bool,
    pub fail_read: bool,
    pub frame: [u8; 128],

    pub last_poll: [u8; POLL_LEN],
    pub expected_response: bool,
    pub outcome_polls: u32,
    pub cleared: Status,
    pub receiver_resets: u32,
    pub frames_read: u32,

    polls_left: u32,
    frame_len: usize,
}

impl FakeRadio {
    pub fn new(behaviour: Behaviour) -> Self {
        FakeRadio {
            behaviour,
            wait_polls: 0,
            local_timestamps: (0, 0),
            poll_rx_time: 0,
            response_tx_time: 0,
            carrier_integrator: 0,
            fail_transmit: false,
            fail_read: false,
            frame: [0; 128],

            last_poll: [0; POLL_LEN],
            expected_response: false,
            outcome_polls: 0,
            cleared: Status::default(),
            receiver_resets: 0,
            frames_read: 0,

            polls_left: 0,
            frame_len: 0,
        }
    }
}

impl Radio for FakeRadio {
    type Error = FakeError;

    fn transmit(&mut self, frame: &[u8], expect_response: bool) -> Result<(), FakeError> {
        if self.fail_transmit {
            return Err(FakeError);
        }

        self.last_poll.copy_from_slice(frame);
        self.expected_response = expect_response;
        self.polls_left = self.wait_polls;

        match self.behaviour {
            Behaviour::Respond => {
                let mut header = CommonHeader::response(&FrameAddressing::response(), frame[5]);
                header.sequence = frame[2];

                let response = ResponseFrame {
                    header,
                    poll_rx_time: Timestamp::new(self.poll_rx_time),
                    response_tx_time: Timestamp::new(self.response_tx_time),
                }
                .encode();

                self.frame[..RESPONSE_LEN].copy_from_slice(&response);
                self.frame_len = RESPONSE_LEN;
            }
            Behaviour::Frame(len) => {
                self.frame_len = len;
            }
            _ => (),
        }

        Ok(())
    }

    fn wait_outcome(&mut self) -> nb::Result<Outcome, FakeError> {
        self.outcome_polls += 1;

        if self.polls_left > 0 {
            self.polls_left -= 1;
            return Err(nb::Error::WouldBlock);
        }

        match self.behaviour {
            Behaviour::Respond | Behaviour::Frame(_) => {
                Ok(Outcome::FrameReceived { len: self.frame_len })
            }
            Behaviour::Timeout => Ok(Outcome::Timeout),
            Behaviour::Error => Ok(Outcome::Error),
            Behaviour::Silent => Err(nb::Error::WouldBlock),
        }
    }

    fn read_local_timestamps(&mut self) -> Result<(u32, u32), FakeError> {
        Ok(self.local_timestamps)
    }

    fn read_carrier_integrator(&mut self) -> Result<i32, FakeError> {
        Ok(self.carrier_integrator)
    }

    fn read_frame(&mut self, buffer: &mut [u8]) -> Result<(), FakeError> {
        assert!(buffer.len() <= RX_BUFFER_LEN);
        if self.fail_read {
            return Err(FakeError);
        }

        self.frames_read += 1;
        buffer.copy_from_slice(&self.frame[..buffer.len()]);
        Ok(())
    }

    fn clear_status(&mut self, flags: Status) -> Result<(), FakeError> {
        self.cleared |= flags;
        Ok(())
    }

    fn reset_receiver(&mut self) -> Result<(), FakeError> {
        self.receiver_resets += 1;
        Ok(())
    }
}


/// Expires after it has been waited on the given number of times
pub struct FakeTimer {
    remaining: u32,
}

impl FakeTimer {
    pub fn new() -> Self {
        FakeTimer { remaining: 0 }
    }
}

impl CountDown for FakeTimer {
    type Time = u32;

    fn start<T>(&mut self, count: T)
    where
        T: Into<u32>,
    {
        self.remaining = count.into();
    }

    fn wait(&mut self) -> nb::Result<(), void::Void> {
        if self.remaining == 0 {
            return Ok(());
        }

        self.remaining -= 1;
        Err(nb::Error::WouldBlock)
    }
}


/// Records delays, and optionally cancels after a number of them
pub struct FakeDelay<'a> {
    pub calls: u32,
    pub total_ms: u32,
    cancel: Option<(u32, &'a AtomicBool)>,
}

impl<'a> FakeDelay<'a> {
    pub fn new() -> Self {
        FakeDelay {
            calls: 0,
            total_ms: 0,
            cancel: None,
        }
    }

    pub fn cancel_after(calls: u32, flag: &'a AtomicBool) -> Self {
        FakeDelay {
            cancel: Some((calls, flag)),
            ..FakeDelay::new()
        }
    }
}

impl DelayMs<u32> for FakeDelay<'_> {
    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ms += ms;

        if let Some((calls, flag)) = self.cancel {
            if self.calls >= calls {
                flag.store(true, Ordering::Release);
            }
        }
    }
}


/// Collects everything that is sent
pub struct FakeTransport {
    pub sent: heapless::Vec<u8, 1024>,
    pub frames: u32,
    pub space: usize,
    pub now: u32,
}

impl FakeTransport {
    pub fn new(space: usize, now: u32) -> Self {
        FakeTransport {
            sent: heapless::Vec::new(),
            frames: 0,
            space,
            now,
        }
    }
}

impl Transport for FakeTransport {
    type Error = FakeError;

    fn send(&mut self, bytes: &[u8]) -> Result<(), FakeError> {
        self.sent.extend_from_slice(bytes).map_err(|_| FakeError)?;
        self.frames += 1;
        Ok(())
    }

    fn available_space(&self) -> usize {
        self.space
    }

    fn now_millis(&self) -> u32 {
        self.now
    }
}
