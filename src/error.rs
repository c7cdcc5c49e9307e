use core::fmt;

/// An error that can occur while ranging
///
/// A missing, rejected or corrupted response is not an error. Those are
/// reported as a [`Cycle`] outcome and the next cycle goes on as usual.
///
/// [`Cycle`]: exchange/enum.Cycle.html
pub enum Error<E> {
    /// The radio failed to carry out a request
    ///
    /// Typically an error on the bus that connects to the transceiver.
    Radio(E),

    /// The configuration was not valid
    InvalidConfiguration,
}

// Deriving would put the `Debug` bound on the type instead of the impl.
impl<E> fmt::Debug for Error<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Radio(error) => write!(f, "Radio({:?})", error),
            Error::InvalidConfiguration => write!(f, "InvalidConfiguration"),
        }
    }
}
