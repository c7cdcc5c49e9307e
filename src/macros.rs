//! Contains some macros that are useful for driving a ranging exchange


/// Blocks on a non-blocking operation until a timer times out or the wait is
/// cancelled
///
/// Expects three arguments:
///
/// - A timer that implements `embedded_hal::timer::CountDown`
/// - A [`CancelToken`] that is checked before every poll
/// - An expression that evaluates to `nb::Result<T, E>`
///
/// Evaluates the expression and returns `Result<T, WaitError<E>>`.
///
/// # Example
///
/// ``` rust
/// use core::sync::atomic::AtomicBool;
/// use ss_twr::{
///     exchange::CancelToken,
///     macros::WaitError,
///     block_cancellable,
/// };
/// #
/// # struct Timer;
/// #
/// # impl embedded_hal::timer::CountDown for Timer {
/// #     type Time = ();
/// #     fn start<T>(&mut self, _: T) {}
/// #     fn wait(&mut self) -> nb::Result<(), void::Void> {
/// #         Err(nb::Error::WouldBlock)
/// #     }
/// # }
/// #
/// # let mut timer = Timer;
///
/// let flag = AtomicBool::new(false);
/// let cancel = CancelToken::new(&flag);
///
/// let result: Result<u32, WaitError<()>> = block_cancellable!(
///     &mut timer,
///     &cancel,
///     {
///         // The macro keeps evaluating this expression until it returns
///         // `Ok`, the timer runs out, or `cancel` is triggered.
///         Ok(7)
///     }
/// );
///
/// assert_eq!(result.ok(), Some(7));
/// ```
///
/// [`CancelToken`]: exchange/struct.CancelToken.html
#[macro_export]
macro_rules! block_cancellable {
    ($timer:expr, $cancel:expr, $op:expr) => {
        {
            use embedded_hal::prelude::*;

            // Make sure the timer has the right type. If it isn't, the user
            // should at least get a good error message.
            fn check_type<T>(_: &mut T)
                where T: embedded_hal::timer::CountDown {}
            check_type($timer);

            loop {
                if $cancel.is_cancelled() {
                    break Err($crate::macros::WaitError::Cancelled);
                }

                match $timer.wait() {
                    Ok(()) =>
                        break Err($crate::macros::WaitError::Timeout),
                    Err(nb::Error::WouldBlock) =>
                        (),
                    Err(_) =>
                        unreachable!(),
                }

                match $op {
                    Ok(result) =>
                        break Ok(result),
                    Err(nb::Error::WouldBlock) =>
                        (),
                    Err(nb::Error::Other(error)) =>
                        break Err($crate::macros::WaitError::Other(error)),
                }
            }
        }
    }
}


/// An error that can be a timeout, a cancellation, or another error
///
/// Returned by the [`block_cancellable`] macro.
#[derive(Debug, PartialEq)]
pub enum WaitError<T> {
    /// The timer ran out before the operation finished
    Timeout,

    /// The wait was cancelled before the operation finished
    Cancelled,

    /// Another error occured
    Other(T),
}


// Logging shims. With the `defmt` feature the arguments go to `defmt`,
// otherwise they are only borrowed so they don't trigger unused warnings.

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::debug!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            let _ = ($( & $x, )*);
        }
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::warn!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            let _ = ($( & $x, )*);
        }
    };
}
