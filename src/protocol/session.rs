use crate::models::Gains;
use crate::protocol::{CommandError, Pwm, Setpoint, TrialOutcome};
use futures::future::BoxFuture;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("transport unavailable: {target}")]
    Unavailable {
        target: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transport I/O failed")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Exclusive conversation with one device.
///
/// Every operation is awaited to completion before the next one is issued,
/// which `&mut self` enforces. Device side failures (an `ERROR` line, an idle
/// timeout, a truncated stream) are reported through [`TrialOutcome`]. Only
/// failures of the transport itself are errors.
pub trait Session: Send {
    /// Sends `START` with the given gains and reads the response until it
    /// terminates.
    fn run_trial(
        &mut self,
        gains: Gains,
        setpoint: Setpoint,
    ) -> BoxFuture<'_, Result<TrialOutcome, SessionError>>;

    /// Drives the motor open-loop. The device does not answer.
    fn manual_drive(&mut self, pwm: Pwm) -> BoxFuture<'_, Result<(), SessionError>>;

    /// Sends `STOP` and reports whether the device acknowledged it.
    fn stop(&mut self) -> BoxFuture<'_, Result<bool, SessionError>>;
}

impl<S: Session + ?Sized> Session for Box<S> {
    fn run_trial(
        &mut self,
        gains: Gains,
        setpoint: Setpoint,
    ) -> BoxFuture<'_, Result<TrialOutcome, SessionError>> {
        (**self).run_trial(gains, setpoint)
    }

    fn manual_drive(&mut self, pwm: Pwm) -> BoxFuture<'_, Result<(), SessionError>> {
        (**self).manual_drive(pwm)
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<bool, SessionError>> {
        (**self).stop()
    }
}
