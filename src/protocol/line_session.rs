use crate::models::Gains;
use crate::protocol::{Command, Pwm, ReadMachine, Session, SessionError, Setpoint, TrialOutcome};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tracing::{debug, info, instrument, warn};

/// Default time the device may stay quiet before a read gives up.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

const STOPPED: &str = "STOPPED";

enum LineEvent {
    Line(Vec<u8>),
    Idle,
    Closed,
}

/// [`Session`] speaking the line protocol over any duplex byte stream: a
/// serial device node, a TCP serial bridge or an in-memory pipe.
///
/// Timeouts are measured with tokio's clock and apply per line, so a long
/// trial that keeps streaming never times out.
pub struct LineSession<T> {
    reader: BufReader<ReadHalf<T>>,
    writer: WriteHalf<T>,
    partial: Vec<u8>,
    idle_timeout: Duration,
}

impl<T> LineSession<T>
where
    T: AsyncRead + AsyncWrite + Send,
{
    pub fn new(transport: T, idle_timeout: Duration) -> Self {
        let (reader, writer) = tokio::io::split(transport);
        Self {
            reader: BufReader::new(reader),
            writer,
            partial: Vec::new(),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Discards incoming lines until the device has been quiet for `quiet`.
    /// Returns the number of discarded lines.
    #[instrument(level = "debug", skip(self))]
    pub async fn drain(&mut self, quiet: Duration) -> Result<usize, SessionError> {
        let mut discarded = 0;
        loop {
            match tokio::time::timeout(quiet, self.reader.read_until(b'\n', &mut self.partial))
                .await
            {
                Err(_) | Ok(Ok(0)) => break,
                Ok(Ok(_)) => {
                    discarded += 1;
                    self.partial.clear();
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
        self.discard_stale_input();

        debug!(discarded, "Drained startup noise");
        Ok(discarded)
    }

    #[instrument(level = "info", skip(self), fields(gains = %gains, setpoint = %setpoint))]
    pub async fn trial(
        &mut self,
        gains: Gains,
        setpoint: Setpoint,
    ) -> Result<TrialOutcome, SessionError> {
        self.send(&Command::Start { gains, setpoint }).await?;

        let mut machine = ReadMachine::new();
        machine.command_sent();

        while !machine.is_terminal() {
            match self.next_line(self.idle_timeout).await {
                LineEvent::Line(bytes) => match String::from_utf8(bytes) {
                    Ok(line) => machine.on_line(&line),
                    Err(_) => machine.on_undecodable(),
                },
                LineEvent::Idle | LineEvent::Closed => machine.on_idle_timeout(),
            }
        }

        let outcome = machine.finish();
        debug!(
            termination = ?outcome.termination,
            samples = outcome.record.len(),
            discarded = outcome.discarded_lines,
            "Trial finished"
        );
        Ok(outcome)
    }

    #[instrument(level = "debug", skip(self), fields(pwm = pwm.get()))]
    pub async fn drive(&mut self, pwm: Pwm) -> Result<(), SessionError> {
        self.send(&Command::Manual { pwm }).await
    }

    #[instrument(level = "info", skip(self))]
    pub async fn abort(&mut self) -> Result<bool, SessionError> {
        self.send(&Command::Stop).await?;

        loop {
            match self.next_line(self.idle_timeout).await {
                LineEvent::Line(bytes) if bytes.trim_ascii() == STOPPED.as_bytes() => {
                    info!("Device acknowledged STOP");
                    return Ok(true);
                }
                LineEvent::Line(_) => continue,
                LineEvent::Idle | LineEvent::Closed => {
                    warn!("Device did not acknowledge STOP");
                    return Ok(false);
                }
            }
        }
    }

    async fn send(&mut self, command: &Command) -> Result<(), SessionError> {
        self.discard_stale_input();

        debug!(%command, "Sending command");
        self.writer.write_all(command.encode().as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn next_line(&mut self, idle: Duration) -> LineEvent {
        match tokio::time::timeout(idle, self.reader.read_until(b'\n', &mut self.partial)).await {
            Err(_) => LineEvent::Idle,
            Ok(Ok(0)) => {
                debug!("Transport reached end of stream");
                LineEvent::Closed
            }
            Ok(Ok(_)) => LineEvent::Line(std::mem::take(&mut self.partial)),
            Ok(Err(e)) => {
                warn!(error = %e, "Transport read failed");
                LineEvent::Closed
            }
        }
    }

    /// Drops a partially received line and everything the transport can
    /// deliver without waiting, so a new exchange never sees the tail of an
    /// earlier one.
    fn discard_stale_input(&mut self) {
        let mut discarded = std::mem::take(&mut self.partial).len();

        loop {
            let available = match self.reader.fill_buf().now_or_never() {
                Some(Ok(buffer)) => buffer.len(),
                Some(Err(e)) => {
                    debug!(error = %e, "Transport read failed while discarding");
                    0
                }
                None => 0,
            };
            if available == 0 {
                break;
            }
            self.reader.consume(available);
            discarded += available;
        }

        if discarded > 0 {
            debug!(bytes = discarded, "Discarded stale input");
        }
    }
}

impl<T> Session for LineSession<T>
where
    T: AsyncRead + AsyncWrite + Send,
{
    fn run_trial(
        &mut self,
        gains: Gains,
        setpoint: Setpoint,
    ) -> BoxFuture<'_, Result<TrialOutcome, SessionError>> {
        Box::pin(self.trial(gains, setpoint))
    }

    fn manual_drive(&mut self, pwm: Pwm) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(self.drive(pwm))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<bool, SessionError>> {
        Box::pin(self.abort())
    }
}
