use crate::models::{TelemetryRecord, TelemetrySample};
use serde::Serialize;
use tracing::{debug, warn};

const DONE: &str = "DONE";
const ERROR_PREFIX: &str = "ERROR";

/// Progress of one trial read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReadState {
    #[default]
    Idle,
    AwaitingFirstByte,
    Streaming,
    Completed,
    Failed { reason: String },
    TimedOut,
}

impl ReadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed { .. } | Self::TimedOut
        )
    }
}

/// How a trial read ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// The device reported `DONE`.
    Completed,
    /// The device reported an `ERROR` line.
    Failed { reason: String },
    /// The line went quiet, or the stream ended, before a terminal line.
    TimedOut,
}

/// Everything a trial read produced. Every termination carries the samples
/// accumulated up to that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutcome {
    pub termination: Termination,
    pub record: TelemetryRecord,
    pub discarded_lines: usize,
}

impl TrialOutcome {
    pub fn is_completed(&self) -> bool {
        self.termination == Termination::Completed
    }
}

/// Transport independent state machine turning device lines into a
/// [`TrialOutcome`].
///
/// The machine never touches I/O itself. Callers feed it decoded lines and
/// tell it when the idle timer fired, which keeps every timing decision on
/// the caller's clock.
///
/// ```rust
/// use fx_pid_tuner::protocol::{ReadMachine, Termination};
///
/// let mut machine = ReadMachine::new();
/// machine.command_sent();
/// machine.on_line("10,50,100,0");
/// machine.on_line("DONE");
///
/// let outcome = machine.finish();
/// assert_eq!(outcome.termination, Termination::Completed);
/// assert_eq!(outcome.record.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ReadMachine {
    state: ReadState,
    record: TelemetryRecord,
    discarded_lines: usize,
}

impl ReadMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReadState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn command_sent(&mut self) {
        if self.state == ReadState::Idle {
            self.state = ReadState::AwaitingFirstByte;
        }
    }

    pub fn on_line(&mut self, line: &str) {
        if !self.is_listening() {
            return;
        }

        let line = line.trim();

        if let Some(sample) = TelemetrySample::parse(line) {
            self.record.push(sample);
            self.state = ReadState::Streaming;
        } else if line == DONE {
            self.state = ReadState::Completed;
        } else if line.starts_with(ERROR_PREFIX) {
            warn!(line, "Device reported an error");
            self.state = ReadState::Failed {
                reason: line.to_string(),
            };
        } else {
            debug!(line, "Discarding unrecognised line");
            self.discarded_lines += 1;
        }
    }

    pub fn on_undecodable(&mut self) {
        if self.is_listening() {
            debug!("Discarding undecodable line");
            self.discarded_lines += 1;
        }
    }

    pub fn on_idle_timeout(&mut self) {
        if !self.state.is_terminal() {
            warn!(samples = self.record.len(), "Trial read timed out");
            self.state = ReadState::TimedOut;
        }
    }

    /// Consumes the machine. A read that never reached a terminal state
    /// counts as timed out.
    pub fn finish(self) -> TrialOutcome {
        let termination = match self.state {
            ReadState::Completed => Termination::Completed,
            ReadState::Failed { reason } => Termination::Failed { reason },
            _ => Termination::TimedOut,
        };

        TrialOutcome {
            termination,
            record: self.record,
            discarded_lines: self.discarded_lines,
        }
    }

    fn is_listening(&self) -> bool {
        matches!(
            self.state,
            ReadState::AwaitingFirstByte | ReadState::Streaming
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_script(lines: &[&str]) -> ReadMachine {
        let mut machine = ReadMachine::new();
        machine.command_sent();
        for line in lines {
            machine.on_line(line);
        }
        machine
    }

    #[test]
    fn it_completes_with_one_sample() {
        let outcome = run_script(&["10,50,100,0", "DONE"]).finish();

        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.record.samples(), &[TelemetrySample::new(10, 50, 100, 0)]);
    }

    #[test]
    fn it_discards_garbage() {
        let outcome = run_script(&["garbage", "DONE"]).finish();

        assert_eq!(outcome.termination, Termination::Completed);
        assert!(outcome.record.is_empty());
        assert_eq!(outcome.discarded_lines, 1);
    }

    #[test]
    fn it_fails_and_keeps_samples() {
        let outcome = run_script(&["5,1,2,0", "ERROR:stall"]).finish();

        assert_eq!(
            outcome.termination,
            Termination::Failed {
                reason: "ERROR:stall".to_string()
            }
        );
        assert_eq!(outcome.record.len(), 1);
    }

    #[test]
    fn it_times_out_on_silence() {
        let mut machine = run_script(&[]);
        assert_eq!(machine.state(), &ReadState::AwaitingFirstByte);

        machine.on_idle_timeout();
        let outcome = machine.finish();

        assert_eq!(outcome.termination, Termination::TimedOut);
        assert!(outcome.record.is_empty());
    }

    #[test]
    fn it_keeps_samples_when_timing_out_mid_stream() {
        let mut machine = run_script(&["0,400,600,255", "20,410,600,230"]);
        assert_eq!(machine.state(), &ReadState::Streaming);

        machine.on_idle_timeout();
        let outcome = machine.finish();

        assert_eq!(outcome.termination, Termination::TimedOut);
        assert_eq!(outcome.record.len(), 2);
    }

    #[test]
    fn it_ignores_lines_before_the_command_and_after_termination() {
        let mut machine = ReadMachine::new();
        machine.on_line("1,2,3,4");
        machine.on_line("DONE");
        assert_eq!(machine.state(), &ReadState::Idle);

        machine.command_sent();
        machine.on_line("DONE");
        machine.on_line("5,6,7,8");
        machine.on_idle_timeout();

        let outcome = machine.finish();
        assert_eq!(outcome.termination, Termination::Completed);
        assert!(outcome.record.is_empty());
    }

    #[test]
    fn it_trims_lines_and_counts_undecodable_ones() {
        let mut machine = run_script(&["  10,50,100,0\r", "DONE\r"]);
        machine.on_undecodable();

        let outcome = machine.finish();
        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.record.len(), 1);
        // Arrived after DONE
        assert_eq!(outcome.discarded_lines, 0);
    }

    #[test]
    fn it_treats_an_unfinished_read_as_timed_out() {
        let outcome = run_script(&["1,2,3,4"]).finish();
        assert_eq!(outcome.termination, Termination::TimedOut);
    }
}
