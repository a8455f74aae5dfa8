//! A simulated DC motor with a potentiometer, speaking the device side of the
//! line protocol.
//!
//! The plant follows `J·θ'' + b·θ' = Kt·V` with Euler integration. Its
//! position persists between trials, so the homing move before each trial
//! matters exactly as it does on hardware. Faults can be injected to exercise
//! the error paths of a [`Session`].

use crate::models::{Gains, TelemetryRecord, TelemetrySample};
use crate::protocol::command::{MAX_PWM, MAX_SETPOINT};
use crate::protocol::{
    Command, Pwm, ReadMachine, Session, SessionError, Setpoint, TrialOutcome,
};
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, instrument, warn};

const NOISE_LINE: &str = "#~ noise ~#";

/// Physical constants and timing of the simulated plant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantParameters {
    /// Rotor inertia `J`.
    pub inertia: f64,
    /// Viscous damping `b`.
    pub damping: f64,
    /// Torque constant `Kt`, torque at full drive.
    pub torque_constant: f64,
    /// Control period of a trial.
    pub step: Duration,
    /// Length of a trial.
    pub trial_duration: Duration,
}

impl Default for PlantParameters {
    fn default() -> Self {
        Self {
            inertia: 0.001,
            damping: 0.0,
            torque_constant: 0.5,
            step: Duration::from_millis(20),
            trial_duration: Duration::from_millis(1500),
        }
    }
}

/// Misbehaviour injected into the simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Never answers anything.
    Silent,
    /// Reports `ERROR:stall` after streaming `samples` samples.
    StallAfter { samples: usize },
    /// Interleaves a garbage line after every sample.
    Noisy,
}

#[derive(Debug, Clone)]
pub struct SimulatedPlant {
    parameters: PlantParameters,
    position: f64,
    velocity: f64,
    fault: Option<Fault>,
}

impl Default for SimulatedPlant {
    fn default() -> Self {
        Self::new(PlantParameters::default())
    }
}

impl SimulatedPlant {
    pub fn new(parameters: PlantParameters) -> Self {
        Self {
            parameters,
            position: 0.0,
            velocity: 0.0,
            fault: None,
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn with_position(mut self, position: f64) -> Self {
        self.position = position.clamp(0.0, f64::from(MAX_SETPOINT));
        self
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn parameters(&self) -> &PlantParameters {
        &self.parameters
    }

    /// Advances the plant by `dt` seconds under the given drive and returns
    /// the new position.
    pub fn step(&mut self, pwm: f64, dt: f64) -> f64 {
        let p = &self.parameters;
        let torque = pwm / f64::from(MAX_PWM) * p.torque_constant;
        let acceleration = (torque - p.damping * self.velocity) / p.inertia;

        self.velocity += acceleration * dt;
        self.position = (self.position + self.velocity * dt).clamp(0.0, f64::from(MAX_SETPOINT));
        self.position
    }

    /// Runs one closed-loop trial from the current position.
    ///
    /// The controller uses the derivative of the error and saturates at the
    /// drive limits. Each sample is logged before the drive is applied.
    #[instrument(level = "debug", skip(self), fields(gains = %gains, setpoint = %setpoint, start = self.position))]
    pub fn run_trial(&mut self, gains: Gains, setpoint: Setpoint) -> TelemetryRecord {
        let step_ms = self.parameters.step.as_millis().max(1);
        let steps = self.parameters.trial_duration.as_millis() / step_ms;
        let dt = self.parameters.step.as_secs_f64();
        let target = f64::from(setpoint.get());
        let limit = f64::from(MAX_PWM);

        self.velocity = 0.0;
        let mut integral = 0.0;
        let mut previous_error = 0.0;
        let mut record = TelemetryRecord::new();

        for index in 0..steps {
            let position = self.position;
            let error = target - position;
            integral += error * dt;
            let derivative = (error - previous_error) / dt;
            previous_error = error;

            let output = (gains.kp * error + gains.ki * integral + gains.kd * derivative)
                .clamp(-limit, limit);
            // NaN gains never reach a real motor
            let output = if output.is_nan() { 0.0 } else { output };

            self.step(output, dt);

            record.push(TelemetrySample::new(
                (index * step_ms) as u64,
                position as i32,
                setpoint.get(),
                output as i32,
            ));
        }

        record
    }

    /// Produces the lines the device sends in answer to `line`.
    pub fn respond(&mut self, line: &str) -> Vec<String> {
        if self.fault == Some(Fault::Silent) {
            return Vec::new();
        }

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Simulated device rejected command");
                return vec![format!("ERROR:{e}")];
            }
        };

        match command {
            Command::Start { gains, setpoint } => {
                let record = self.run_trial(gains, setpoint);
                self.render(&record)
            }
            Command::Manual { pwm } => {
                self.step(f64::from(pwm.get()), self.parameters.step.as_secs_f64());
                Vec::new()
            }
            Command::Stop => vec!["STOPPED".to_string()],
        }
    }

    fn render(&self, record: &TelemetryRecord) -> Vec<String> {
        let line = |s: &TelemetrySample| {
            format!("{},{},{},{}", s.time_ms, s.position, s.setpoint, s.output)
        };

        match self.fault {
            Some(Fault::StallAfter { samples }) => record
                .iter()
                .take(samples)
                .map(line)
                .chain(std::iter::once("ERROR:stall".to_string()))
                .collect(),
            Some(Fault::Noisy) => record
                .iter()
                .flat_map(|s| [line(s), NOISE_LINE.to_string()])
                .chain(std::iter::once("DONE".to_string()))
                .collect(),
            _ => record
                .iter()
                .map(line)
                .chain(std::iter::once("DONE".to_string()))
                .collect(),
        }
    }
}

/// [`Session`] talking to a [`SimulatedPlant`] in process.
///
/// Answers arrive instantly. When an answer ends without a terminal line the
/// session waits out the idle timeout on tokio's clock, as a real line would.
pub struct SimulatedSession {
    plant: SimulatedPlant,
    idle_timeout: Duration,
}

impl SimulatedSession {
    pub fn new(plant: SimulatedPlant, idle_timeout: Duration) -> Self {
        Self {
            plant,
            idle_timeout,
        }
    }

    pub fn plant(&self) -> &SimulatedPlant {
        &self.plant
    }

    async fn trial(&mut self, gains: Gains, setpoint: Setpoint) -> TrialOutcome {
        let command = Command::Start { gains, setpoint };

        let mut machine = ReadMachine::new();
        machine.command_sent();
        for line in self.plant.respond(&command.encode()) {
            machine.on_line(&line);
        }

        if !machine.is_terminal() {
            tokio::time::sleep(self.idle_timeout).await;
            machine.on_idle_timeout();
        }

        machine.finish()
    }

    async fn abort(&mut self) -> bool {
        let acknowledged = self
            .plant
            .respond(&Command::Stop.encode())
            .iter()
            .any(|line| line == "STOPPED");

        if !acknowledged {
            tokio::time::sleep(self.idle_timeout).await;
        }
        acknowledged
    }
}

impl Session for SimulatedSession {
    fn run_trial(
        &mut self,
        gains: Gains,
        setpoint: Setpoint,
    ) -> BoxFuture<'_, Result<TrialOutcome, SessionError>> {
        Box::pin(async move { Ok(self.trial(gains, setpoint).await) })
    }

    fn manual_drive(&mut self, pwm: Pwm) -> BoxFuture<'_, Result<(), SessionError>> {
        Box::pin(async move {
            self.plant.respond(&Command::Manual { pwm }.encode());
            Ok(())
        })
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<bool, SessionError>> {
        Box::pin(async move { Ok(self.abort().await) })
    }
}

/// Runs `plant` as a byte-level device on `stream` until the peer closes it.
///
/// Lines that are not valid UTF-8 are decoded lossily, which the plant then
/// rejects as malformed commands.
#[instrument(level = "debug", skip_all)]
pub async fn serve<T>(mut plant: SimulatedPlant, stream: T) -> std::io::Result<()>
where
    T: AsyncRead + AsyncWrite,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            debug!("Peer closed the line");
            return Ok(());
        }

        let command = String::from_utf8_lossy(&line);
        if command.trim().is_empty() {
            continue;
        }

        for response in plant.respond(&command) {
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Termination;

    fn setpoint(value: i32) -> Setpoint {
        Setpoint::new(value).expect("is valid")
    }

    #[test]
    fn it_logs_every_control_period() {
        let mut plant = SimulatedPlant::default();
        let record = plant.run_trial(Gains::proportional(1.0), setpoint(600));

        assert_eq!(record.len(), 75);
        let times: Vec<u64> = record.iter().map(|s| s.time_ms).collect();
        assert_eq!(times.first(), Some(&0));
        assert_eq!(times.last(), Some(&1480));
        assert!(times.windows(2).all(|w| w[1] - w[0] == 20));
        assert!(record.iter().all(|s| s.setpoint == 600));
    }

    #[test]
    fn it_starts_where_the_last_trial_left_off() {
        let mut plant = SimulatedPlant::default().with_position(400.0);
        let first = plant.run_trial(Gains::proportional(1.0), setpoint(600));
        assert_eq!(first.first().map(|s| s.position), Some(400));

        let resting = plant.position();
        let second = plant.run_trial(Gains::proportional(1.0), setpoint(600));
        assert_eq!(second.first().map(|s| s.position), Some(resting as i32));
    }

    #[test]
    fn it_drives_towards_the_setpoint() {
        let mut plant = SimulatedPlant::default();
        let record = plant.run_trial(Gains::proportional(2.0), setpoint(600));

        assert_eq!(record.first().map(|s| s.output), Some(255));
        let peak = record.iter().map(|s| s.position).max().unwrap_or_default();
        assert!(peak > 0);
        assert!(record.iter().all(|s| (0..=1023).contains(&s.position)));
        assert!(record.iter().all(|s| (-255..=255).contains(&s.output)));
    }

    #[test]
    fn it_is_deterministic() {
        let gains = Gains::new(1.5, 0.2, 0.05);
        let a = SimulatedPlant::default().run_trial(gains, setpoint(600));
        let b = SimulatedPlant::default().run_trial(gains, setpoint(600));
        assert_eq!(a, b);
    }

    #[test]
    fn it_answers_commands() {
        let mut plant = SimulatedPlant::default();

        let lines = plant.respond("START:1,0,0,600\n");
        assert_eq!(lines.len(), 76);
        assert_eq!(lines.last().map(String::as_str), Some("DONE"));

        assert_eq!(plant.respond("STOP\n"), vec!["STOPPED".to_string()]);
        assert!(plant.respond("M:100\n").is_empty());

        let rejected = plant.respond("START:1,0\n");
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].starts_with("ERROR:"));
    }

    #[test]
    fn it_injects_faults() {
        let start = "START:1,0,0,600\n";

        let mut silent = SimulatedPlant::default().with_fault(Fault::Silent);
        assert!(silent.respond(start).is_empty());
        assert!(silent.respond("STOP\n").is_empty());

        let mut stalling =
            SimulatedPlant::default().with_fault(Fault::StallAfter { samples: 3 });
        let lines = stalling.respond(start);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "ERROR:stall");

        let mut noisy = SimulatedPlant::default().with_fault(Fault::Noisy);
        let lines = noisy.respond(start);
        assert_eq!(lines.len(), 151);
    }

    #[tokio::test(start_paused = true)]
    async fn it_scores_faulty_trials_through_the_read_machine() {
        let gains = Gains::proportional(1.0);
        let idle = Duration::from_secs(3);

        let mut stalling = SimulatedSession::new(
            SimulatedPlant::default().with_fault(Fault::StallAfter { samples: 3 }),
            idle,
        );
        let outcome = stalling
            .run_trial(gains, setpoint(600))
            .await
            .expect("simulation has no transport");
        assert!(matches!(outcome.termination, Termination::Failed { .. }));
        assert_eq!(outcome.record.len(), 3);

        let mut noisy =
            SimulatedSession::new(SimulatedPlant::default().with_fault(Fault::Noisy), idle);
        let outcome = noisy
            .run_trial(gains, setpoint(600))
            .await
            .expect("simulation has no transport");
        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.record.len(), 75);
        assert_eq!(outcome.discarded_lines, 75);
    }

    #[tokio::test(start_paused = true)]
    async fn it_times_out_when_silent() {
        let idle = Duration::from_secs(3);
        let mut session =
            SimulatedSession::new(SimulatedPlant::default().with_fault(Fault::Silent), idle);

        let started = tokio::time::Instant::now();
        let outcome = session
            .run_trial(Gains::proportional(1.0), setpoint(600))
            .await
            .expect("simulation has no transport");

        assert_eq!(outcome.termination, Termination::TimedOut);
        assert!(outcome.record.is_empty());
        assert!(started.elapsed() >= idle);
        assert!(!session.stop().await.expect("simulation has no transport"));
    }

    #[tokio::test]
    async fn it_serves_the_line_protocol() {
        let (mut client, device) = tokio::io::duplex(16 * 1024);
        let server = tokio::spawn(serve(SimulatedPlant::default(), device));

        client
            .write_all(b"START:2,0,0.1,500\nSTOP\n")
            .await
            .expect("device is connected");
        client.shutdown().await.expect("device is connected");

        let mut lines = BufReader::new(client).lines();
        let mut received = Vec::new();
        while let Some(line) = lines.next_line().await.expect("device is connected") {
            received.push(line);
        }

        server
            .await
            .expect("server task completes")
            .expect("server exits cleanly");
        assert_eq!(received.len(), 77);
        assert_eq!(received[75], "DONE");
        assert_eq!(received[76], "STOPPED");
    }
}
