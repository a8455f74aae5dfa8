use crate::models::{Gains, MutationRateOutOfRange, Mutagen, Schedule};
use crate::protocol::{
    DEFAULT_IDLE_TIMEOUT, CommandError, LineSession, Session, SessionError, Setpoint,
    SimulatedPlant, SimulatedSession, TrialOutcome,
};
use crate::services::tuner::{self, ElitePolicy, GeneticTuner, TunerConfig};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio_serial::SerialPortBuilderExt;
use tracing::instrument;

const PREFIX: &str = "PID_TUNER_";

/// How long the line must stay quiet before the startup chatter is
/// considered over.
const DRAIN_QUIET: Duration = Duration::from_millis(250);

/// Line speed of the controller firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{name}={value:?} is invalid: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    MutationRate(#[from] MutationRateOutOfRange),
}

/// Where the device is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportTarget {
    /// The in-process simulated plant.
    Simulated,
    /// A serial-to-TCP bridge at `host:port`.
    Tcp(String),
    /// A serial device node, opened at the configured baud rate.
    Device(PathBuf),
}

impl FromStr for TransportTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("transport must not be empty".to_string());
        }
        if s == "sim" {
            return Ok(Self::Simulated);
        }
        if let Some(address) = s.strip_prefix("tcp://") {
            if address.is_empty() {
                return Err("tcp transport needs host:port".to_string());
            }
            return Ok(Self::Tcp(address.to_string()));
        }
        Ok(Self::Device(PathBuf::from(s)))
    }
}

impl Display for TransportTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulated => f.write_str("sim"),
            Self::Tcp(address) => write!(f, "tcp://{address}"),
            Self::Device(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Everything the `tune` binary needs, read from `PID_TUNER_*` variables.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub transport: TransportTarget,
    pub baud_rate: u32,
    pub idle_timeout: Duration,
    /// Pause after opening a device whose controller resets on connect.
    pub reset_delay: Duration,
    pub setpoint: Setpoint,
    pub tuner: TunerConfig,
    pub schedule: Schedule,
    pub seed: Option<u64>,
    /// Where to write the best step response as CSV.
    pub best_csv: Option<PathBuf>,
    /// Run a single trial with these gains instead of tuning.
    pub probe: Option<Gains>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            transport: TransportTarget::Simulated,
            baud_rate: DEFAULT_BAUD_RATE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            reset_delay: Duration::from_secs(2),
            setpoint: Setpoint::saturating(600),
            tuner: TunerConfig::default(),
            schedule: Schedule::unbounded(),
            seed: None,
            best_csv: None,
            probe: None,
        }
    }
}

impl Configuration {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Unset variables
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let mut config = Self::default();

        if let Some(transport) = vars.parse::<TransportTarget>("TRANSPORT")? {
            config.transport = transport;
        }
        if let Some(baud_rate) = vars.parse::<u32>("BAUD_RATE")? {
            config.baud_rate = baud_rate;
        }
        if let Some(ms) = vars.parse::<u64>("IDLE_TIMEOUT_MS")? {
            config.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = vars.parse::<u64>("RESET_DELAY_MS")? {
            config.reset_delay = Duration::from_millis(ms);
        }
        if let Some(setpoint) = vars.parse::<i32>("SETPOINT")? {
            config.setpoint = Setpoint::new(setpoint)?;
        }
        if let Some(population_size) = vars.parse::<usize>("POPULATION")? {
            config.tuner.population_size = population_size;
        }
        if let Some(elite_count) = vars.parse::<usize>("ELITES")? {
            config.tuner.elite_count = elite_count;
        }
        if let Some(rate) = vars.parse::<f64>("MUTATION_RATE")? {
            config.tuner.mutagen = Mutagen::constant(rate)?;
        }
        if let Some(generations) = vars.parse::<u64>("REEVALUATE_ELITES_EVERY")? {
            config.tuner.elite_policy = ElitePolicy::ReevaluateEvery { generations };
        }
        if let Some(generations) = vars.parse::<u64>("GENERATIONS")? {
            config.schedule.max_generations = Some(generations);
        }
        if let Some(target) = vars.parse::<f64>("TARGET_COST")? {
            config.schedule.target_cost = Some(target);
        }
        config.seed = vars.parse::<u64>("SEED")?;
        config.best_csv = vars.get("BEST_CSV").map(PathBuf::from);
        config.probe = vars.parse_with("PROBE", parse_gains)?;

        Ok(config)
    }

    /// Builds a tuner from this configuration, seeded if a seed was given.
    pub fn tuner(&self) -> Result<GeneticTuner, tuner::Error> {
        let builder = GeneticTuner::builder().with_config(self.tuner.clone());
        match self.seed {
            Some(seed) => builder.with_seed(seed),
            None => builder,
        }
        .build()
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{PREFIX}{name}")).filter(|value| !value.trim().is_empty())
    }

    fn parse<T>(&self, name: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.parse_with(name, |value| value.trim().parse::<T>().map_err(|e| e.to_string()))
    }

    fn parse_with<T>(
        &self,
        name: &str,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> Result<Option<T>, ConfigurationError> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };

        parse(&value)
            .map(Some)
            .map_err(|reason| ConfigurationError::InvalidValue {
                name: format!("{PREFIX}{name}"),
                value,
                reason,
            })
    }
}

/// Parses `kp,ki,kd`.
fn parse_gains(value: &str) -> Result<Gains, String> {
    let genes = value
        .split(',')
        .map(|gene| gene.trim().parse::<f64>().map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    match genes.as_slice() {
        [kp, ki, kd] => Ok(Gains::new(*kp, *ki, *kd)),
        _ => Err(format!("expected kp,ki,kd, got {} values", genes.len())),
    }
}

/// Opens a session to the configured device.
///
/// Real devices get the reset delay and have their startup chatter drained
/// before the session is handed out.
#[instrument(level = "info", skip(config), fields(transport = %config.transport))]
pub async fn open_session(config: &Configuration) -> Result<Box<dyn Session>, SessionError> {
    let unavailable = |source| SessionError::Unavailable {
        target: config.transport.to_string(),
        source,
    };

    match &config.transport {
        TransportTarget::Simulated => {
            tracing::info!("Using the simulated plant");
            Ok(Box::new(SimulatedSession::new(
                SimulatedPlant::default(),
                config.idle_timeout,
            )))
        }
        TransportTarget::Tcp(address) => {
            let stream = tokio::net::TcpStream::connect(address)
                .await
                .map_err(unavailable)?;
            let session = prepare(LineSession::new(stream, config.idle_timeout), config).await?;
            Ok(Box::new(session))
        }
        TransportTarget::Device(path) => {
            let device = tokio_serial::new(path.to_string_lossy(), config.baud_rate)
                .open_native_async()
                .map_err(|e| unavailable(e.into()))?;
            let session = prepare(LineSession::new(device, config.idle_timeout), config).await?;
            Ok(Box::new(session))
        }
    }
}

/// Runs a single trial with `gains`, then stops the motor whatever the
/// trial's outcome.
#[instrument(level = "info", skip(session, config), fields(gains = %gains))]
pub async fn single_trial<S>(
    session: &mut S,
    config: &Configuration,
    gains: Gains,
) -> Result<TrialOutcome, SessionError>
where
    S: Session + ?Sized,
{
    let outcome = session.run_trial(gains, config.setpoint).await;
    stop_motor(session).await;
    outcome
}

/// Sends STOP and reports whether the device acknowledged it. Failures are
/// logged, never returned, so this is safe to call on the way out.
pub async fn stop_motor<S>(session: &mut S) -> bool
where
    S: Session + ?Sized,
{
    match session.stop().await {
        Ok(true) => {
            tracing::info!("Motor stopped");
            true
        }
        Ok(false) => {
            tracing::warn!("Device did not acknowledge STOP");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to send STOP");
            false
        }
    }
}

async fn prepare<T>(
    mut session: LineSession<T>,
    config: &Configuration,
) -> Result<LineSession<T>, SessionError>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send,
{
    tracing::info!(reset_delay = ?config.reset_delay, "Waiting for the controller to reset");
    tokio::time::sleep(config.reset_delay).await;

    let discarded = session.drain(DRAIN_QUIET).await?;
    tracing::info!(discarded, "Connected");

    Ok(session)
}
