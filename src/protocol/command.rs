use crate::models::Gains;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest position a setpoint may address (10-bit ADC range).
pub const MAX_SETPOINT: i32 = 1023;

/// Largest magnitude of an open-loop drive command.
pub const MAX_PWM: i32 = 255;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("setpoint must be between 0 and {MAX_SETPOINT}, got {0}")]
    SetpointOutOfRange(i32),
    #[error("pwm must be between -{MAX_PWM} and {MAX_PWM}, got {0}")]
    PwmOutOfRange(i32),
    #[error("malformed command: {0:?}")]
    Malformed(String),
}

/// Target position of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Setpoint(i32);

impl Setpoint {
    pub fn new(value: i32) -> Result<Self, CommandError> {
        if !(0..=MAX_SETPOINT).contains(&value) {
            return Err(CommandError::SetpointOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Clamps `value` into the addressable range.
    pub fn saturating(value: i32) -> Self {
        Self(value.clamp(0, MAX_SETPOINT))
    }

    pub fn get(&self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for Setpoint {
    type Error = CommandError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Setpoint> for i32 {
    fn from(setpoint: Setpoint) -> Self {
        setpoint.0
    }
}

impl fmt::Display for Setpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Signed open-loop motor drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pwm(i32);

impl Pwm {
    pub fn new(value: i32) -> Result<Self, CommandError> {
        if !(-MAX_PWM..=MAX_PWM).contains(&value) {
            return Err(CommandError::PwmOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> i32 {
        self.0
    }
}

/// A client to device command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// `START:<kp>,<ki>,<kd>,<setpoint>` runs one closed-loop trial.
    Start { gains: Gains, setpoint: Setpoint },
    /// `M:<pwm>` drives the motor open-loop.
    Manual { pwm: Pwm },
    /// `STOP` aborts the trial in progress.
    Stop,
}

impl Command {
    /// Encodes the command as a newline terminated line.
    pub fn encode(&self) -> String {
        match self {
            Self::Start { gains, setpoint } => format!(
                "START:{},{},{},{}\n",
                gains.kp, gains.ki, gains.kd, setpoint
            ),
            Self::Manual { pwm } => format!("M:{}\n", pwm.get()),
            Self::Stop => "STOP\n".to_string(),
        }
    }

    /// Parses a command line as the device would.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let malformed = || CommandError::Malformed(line.to_string());

        if line == "STOP" {
            return Ok(Self::Stop);
        }

        if let Some(params) = line.strip_prefix("START:") {
            let params: Vec<&str> = params.split(',').map(str::trim).collect();
            let [kp, ki, kd, setpoint] = params.as_slice() else {
                return Err(malformed());
            };

            let gain = |s: &str| s.parse::<f64>().map_err(|_| malformed());
            let gains = Gains::new(gain(kp)?, gain(ki)?, gain(kd)?);
            let setpoint = Setpoint::new(setpoint.parse().map_err(|_| malformed())?)?;

            return Ok(Self::Start { gains, setpoint });
        }

        if let Some(pwm) = line.strip_prefix("M:") {
            let pwm = Pwm::new(pwm.trim().parse().map_err(|_| malformed())?)?;
            return Ok(Self::Manual { pwm });
        }

        Err(malformed())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode().trim_end())
    }
}
