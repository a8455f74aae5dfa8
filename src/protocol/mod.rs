//! The line protocol spoken with the motor controller, and the sessions that
//! drive it.
//!
//! A trial is one `START` command answered by a stream of
//! `time,position,setpoint,output` samples that ends with `DONE`, an
//! `ERROR...` line or silence. [`ReadMachine`] turns that stream into a
//! [`TrialOutcome`] independent of the transport.

pub mod command;
mod line_session;
mod reader;
mod session;
mod simulated;

pub use command::{Command, CommandError, Pwm, Setpoint};
pub use line_session::{DEFAULT_IDLE_TIMEOUT, LineSession};
pub use reader::{ReadMachine, ReadState, Termination, TrialOutcome};
pub use session::{Session, SessionError};
pub use simulated::{Fault, PlantParameters, SimulatedPlant, SimulatedSession, serve};
