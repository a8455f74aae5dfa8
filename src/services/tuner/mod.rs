mod errors;
mod models;
mod service;
mod service_builder;

pub use errors::Error;
pub use models::{ElitePolicy, GenerationReport, Homing, RunSummary, TunerConfig};
pub use service::GeneticTuner;
pub use service_builder::TunerBuilder;
