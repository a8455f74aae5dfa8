pub mod bootstrap;
pub mod models;
pub mod protocol;
pub mod services;

pub use services::tuner::{GeneticTuner, TunerBuilder};
