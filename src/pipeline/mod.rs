//! Pipeline configuration and orchestration

mod config;
mod orchestrator;

pub use config::TrainingParameters;
pub use orchestrator::SupervisedPipeline;
