use thiserror::Error;

/// Hard errors raised by the pipeline.
///
/// Only wiring mistakes surface as errors. Statistical and numeric anomalies
/// (singular covariance, underflowed likelihoods, invalid signals, breached
/// risk limits) degrade to conservative defaults and are reported as data.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("regime model error in {path}: {msg}")]
    RegimeModel { path: String, msg: String },

    #[error("unknown policy id '{0}' referenced in update")]
    UnknownPolicy(String),

    #[error("policy catalog is empty")]
    EmptyCatalog,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
