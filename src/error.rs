use thiserror::Error;

/// Errors surfaced by the environment core and the aquarium.
///
/// Recoverable conditions (bad joint references, action length mismatches,
/// degenerate muscle geometry) are logged instead and never show up here.
#[derive(Debug, Error, PartialEq)]
pub enum EnvError {
    /// `step` was called before the first `reset`.
    #[error("environment must be reset before stepping")]
    NotReset,
    /// The environment was destroyed and can no longer be used.
    #[error("environment has been destroyed")]
    Destroyed,
    /// The design has no bones, so there is nothing to simulate.
    #[error("design `{0}` has no bones")]
    EmptyDesign(String),
    /// A configuration value is outside of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// No aquarium creature is registered under the given id.
    #[error("unknown creature {0}")]
    UnknownCreature(uuid::Uuid),
}
