use thiserror::Error;

/// Errors raised while validating a configuration, before any integration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The constant must be strictly positive and finite.
    #[error("`{field}` must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    /// The constant must be finite.
    #[error("`{field}` must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    /// The constant lies outside its admissible range.
    #[error("`{field}` = {value} is out of range: {expected}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    /// The state dimension does not match the system.
    #[error("initial state has dimension {actual}, system expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors that abort an integration. No partial trajectory is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("invalid integrator settings: {0}")]
    InvalidSettings(#[from] ConfigError),

    /// The controller shrank the step below the admissible minimum without
    /// meeting the error tolerance.
    #[error("step size {step:e} s fell below the minimum at t = {time} s (state {state:?})")]
    StepSizeUnderflow {
        time: f64,
        step: f64,
        state: Vec<f64>,
    },

    /// The rate law returned NaN or an infinity.
    #[error("rate law returned a non-finite value at t = {time} s (state {state:?})")]
    NonFiniteRate { time: f64, state: Vec<f64> },

    #[error("accepted-step budget of {max_steps} exhausted at t = {time} s (state {state:?})")]
    StepBudgetExhausted {
        max_steps: usize,
        time: f64,
        state: Vec<f64>,
    },

    #[error("integration cancelled at t = {time} s (state {state:?})")]
    Cancelled { time: f64, state: Vec<f64> },
}

/// Errors raised while deriving diagnostic fields from a trajectory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiagnosticError {
    /// The trajectory is empty, ragged, or not ordered in time.
    #[error("trajectory is incomplete: {reason}")]
    IncompleteTrajectory { reason: String },

    /// Zero ice thickness makes the sliding law divide by zero.
    #[error("ice thickness is zero at sample {index} (t = {time} s)")]
    ZeroThickness { index: usize, time: f64 },

    #[error("`{quantity}` is not finite at sample {index} (t = {time} s): {value}")]
    NonFinite {
        quantity: &'static str,
        index: usize,
        time: f64,
        value: f64,
    },
}

/// A failed run, tagged with the stage that failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("integration error: {0}")]
    Integration(#[from] IntegrationError),

    #[error("diagnostic error: {0}")]
    Diagnostic(#[from] DiagnosticError),
}
