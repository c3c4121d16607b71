//! The `surge_core` crate models the coupled long-timescale evolution of an ice
//! stream: ice thickness, till void ratio, unfrozen till thickness and basal
//! temperature, whose interplay produces stick-slip surge cycles.
//!
//! Key components:
//! - **Config**: `StreamConfig`, the immutable constants of one run.
//! - **Rate law**: the `RateLaw` trait for the governing equations, and
//!   `TillThermalModel`, a reference implementation.
//! - **Solvers**: the Tsit5 embedded pair and an adaptive integrator built on it.
//! - **Diagnostics**: clamped reporting series, stresses and sliding velocity.
//! - **Simulation**: the validate → integrate → diagnose pipeline.
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod integrator;
pub mod model;
pub mod rate_law;
pub mod simulation;
pub mod solvers;
pub mod state;
pub mod stress;
pub mod traits;

pub use config::StreamConfig;
pub use diagnostics::{diagnose, Diagnostics, SampleDiagnostics, ThinIcePolicy};
pub use error::{ConfigError, DiagnosticError, IntegrationError, SimulationError};
pub use integrator::{IntegratorSettings, StepControl, StepReport};
pub use model::TillThermalModel;
pub use rate_law::RateLaw;
pub use simulation::{run, run_with, SimulationOutput};
pub use state::{StreamState, Trajectory};
