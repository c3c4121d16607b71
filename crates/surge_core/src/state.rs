use crate::{
    error::{ConfigError, DiagnosticError},
    integrator::{IntegrationStats, Solution},
};
use serde::{Deserialize, Serialize};

/// Coupled ice-stream state `(h, e, h_till, T_b)`.
///
/// `t_b` is the basal temperature expressed as a depression below the
/// pressure-melting point: 0 at melting, positive when the bed is colder.
/// None of the physical bounds are enforced here; the integrator may carry
/// the state outside them and only the diagnostics clamp for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// Ice thickness (m).
    pub h: f64,
    /// Till void ratio.
    pub e: f64,
    /// Unfrozen till thickness (m).
    pub h_till: f64,
    /// Basal temperature depression below melting (K).
    pub t_b: f64,
}

impl StreamState {
    pub const DIMENSION: usize = 4;

    pub fn new(h: f64, e: f64, h_till: f64, t_b: f64) -> Self {
        Self { h, e, h_till, t_b }
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.h, self.e, self.h_till, self.t_b]
    }

    /// Reads the first four components of `x`, which must hold at least
    /// [`Self::DIMENSION`] values.
    pub(crate) fn from_slice(x: &[f64]) -> Self {
        Self::new(x[0], x[1], x[2], x[3])
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl From<[f64; 4]> for StreamState {
    fn from(x: [f64; 4]) -> Self {
        Self::new(x[0], x[1], x[2], x[3])
    }
}

impl TryFrom<&[f64]> for StreamState {
    type Error = ConfigError;

    fn try_from(x: &[f64]) -> Result<Self, Self::Error> {
        if x.len() != Self::DIMENSION {
            return Err(ConfigError::DimensionMismatch {
                expected: Self::DIMENSION,
                actual: x.len(),
            });
        }
        Ok(Self::from_slice(x))
    }
}

impl From<StreamState> for [f64; 4] {
    fn from(state: StreamState) -> Self {
        state.to_array()
    }
}

/// Time-ordered samples of a completed run. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<StreamState>,
    stats: IntegrationStats,
}

impl Trajectory {
    pub(crate) fn from_solution(solution: Solution) -> Self {
        Self {
            states: solution
                .states
                .iter()
                .map(|x| StreamState::from_slice(x))
                .collect(),
            times: solution.times,
            stats: solution.stats,
        }
    }

    /// Builds a trajectory from externally produced samples.
    ///
    /// The samples must be non-empty, of equal length, start at t = 0 and be
    /// strictly increasing in time.
    pub fn from_samples(
        times: Vec<f64>,
        states: Vec<StreamState>,
    ) -> Result<Self, DiagnosticError> {
        let incomplete = |reason: String| DiagnosticError::IncompleteTrajectory { reason };
        if times.is_empty() {
            return Err(incomplete("no samples".to_string()));
        }
        if times.len() != states.len() {
            return Err(incomplete(format!(
                "{} times but {} states",
                times.len(),
                states.len()
            )));
        }
        if times[0] != 0.0 {
            return Err(incomplete(format!("first time is {}, expected 0", times[0])));
        }
        if let Some(index) = times.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(incomplete(format!(
                "time does not increase at sample {}",
                index + 1
            )));
        }
        Ok(Self {
            times,
            states,
            stats: IntegrationStats::default(),
        })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &[StreamState] {
        &self.states
    }

    pub fn stats(&self) -> &IntegrationStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn final_time(&self) -> f64 {
        self.times.last().copied().unwrap_or(0.0)
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, &StreamState)> + '_ {
        self.times.iter().copied().zip(self.states.iter())
    }

    pub fn times_in_years(&self, year: f64) -> Vec<f64> {
        self.times.iter().map(|t| t / year).collect()
    }
}
