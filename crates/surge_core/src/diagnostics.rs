use crate::{
    config::StreamConfig,
    error::DiagnosticError,
    state::{StreamState, Trajectory},
    stress::{driving_stress, floor_at_zero, sliding_velocity, yield_stress},
};
use serde::{Deserialize, Serialize};

/// What to do when a sample has zero ice thickness or produces a
/// non-finite derived quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThinIcePolicy {
    /// Stop at the first offending sample with a [`DiagnosticError`].
    #[default]
    FailFast,
    /// Evaluate with IEEE arithmetic and keep whatever results, NaN included.
    Propagate,
}

/// Reported and derived quantities for a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleDiagnostics {
    /// `T_s - T_b`, from the raw basal temperature (K).
    pub delta_t: f64,
    /// Void ratio truncated at `e_c`.
    pub void_ratio: f64,
    /// Till thickness clamped to `[h_t_min, htill_init]` (m).
    pub till_thickness: f64,
    /// Basal temperature floored at 0 (K).
    pub basal_temperature: f64,
    /// Driving stress (Pa).
    pub tau_d: f64,
    /// Till yield stress from the raw void ratio (Pa).
    pub tau_f: f64,
    /// Sliding velocity floored at 0 (m/s).
    pub velocity: f64,
}

impl SampleDiagnostics {
    pub fn evaluate(state: &StreamState, config: &StreamConfig) -> Self {
        let tau_d = driving_stress(state.h, config);
        // The yield stress sees the raw void ratio, not the reported one.
        let tau_f = yield_stress(state.e, config);
        let velocity = sliding_velocity(state.h, tau_d, tau_f, config);

        Self {
            delta_t: config.t_s - state.t_b,
            void_ratio: bounded(state.e, f64::NEG_INFINITY, config.e_c),
            till_thickness: bounded(state.h_till, config.h_t_min, config.htill_init),
            basal_temperature: floor_at_zero(state.t_b),
            tau_d,
            tau_f,
            velocity,
        }
    }

    fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        [
            ("delta_t", self.delta_t),
            ("void_ratio", self.void_ratio),
            ("till_thickness", self.till_thickness),
            ("basal_temperature", self.basal_temperature),
            ("tau_d", self.tau_d),
            ("tau_f", self.tau_f),
            ("velocity", self.velocity),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
    }
}

/// Clamps to `[lower, upper]`, passing NaN through.
fn bounded(value: f64, lower: f64, upper: f64) -> f64 {
    if value.is_nan() {
        value
    } else {
        value.max(lower).min(upper)
    }
}

/// Per-sample diagnostic series, aligned with the trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub delta_t: Vec<f64>,
    pub void_ratio: Vec<f64>,
    pub till_thickness: Vec<f64>,
    pub basal_temperature: Vec<f64>,
    pub tau_d: Vec<f64>,
    pub tau_f: Vec<f64>,
    pub velocity: Vec<f64>,
}

impl Diagnostics {
    fn with_capacity(len: usize) -> Self {
        Self {
            delta_t: Vec::with_capacity(len),
            void_ratio: Vec::with_capacity(len),
            till_thickness: Vec::with_capacity(len),
            basal_temperature: Vec::with_capacity(len),
            tau_d: Vec::with_capacity(len),
            tau_f: Vec::with_capacity(len),
            velocity: Vec::with_capacity(len),
        }
    }

    fn push(&mut self, sample: SampleDiagnostics) {
        self.delta_t.push(sample.delta_t);
        self.void_ratio.push(sample.void_ratio);
        self.till_thickness.push(sample.till_thickness);
        self.basal_temperature.push(sample.basal_temperature);
        self.tau_d.push(sample.tau_d);
        self.tau_f.push(sample.tau_f);
        self.velocity.push(sample.velocity);
    }

    pub fn len(&self) -> usize {
        self.velocity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.velocity.is_empty()
    }

    /// Sliding velocity in m/yr.
    pub fn velocity_per_year(&self, year: f64) -> Vec<f64> {
        self.velocity.iter().map(|u| u * year).collect()
    }
}

/// Derives the reported series from a completed trajectory.
pub fn diagnose(
    trajectory: &Trajectory,
    config: &StreamConfig,
    policy: ThinIcePolicy,
) -> Result<Diagnostics, DiagnosticError> {
    let mut diagnostics = Diagnostics::with_capacity(trajectory.len());
    let mut non_finite = 0usize;

    for (index, (time, state)) in trajectory.samples().enumerate() {
        if policy == ThinIcePolicy::FailFast && state.h == 0.0 {
            return Err(DiagnosticError::ZeroThickness { index, time });
        }

        let sample = SampleDiagnostics::evaluate(state, config);
        if let Some((quantity, value)) = sample.first_non_finite() {
            match policy {
                ThinIcePolicy::FailFast => {
                    return Err(DiagnosticError::NonFinite {
                        quantity,
                        index,
                        time,
                        value,
                    })
                }
                ThinIcePolicy::Propagate => non_finite += 1,
            }
        }
        diagnostics.push(sample);
    }

    if non_finite > 0 {
        log::warn!(
            "{} of {} diagnostic samples contain non-finite values",
            non_finite,
            diagnostics.len()
        );
    }

    Ok(diagnostics)
}
