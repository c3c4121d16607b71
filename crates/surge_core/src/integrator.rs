use crate::{
    error::{ConfigError, IntegrationError},
    solvers::Tsit5,
    traits::{DynamicalSystem, Steppable},
};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

/// Step-size control settings for the adaptive integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    pub rtol: f64,
    pub atol: f64,
    /// First trial step in seconds. `None` picks one from the local rate.
    pub initial_step: Option<f64>,
    pub min_step: f64,
    /// Upper bound on the step in seconds. `None` leaves it unbounded.
    pub max_step: Option<f64>,
    /// Maximum number of accepted steps.
    pub max_steps: usize,
    pub safety: f64,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-6,
            initial_step: None,
            min_step: 1e-8,
            max_step: None,
            max_steps: 1_000_000,
            safety: 0.9,
            min_factor: 0.2,
            max_factor: 5.0,
        }
    }
}

impl IntegratorSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("rtol", self.rtol)?;
        positive("atol", self.atol)?;
        if let Some(step) = self.initial_step {
            positive("initial_step", step)?;
        }
        positive("min_step", self.min_step)?;
        if let Some(step) = self.max_step {
            positive("max_step", step)?;
            if step < self.min_step {
                return Err(ConfigError::OutOfRange {
                    field: "max_step",
                    value: step,
                    expected: "max_step >= min_step",
                });
            }
        }
        if self.max_steps == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_steps",
                value: 0.0,
                expected: "at least one step",
            });
        }
        in_unit_interval("safety", self.safety)?;
        in_unit_interval("min_factor", self.min_factor)?;
        if !(self.max_factor > 1.0) || !self.max_factor.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "max_factor",
                value: self.max_factor,
                expected: "finite and greater than 1",
            });
        }
        Ok(())
    }
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn in_unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "strictly between 0 and 1",
        })
    }
}

/// Counters collected over one integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub evaluations: usize,
    /// Largest error ratio among accepted steps; at most 1.
    pub max_error_ratio: f64,
}

/// Raw output of a completed integration.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub times: Vec<f64>,
    pub states: Vec<Vec<f64>>,
    /// Error ratio of each accepted step, aligned with `times[1..]`.
    pub error_ratios: Vec<f64>,
    pub stats: IntegrationStats,
}

/// Passed to the monitor after every accepted step.
#[derive(Debug)]
pub struct StepReport<'a> {
    pub step: usize,
    pub time: f64,
    pub dt: f64,
    pub error_ratio: f64,
    pub state: &'a [f64],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    Continue,
    Cancel,
}

/// Records the first non-finite evaluation of the wrapped system and
/// counts evaluations.
struct Guarded<'a, S> {
    inner: &'a S,
    evaluations: Cell<usize>,
    fault: RefCell<Option<(f64, Vec<f64>)>>,
}

impl<'a, S: DynamicalSystem<f64>> Guarded<'a, S> {
    fn new(inner: &'a S) -> Self {
        Self {
            inner,
            evaluations: Cell::new(0),
            fault: RefCell::new(None),
        }
    }

    fn take_fault(&self) -> Option<(f64, Vec<f64>)> {
        self.fault.borrow_mut().take()
    }
}

impl<S: DynamicalSystem<f64>> DynamicalSystem<f64> for Guarded<'_, S> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        self.inner.apply(t, x, out);
        self.evaluations.set(self.evaluations.get() + 1);
        if out.iter().any(|v| !v.is_finite()) {
            let mut fault = self.fault.borrow_mut();
            if fault.is_none() {
                *fault = Some((t, x.to_vec()));
            }
        }
    }
}

/// Integrates `system` from `t_start` to `t_end` without observation.
pub fn integrate<S>(
    system: &S,
    initial_state: &[f64],
    t_start: f64,
    t_end: f64,
    settings: &IntegratorSettings,
) -> Result<Solution, IntegrationError>
where
    S: DynamicalSystem<f64>,
{
    integrate_monitored(system, initial_state, t_start, t_end, settings, |_| {
        StepControl::Continue
    })
}

/// Integrates `system` with the adaptive Tsit5 pair.
///
/// Every accepted step satisfies
/// `max_i |err_i| / (atol + rtol * max(|y_i|, |y_next_i|)) <= 1`. The last
/// step is clipped so the trajectory ends exactly at `t_end`. After each
/// accepted step `monitor` may cancel the run, which fails it with
/// [`IntegrationError::Cancelled`].
pub fn integrate_monitored<S, M>(
    system: &S,
    initial_state: &[f64],
    t_start: f64,
    t_end: f64,
    settings: &IntegratorSettings,
    mut monitor: M,
) -> Result<Solution, IntegrationError>
where
    S: DynamicalSystem<f64>,
    M: FnMut(&StepReport<'_>) -> StepControl,
{
    settings.validate()?;
    let dim = system.dimension();
    if initial_state.len() != dim {
        return Err(ConfigError::DimensionMismatch {
            expected: dim,
            actual: initial_state.len(),
        }
        .into());
    }
    if !t_start.is_finite() {
        return Err(ConfigError::NotFinite {
            field: "t_start",
            value: t_start,
        }
        .into());
    }
    if !(t_end > t_start) || !t_end.is_finite() {
        return Err(ConfigError::OutOfRange {
            field: "t_end",
            value: t_end,
            expected: "finite and after t_start",
        }
        .into());
    }
    if let Some(value) = initial_state.iter().copied().find(|v| !v.is_finite()) {
        return Err(ConfigError::NotFinite {
            field: "initial_state",
            value,
        }
        .into());
    }

    let guarded = Guarded::new(system);
    let mut stepper = Tsit5::<f64>::new(dim);
    let exponent = 1.0 / stepper.order() as f64;
    let max_step = settings.max_step.unwrap_or(f64::INFINITY);

    let mut t = t_start;
    let mut state = initial_state.to_vec();
    let mut next = vec![0.0; dim];
    let mut error = vec![0.0; dim];

    let mut times = vec![t];
    let mut states = vec![state.clone()];
    let mut error_ratios = Vec::new();
    let mut stats = IntegrationStats::default();

    let mut dt = match settings.initial_step {
        Some(step) => step,
        None => initial_step(&guarded, t, &state, settings, exponent)?,
    }
    .min(max_step)
    .min(t_end - t_start);
    let mut last_rejected = false;

    while t < t_end {
        if stats.accepted_steps >= settings.max_steps {
            return Err(IntegrationError::StepBudgetExhausted {
                max_steps: settings.max_steps,
                time: t,
                state,
            });
        }

        let remaining = t_end - t;
        let last = dt >= remaining || remaining - dt <= 1e-12 * t_end.abs();
        let h = if last { remaining } else { dt };

        stepper.try_step(&guarded, t, &state, h, &mut next, &mut error);
        if let Some((time, state)) = guarded.take_fault() {
            return Err(IntegrationError::NonFiniteRate { time, state });
        }

        let ratio = error_ratio(&state, &next, &error, settings);
        if ratio <= 1.0 {
            let t_next = if last { t_end } else { t + h };
            if t_next <= t {
                return Err(IntegrationError::StepSizeUnderflow {
                    time: t,
                    step: h,
                    state,
                });
            }

            stepper.accept();
            t = t_next;
            std::mem::swap(&mut state, &mut next);
            times.push(t);
            states.push(state.clone());
            error_ratios.push(ratio);
            stats.accepted_steps += 1;
            stats.max_error_ratio = stats.max_error_ratio.max(ratio);

            let report = StepReport {
                step: stats.accepted_steps,
                time: t,
                dt: h,
                error_ratio: ratio,
                state: &state,
            };
            if monitor(&report) == StepControl::Cancel {
                return Err(IntegrationError::Cancelled { time: t, state });
            }

            let mut factor = if ratio == 0.0 {
                settings.max_factor
            } else {
                settings.safety * ratio.powf(-exponent)
            };
            if last_rejected {
                factor = factor.min(1.0);
            }
            factor = factor.clamp(settings.min_factor, settings.max_factor);
            dt = (h * factor).min(max_step);
            last_rejected = false;
        } else {
            stats.rejected_steps += 1;
            let factor = if ratio.is_finite() {
                (settings.safety * ratio.powf(-exponent)).clamp(settings.min_factor, 1.0)
            } else {
                settings.min_factor
            };
            dt = h * factor;
            log::trace!(
                "Rejected step at t = {:.6e} s (ratio {:.3e}), retrying with dt = {:.3e} s",
                t,
                ratio,
                dt
            );

            let floor = settings.min_step.max(16.0 * f64::EPSILON * t.abs());
            if dt < floor {
                return Err(IntegrationError::StepSizeUnderflow {
                    time: t,
                    step: dt,
                    state,
                });
            }
            last_rejected = true;
        }
    }

    stats.evaluations = guarded.evaluations.get();
    log::debug!(
        "Integration finished: {} accepted, {} rejected, {} evaluations",
        stats.accepted_steps,
        stats.rejected_steps,
        stats.evaluations
    );

    Ok(Solution {
        times,
        states,
        error_ratios,
        stats,
    })
}

fn error_ratio(state: &[f64], next: &[f64], error: &[f64], settings: &IntegratorSettings) -> f64 {
    let mut ratio: f64 = 0.0;
    for i in 0..state.len() {
        let scale = settings.atol + settings.rtol * state[i].abs().max(next[i].abs());
        let component = error[i].abs() / scale;
        if component.is_nan() {
            return f64::NAN;
        }
        ratio = ratio.max(component);
    }
    ratio
}

fn scaled_rms(values: &[f64], reference: &[f64], settings: &IntegratorSettings) -> f64 {
    let sum: f64 = values
        .iter()
        .zip(reference)
        .map(|(v, r)| {
            let scaled = v / (settings.atol + settings.rtol * r.abs());
            scaled * scaled
        })
        .sum();
    (sum / values.len().max(1) as f64).sqrt()
}

/// Hairer-Norsett-Wanner starting step heuristic.
fn initial_step<S: DynamicalSystem<f64>>(
    system: &Guarded<'_, S>,
    t: f64,
    state: &[f64],
    settings: &IntegratorSettings,
    exponent: f64,
) -> Result<f64, IntegrationError> {
    let dim = state.len();
    let mut f0 = vec![0.0; dim];
    system.apply(t, state, &mut f0);
    if let Some((time, state)) = system.take_fault() {
        return Err(IntegrationError::NonFiniteRate { time, state });
    }

    let d0 = scaled_rms(state, state, settings);
    let d1 = scaled_rms(&f0, state, settings);
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };

    let probe: Vec<f64> = state.iter().zip(&f0).map(|(x, f)| x + h0 * f).collect();
    let mut f1 = vec![0.0; dim];
    system.apply(t + h0, &probe, &mut f1);
    if let Some((time, state)) = system.take_fault() {
        return Err(IntegrationError::NonFiniteRate { time, state });
    }

    let diff: Vec<f64> = f1.iter().zip(&f0).map(|(a, b)| a - b).collect();
    let d2 = scaled_rms(&diff, state, settings) / h0;
    let dmax = d1.max(d2);
    let h1 = if dmax <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / dmax).powf(exponent)
    };

    Ok((100.0 * h0).min(h1).max(settings.min_step))
}
