use crate::{
    config::StreamConfig,
    diagnostics::{diagnose, Diagnostics, ThinIcePolicy},
    error::SimulationError,
    integrator::{integrate_monitored, StepControl, StepReport},
    rate_law::{RateLaw, RateLawSystem},
    state::Trajectory,
};
use serde::Serialize;

/// Trajectory and diagnostics of one completed run, of equal length.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutput {
    pub trajectory: Trajectory,
    pub diagnostics: Diagnostics,
}

/// Runs the full pipeline with fail-fast diagnostics and no monitor.
pub fn run<R: RateLaw>(
    config: &StreamConfig,
    rate_law: &R,
) -> Result<SimulationOutput, SimulationError> {
    run_with(config, rate_law, ThinIcePolicy::default(), |_| {
        StepControl::Continue
    })
}

/// Validates `config`, integrates `rate_law` over `[0, year * t_final]` and
/// derives the diagnostics. `monitor` is called after each accepted step and
/// may cancel the run.
pub fn run_with<R, M>(
    config: &StreamConfig,
    rate_law: &R,
    policy: ThinIcePolicy,
    monitor: M,
) -> Result<SimulationOutput, SimulationError>
where
    R: RateLaw,
    M: FnMut(&StepReport<'_>) -> StepControl,
{
    config.validate()?;

    log::info!(
        "Integrating ice stream over {} years (rtol {:e}, atol {:e})",
        config.t_final,
        config.solver.rtol,
        config.solver.atol
    );

    let system = RateLawSystem::new(rate_law, config);
    let solution = integrate_monitored(
        &system,
        &config.initial_state.to_array(),
        0.0,
        config.t_end_seconds(),
        &config.solver,
        monitor,
    )?;
    let trajectory = Trajectory::from_solution(solution);

    let diagnostics = diagnose(&trajectory, config, policy)?;

    log::info!(
        "Run complete: {} samples, {} rejected steps",
        trajectory.len(),
        trajectory.stats().rejected_steps
    );

    Ok(SimulationOutput {
        trajectory,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::{run, run_with};
    use crate::config::StreamConfig;
    use crate::diagnostics::ThinIcePolicy;
    use crate::error::{ConfigError, IntegrationError, SimulationError};
    use crate::integrator::StepControl;
    use crate::model::TillThermalModel;
    use crate::rate_law::RateLaw;
    use crate::state::StreamState;
    use approx::assert_relative_eq;

    /// Pure exponential thinning; keeps tests fast and analytically checkable.
    struct Thinning {
        rate: f64,
    }

    impl RateLaw for Thinning {
        fn rate(&self, _t: f64, state: &StreamState, _config: &StreamConfig) -> StreamState {
            StreamState::new(-self.rate * state.h, 0.0, 0.0, 0.0)
        }
    }

    struct Broken;

    impl RateLaw for Broken {
        fn rate(&self, t: f64, _state: &StreamState, _config: &StreamConfig) -> StreamState {
            let de = if t > 1e6 { f64::INFINITY } else { 0.0 };
            StreamState::new(0.0, de, 0.0, 0.0)
        }
    }

    #[test]
    fn reference_run_completes_with_bounded_diagnostics() -> anyhow::Result<()> {
        let config = StreamConfig::default();
        let output = run(&config, &TillThermalModel)?;
        let trajectory = &output.trajectory;
        let diagnostics = &output.diagnostics;

        assert!(trajectory.len() >= 2);
        assert_eq!(trajectory.times()[0], 0.0);
        assert!(trajectory.final_time() >= config.t_end_seconds());
        assert!(trajectory.times().windows(2).all(|w| w[1] > w[0]));
        assert!(trajectory.stats().max_error_ratio <= 1.0);
        assert_eq!(trajectory.states()[0], StreamState::new(700.0, 0.6, 1.0, 0.0));

        assert_eq!(diagnostics.len(), trajectory.len());
        for i in 0..diagnostics.len() {
            assert!(diagnostics.void_ratio[i] <= config.e_c);
            assert!(diagnostics.till_thickness[i] >= config.h_t_min);
            assert!(diagnostics.till_thickness[i] <= config.htill_init);
            assert!(diagnostics.basal_temperature[i] >= 0.0);
            assert!(diagnostics.velocity[i] >= 0.0);
        }
        Ok(())
    }

    #[test]
    fn reference_run_is_deterministic() -> anyhow::Result<()> {
        let config = StreamConfig {
            t_final: 2000.0,
            ..StreamConfig::default()
        };
        let a = run(&config, &TillThermalModel)?;
        let b = run(&config, &TillThermalModel)?;
        assert_eq!(a.trajectory, b.trajectory);
        assert_eq!(a.diagnostics, b.diagnostics);
        Ok(())
    }

    #[test]
    fn thinning_matches_analytic_solution() -> anyhow::Result<()> {
        let config = StreamConfig {
            t_final: 100.0,
            ..StreamConfig::default()
        };
        let rate = 1.0 / (50.0 * config.year);
        let output = run(&config, &Thinning { rate })?;

        let (time, state) = output
            .trajectory
            .samples()
            .last()
            .ok_or_else(|| anyhow::anyhow!("empty trajectory"))?;
        let expected = 700.0 * (-rate * time).exp();
        assert!((state.h - expected).abs() < 1e-2, "{} vs {expected}", state.h);

        let years = output.trajectory.times_in_years(config.year);
        assert_relative_eq!(years[years.len() - 1], 100.0, max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn invalid_config_fails_before_integration() {
        let config = StreamConfig {
            e_c: 1.2,
            ..StreamConfig::default()
        };
        let mut steps = 0;
        let err = run_with(&config, &TillThermalModel, ThinIcePolicy::default(), |_| {
            steps += 1;
            StepControl::Continue
        })
        .expect_err("invalid e_c");
        assert!(matches!(
            err,
            SimulationError::Config(ConfigError::OutOfRange { field: "e_c", .. })
        ));
        assert_eq!(steps, 0);
    }

    #[test]
    fn non_finite_rate_fails_the_whole_run() {
        let config = StreamConfig::default();
        let err = run(&config, &Broken).expect_err("infinite rate");
        match err {
            SimulationError::Integration(IntegrationError::NonFiniteRate { time, state }) => {
                assert!(time > 1e6);
                assert_eq!(state.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cancellation_yields_no_trajectory() {
        let config = StreamConfig::default();
        let err = run_with(&config, &TillThermalModel, ThinIcePolicy::default(), |report| {
            if report.time > 100.0 * config.year {
                StepControl::Cancel
            } else {
                StepControl::Continue
            }
        })
        .expect_err("cancelled");
        match err {
            SimulationError::Integration(IntegrationError::Cancelled { time, .. }) => {
                assert!(time > 100.0 * config.year);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
