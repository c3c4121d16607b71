use crate::{config::StreamConfig, state::StreamState, traits::DynamicalSystem};

/// Governing equations of the coupled ice-stream system.
///
/// `rate` returns `dX/dt` in per-second units for the state
/// `X = (h, e, h_till, T_b)`:
///
/// - `h`: ice mass balance, accumulation minus a discharge term that depends
///   on sliding velocity and geometry;
/// - `e`: till void-ratio relaxation driven by the basal water budget and the
///   consolidation state;
/// - `h_till`: net basal freezing or thawing of the till layer;
/// - `T_b`: basal heat budget (geothermal input, frictional dissipation,
///   conduction into the ice column, latent heat of till freeze/thaw).
///
/// Implementations must be pure and continuous enough for step-size control,
/// and must accept states outside the physical bounds: the integrator probes
/// trial states before it accepts or rejects a step. Anomalies must not be
/// masked; a non-finite component fails the run.
pub trait RateLaw {
    fn rate(&self, t: f64, state: &StreamState, config: &StreamConfig) -> StreamState;
}

impl<R: RateLaw + ?Sized> RateLaw for &R {
    fn rate(&self, t: f64, state: &StreamState, config: &StreamConfig) -> StreamState {
        (**self).rate(t, state, config)
    }
}

/// Exposes a rate law, bound to one configuration, to the solvers.
pub struct RateLawSystem<'a, R> {
    pub rate_law: &'a R,
    pub config: &'a StreamConfig,
}

impl<'a, R: RateLaw> RateLawSystem<'a, R> {
    pub fn new(rate_law: &'a R, config: &'a StreamConfig) -> Self {
        Self { rate_law, config }
    }
}

impl<R: RateLaw> DynamicalSystem<f64> for RateLawSystem<'_, R> {
    fn dimension(&self) -> usize {
        StreamState::DIMENSION
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        let state = StreamState::from_slice(x);
        let rate = self.rate_law.rate(t, &state, self.config);
        out.copy_from_slice(&rate.to_array());
    }
}

#[cfg(test)]
mod tests {
    use super::{RateLaw, RateLawSystem};
    use crate::config::StreamConfig;
    use crate::state::StreamState;
    use crate::traits::DynamicalSystem;

    /// Relaxes every component towards the configured initial state.
    struct Relax {
        rate: f64,
    }

    impl RateLaw for Relax {
        fn rate(&self, _t: f64, state: &StreamState, config: &StreamConfig) -> StreamState {
            let target = config.initial_state;
            StreamState::new(
                self.rate * (target.h - state.h),
                self.rate * (target.e - state.e),
                self.rate * (target.h_till - state.h_till),
                self.rate * (target.t_b - state.t_b),
            )
        }
    }

    #[test]
    fn adapter_preserves_component_order() {
        let config = StreamConfig::default();
        let law = Relax { rate: 2.0 };
        let system = RateLawSystem::new(&law, &config);
        assert_eq!(system.dimension(), 4);

        let mut out = [0.0; 4];
        system.apply(0.0, &[690.0, 0.5, 0.5, 1.0], &mut out);
        assert!((out[0] - 20.0).abs() < 1e-12);
        assert!((out[1] - 0.2).abs() < 1e-12);
        assert!((out[2] - 1.0).abs() < 1e-12);
        assert!((out[3] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn borrowed_trait_objects_drive_the_adapter() {
        let config = StreamConfig::default();
        let law = Relax { rate: 1.0 };
        let by_ref: &dyn RateLaw = &law;
        let system = RateLawSystem::new(&by_ref, &config);

        let mut out = [0.0; 4];
        system.apply(0.0, &config.initial_state.to_array(), &mut out);
        assert_eq!(out, [0.0; 4]);
    }
}
