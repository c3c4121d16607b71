//! Reference implementation of the coupled ice-stream rate law.
//!
//! The bed is either frozen (`T_b > 0`), in which case only the basal layer
//! temperature evolves, or at the melting point, where the heat budget is
//! spent on melting into (or freezing out of) the till. Melting first swells
//! the till's void ratio; once the till has consolidated to `e_c`, further
//! freezing thins the unfrozen layer instead, and only a fully frozen layer
//! lets the bed cool below melting.

use crate::{
    config::StreamConfig,
    rate_law::RateLaw,
    state::StreamState,
    stress::{driving_stress, sliding_velocity, yield_stress},
};
use serde::{Deserialize, Serialize};

/// Thickness floor used inside the rate law so probe states with vanishing
/// or negative ice do not divide by zero (m).
const MIN_ICE_THICKNESS: f64 = 1.0;

/// Which branch of the basal equations is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasalRegime {
    /// Bed below melting; the basal layer warms or cools.
    Frozen,
    /// Bed at melting; meltwater changes the void ratio.
    Swelling,
    /// Bed at melting, consolidated till freezing from the top.
    Freezing,
    /// Bed at melting, consolidated till thawing back to full thickness.
    Thawing,
    /// Till fully frozen; the bed starts cooling below melting.
    Cooling,
}

/// Ice-stream rate law with till consolidation and basal freeze/thaw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TillThermalModel;

impl TillThermalModel {
    /// Net basal heat flux into the bed (W/m^2): geothermal input plus
    /// frictional heating minus conduction into the ice column.
    pub fn basal_heat_flux(&self, state: &StreamState, config: &StreamConfig) -> f64 {
        let h = state.h.max(MIN_ICE_THICKNESS);
        let tau_f = yield_stress(state.e, config);
        let velocity = self.velocity(state, config);
        let conduction = config.k_i * (config.t_s - state.t_b) / h;
        config.q_g + tau_f * velocity - conduction
    }

    /// Sliding velocity seen by the dynamics (m/s).
    pub fn velocity(&self, state: &StreamState, config: &StreamConfig) -> f64 {
        let h = state.h.max(MIN_ICE_THICKNESS);
        sliding_velocity(
            h,
            driving_stress(h, config),
            yield_stress(state.e, config),
            config,
        )
    }

    pub fn regime(&self, state: &StreamState, heat_flux: f64, config: &StreamConfig) -> BasalRegime {
        if state.t_b > 0.0 {
            return BasalRegime::Frozen;
        }
        if state.e > config.e_c {
            return BasalRegime::Swelling;
        }
        if heat_flux >= 0.0 {
            if state.h_till < config.htill_init {
                BasalRegime::Thawing
            } else {
                BasalRegime::Swelling
            }
        } else if state.h_till > config.h_t_min {
            BasalRegime::Freezing
        } else {
            BasalRegime::Cooling
        }
    }
}

impl RateLaw for TillThermalModel {
    fn rate(&self, _t: f64, state: &StreamState, config: &StreamConfig) -> StreamState {
        let h = state.h.max(MIN_ICE_THICKNESS);
        let velocity = self.velocity(state, config);
        let dh = config.a - velocity * h / config.length;

        let heat_flux = self.basal_heat_flux(state, config);
        let melt_rate = heat_flux / (config.rho_i * config.l_f);
        let heat_capacity = config.c_ice * config.rho_i * config.eta_b;

        let (de, dh_till, dt_b) = match self.regime(state, heat_flux, config) {
            BasalRegime::Frozen | BasalRegime::Cooling => (0.0, 0.0, -heat_flux / heat_capacity),
            BasalRegime::Swelling => (melt_rate / state.h_till.max(config.h_t_min), 0.0, 0.0),
            BasalRegime::Freezing | BasalRegime::Thawing => (0.0, melt_rate / config.e_c, 0.0),
        };

        StreamState::new(dh, de, dh_till, dt_b)
    }
}
