use crate::{
    error::ConfigError,
    integrator::{positive, IntegratorSettings},
    state::StreamState,
};
use serde::{Deserialize, Serialize};

/// Seconds per year used by the default configuration.
pub const SECONDS_PER_YEAR: f64 = 3600.0 * 24.0 * 365.242;

/// Constants for one run of the coupled ice-stream model.
///
/// A configuration is built once, validated, and then only read: it is the
/// sole channel through which the rate law and the diagnostics share data.
/// Serialized field names follow the customary symbols (`L`, `W`, `T_s`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Seconds per year.
    pub year: f64,
    /// Simulated duration (years).
    pub t_final: f64,
    /// Ice-stream length (m).
    #[serde(rename = "L")]
    pub length: f64,
    /// Ice-stream width (m).
    #[serde(rename = "W")]
    pub width: f64,
    /// Flow-law exponent.
    pub n: f64,
    /// Geothermal flux (W/m^2).
    pub q_g: f64,
    /// Initial and maximum unfrozen till thickness (m).
    pub htill_init: f64,
    /// Surface temperature depression below melting (K).
    #[serde(rename = "T_s")]
    pub t_s: f64,
    /// Ice density (kg/m^3).
    pub rho_i: f64,
    /// Latent heat of fusion (J/kg).
    #[serde(rename = "L_f")]
    pub l_f: f64,
    /// Thermal conductivity of ice (W/(m K)).
    #[serde(rename = "K_i")]
    pub k_i: f64,
    /// Flow-law rate factor (Pa^-n s^-1).
    #[serde(rename = "A_f")]
    pub a_f: f64,
    /// Gravitational acceleration (m/s^2).
    pub g: f64,
    /// Void ratio consolidation bound.
    pub e_c: f64,
    /// Till strength prefactor (Pa).
    pub tau0: f64,
    /// Till strength exponent.
    pub c: f64,
    /// Specific heat capacity of ice (J/(kg K)).
    #[serde(rename = "C_ice")]
    pub c_ice: f64,
    /// Thickness of the basal ice layer that stores sensible heat (m).
    pub eta_b: f64,
    /// Floor on the unfrozen till thickness (m).
    pub h_t_min: f64,
    /// Accumulation rate (m/s).
    pub a: f64,
    pub initial_state: StreamState,
    pub solver: IntegratorSettings,
}

impl Default for StreamConfig {
    fn default() -> Self {
        let year = SECONDS_PER_YEAR;
        let htill_init = 1.0;
        Self {
            year,
            t_final: 1e4,
            length: 500e3,
            width: 40e3,
            n: 3.0,
            q_g: 0.07,
            htill_init,
            t_s: 23.0,
            rho_i: 917.0,
            l_f: 3.35e5,
            k_i: 2.1,
            a_f: 5e-25,
            g: 9.81,
            e_c: 0.3,
            tau0: 9.44e8,
            c: 21.7,
            c_ice: 2009.0,
            eta_b: 10.0,
            h_t_min: 1e-3,
            a: 0.1 / year,
            initial_state: StreamState::new(700.0, 0.6, htill_init, 0.0),
            solver: IntegratorSettings::default(),
        }
    }
}

impl StreamConfig {
    /// Ice-stream area `L * W` (m^2).
    pub fn area(&self) -> f64 {
        self.length * self.width
    }

    /// End of the integration window in seconds.
    pub fn t_end_seconds(&self) -> f64 {
        self.year * self.t_final
    }

    /// Converts an accumulation rate in m/yr to the stored m/s.
    pub fn accumulation_per_year(&self, meters_per_year: f64) -> f64 {
        meters_per_year / self.year
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("year", self.year)?;
        positive("t_final", self.t_final)?;
        positive("L", self.length)?;
        positive("W", self.width)?;
        positive("n", self.n)?;
        positive("htill_init", self.htill_init)?;
        positive("rho_i", self.rho_i)?;
        positive("L_f", self.l_f)?;
        positive("K_i", self.k_i)?;
        positive("A_f", self.a_f)?;
        positive("g", self.g)?;
        positive("tau0", self.tau0)?;
        positive("c", self.c)?;
        positive("C_ice", self.c_ice)?;
        positive("eta_b", self.eta_b)?;
        positive("h_t_min", self.h_t_min)?;
        positive("a", self.a)?;

        if !(self.q_g >= 0.0) || !self.q_g.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "q_g",
                value: self.q_g,
                expected: "finite and non-negative",
            });
        }
        if !self.t_s.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "T_s",
                value: self.t_s,
            });
        }
        if !(self.e_c > 0.0 && self.e_c < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "e_c",
                value: self.e_c,
                expected: "strictly between 0 and 1",
            });
        }
        if !(self.h_t_min < self.htill_init) {
            return Err(ConfigError::OutOfRange {
                field: "h_t_min",
                value: self.h_t_min,
                expected: "below htill_init",
            });
        }

        let StreamState { h, e, h_till, t_b } = self.initial_state;
        positive("initial_state.h", h)?;
        for (field, value) in [
            ("initial_state.e", e),
            ("initial_state.h_till", h_till),
            ("initial_state.t_b", t_b),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field, value });
            }
        }

        self.solver.validate()
    }
}
