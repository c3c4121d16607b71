//! Stress balance and sliding law shared by the reference rate law and the
//! diagnostics.

use crate::config::StreamConfig;

/// Gravitational driving stress `rho_i * g * h^2 / L` (Pa).
pub fn driving_stress(h: f64, config: &StreamConfig) -> f64 {
    config.rho_i * config.g * h * h / config.length
}

/// Till yield stress `tau0 * exp(-c * e)` (Pa).
pub fn yield_stress(e: f64, config: &StreamConfig) -> f64 {
    config.tau0 * (-config.c * e).exp()
}

/// Unfloored centerline sliding velocity (m/s),
/// `(A_f / 256) * W^(n+1) * ((tau_d - tau_f) / h)^n`.
///
/// Integer exponents use the power as written, so an even `n` gives a
/// positive value even when the till resists. A fractional power of a
/// negative base is undefined; it is taken on the magnitude with the sign
/// of the base restored.
pub fn raw_sliding_velocity(h: f64, tau_d: f64, tau_f: f64, config: &StreamConfig) -> f64 {
    let net = (tau_d - tau_f) / h;
    let coefficient = config.a_f / 256.0 * config.width.powf(config.n + 1.0);
    let power = if config.n.fract() == 0.0 {
        net.powf(config.n)
    } else {
        net.signum() * net.abs().powf(config.n)
    };
    coefficient * power
}

/// Floors at zero but lets NaN through.
pub fn floor_at_zero(value: f64) -> f64 {
    if value.is_nan() {
        value
    } else {
        value.max(0.0)
    }
}

/// Sliding velocity floored at zero (m/s).
pub fn sliding_velocity(h: f64, tau_d: f64, tau_f: f64, config: &StreamConfig) -> f64 {
    floor_at_zero(raw_sliding_velocity(h, tau_d, tau_f, config))
}
