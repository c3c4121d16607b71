use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in our dynamical systems.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Represents a continuous-time dynamical system dx/dt = f(t, x).
///
/// Implementations must be pure: `apply` may be called at any state the
/// solver chooses to probe, including states outside the physical domain.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// x: current state
    /// t: current time
    /// out: buffer to write dx/dt
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A trait for embedded Runge-Kutta pairs that can attempt a step and
/// report a local error estimate for it.
pub trait Steppable<T: Scalar> {
    /// Order of the propagated solution. The embedded estimate is one lower.
    fn order(&self) -> usize;

    /// Attempts one step of size dt from (t, state) without committing it.
    /// next: candidate state at t + dt
    /// error: per-component local truncation error estimate
    fn try_step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        next: &mut [T],
        error: &mut [T],
    );

    /// Commits the last attempted step. The caller must continue from the
    /// `next` state written by that attempt.
    fn accept(&mut self);
}
