use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Numeric type the models and steppers are written against.
/// Everything in the crate runs on `f64`; the bound keeps the models generic.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A first-order ODE system `dx/dt = f(t, x)`.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer receiving dx/dt
    fn apply(&self, t: T, x: &[T], out: &mut [T]);

    /// Allocating convenience wrapper around [`DynamicalSystem::apply`].
    fn derivative(&self, t: T, x: &[T]) -> Vec<T> {
        let mut out = vec![T::zero(); self.dimension()];
        self.apply(t, x, &mut out);
        out
    }
}

/// A fixed-step integrator that advances a state in place.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);

    /// Classical order of accuracy of the method.
    fn order(&self) -> usize;
}
