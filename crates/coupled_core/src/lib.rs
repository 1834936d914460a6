pub mod animation;
pub mod config;
pub mod modes;
pub mod pendulum;
pub mod ring;
pub mod solvers;
pub mod trajectory;
/// The `coupled_core` crate holds the numerics behind the coupled oscillator
/// demonstrations: two spring-coupled pendulums and a ring of masses with
/// nearest, next-nearest and opposite springs.
///
/// Key components:
/// - **Traits**: `Scalar`, `DynamicalSystem` (ODE right-hand sides), `Steppable` (fixed-step solvers).
/// - **Solvers**: classical RK4 and an adaptive Dormand-Prince 4(5) pair.
/// - **Trajectory**: fixed-step and adaptive integration into sampled time series.
/// - **Pendulum / Ring**: the two physical models and their stiffness matrices.
/// - **Modes**: symmetric eigen-decomposition and closed-form mode trajectories.
/// - **Animation**: frame-index-to-render-state functions for the mode animations.
pub mod traits;
