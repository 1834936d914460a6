//! Browser bridge for `coupled_core`: pendulum runs, live stepping, ring
//! normal modes and animation frames, exposed through `wasm-bindgen`.

pub mod modes;
pub mod simulation;
pub mod system;

pub use modes::WasmRingModes;
pub use simulation::{pendulum_mode_series, simulate_pendulums, WasmPendulumAnimation};
pub use system::WasmPendulumSystem;
