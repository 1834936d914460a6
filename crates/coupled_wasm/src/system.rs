//! Live-stepped coupled pendulum system and shared bridge helpers.

use coupled_core::config::{AdaptiveSettings, PendulumParams};
use coupled_core::pendulum::{CoupledPendulums, OscillatorState, STATE_DIM, THETA1, THETA2};
use coupled_core::solvers::{DormandPrince45, RK4};
use coupled_core::traits::Steppable;
use std::fmt::Display;
use wasm_bindgen::prelude::*;

pub(crate) fn js_error(context: &str, err: impl Display) -> JsValue {
    JsValue::from_str(&format!("{context}: {err:#}"))
}

enum SolverType {
    RK4(RK4<f64>),
    RK45(DormandPrince45),
}

#[wasm_bindgen]
pub struct WasmPendulumSystem {
    system: CoupledPendulums,
    state: OscillatorState,
    t: f64,
    solver: SolverType,
}

#[wasm_bindgen]
impl WasmPendulumSystem {
    #[wasm_bindgen(constructor)]
    pub fn new(
        m1: f64,
        m2: f64,
        kappa: f64,
        length: f64,
        gravity: f64,
        solver_name: &str,
    ) -> Result<WasmPendulumSystem, JsValue> {
        console_error_panic_hook::set_once();

        let params = PendulumParams {
            m1,
            m2,
            kappa,
            length,
            gravity,
        };
        let system =
            CoupledPendulums::new(params).map_err(|e| js_error("Invalid pendulum parameters", e))?;

        let solver = match solver_name {
            "rk4" => SolverType::RK4(RK4::new(STATE_DIM)),
            "rk45" => SolverType::RK45(DormandPrince45::new(
                STATE_DIM,
                AdaptiveSettings::default(),
            )),
            _ => return Err(JsValue::from_str("Unknown solver")),
        };

        Ok(WasmPendulumSystem {
            system,
            state: [0.0; STATE_DIM],
            t: 0.0,
            solver,
        })
    }

    pub fn set_state(&mut self, state: &[f64]) -> Result<(), JsValue> {
        self.state = state.try_into().map_err(|_| {
            JsValue::from_str(&format!(
                "State must have {} components, got {}.",
                STATE_DIM,
                state.len()
            ))
        })?;
        Ok(())
    }

    pub fn get_state(&self) -> Vec<f64> {
        self.state.to_vec()
    }

    pub fn set_t(&mut self, t: f64) {
        self.t = t;
    }

    pub fn get_t(&self) -> f64 {
        self.t
    }

    /// Angles `[theta1, theta2]` for drawing the current pose.
    pub fn angles(&self) -> Vec<f64> {
        vec![self.state[THETA1], self.state[THETA2]]
    }

    pub fn energy(&self) -> f64 {
        self.system.energy(&self.state)
    }

    /// Advances by `dt`: one RK4 step, or as many adaptive steps as the
    /// tolerances require.
    pub fn step(&mut self, dt: f64) -> Result<(), JsValue> {
        match &mut self.solver {
            SolverType::RK4(s) => {
                s.step(&self.system, &mut self.t, &mut self.state, dt);
                Ok(())
            }
            SolverType::RK45(s) => {
                let target = self.t + dt;
                s.advance(&self.system, &mut self.t, &mut self.state, target)
                    .map_err(|e| js_error("Adaptive step failed", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_system(solver: &str) -> WasmPendulumSystem {
        WasmPendulumSystem::new(1.0, 1.0, 0.5, 1.0, 9.81, solver).expect("system should build")
    }

    #[test]
    #[cfg(target_arch = "wasm32")]
    fn wasm_pendulum_system_rejects_unknown_solver() {
        let result = WasmPendulumSystem::new(1.0, 1.0, 0.5, 1.0, 9.81, "euler");
        assert!(result.is_err(), "expected unknown solver error");
    }

    #[test]
    #[cfg(target_arch = "wasm32")]
    fn wasm_pendulum_system_rejects_bad_state_length() {
        let mut system = default_system("rk4");
        assert!(system.set_state(&[0.1, 0.0]).is_err());
    }

    #[test]
    fn wasm_pendulum_system_step_advances_state_and_time() {
        let mut system = default_system("rk4");
        system.set_state(&[0.1, 0.0, 0.1, 0.0]).expect("state");
        system.set_t(0.0);
        system.step(0.01).expect("step");

        assert!((system.get_t() - 0.01).abs() < 1e-12);
        let angles = system.angles();
        assert_eq!(angles[0], angles[1]);
        let expected = 0.1 * (9.81_f64.sqrt() * 0.01).cos();
        assert!((angles[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn wasm_pendulum_system_adaptive_lands_on_target_time() {
        let mut system = default_system("rk45");
        system.set_state(&[0.1, 0.0, 0.0, 0.0]).expect("state");
        system.set_t(1.0);
        let e0 = system.energy();
        for _ in 0..10 {
            system.step(0.05).expect("step");
        }
        assert!((system.get_t() - 1.5).abs() < 1e-12);
        assert!(((system.energy() - e0) / e0).abs() < 2e-2);
    }

    #[test]
    fn wasm_pendulum_system_get_state_returns_copy() {
        let mut system = default_system("rk4");
        system.set_state(&[1.0, 2.0, 3.0, 4.0]).expect("state");
        let mut snapshot = system.get_state();
        snapshot[0] = 9.0;
        assert_eq!(system.get_state(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
