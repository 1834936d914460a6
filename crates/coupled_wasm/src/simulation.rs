//! One-shot pendulum runs and the two-pendulum mode demonstration.

use crate::system::js_error;
use coupled_core::animation::PendulumAnimation;
use coupled_core::config::{
    AdaptiveSettings, PendulumModeSettings, PendulumParams, SimulationSettings,
};
use coupled_core::pendulum::{pendulum_mode_series as core_mode_series, THETA1, THETA2};
use coupled_core::solvers::SolverStats;
use coupled_core::trajectory::{simulate_pendulums as core_simulate, IntegrationMethod};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Deserializes `value`, falling back to defaults for `undefined`/`null`.
pub(crate) fn settings_or_default<T>(value: JsValue, what: &str) -> Result<T, JsValue>
where
    T: DeserializeOwned + Default,
{
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    from_value(value).map_err(|e| js_error(&format!("Invalid {what}"), e))
}

/// Column-oriented payload for plotting.
#[derive(Serialize)]
struct PendulumRunPayload {
    method: IntegrationMethod,
    times: Vec<f64>,
    theta1: Vec<f64>,
    theta2: Vec<f64>,
    energy: Vec<f64>,
    energy_drift: f64,
    stats: Option<SolverStats>,
}

/// Integrates the coupled pendulums and returns `{ times, theta1, theta2, ... }`.
#[wasm_bindgen]
pub fn simulate_pendulums(
    params: JsValue,
    settings: JsValue,
    adaptive: JsValue,
    method: &str,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let params: PendulumParams = settings_or_default(params, "pendulum parameters")?;
    let settings: SimulationSettings = settings_or_default(settings, "simulation settings")?;
    let adaptive: AdaptiveSettings = settings_or_default(adaptive, "adaptive settings")?;
    let method = IntegrationMethod::from_name(method).map_err(|e| js_error("Bad method", e))?;

    let run = core_simulate(&params, &settings, method, adaptive)
        .map_err(|e| js_error("Pendulum simulation failed", e))?;

    let payload = PendulumRunPayload {
        method: run.method,
        times: run.trajectory.times().to_vec(),
        theta1: run.trajectory.component(THETA1),
        theta2: run.trajectory.component(THETA2),
        energy_drift: run.energy_drift(),
        energy: run.energy,
        stats: run.stats,
    };
    to_value(&payload).map_err(|e| js_error("Serialization error", e))
}

/// Closed-form angle series of the in-phase and out-of-phase modes.
#[wasm_bindgen]
pub fn pendulum_mode_series(params: JsValue, settings: JsValue) -> Result<JsValue, JsValue> {
    let params: PendulumParams = settings_or_default(params, "pendulum parameters")?;
    let settings: PendulumModeSettings = settings_or_default(settings, "mode settings")?;
    let series = core_mode_series(&params, &settings)
        .map_err(|e| js_error("Mode series failed", e))?;
    to_value(&series).map_err(|e| js_error("Serialization error", e))
}

#[wasm_bindgen]
pub struct WasmPendulumAnimation {
    animation: PendulumAnimation,
}

#[wasm_bindgen]
impl WasmPendulumAnimation {
    #[wasm_bindgen(constructor)]
    pub fn new(params: JsValue, settings: JsValue) -> Result<WasmPendulumAnimation, JsValue> {
        console_error_panic_hook::set_once();
        let params: PendulumParams = settings_or_default(params, "pendulum parameters")?;
        let settings: PendulumModeSettings = settings_or_default(settings, "mode settings")?;
        let animation = PendulumAnimation::new(&params, &settings)
            .map_err(|e| js_error("Animation setup failed", e))?;
        Ok(WasmPendulumAnimation { animation })
    }

    pub fn frame_count(&self) -> usize {
        self.animation.frame_count()
    }

    pub fn frame(&self, index: usize) -> Result<JsValue, JsValue> {
        let frame = self
            .animation
            .frame(index)
            .map_err(|e| js_error("Frame unavailable", e))?;
        to_value(&frame).map_err(|e| js_error("Serialization error", e))
    }
}
