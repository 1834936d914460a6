//! Ring normal modes: computed once per parameter set, then served to the
//! plotting and animation views.

use crate::simulation::settings_or_default;
use crate::system::js_error;
use coupled_core::animation::RingAnimation;
use coupled_core::config::{RingAnimationSettings, RingParams};
use coupled_core::modes::ModeSet;
use coupled_core::ring::stiffness_matrix;
use coupled_core::trajectory::arange;
use js_sys::Float64Array;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmRingModes {
    params: RingParams,
    stiffness: Vec<f64>,
    modes: ModeSet,
    animation: RingAnimationSettings,
    frame_count: usize,
}

impl WasmRingModes {
    pub(crate) fn build(params: RingParams) -> anyhow::Result<Self> {
        let k = stiffness_matrix(&params)?;
        let modes = ModeSet::from_stiffness(&k, params.mass)?;
        // row-major for the JS side
        let stiffness = k.transpose().as_slice().to_vec();
        let animation = RingAnimationSettings::default();
        let frame_count = RingAnimation::new(&modes, animation)?.frame_count();
        Ok(Self {
            params,
            stiffness,
            modes,
            animation,
            frame_count,
        })
    }

    fn ring_animation(&self) -> anyhow::Result<RingAnimation<'_>> {
        RingAnimation::new(&self.modes, self.animation)
    }
}

#[wasm_bindgen]
impl WasmRingModes {
    #[wasm_bindgen(constructor)]
    pub fn new(n: usize, mass: f64, k1: f64, k2: f64, k3: f64) -> Result<WasmRingModes, JsValue> {
        console_error_panic_hook::set_once();
        Self::build(RingParams { n, mass, k1, k2, k3 })
            .map_err(|e| js_error("Normal mode analysis failed", e))
    }

    pub fn size(&self) -> usize {
        self.params.n
    }

    /// Stiffness matrix flattened row by row.
    pub fn stiffness_matrix(&self) -> Float64Array {
        Float64Array::from(self.stiffness.as_slice())
    }

    pub fn eigenvalues(&self) -> Vec<f64> {
        self.modes.eigenvalues()
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.modes.frequencies()
    }

    pub fn eigenvector(&self, mode: usize) -> Option<Vec<f64>> {
        self.modes.modes().get(mode).map(|m| m.vector.clone())
    }

    /// Displacement histories of every mode on `arange(0, t_max, dt)`.
    pub fn mode_trajectories(&self, amplitude: f64, t_max: f64, dt: f64) -> Result<JsValue, JsValue> {
        if !(dt > 0.0) {
            return Err(JsValue::from_str("dt must be positive."));
        }
        let times = arange(0.0, t_max, dt);
        let trajectories = self.modes.all_mode_trajectories(amplitude, &times);
        to_value(&trajectories).map_err(|e| js_error("Serialization error", e))
    }

    pub fn set_animation(&mut self, settings: JsValue) -> Result<(), JsValue> {
        let settings: RingAnimationSettings = settings_or_default(settings, "animation settings")?;
        let frame_count = RingAnimation::new(&self.modes, settings)
            .map_err(|e| js_error("Invalid animation settings", e))?
            .frame_count();
        self.animation = settings;
        self.frame_count = frame_count;
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Render state of every mode panel at `index`.
    pub fn frame(&self, index: usize) -> Result<JsValue, JsValue> {
        let frame = self
            .ring_animation()
            .and_then(|animation| animation.frame(index))
            .map_err(|e| js_error("Frame unavailable", e))?;
        to_value(&frame).map_err(|e| js_error("Serialization error", e))
    }
}
