use muscl_core::{HydroConfig, HydroSolver, ID, IP};
use wasm_bindgen::prelude::*;

/// Two-dimensional solver driven from JavaScript, one step per call.
#[wasm_bindgen]
pub struct Solver {
    inner: HydroSolver<2>,
}

#[wasm_bindgen]
impl Solver {
    /// `config` is a JSON parameter object; missing keys take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: &str) -> Result<Solver, JsValue> {
        let mut cfg: HydroConfig = if config.trim().is_empty() {
            HydroConfig::default()
        } else {
            serde_json::from_str(config).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        cfg.mesh.dimension = 2;
        let params = cfg.validate::<2>().map_err(to_js)?;
        let inner = HydroSolver::new(params).map_err(to_js)?;
        Ok(Solver { inner })
    }

    pub fn nx(&self) -> usize {
        self.inner.grid().n()[0]
    }

    pub fn ny(&self) -> usize {
        self.inner.grid().n()[1]
    }

    pub fn time(&self) -> f64 {
        self.inner.clock().time()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    // Copy-based JS access, x fastest
    pub fn get_density(&self) -> Vec<f64> {
        self.inner.current_state().primitive_variable(ID)
    }

    pub fn get_pressure(&self) -> Vec<f64> {
        self.inner.current_state().primitive_variable(IP)
    }

    // Step + timing (WASM-only)
    pub fn step(&mut self) -> Result<StepInfo, JsValue> {
        let t0 = now_ms();
        let dt = self.inner.step().map_err(to_js)?;
        let t1 = now_ms();
        let clock = self.inner.clock();
        Ok(StepInfo {
            dt,
            compute_ms: t1 - t0,
            time: clock.time(),
            iteration: clock.iteration() as u32,
        })
    }
}

#[wasm_bindgen]
pub struct StepInfo {
    dt: f64,
    compute_ms: f64,
    time: f64,
    iteration: u32,
}

#[wasm_bindgen]
impl StepInfo {
    pub fn dt(&self) -> f64 { self.dt }
    pub fn compute_ms(&self) -> f64 { self.compute_ms }
    pub fn time(&self) -> f64 { self.time }
    pub fn iteration(&self) -> u32 { self.iteration }
}

fn to_js(e: muscl_core::HydroError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}
