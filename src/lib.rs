pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod glsl;
pub mod pipeline;
pub mod raster;
pub mod shader;
pub mod soft;
pub mod types;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::SceneConfig;
pub use context::GlContext;
pub use error::PipelineError;
pub use pipeline::{draw_scene, Pipeline, PipelineState};
pub use soft::SoftContext;

// ----------------------------------------------------------------------------
// When compiling for web:

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// This is the entry-point for all the web-assembly.
/// This is called once from the HTML, after the canvas is mounted.
/// It draws the triangle into the canvas and returns.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start(canvas_id: &str) -> Result<(), JsValue> {
  std::panic::set_hook(Box::new(console_error_panic_hook::hook));

  let mut backend = web::WebGlBackend::from_canvas_id(canvas_id)?;
  let (width, height) = backend.size();
  let scene = SceneConfig {
    width,
    height,
    ..SceneConfig::default()
  };
  draw_scene(&mut backend, &scene).map_err(|e| JsValue::from_str(&e.to_string()))
}
