use std::path::Path;

use anyhow::{Context, Result};
use trigl::{draw_scene, SceneConfig, SoftContext};

const DEFAULT_OUTPUT: &str = "triangle.png";

// usage: trigl [scene.json|-] [out.png]
fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let args: Vec<_> = std::env::args().collect();
  let scene = match args.get(1).map(String::as_str) {
    Some(path) if path != "-" => SceneConfig::load(Path::new(path))?,
    _ => SceneConfig::default(),
  };
  let output = args.get(2).map(String::as_str).unwrap_or(DEFAULT_OUTPUT);

  render_to_file(&scene, Path::new(output))
}

fn render_to_file(scene: &SceneConfig, output: &Path) -> Result<()> {
  let mut ctx = SoftContext::new(scene.width, scene.height);
  draw_scene(&mut ctx, scene)?;

  ctx
    .surface()
    .to_rgba_image()
    .save(output)
    .with_context(|| format!("writing {}", output.display()))?;
  tracing::info!(path = %output.display(), "saved");
  Ok(())
}
