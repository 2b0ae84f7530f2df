use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
  frame::TRIANGLE_VERTEX_COUNT,
  geometry::TRIANGLE_VERTICES,
  shader::{FRAGMENT_SHADER_SOURCE, VERTEX_SHADER_SOURCE},
  types::{Color, COLOR},
};

/// Largest accepted surface side, matching common `MAX_RENDERBUFFER_SIZE`.
pub const MAX_SURFACE_DIMENSION: usize = 16384;

/// Everything one bootstrap-and-draw run consumes. Missing fields in a JSON
/// scene fall back to the blue triangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
  pub width: usize,
  pub height: usize,
  pub clear_color: Color,
  pub vertex_shader: String,
  pub fragment_shader: String,
  pub vertices: Vec<f32>,
  pub vertex_count: i32,
}

impl Default for SceneConfig {
  fn default() -> Self {
    Self {
      width: 640,
      height: 480,
      clear_color: COLOR::BLACK,
      vertex_shader: VERTEX_SHADER_SOURCE.to_string(),
      fragment_shader: FRAGMENT_SHADER_SOURCE.to_string(),
      vertices: TRIANGLE_VERTICES.to_vec(),
      vertex_count: TRIANGLE_VERTEX_COUNT,
    }
  }
}

impl SceneConfig {
  pub fn from_json(s: &str) -> Result<Self> {
    let scene: Self = serde_json::from_str(s)?;
    scene.validate()?;
    Ok(scene)
  }

  pub fn validate(&self) -> Result<()> {
    for (name, side) in [("width", self.width), ("height", self.height)] {
      if side == 0 || side > MAX_SURFACE_DIMENSION {
        bail!(
          "{} {} outside 1..={}",
          name,
          side,
          MAX_SURFACE_DIMENSION
        );
      }
    }
    Ok(())
  }

  pub fn load(path: &Path) -> Result<Self> {
    let buf = fs::read_to_string(path)
      .with_context(|| format!("reading scene {}", path.display()))?;
    Self::from_json(&buf).with_context(|| format!("parsing scene {}", path.display()))
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_empty_json_is_default_scene() {
    assert_eq!(SceneConfig::from_json("{}").unwrap(), SceneConfig::default());
  }

  #[test]
  fn test_partial_override() {
    let scene = SceneConfig::from_json(
      r#"{ "width": 64, "height": 32, "clear_color": [1.0, 1.0, 1.0, 1.0] }"#,
    )
    .unwrap();
    assert_eq!((scene.width, scene.height), (64, 32));
    assert_eq!(scene.clear_color, COLOR::rgb(1.0, 1.0, 1.0));
    assert_eq!(scene.vertices, TRIANGLE_VERTICES.to_vec());
  }

  #[test]
  fn test_malformed_json_is_an_error() {
    assert!(SceneConfig::from_json("{ \"width\": \"wide\" }").is_err());
  }

  #[test]
  fn test_surface_size_is_bounded() {
    let huge = format!(r#"{{ "width": {}, "height": 10 }}"#, u64::MAX);
    let err = SceneConfig::from_json(&huge).unwrap_err();
    assert!(err.to_string().contains("width"));

    let err = SceneConfig::from_json(r#"{ "height": 0 }"#).unwrap_err();
    assert!(err.to_string().contains("height"));

    assert!(SceneConfig::from_json(r#"{ "width": 16384, "height": 1 }"#).is_ok());
  }

  #[test]
  fn test_bundled_scene_parses() {
    let scene = SceneConfig::from_json(include_str!("../scenes/red_on_white.json")).unwrap();
    assert_eq!((scene.width, scene.height), (320, 240));
    assert_eq!(scene.vertex_shader, VERTEX_SHADER_SOURCE);
    assert_eq!(scene.vertices.len(), 6);
  }

  #[test]
  fn test_missing_file_mentions_path() {
    let err = SceneConfig::load(Path::new("/nonexistent/scene.json")).unwrap_err();
    assert!(format!("{:#}", err).contains("/nonexistent/scene.json"));
  }
}
