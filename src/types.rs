pub use glam::{vec2, vec4, Vec2, Vec4};

/// RGBA, each channel in `0.0..=1.0`
pub type Color = Vec4;

#[allow(non_snake_case)]
pub mod COLOR {
  use super::*;

  pub const BLACK: Color = rgb(0.0, 0.0, 0.0);
  pub const TRANSPARENT: Color = rgba(0.0, 0.0, 0.0, 0.0);

  pub const fn rgb(r: f32, g: f32, b: f32) -> Color {
    rgba(r, g, b, 1.0)
  }

  pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Color {
    Vec4::new(r, g, b, a)
  }

  pub fn to_rgba8(color: Color) -> [u8; 4] {
    let c = color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
    [
      c.x.round() as u8,
      c.y.round() as u8,
      c.z.round() as u8,
      c.w.round() as u8,
    ]
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
  Vertex,
  Fragment,
}

impl ShaderStage {
  pub fn name(&self) -> &'static str {
    match self {
      ShaderStage::Vertex => "vertex",
      ShaderStage::Fragment => "fragment",
    }
  }
}

impl std::fmt::Display for ShaderStage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
  StaticDraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
  Triangles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
  Float,
}

/// How one attribute reads its data out of the bound array buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
  pub components: i32,
  pub component_type: ComponentType,
  pub normalized: bool,
  // in bytes, 0 means tightly packed
  pub stride: i32,
  pub offset: i32,
}

impl VertexLayout {
  /// Two tightly packed floats per vertex.
  pub const VEC2_F32: VertexLayout = VertexLayout {
    components: 2,
    component_type: ComponentType::Float,
    normalized: false,
    stride: 0,
    offset: 0,
  };

  pub fn effective_stride(&self) -> usize {
    if self.stride == 0 {
      self.components as usize * std::mem::size_of::<f32>()
    } else {
      self.stride as usize
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn rgba8_conversion_clamps() {
    assert_eq!(COLOR::to_rgba8(COLOR::rgb(0.0, 0.0, 1.0)), [0, 0, 255, 255]);
    assert_eq!(COLOR::to_rgba8(COLOR::rgba(2.0, -1.0, 0.5, 0.0)), [255, 0, 128, 0]);
  }

  #[test]
  fn tight_stride_is_derived_from_components() {
    assert_eq!(VertexLayout::VEC2_F32.effective_stride(), 8);
  }
}
