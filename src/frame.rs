use crate::{
  context::GlContext,
  types::{Color, Primitive, COLOR},
};

pub const TRIANGLE_VERTEX_COUNT: i32 = 3;

/// Clears to opaque black and draws `vertex_count` vertices as triangles.
pub fn render_frame<C: GlContext>(ctx: &mut C, vertex_count: i32) {
  render_frame_with(ctx, COLOR::BLACK, vertex_count)
}

pub fn render_frame_with<C: GlContext>(ctx: &mut C, clear: Color, vertex_count: i32) {
  ctx.clear_color(clear);
  ctx.clear_color_buffer();
  ctx.draw_arrays(Primitive::Triangles, 0, vertex_count);
  tracing::info!(vertex_count, "frame rendered");
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::soft::SoftContext;

  #[test]
  fn test_clear_only_frame_without_program() {
    let mut ctx = SoftContext::new(2, 2);
    render_frame_with(&mut ctx, COLOR::rgb(0.0, 1.0, 0.0), 0);

    assert_eq!(ctx.stats().clears, 1);
    assert_eq!(ctx.stats().draw_calls, 1);
    assert!(ctx
      .surface()
      .pixels()
      .all(|p| *p == COLOR::rgb(0.0, 1.0, 0.0)));
  }

  #[test]
  fn test_default_clear_is_opaque_black() {
    let mut ctx = SoftContext::new(2, 2);
    render_frame(&mut ctx, 0);
    assert_eq!(ctx.pixel(1, 1), Some(COLOR::BLACK));
  }
}
