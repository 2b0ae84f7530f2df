use crate::{
  context::GlContext,
  error::{PipelineError, Result},
  shader::ShaderProgram,
  types::{BufferUsage, VertexLayout},
};

pub const POSITION_ATTRIBUTE: &str = "position";

/// Three 2D vertices in normalized device coordinates: top, bottom left,
/// bottom right.
pub const TRIANGLE_VERTICES: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];

/// A buffer wired to an enabled attribute of the current program.
pub struct AttributeBinding<C: GlContext> {
  pub buffer: C::Buffer,
  pub location: u32,
  pub layout: VertexLayout,
  /// Whole vertices held by `buffer`.
  pub vertex_count: usize,
}

/// Uploads 2D positions and feeds them to the program's `position` attribute.
pub fn upload<C: GlContext>(
  ctx: &mut C,
  program: &ShaderProgram<C>,
  vertices: &[f32],
) -> Result<AttributeBinding<C>> {
  upload_attribute(
    ctx,
    program,
    POSITION_ATTRIBUTE,
    VertexLayout::VEC2_F32,
    vertices,
  )
}

pub fn upload_attribute<C: GlContext>(
  ctx: &mut C,
  program: &ShaderProgram<C>,
  attribute: &str,
  layout: VertexLayout,
  data: &[f32],
) -> Result<AttributeBinding<C>> {
  let components = layout.components as usize;
  if components == 0 || data.len() % components != 0 {
    return Err(PipelineError::Geometry(format!(
      "{} floats do not divide into {}-component vertices",
      data.len(),
      components
    )));
  }

  let buffer = ctx
    .create_buffer()
    .ok_or(PipelineError::ObjectCreation("buffer"))?;
  ctx.bind_array_buffer(Some(&buffer));
  ctx.array_buffer_data(data, BufferUsage::StaticDraw);

  let location = ctx.attrib_location(program.handle(), attribute);
  if location < 0 {
    return Err(PipelineError::Bind {
      attribute: attribute.to_string(),
    });
  }
  let location = location as u32;
  ctx.enable_vertex_attrib_array(location);
  ctx.vertex_attrib_pointer(location, &layout);

  tracing::debug!(attribute, location, floats = data.len(), "vertex data bound");
  Ok(AttributeBinding {
    buffer,
    location,
    layout,
    vertex_count: data.len() / components,
  })
}
