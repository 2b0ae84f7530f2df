use crate::types::{BufferUsage, Color, Primitive, ShaderStage, VertexLayout};

/// The capability set of a WebGL-style rendering context.
///
/// The methods mirror the WebGL 1 calls the pipeline issues, one for one, so
/// a backend over a real browser context stays a thin forwarding layer. State
/// such as the bound array buffer and the current program lives inside the
/// context; every method takes `&mut self` when it may change that state.
///
/// Object creation returns `None` when the context cannot hand out a new
/// object (for example after the context was lost).
pub trait GlContext {
  type Shader;
  type Program;
  type Buffer;

  fn create_shader(&mut self, stage: ShaderStage) -> Option<Self::Shader>;
  fn shader_source(&mut self, shader: &Self::Shader, source: &str);
  fn compile_shader(&mut self, shader: &Self::Shader);
  fn shader_compile_status(&self, shader: &Self::Shader) -> bool;
  fn shader_info_log(&self, shader: &Self::Shader) -> Option<String>;
  fn delete_shader(&mut self, shader: Self::Shader);

  fn create_program(&mut self) -> Option<Self::Program>;
  fn attach_shader(&mut self, program: &Self::Program, shader: &Self::Shader);
  fn link_program(&mut self, program: &Self::Program);
  fn program_link_status(&self, program: &Self::Program) -> bool;
  fn program_info_log(&self, program: &Self::Program) -> Option<String>;
  fn delete_program(&mut self, program: Self::Program);
  fn use_program(&mut self, program: Option<&Self::Program>);

  fn create_buffer(&mut self) -> Option<Self::Buffer>;
  fn bind_array_buffer(&mut self, buffer: Option<&Self::Buffer>);
  /// Uploads into the currently bound array buffer.
  fn array_buffer_data(&mut self, data: &[f32], usage: BufferUsage);

  /// `-1` when `name` is not an active attribute of `program`.
  fn attrib_location(&self, program: &Self::Program, name: &str) -> i32;
  fn enable_vertex_attrib_array(&mut self, index: u32);
  /// Sources attribute `index` from the currently bound array buffer.
  fn vertex_attrib_pointer(&mut self, index: u32, layout: &VertexLayout);

  fn clear_color(&mut self, color: Color);
  fn clear_color_buffer(&mut self);
  fn draw_arrays(&mut self, mode: Primitive, first: i32, count: i32);
}
