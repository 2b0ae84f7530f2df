use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
  HtmlCanvasElement, WebGlBuffer, WebGlProgram, WebGlRenderingContext as GL,
  WebGlShader,
};

use crate::{
  context::GlContext,
  types::{
    BufferUsage, Color, ComponentType, Primitive, ShaderStage, VertexLayout,
  },
};

/// Forwards every [`GlContext`] call to a browser WebGL 1 context.
pub struct WebGlBackend {
  gl: GL,
}

impl WebGlBackend {
  pub fn new(gl: GL) -> Self {
    Self { gl }
  }

  pub fn from_canvas_id(canvas_id: &str) -> Result<Self, JsValue> {
    let document = web_sys::window()
      .and_then(|w| w.document())
      .ok_or("no document")?;
    let canvas: HtmlCanvasElement = document
      .get_element_by_id(canvas_id)
      .ok_or_else(|| JsValue::from_str(&format!("no canvas with id {}", canvas_id)))?
      .dyn_into()?;
    let gl: GL = canvas
      .get_context("webgl")?
      .ok_or("Unable to initialize WebGL. Your browser may not support it.")?
      .dyn_into()?;
    Ok(Self::new(gl))
  }

  pub fn size(&self) -> (usize, usize) {
    (
      self.gl.drawing_buffer_width() as usize,
      self.gl.drawing_buffer_height() as usize,
    )
  }
}

fn stage_enum(stage: ShaderStage) -> u32 {
  match stage {
    ShaderStage::Vertex => GL::VERTEX_SHADER,
    ShaderStage::Fragment => GL::FRAGMENT_SHADER,
  }
}

impl GlContext for WebGlBackend {
  type Shader = WebGlShader;
  type Program = WebGlProgram;
  type Buffer = WebGlBuffer;

  fn create_shader(&mut self, stage: ShaderStage) -> Option<WebGlShader> {
    self.gl.create_shader(stage_enum(stage))
  }

  fn shader_source(&mut self, shader: &WebGlShader, source: &str) {
    self.gl.shader_source(shader, source);
  }

  fn compile_shader(&mut self, shader: &WebGlShader) {
    self.gl.compile_shader(shader);
  }

  fn shader_compile_status(&self, shader: &WebGlShader) -> bool {
    self
      .gl
      .get_shader_parameter(shader, GL::COMPILE_STATUS)
      .as_bool()
      .unwrap_or(false)
  }

  fn shader_info_log(&self, shader: &WebGlShader) -> Option<String> {
    self.gl.get_shader_info_log(shader)
  }

  fn delete_shader(&mut self, shader: WebGlShader) {
    self.gl.delete_shader(Some(&shader));
  }

  fn create_program(&mut self) -> Option<WebGlProgram> {
    self.gl.create_program()
  }

  fn attach_shader(&mut self, program: &WebGlProgram, shader: &WebGlShader) {
    self.gl.attach_shader(program, shader);
  }

  fn link_program(&mut self, program: &WebGlProgram) {
    self.gl.link_program(program);
  }

  fn program_link_status(&self, program: &WebGlProgram) -> bool {
    self
      .gl
      .get_program_parameter(program, GL::LINK_STATUS)
      .as_bool()
      .unwrap_or(false)
  }

  fn program_info_log(&self, program: &WebGlProgram) -> Option<String> {
    self.gl.get_program_info_log(program)
  }

  fn delete_program(&mut self, program: WebGlProgram) {
    self.gl.delete_program(Some(&program));
  }

  fn use_program(&mut self, program: Option<&WebGlProgram>) {
    self.gl.use_program(program);
  }

  fn create_buffer(&mut self) -> Option<WebGlBuffer> {
    self.gl.create_buffer()
  }

  fn bind_array_buffer(&mut self, buffer: Option<&WebGlBuffer>) {
    self.gl.bind_buffer(GL::ARRAY_BUFFER, buffer);
  }

  fn array_buffer_data(&mut self, data: &[f32], usage: BufferUsage) {
    let usage = match usage {
      BufferUsage::StaticDraw => GL::STATIC_DRAW,
    };
    let array = js_sys::Float32Array::from(data);
    self
      .gl
      .buffer_data_with_array_buffer_view(GL::ARRAY_BUFFER, &array, usage);
  }

  fn attrib_location(&self, program: &WebGlProgram, name: &str) -> i32 {
    self.gl.get_attrib_location(program, name)
  }

  fn enable_vertex_attrib_array(&mut self, index: u32) {
    self.gl.enable_vertex_attrib_array(index);
  }

  fn vertex_attrib_pointer(&mut self, index: u32, layout: &VertexLayout) {
    let ty = match layout.component_type {
      ComponentType::Float => GL::FLOAT,
    };
    self.gl.vertex_attrib_pointer_with_i32(
      index,
      layout.components,
      ty,
      layout.normalized,
      layout.stride,
      layout.offset,
    );
  }

  fn clear_color(&mut self, color: Color) {
    self.gl.clear_color(color.x, color.y, color.z, color.w);
  }

  fn clear_color_buffer(&mut self) {
    self.gl.clear(GL::COLOR_BUFFER_BIT);
  }

  fn draw_arrays(&mut self, mode: Primitive, first: i32, count: i32) {
    let mode = match mode {
      Primitive::Triangles => GL::TRIANGLES,
    };
    self.gl.draw_arrays(mode, first, count);
  }
}
