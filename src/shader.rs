use crate::{
  context::GlContext,
  error::{PipelineError, Result},
  types::ShaderStage,
};

pub const VERTEX_SHADER_SOURCE: &str = "
  attribute vec2 position;
  void main() {
    gl_Position = vec4(position, 0.0, 1.0);
  }
";

pub const FRAGMENT_SHADER_SOURCE: &str = "
  void main() {
    gl_FragColor = vec4(0.0, 0.0, 1.0, 1.0); // Blue color
  }
";

/// A shader object that compiled successfully.
pub struct CompiledShader<C: GlContext> {
  handle: C::Shader,
  stage: ShaderStage,
}

impl<C: GlContext> CompiledShader<C> {
  pub fn stage(&self) -> ShaderStage {
    self.stage
  }

  pub fn handle(&self) -> &C::Shader {
    &self.handle
  }

  pub fn delete(self, ctx: &mut C) {
    ctx.delete_shader(self.handle);
  }
}

/// A linked program. It owns the shaders attached to it.
pub struct ShaderProgram<C: GlContext> {
  handle: C::Program,
  shaders: [C::Shader; 2],
}

impl<C: GlContext> ShaderProgram<C> {
  pub fn handle(&self) -> &C::Program {
    &self.handle
  }

  pub fn shaders(&self) -> &[C::Shader; 2] {
    &self.shaders
  }
}

pub fn compile_stage<C: GlContext>(
  ctx: &mut C,
  stage: ShaderStage,
  source: &str,
) -> Result<CompiledShader<C>> {
  let shader = ctx
    .create_shader(stage)
    .ok_or(PipelineError::ObjectCreation("shader"))?;
  ctx.shader_source(&shader, source);
  ctx.compile_shader(&shader);

  if !ctx.shader_compile_status(&shader) {
    let log = non_empty(ctx.shader_info_log(&shader), "compilation failed");
    ctx.delete_shader(shader);
    return Err(PipelineError::Compile { stage, log });
  }

  tracing::debug!(%stage, "shader compiled");
  Ok(CompiledShader {
    handle: shader,
    stage,
  })
}

/// Links the two stages and makes the program current. On failure the
/// program and both shaders are released.
pub fn link_program<C: GlContext>(
  ctx: &mut C,
  vertex: CompiledShader<C>,
  fragment: CompiledShader<C>,
) -> Result<ShaderProgram<C>> {
  let program = match ctx.create_program() {
    Some(program) => program,
    None => {
      vertex.delete(ctx);
      fragment.delete(ctx);
      return Err(PipelineError::ObjectCreation("program"));
    }
  };
  ctx.attach_shader(&program, &vertex.handle);
  ctx.attach_shader(&program, &fragment.handle);
  ctx.link_program(&program);

  if !ctx.program_link_status(&program) {
    let log = non_empty(ctx.program_info_log(&program), "linking failed");
    ctx.delete_program(program);
    ctx.delete_shader(vertex.handle);
    ctx.delete_shader(fragment.handle);
    return Err(PipelineError::Link { log });
  }

  ctx.use_program(Some(&program));
  tracing::debug!("shader program linked");
  Ok(ShaderProgram {
    handle: program,
    shaders: [vertex.handle, fragment.handle],
  })
}

fn non_empty(log: Option<String>, fallback: &str) -> String {
  match log {
    Some(log) if !log.trim().is_empty() => log,
    _ => fallback.to_string(),
  }
}

/// Compiles a vertex and a fragment source and links them, stopping at the
/// first failure.
pub struct ShaderProgramBuilder<'a> {
  vertex: &'a str,
  fragment: &'a str,
}

impl<'a> Default for ShaderProgramBuilder<'a> {
  fn default() -> Self {
    Self::new(VERTEX_SHADER_SOURCE, FRAGMENT_SHADER_SOURCE)
  }
}

impl<'a> ShaderProgramBuilder<'a> {
  pub fn new(vertex: &'a str, fragment: &'a str) -> Self {
    Self { vertex, fragment }
  }

  /// Compiles both stages. A fragment failure releases the vertex shader.
  pub fn compile<C: GlContext>(
    &self,
    ctx: &mut C,
  ) -> Result<(CompiledShader<C>, CompiledShader<C>)> {
    let vertex = compile_stage(ctx, ShaderStage::Vertex, self.vertex)?;
    match compile_stage(ctx, ShaderStage::Fragment, self.fragment) {
      Ok(fragment) => Ok((vertex, fragment)),
      Err(err) => {
        vertex.delete(ctx);
        Err(err)
      }
    }
  }

  pub fn build<C: GlContext>(&self, ctx: &mut C) -> Result<ShaderProgram<C>> {
    let (vertex, fragment) = self.compile(ctx)?;
    link_program(ctx, vertex, fragment)
  }
}
