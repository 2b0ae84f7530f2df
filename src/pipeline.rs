use crate::{
  config::SceneConfig,
  context::GlContext,
  error::{PipelineError, Result},
  frame::render_frame_with,
  geometry::upload,
  shader::{link_program, ShaderProgramBuilder},
};

/// Where a [`Pipeline`] is in its one-shot progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
  Uninitialized,
  ShadersCompiling,
  ShadersCompiled,
  ProgramLinking,
  ProgramLinked,
  GeometryUploaded,
  Rendered,
  Failed,
}

impl PipelineState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, PipelineState::Rendered | PipelineState::Failed)
  }
}

/// Build program, upload geometry, render frame. Runs once; a finished
/// pipeline has to be [`reset`](Pipeline::reset) before it runs again.
#[derive(Debug)]
pub struct Pipeline {
  state: PipelineState,
}

impl Default for Pipeline {
  fn default() -> Self {
    Self::new()
  }
}

impl Pipeline {
  pub fn new() -> Self {
    Self {
      state: PipelineState::Uninitialized,
    }
  }

  pub fn state(&self) -> PipelineState {
    self.state
  }

  pub fn reset(&mut self) {
    self.state = PipelineState::Uninitialized;
  }

  pub fn run<C: GlContext>(&mut self, ctx: &mut C, scene: &SceneConfig) -> Result<()> {
    if self.state != PipelineState::Uninitialized {
      return Err(PipelineError::InvalidState(self.state));
    }
    self.stages(ctx, scene).map_err(|err| {
      tracing::error!(state = ?self.state, "{}", err);
      self.state = PipelineState::Failed;
      err
    })
  }

  fn stages<C: GlContext>(&mut self, ctx: &mut C, scene: &SceneConfig) -> Result<()> {
    self.advance(PipelineState::ShadersCompiling);
    let (vertex, fragment) =
      ShaderProgramBuilder::new(&scene.vertex_shader, &scene.fragment_shader)
        .compile(ctx)?;
    self.advance(PipelineState::ShadersCompiled);

    self.advance(PipelineState::ProgramLinking);
    let program = link_program(ctx, vertex, fragment)?;
    self.advance(PipelineState::ProgramLinked);

    let binding = upload(ctx, &program, &scene.vertices)?;
    if scene.vertex_count < 0 || scene.vertex_count as usize > binding.vertex_count {
      return Err(PipelineError::Geometry(format!(
        "cannot draw {} vertices from a buffer of {}",
        scene.vertex_count, binding.vertex_count
      )));
    }
    self.advance(PipelineState::GeometryUploaded);

    render_frame_with(ctx, scene.clear_color, scene.vertex_count);
    self.advance(PipelineState::Rendered);
    Ok(())
  }

  fn advance(&mut self, state: PipelineState) {
    tracing::debug!(from = ?self.state, to = ?state, "pipeline");
    self.state = state;
  }
}

/// Runs a fresh pipeline over `scene` once.
pub fn draw_scene<C: GlContext>(ctx: &mut C, scene: &SceneConfig) -> Result<()> {
  Pipeline::new().run(ctx, scene)
}
