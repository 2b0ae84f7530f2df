//! An in-process implementation of [`GlContext`]: shaders go through the
//! [`glsl`](crate::glsl) compiler, draws through the scanline [`Rasterizer`].
//!
//! Object handles are plain ids. Calls that WebGL would answer with
//! `INVALID_OPERATION`/`INVALID_VALUE` leave the state untouched and record
//! the error, readable once through [`SoftContext::take_error`].

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::{
  context::GlContext,
  glsl::{self, Module},
  raster::{Image, Rasterizer, ScreenPt},
  types::{
    BufferUsage, Color, Primitive, ShaderStage, Vec4, VertexLayout, COLOR,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u32);

/// Kinds of object the context hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
  Shader,
  Program,
  Buffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlError {
  InvalidValue,
  InvalidOperation,
}

/// Call counters, for asserting which parts of a sequence actually ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
  pub shaders_created: usize,
  pub programs_created: usize,
  pub link_calls: usize,
  pub buffers_created: usize,
  pub clears: usize,
  pub draw_calls: usize,
}

struct ShaderObject {
  stage: ShaderStage,
  source: String,
  compiled: Option<Result<Module, String>>,
  // deleted while attached: freed once no program holds it
  delete_pending: bool,
}

struct Linked {
  vertex: Module,
  fragment: Module,
  // (location, index into vertex.attributes)
  locations: Vec<(u32, usize)>,
}

struct ProgramObject {
  attached: SmallVec<[ShaderId; 2]>,
  linked: Option<Result<Linked, String>>,
}

#[derive(Clone, Copy)]
struct AttribPointer {
  buffer: BufferId,
  layout: VertexLayout,
}

#[derive(Clone, Copy, Default)]
struct AttribState {
  enabled: bool,
  pointer: Option<AttribPointer>,
}

pub const MAX_VERTEX_ATTRIBS: u32 = 16;

pub struct SoftContext {
  surface: Image,
  next_id: u32,
  shaders: HashMap<ShaderId, ShaderObject>,
  programs: HashMap<ProgramId, ProgramObject>,
  buffers: HashMap<BufferId, Vec<f32>>,
  array_buffer: Option<BufferId>,
  current_program: Option<ProgramId>,
  attribs: [AttribState; MAX_VERTEX_ATTRIBS as usize],
  clear_color: Color,
  error: Option<GlError>,
  stats: Stats,
  refused: SmallVec<[ObjectKind; 3]>,
}

impl SoftContext {
  /// A fresh canvas: transparent black, like an untouched `<canvas>`.
  pub fn new(width: usize, height: usize) -> Self {
    Self {
      surface: Image::new((width, height), COLOR::TRANSPARENT),
      next_id: 1,
      shaders: HashMap::new(),
      programs: HashMap::new(),
      buffers: HashMap::new(),
      array_buffer: None,
      current_program: None,
      attribs: [AttribState::default(); MAX_VERTEX_ATTRIBS as usize],
      clear_color: COLOR::TRANSPARENT,
      error: None,
      stats: Stats::default(),
      refused: SmallVec::new(),
    }
  }

  pub fn surface(&self) -> &Image {
    &self.surface
  }

  pub fn surface_mut(&mut self) -> &mut Image {
    &mut self.surface
  }

  pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
    self.surface.pixel((x, y)).copied()
  }

  pub fn stats(&self) -> Stats {
    self.stats
  }

  /// Makes every later `create_*` call for `kind` return no object, the way
  /// a lost context does.
  pub fn refuse_creation(&mut self, kind: ObjectKind) {
    if !self.refused.contains(&kind) {
      self.refused.push(kind);
    }
  }

  fn refuses(&self, kind: ObjectKind) -> bool {
    self.refused.contains(&kind)
  }

  fn release_if_unreferenced(&mut self, shader: ShaderId) {
    let attached = self
      .programs
      .values()
      .any(|p| p.attached.contains(&shader));
    let pending = self.shaders.get(&shader).map_or(false, |s| s.delete_pending);
    if pending && !attached {
      self.shaders.remove(&shader);
    }
  }

  // How many vertices every enabled array can supply. `None` when no
  // attribute reads from an array.
  fn vertices_available(&self, linked: &Linked) -> Option<usize> {
    let float = std::mem::size_of::<f32>();
    linked
      .locations
      .iter()
      .filter_map(|&(location, _)| {
        let state = &self.attribs[location as usize];
        match (state.enabled, state.pointer) {
          (true, Some(pointer)) => Some(pointer),
          _ => None,
        }
      })
      .map(|pointer| {
        let bytes = self.buffers.get(&pointer.buffer).map_or(0, |b| b.len() * float);
        let layout = pointer.layout;
        let element = layout.components as usize * float;
        let needed = layout.offset as usize + element;
        if bytes < needed {
          0
        } else {
          (bytes - needed) / layout.effective_stride() + 1
        }
      })
      .min()
  }

  pub fn live_shaders(&self) -> usize {
    self.shaders.len()
  }

  pub fn live_programs(&self) -> usize {
    self.programs.len()
  }

  /// Like `glGetError`: returns the first recorded error and resets it.
  pub fn take_error(&mut self) -> Option<GlError> {
    self.error.take()
  }

  fn record(&mut self, error: GlError) {
    tracing::warn!(?error, "software context rejected a call");
    self.error.get_or_insert(error);
  }

  fn alloc_id(&mut self) -> u32 {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  fn link(&self, program: &ProgramObject) -> Result<Linked, String> {
    let mut vertex = None;
    let mut fragment = None;
    for id in &program.attached {
      let shader = &self.shaders[id];
      let module = match &shader.compiled {
        Some(Ok(module)) => module,
        _ => return Err(format!("{} shader is not compiled", shader.stage)),
      };
      let slot = match shader.stage {
        ShaderStage::Vertex => &mut vertex,
        ShaderStage::Fragment => &mut fragment,
      };
      if slot.is_some() {
        return Err(format!("more than one {} shader attached", shader.stage));
      }
      *slot = Some(module.clone());
    }

    let vertex = vertex.ok_or("missing vertex shader")?;
    let fragment = fragment.ok_or("missing fragment shader")?;
    for module in [&vertex, &fragment] {
      if module.output.is_none() {
        return Err(format!(
          "{} shader does not write {}",
          module.stage,
          module.output_name()
        ));
      }
    }

    let active = vertex.attributes.iter().enumerate().filter(|(_, a)| a.used);
    let mut locations = vec![];
    for (location, (i, _)) in active.enumerate() {
      if location as u32 >= MAX_VERTEX_ATTRIBS {
        return Err("too many vertex attributes".to_string());
      }
      locations.push((location as u32, i));
    }

    Ok(Linked {
      vertex,
      fragment,
      locations,
    })
  }

  // Reads attribute inputs for one vertex. `None` when an enabled array
  // points past the end of its buffer.
  fn fetch_vertex(&self, linked: &Linked, vertex: usize) -> Option<Vec<Vec4>> {
    let mut inputs = vec![Vec4::W; linked.vertex.attributes.len()];
    for &(location, index) in &linked.locations {
      let state = &self.attribs[location as usize];
      let pointer = match (state.enabled, state.pointer) {
        (true, Some(pointer)) => pointer,
        // disabled arrays read the generic default
        _ => continue,
      };
      let data = self.buffers.get(&pointer.buffer)?;
      let layout = pointer.layout;
      let float = std::mem::size_of::<f32>();
      let start = (layout.offset as usize + vertex * layout.effective_stride()) / float;
      let values = data.get(start..start + layout.components as usize)?;

      let mut input = Vec4::W.to_array();
      input[..values.len()].copy_from_slice(values);
      inputs[index] = Vec4::from_array(input);
    }
    Some(inputs)
  }
}

impl GlContext for SoftContext {
  type Shader = ShaderId;
  type Program = ProgramId;
  type Buffer = BufferId;

  fn create_shader(&mut self, stage: ShaderStage) -> Option<ShaderId> {
    if self.refuses(ObjectKind::Shader) {
      return None;
    }
    let id = ShaderId(self.alloc_id());
    self.shaders.insert(
      id,
      ShaderObject {
        stage,
        source: String::new(),
        compiled: None,
        delete_pending: false,
      },
    );
    self.stats.shaders_created += 1;
    Some(id)
  }

  fn shader_source(&mut self, shader: &ShaderId, source: &str) {
    match self.shaders.get_mut(shader) {
      Some(obj) => obj.source = source.to_string(),
      None => self.record(GlError::InvalidValue),
    }
  }

  fn compile_shader(&mut self, shader: &ShaderId) {
    match self.shaders.get_mut(shader) {
      Some(obj) => obj.compiled = Some(glsl::compile(obj.stage, &obj.source)),
      None => self.record(GlError::InvalidValue),
    }
  }

  fn shader_compile_status(&self, shader: &ShaderId) -> bool {
    matches!(
      self.shaders.get(shader).and_then(|s| s.compiled.as_ref()),
      Some(Ok(_))
    )
  }

  fn shader_info_log(&self, shader: &ShaderId) -> Option<String> {
    let obj = self.shaders.get(shader)?;
    match &obj.compiled {
      Some(Err(log)) => Some(log.clone()),
      _ => Some(String::new()),
    }
  }

  fn delete_shader(&mut self, shader: ShaderId) {
    if let Some(obj) = self.shaders.get_mut(&shader) {
      obj.delete_pending = true;
      self.release_if_unreferenced(shader);
    }
  }

  fn create_program(&mut self) -> Option<ProgramId> {
    if self.refuses(ObjectKind::Program) {
      return None;
    }
    let id = ProgramId(self.alloc_id());
    self.programs.insert(
      id,
      ProgramObject {
        attached: SmallVec::new(),
        linked: None,
      },
    );
    self.stats.programs_created += 1;
    Some(id)
  }

  fn attach_shader(&mut self, program: &ProgramId, shader: &ShaderId) {
    if !self.shaders.contains_key(shader) {
      return self.record(GlError::InvalidValue);
    }
    let already = match self.programs.get(program) {
      Some(p) => p.attached.contains(shader),
      None => return self.record(GlError::InvalidValue),
    };
    if already {
      return self.record(GlError::InvalidOperation);
    }
    if let Some(p) = self.programs.get_mut(program) {
      p.attached.push(*shader);
    }
  }

  fn link_program(&mut self, program: &ProgramId) {
    self.stats.link_calls += 1;
    let result = match self.programs.get(program) {
      Some(p) => self.link(p),
      None => return self.record(GlError::InvalidValue),
    };
    if let Some(p) = self.programs.get_mut(program) {
      p.linked = Some(result);
    }
  }

  fn program_link_status(&self, program: &ProgramId) -> bool {
    matches!(
      self.programs.get(program).and_then(|p| p.linked.as_ref()),
      Some(Ok(_))
    )
  }

  fn program_info_log(&self, program: &ProgramId) -> Option<String> {
    let obj = self.programs.get(program)?;
    match &obj.linked {
      Some(Err(log)) => Some(log.clone()),
      _ => Some(String::new()),
    }
  }

  fn delete_program(&mut self, program: ProgramId) {
    if self.current_program == Some(program) {
      self.current_program = None;
    }
    // detaches; only shaders already flagged for deletion go away
    if let Some(obj) = self.programs.remove(&program) {
      for shader in obj.attached {
        self.release_if_unreferenced(shader);
      }
    }
  }

  fn use_program(&mut self, program: Option<&ProgramId>) {
    match program {
      None => self.current_program = None,
      Some(id) if self.program_link_status(id) => self.current_program = Some(*id),
      Some(_) => self.record(GlError::InvalidOperation),
    }
  }

  fn create_buffer(&mut self) -> Option<BufferId> {
    if self.refuses(ObjectKind::Buffer) {
      return None;
    }
    let id = BufferId(self.alloc_id());
    self.buffers.insert(id, vec![]);
    self.stats.buffers_created += 1;
    Some(id)
  }

  fn bind_array_buffer(&mut self, buffer: Option<&BufferId>) {
    match buffer {
      Some(id) if !self.buffers.contains_key(id) => {
        self.record(GlError::InvalidOperation)
      }
      _ => self.array_buffer = buffer.copied(),
    }
  }

  fn array_buffer_data(&mut self, data: &[f32], _usage: BufferUsage) {
    match self.array_buffer.and_then(|id| self.buffers.get_mut(&id)) {
      Some(buffer) => *buffer = data.to_vec(),
      None => self.record(GlError::InvalidOperation),
    }
  }

  fn attrib_location(&self, program: &ProgramId, name: &str) -> i32 {
    let linked = match self.programs.get(program).and_then(|p| p.linked.as_ref()) {
      Some(Ok(linked)) => linked,
      _ => return -1,
    };
    linked
      .locations
      .iter()
      .find(|(_, i)| linked.vertex.attributes[*i].name == name)
      .map(|(location, _)| *location as i32)
      .unwrap_or(-1)
  }

  fn enable_vertex_attrib_array(&mut self, index: u32) {
    match self.attribs.get_mut(index as usize) {
      Some(state) => state.enabled = true,
      None => self.record(GlError::InvalidValue),
    }
  }

  fn vertex_attrib_pointer(&mut self, index: u32, layout: &VertexLayout) {
    if !(1..=4).contains(&layout.components) || layout.stride < 0 || layout.offset < 0 {
      return self.record(GlError::InvalidValue);
    }
    let buffer = match self.array_buffer {
      Some(buffer) => buffer,
      None => return self.record(GlError::InvalidOperation),
    };
    match self.attribs.get_mut(index as usize) {
      Some(state) => {
        state.pointer = Some(AttribPointer {
          buffer,
          layout: *layout,
        })
      }
      None => self.record(GlError::InvalidValue),
    }
  }

  fn clear_color(&mut self, color: Color) {
    self.clear_color = color.clamp(Vec4::ZERO, Vec4::ONE);
  }

  fn clear_color_buffer(&mut self) {
    self.stats.clears += 1;
    self.surface.fill(self.clear_color);
  }

  fn draw_arrays(&mut self, mode: Primitive, first: i32, count: i32) {
    self.stats.draw_calls += 1;
    if first < 0 || count < 0 {
      return self.record(GlError::InvalidValue);
    }
    let program = self
      .current_program
      .and_then(|id| self.programs.get(&id))
      .and_then(|p| p.linked.as_ref());
    let linked = match program {
      Some(Ok(linked)) => linked,
      _ => return self.record(GlError::InvalidOperation),
    };

    let end = match first.checked_add(count) {
      Some(end) => end as usize,
      None => return self.record(GlError::InvalidValue),
    };
    let available = self.vertices_available(linked);
    match available {
      Some(n) if end > n => return self.record(GlError::InvalidOperation),
      // every vertex reads the same generic values: all triangles degenerate
      None => return,
      Some(_) => {}
    }

    let mut clip = Vec::with_capacity(count as usize);
    for vertex in first as usize..end {
      let inputs = match self.fetch_vertex(linked, vertex) {
        Some(inputs) => inputs,
        None => return self.record(GlError::InvalidOperation),
      };
      clip.extend(linked.vertex.eval_output(&inputs));
    }
    // no varyings: the fragment stage is constant across a draw
    let color = linked.fragment.eval_output(&[]).unwrap_or(COLOR::BLACK);

    let size = self.surface.size();
    let mut raster = Rasterizer::new(&mut self.surface);
    match mode {
      Primitive::Triangles => {
        for tri in clip.chunks_exact(3) {
          let a = ScreenPt::from_clip(tri[0], size);
          let b = ScreenPt::from_clip(tri[1], size);
          let c = ScreenPt::from_clip(tri[2], size);
          // TODO: clip against the near plane instead of dropping the triangle
          if let (Some(a), Some(b), Some(c)) = (a, b, c) {
            raster.fill_triangle([a, b, c], color.clamp(Vec4::ZERO, Vec4::ONE));
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  const VERTEX: &str = "attribute vec2 position;\nvoid main() { gl_Position = vec4(position, 0.0, 1.0); }";
  const FRAGMENT: &str = "void main() { gl_FragColor = vec4(1.0, 0.0, 0.0, 1.0); }";

  fn compiled(ctx: &mut SoftContext, stage: ShaderStage, src: &str) -> ShaderId {
    let shader = ctx.create_shader(stage).unwrap();
    ctx.shader_source(&shader, src);
    ctx.compile_shader(&shader);
    shader
  }

  fn linked(ctx: &mut SoftContext) -> ProgramId {
    let vs = compiled(ctx, ShaderStage::Vertex, VERTEX);
    let fs = compiled(ctx, ShaderStage::Fragment, FRAGMENT);
    let program = ctx.create_program().unwrap();
    ctx.attach_shader(&program, &vs);
    ctx.attach_shader(&program, &fs);
    ctx.link_program(&program);
    program
  }

  #[test]
  fn test_compile_status_and_log() {
    let mut ctx = SoftContext::new(4, 4);
    let good = compiled(&mut ctx, ShaderStage::Vertex, VERTEX);
    assert!(ctx.shader_compile_status(&good));
    assert_eq!(ctx.shader_info_log(&good).as_deref(), Some(""));

    let bad = compiled(&mut ctx, ShaderStage::Vertex, "void main() {");
    assert!(!ctx.shader_compile_status(&bad));
    assert!(!ctx.shader_info_log(&bad).unwrap().is_empty());
  }

  #[test]
  fn test_link_assigns_locations_to_used_attributes() {
    let mut ctx = SoftContext::new(4, 4);
    let program = linked(&mut ctx);
    assert!(ctx.program_link_status(&program));
    assert_eq!(ctx.attrib_location(&program, "position"), 0);
    assert_eq!(ctx.attrib_location(&program, "color"), -1);
  }

  #[test]
  fn test_link_requires_both_stages() {
    let mut ctx = SoftContext::new(4, 4);
    let vs = compiled(&mut ctx, ShaderStage::Vertex, VERTEX);
    let program = ctx.create_program().unwrap();
    ctx.attach_shader(&program, &vs);
    ctx.link_program(&program);
    assert!(!ctx.program_link_status(&program));
    assert_eq!(
      ctx.program_info_log(&program).as_deref(),
      Some("missing fragment shader")
    );
  }

  #[test]
  fn test_deleting_program_only_detaches_shaders() {
    let mut ctx = SoftContext::new(4, 4);
    let program = linked(&mut ctx);
    assert_eq!(ctx.live_shaders(), 2);
    ctx.delete_program(program);
    assert_eq!(ctx.live_programs(), 0);
    assert_eq!(ctx.live_shaders(), 2);
  }

  #[test]
  fn test_attached_shader_is_freed_with_its_program() {
    let mut ctx = SoftContext::new(4, 4);
    let vs = compiled(&mut ctx, ShaderStage::Vertex, VERTEX);
    let fs = compiled(&mut ctx, ShaderStage::Fragment, FRAGMENT);
    let program = ctx.create_program().unwrap();
    ctx.attach_shader(&program, &vs);
    ctx.attach_shader(&program, &fs);

    ctx.delete_shader(vs);
    assert_eq!(ctx.live_shaders(), 2);
    ctx.delete_program(program);
    assert_eq!(ctx.live_shaders(), 1);
    ctx.delete_shader(fs);
    assert_eq!(ctx.live_shaders(), 0);
  }

  #[test]
  fn test_refused_creation_returns_none() {
    let mut ctx = SoftContext::new(4, 4);
    ctx.refuse_creation(ObjectKind::Program);
    assert!(ctx.create_program().is_none());
    assert!(ctx.create_shader(ShaderStage::Vertex).is_some());
    assert_eq!(ctx.stats().programs_created, 0);
  }

  #[test]
  fn test_huge_draw_count_is_rejected_without_allocating() {
    let mut ctx = SoftContext::new(4, 4);
    let program = linked(&mut ctx);
    ctx.use_program(Some(&program));
    let buffer = ctx.create_buffer().unwrap();
    ctx.bind_array_buffer(Some(&buffer));
    ctx.array_buffer_data(&[-1.0, -1.0, 1.0, -1.0, 0.0, 1.0], BufferUsage::StaticDraw);
    ctx.enable_vertex_attrib_array(0);
    ctx.vertex_attrib_pointer(0, &VertexLayout::VEC2_F32);

    ctx.draw_arrays(Primitive::Triangles, 0, i32::MAX);
    assert_eq!(ctx.take_error(), Some(GlError::InvalidOperation));
    ctx.draw_arrays(Primitive::Triangles, 1, i32::MAX);
    assert_eq!(ctx.take_error(), Some(GlError::InvalidValue));
    assert!(ctx.surface().pixels().all(|p| *p == COLOR::TRANSPARENT));
  }

  #[test]
  fn test_draw_without_enabled_arrays_draws_nothing() {
    let mut ctx = SoftContext::new(4, 4);
    let program = linked(&mut ctx);
    ctx.use_program(Some(&program));
    ctx.draw_arrays(Primitive::Triangles, 0, i32::MAX);
    assert_eq!(ctx.take_error(), None);
    assert!(ctx.surface().pixels().all(|p| *p == COLOR::TRANSPARENT));
  }

  #[test]
  fn test_draw_without_program_is_rejected() {
    let mut ctx = SoftContext::new(4, 4);
    ctx.draw_arrays(Primitive::Triangles, 0, 3);
    assert_eq!(ctx.take_error(), Some(GlError::InvalidOperation));
    assert_eq!(ctx.take_error(), None);
  }

  #[test]
  fn test_draw_past_end_of_buffer_is_rejected() {
    let mut ctx = SoftContext::new(4, 4);
    let program = linked(&mut ctx);
    ctx.use_program(Some(&program));
    let buffer = ctx.create_buffer().unwrap();
    ctx.bind_array_buffer(Some(&buffer));
    ctx.array_buffer_data(&[-1.0, -1.0, 1.0, -1.0], BufferUsage::StaticDraw);
    ctx.enable_vertex_attrib_array(0);
    ctx.vertex_attrib_pointer(0, &VertexLayout::VEC2_F32);

    ctx.draw_arrays(Primitive::Triangles, 0, 3);
    assert_eq!(ctx.take_error(), Some(GlError::InvalidOperation));
    assert!(ctx.surface().pixels().all(|p| *p == COLOR::TRANSPARENT));
  }

  #[test]
  fn test_full_screen_triangle_covers_surface() {
    let mut ctx = SoftContext::new(8, 8);
    let program = linked(&mut ctx);
    ctx.use_program(Some(&program));
    let buffer = ctx.create_buffer().unwrap();
    ctx.bind_array_buffer(Some(&buffer));
    ctx.array_buffer_data(&[-1.0, -1.0, 3.0, -1.0, -1.0, 3.0], BufferUsage::StaticDraw);
    ctx.enable_vertex_attrib_array(0);
    ctx.vertex_attrib_pointer(0, &VertexLayout::VEC2_F32);
    ctx.draw_arrays(Primitive::Triangles, 0, 3);

    assert_eq!(ctx.take_error(), None);
    let red = COLOR::rgb(1.0, 0.0, 0.0);
    assert!(ctx.surface().pixels().all(|p| *p == red));
  }
}
