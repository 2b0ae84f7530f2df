//! A compiler for the small slice of GLSL ES 1.00 that a "hello triangle"
//! needs: attribute declarations, a `precision` statement and a `main` that
//! assigns `gl_Position` or `gl_FragColor` from constructor expressions.
//!
//! Diagnostics follow the `ERROR: 0:<line>: '<token>' : <message>` shape
//! browsers report, so logs from this compiler read like driver logs.

use std::fmt;

use smallvec::SmallVec;

use crate::types::{ShaderStage, Vec4};

pub type Value = SmallVec<[f32; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslType {
  Float,
  Vec2,
  Vec3,
  Vec4,
}

impl GlslType {
  fn from_name(name: &str) -> Option<Self> {
    match name {
      "float" => Some(GlslType::Float),
      "vec2" => Some(GlslType::Vec2),
      "vec3" => Some(GlslType::Vec3),
      "vec4" => Some(GlslType::Vec4),
      _ => None,
    }
  }

  pub fn components(&self) -> usize {
    match self {
      GlslType::Float => 1,
      GlslType::Vec2 => 2,
      GlslType::Vec3 => 3,
      GlslType::Vec4 => 4,
    }
  }

  fn name(&self) -> &'static str {
    match self {
      GlslType::Float => "float",
      GlslType::Vec2 => "vec2",
      GlslType::Vec3 => "vec3",
      GlslType::Vec4 => "vec4",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Literal(f32),
  // index into `Module::attributes`
  Attribute(usize),
  Neg(Box<Expr>),
  Construct(GlslType, Vec<Expr>),
}

impl Expr {
  pub fn eval(&self, attributes: &[Attribute], inputs: &[Vec4]) -> Value {
    match self {
      Expr::Literal(v) => SmallVec::from_slice(&[*v]),
      Expr::Attribute(i) => {
        let n = attributes[*i].ty.components();
        let input = inputs.get(*i).copied().unwrap_or(Vec4::W);
        SmallVec::from_slice(&input.to_array()[..n])
      }
      Expr::Neg(inner) => {
        inner.eval(attributes, inputs).into_iter().map(|v| -v).collect()
      }
      Expr::Construct(ty, args) => {
        let n = ty.components();
        let flat: Value = args
          .iter()
          .flat_map(|a| a.eval(attributes, inputs))
          .collect();
        if args.len() == 1 && flat.len() == 1 {
          std::iter::repeat(flat[0]).take(n).collect()
        } else {
          flat.into_iter().take(n).collect()
        }
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
  pub name: String,
  pub ty: GlslType,
  // false means the attribute is dead code and gets no location
  pub used: bool,
}

/// A compiled stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
  pub stage: ShaderStage,
  pub attributes: Vec<Attribute>,
  /// What the stage writes to `gl_Position` or `gl_FragColor`.
  pub output: Option<Expr>,
}

impl Module {
  pub fn eval_output(&self, inputs: &[Vec4]) -> Option<Vec4> {
    let value = self.output.as_ref()?.eval(&self.attributes, inputs);
    let mut out = [0.0; 4];
    out.copy_from_slice(&value[..4]);
    Some(Vec4::from_array(out))
  }

  pub fn output_name(&self) -> &'static str {
    output_name(self.stage)
  }
}

fn output_name(stage: ShaderStage) -> &'static str {
  match stage {
    ShaderStage::Vertex => "gl_Position",
    ShaderStage::Fragment => "gl_FragColor",
  }
}

pub fn compile(stage: ShaderStage, source: &str) -> Result<Module, String> {
  let tokens = tokenize(source)?;
  let mut parser = Parser {
    tokens: &tokens,
    pos: 0,
    stage,
    attributes: vec![],
    output: None,
    has_main: false,
    depth: 0,
  };
  parser.translation_unit()?;

  Ok(Module {
    stage,
    attributes: parser.attributes,
    output: parser.output,
  })
}

fn error(line: usize, token: impl fmt::Display, message: &str) -> String {
  format!("ERROR: 0:{}: '{}' : {}\n", line, token, message)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
  Ident(String),
  Number(f32),
  Punct(char),
}

impl fmt::Display for Tok {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Tok::Ident(s) => f.write_str(s),
      Tok::Number(v) => write!(f, "{}", v),
      Tok::Punct(c) => write!(f, "{}", c),
    }
  }
}

#[derive(Debug, Clone)]
struct Token {
  tok: Tok,
  line: usize,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
  let mut tokens = vec![];
  let mut chars = src.chars().peekable();
  let mut line = 1;

  while let Some(&c) = chars.peek() {
    match c {
      '\n' => {
        line += 1;
        chars.next();
      }
      c if c.is_whitespace() => {
        chars.next();
      }
      '/' => {
        chars.next();
        match chars.peek() {
          Some('/') => {
            while let Some(&c) = chars.peek() {
              if c == '\n' {
                break;
              }
              chars.next();
            }
          }
          Some('*') => {
            chars.next();
            let start = line;
            let mut prev = ' ';
            loop {
              match chars.next() {
                None => return Err(error(start, "/*", "unterminated comment")),
                Some('/') if prev == '*' => break,
                Some(c) => {
                  if c == '\n' {
                    line += 1;
                  }
                  prev = c;
                }
              }
            }
          }
          // no arithmetic beyond negation
          _ => return Err(error(line, '/', "syntax error")),
        }
      }
      c if c.is_ascii_alphabetic() || c == '_' => {
        let mut ident = String::new();
        while let Some(&c) = chars.peek() {
          if !(c.is_ascii_alphanumeric() || c == '_') {
            break;
          }
          ident.push(c);
          chars.next();
        }
        tokens.push(Token {
          tok: Tok::Ident(ident),
          line,
        });
      }
      c if c.is_ascii_digit() || c == '.' => {
        let mut text = String::new();
        while let Some(&c) = chars.peek() {
          if !(c.is_ascii_digit() || c == '.') {
            break;
          }
          text.push(c);
          chars.next();
        }
        let value = text
          .parse::<f32>()
          .map_err(|_| error(line, &text, "invalid number"))?;
        tokens.push(Token {
          tok: Tok::Number(value),
          line,
        });
      }
      ';' | '(' | ')' | '{' | '}' | ',' | '=' | '-' => {
        chars.next();
        tokens.push(Token {
          tok: Tok::Punct(c),
          line,
        });
      }
      other => return Err(error(line, other, "invalid character")),
    }
  }

  Ok(tokens)
}

struct Parser<'a> {
  tokens: &'a [Token],
  pos: usize,
  stage: ShaderStage,
  attributes: Vec<Attribute>,
  output: Option<Expr>,
  has_main: bool,
  // current expression nesting
  depth: usize,
}

const MAX_EXPR_DEPTH: usize = 64;

impl<'a> Parser<'a> {
  fn peek(&self) -> Option<&'a Token> {
    self.tokens.get(self.pos)
  }

  fn last_line(&self) -> usize {
    self.tokens.last().map(|t| t.line).unwrap_or(1)
  }

  fn next(&mut self) -> Result<&'a Token, String> {
    match self.tokens.get(self.pos) {
      Some(token) => {
        self.pos += 1;
        Ok(token)
      }
      None => Err(error(self.last_line(), "", "unexpected end of file")),
    }
  }

  fn expect_punct(&mut self, c: char) -> Result<(), String> {
    let token = self.next()?;
    match token.tok {
      Tok::Punct(p) if p == c => Ok(()),
      _ => Err(error(token.line, &token.tok, "syntax error")),
    }
  }

  fn expect_ident(&mut self) -> Result<(&'a str, usize), String> {
    let token = self.next()?;
    match &token.tok {
      Tok::Ident(s) => Ok((s.as_str(), token.line)),
      other => Err(error(token.line, other, "syntax error")),
    }
  }

  fn eat_punct(&mut self, c: char) -> bool {
    match self.peek() {
      Some(Token {
        tok: Tok::Punct(p), ..
      }) if *p == c => {
        self.pos += 1;
        true
      }
      _ => false,
    }
  }

  fn translation_unit(&mut self) -> Result<(), String> {
    while let Some(token) = self.peek() {
      match &token.tok {
        Tok::Ident(kw) if kw == "precision" => self.precision()?,
        Tok::Ident(kw) if kw == "attribute" => self.attribute()?,
        Tok::Ident(kw) if kw == "void" => self.main()?,
        other => return Err(error(token.line, other, "syntax error")),
      }
    }

    if !self.has_main {
      return Err(error(self.last_line(), "", "Missing main()"));
    }
    Ok(())
  }

  fn precision(&mut self) -> Result<(), String> {
    self.next()?;
    let (qualifier, line) = self.expect_ident()?;
    if !matches!(qualifier, "lowp" | "mediump" | "highp") {
      return Err(error(line, qualifier, "syntax error"));
    }
    let (ty, line) = self.expect_ident()?;
    if ty != "float" {
      return Err(error(line, ty, "unsupported precision type"));
    }
    self.expect_punct(';')
  }

  fn attribute(&mut self) -> Result<(), String> {
    let keyword = self.next()?;
    if self.stage != ShaderStage::Vertex {
      return Err(error(
        keyword.line,
        "attribute",
        "supported in vertex shaders only",
      ));
    }

    let (type_name, line) = self.expect_ident()?;
    let ty = GlslType::from_name(type_name)
      .ok_or_else(|| error(line, type_name, "cannot be used with attribute"))?;

    let (name, line) = self.expect_ident()?;
    if name.starts_with("gl_") {
      return Err(error(line, name, "reserved built-in name"));
    }
    if GlslType::from_name(name).is_some() || is_keyword(name) {
      return Err(error(line, name, "syntax error"));
    }
    if self.attributes.iter().any(|a| a.name == name) {
      return Err(error(line, name, "redefinition"));
    }
    self.expect_punct(';')?;

    self.attributes.push(Attribute {
      name: name.to_string(),
      ty,
      used: false,
    });
    Ok(())
  }

  fn main(&mut self) -> Result<(), String> {
    self.next()?;
    let (name, line) = self.expect_ident()?;
    if name != "main" {
      return Err(error(line, name, "only main() can be defined"));
    }
    if self.has_main {
      return Err(error(line, name, "function already has a body"));
    }
    self.expect_punct('(')?;
    if let Some(Token {
      tok: Tok::Ident(kw), ..
    }) = self.peek()
    {
      if kw == "void" {
        self.pos += 1;
      }
    }
    self.expect_punct(')')?;
    self.expect_punct('{')?;

    loop {
      if self.eat_punct('}') {
        break;
      }
      if self.eat_punct(';') {
        continue;
      }
      self.statement()?;
    }

    self.has_main = true;
    Ok(())
  }

  fn statement(&mut self) -> Result<(), String> {
    let (target, line) = self.expect_ident()?;
    let expected = output_name(self.stage);
    if target != expected {
      let message = if self.attributes.iter().any(|a| a.name == target) {
        "l-value required (can't modify an attribute)"
      } else {
        "undeclared identifier"
      };
      return Err(error(line, target, message));
    }

    self.expect_punct('=')?;
    let (expr, ty) = self.expr()?;
    if ty != GlslType::Vec4 {
      return Err(error(
        line,
        "assign",
        &format!("cannot convert from '{}' to 'vec4'", ty.name()),
      ));
    }
    self.expect_punct(';')?;

    self.output = Some(expr);
    Ok(())
  }

  fn expr(&mut self) -> Result<(Expr, GlslType), String> {
    if self.depth >= MAX_EXPR_DEPTH {
      let line = self.peek().map(|t| t.line).unwrap_or_else(|| self.last_line());
      return Err(error(line, "", "expression too complex"));
    }
    self.depth += 1;
    let result = self.primary();
    self.depth -= 1;
    result
  }

  fn primary(&mut self) -> Result<(Expr, GlslType), String> {
    let token = self.next()?;
    match &token.tok {
      Tok::Punct('-') => {
        let (inner, ty) = self.expr()?;
        Ok((Expr::Neg(Box::new(inner)), ty))
      }
      Tok::Number(v) => Ok((Expr::Literal(*v), GlslType::Float)),
      Tok::Ident(name) => {
        if let Some(ty) = GlslType::from_name(name) {
          return self.constructor(ty, token.line);
        }
        match self.attributes.iter().position(|a| &a.name == name) {
          Some(i) => {
            self.attributes[i].used = true;
            Ok((Expr::Attribute(i), self.attributes[i].ty))
          }
          None => Err(error(token.line, name, "undeclared identifier")),
        }
      }
      other => Err(error(token.line, other, "syntax error")),
    }
  }

  fn constructor(
    &mut self,
    ty: GlslType,
    line: usize,
  ) -> Result<(Expr, GlslType), String> {
    self.expect_punct('(')?;
    let mut args = vec![];
    let mut sizes = vec![];
    if !self.eat_punct(')') {
      loop {
        let (arg, arg_ty) = self.expr()?;
        args.push(arg);
        sizes.push(arg_ty.components());
        if self.eat_punct(')') {
          break;
        }
        self.expect_punct(',')?;
      }
    }

    let need = ty.components();
    let total: usize = sizes.iter().sum();
    let before_last = total - sizes.last().copied().unwrap_or(0);
    if args.is_empty() {
      return Err(error(line, ty.name(), "constructor does not have any arguments"));
    }
    let broadcast = args.len() == 1 && total == 1;
    if !broadcast && total < need {
      return Err(error(line, ty.name(), "not enough data provided for construction"));
    }
    if !broadcast && before_last >= need {
      return Err(error(line, ty.name(), "too many arguments"));
    }

    Ok((Expr::Construct(ty, args), ty))
  }
}

fn is_keyword(name: &str) -> bool {
  matches!(
    name,
    "attribute" | "precision" | "void" | "lowp" | "mediump" | "highp" | "main"
  )
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::types::vec4;

  const VERTEX: &str = "
    attribute vec2 position;
    void main() {
      gl_Position = vec4(position, 0.0, 1.0);
    }
  ";

  const FRAGMENT: &str = "
    void main() {
      gl_FragColor = vec4(0.0, 0.0, 1.0, 1.0); // Blue color
    }
  ";

  #[test]
  fn test_compiles_pass_through_vertex_stage() {
    let module = compile(ShaderStage::Vertex, VERTEX).unwrap();
    assert_eq!(module.attributes.len(), 1);
    assert_eq!(module.attributes[0].name, "position");
    assert!(module.attributes[0].used);

    let pos = module.eval_output(&[vec4(0.25, -0.5, 0.0, 1.0)]).unwrap();
    assert_eq!(pos, vec4(0.25, -0.5, 0.0, 1.0));
  }

  #[test]
  fn test_fragment_stage_ignores_comments() {
    let module = compile(ShaderStage::Fragment, FRAGMENT).unwrap();
    assert_eq!(module.eval_output(&[]), Some(vec4(0.0, 0.0, 1.0, 1.0)));
  }

  #[test]
  fn test_missing_semicolon_reports_line() {
    let src = "void main() {\n  gl_FragColor = vec4(1.0)\n}\n";
    let log = compile(ShaderStage::Fragment, src).unwrap_err();
    assert_eq!(log, "ERROR: 0:3: '}' : syntax error\n");
  }

  #[test]
  fn test_missing_main() {
    let log = compile(ShaderStage::Vertex, "attribute vec2 p;").unwrap_err();
    assert!(log.contains("Missing main()"));
  }

  #[test]
  fn test_unused_attribute_is_marked_dead() {
    let src = "attribute vec2 position;\nvoid main() { gl_Position = vec4(0.0); }";
    let module = compile(ShaderStage::Vertex, src).unwrap();
    assert!(!module.attributes[0].used);
  }

  #[test]
  fn test_attribute_rejected_in_fragment_stage() {
    let src = "attribute vec2 p;\nvoid main() { gl_FragColor = vec4(1.0); }";
    let log = compile(ShaderStage::Fragment, src).unwrap_err();
    assert!(log.contains("vertex shaders only"));
  }

  #[test]
  fn test_constructor_arity_is_checked() {
    let src = "void main() { gl_FragColor = vec4(1.0, 0.0); }";
    let log = compile(ShaderStage::Fragment, src).unwrap_err();
    assert!(log.contains("not enough data"));

    let src = "void main() { gl_FragColor = vec4(1.0, 0.0, 0.0, 1.0, 1.0); }";
    let log = compile(ShaderStage::Fragment, src).unwrap_err();
    assert!(log.contains("too many arguments"));
  }

  #[test]
  fn test_output_must_be_vec4() {
    let src = "attribute vec2 p;\nvoid main() { gl_Position = p; }";
    let log = compile(ShaderStage::Vertex, src).unwrap_err();
    assert!(log.contains("cannot convert from 'vec2'"));
  }

  #[test]
  fn test_wrong_stage_output_is_undeclared() {
    let src = "void main() { gl_Position = vec4(1.0); }";
    let log = compile(ShaderStage::Fragment, src).unwrap_err();
    assert!(log.contains("'gl_Position' : undeclared identifier"));
  }

  #[test]
  fn test_deep_nesting_is_rejected() {
    let depth = 50_000;
    let src = format!(
      "void main() {{ gl_FragColor = {}1.0{}; }}",
      "vec4(".repeat(depth),
      ")".repeat(depth)
    );
    let log = compile(ShaderStage::Fragment, &src).unwrap_err();
    assert!(log.contains("expression too complex"));

    let src = format!("void main() {{ gl_FragColor = vec4({}1.0); }}", "-".repeat(100));
    let log = compile(ShaderStage::Fragment, &src).unwrap_err();
    assert!(log.contains("expression too complex"));
  }

  #[test]
  fn test_moderate_nesting_compiles() {
    let src = format!(
      "void main() {{ gl_FragColor = {}1.0{}; }}",
      "vec4(".repeat(16),
      ")".repeat(16)
    );
    let module = compile(ShaderStage::Fragment, &src).unwrap();
    assert_eq!(module.eval_output(&[]), Some(vec4(1.0, 1.0, 1.0, 1.0)));
  }

  #[test]
  fn test_negation_and_broadcast() {
    let src = "attribute vec2 p;\nvoid main() { gl_Position = vec4(-p, vec2(-1.0)); }";
    let module = compile(ShaderStage::Vertex, src).unwrap();
    let pos = module.eval_output(&[vec4(0.5, 0.25, 0.0, 1.0)]).unwrap();
    assert_eq!(pos, vec4(-0.5, -0.25, -1.0, -1.0));
  }
}
