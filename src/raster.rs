use std::cmp::Ordering;

use image::{Rgba, RgbaImage};

use crate::types::{Color, Vec4, COLOR};

/// The color buffer of a drawing surface. Row 0 is the top row.
#[derive(Clone)]
pub struct Image {
  dimension: (usize, usize),
  pixels: Vec<Color>,
}

impl Image {
  pub fn new(size: (usize, usize), fill: Color) -> Self {
    Self {
      dimension: size,
      pixels: vec![fill; size.0 * size.1],
    }
  }

  pub fn width(&self) -> usize {
    self.dimension.0
  }

  pub fn height(&self) -> usize {
    self.dimension.1
  }

  pub fn size(&self) -> (usize, usize) {
    self.dimension
  }

  pub fn pixels(&self) -> impl Iterator<Item = &Color> {
    self.pixels.iter()
  }

  pub fn pixel(&self, coords: (i32, i32)) -> Option<&Color> {
    let idx = self.index(coords)?;
    self.pixels.get(idx)
  }

  pub fn pixel_mut(&mut self, coords: (i32, i32)) -> Option<&mut Color> {
    let idx = self.index(coords)?;
    self.pixels.get_mut(idx)
  }

  pub fn fill(&mut self, color: Color) {
    self.pixels.iter_mut().for_each(|p| *p = color);
  }

  fn index(&self, coords: (i32, i32)) -> Option<usize> {
    if coords.0 < 0
      || coords.1 < 0
      || coords.0 >= self.width() as i32
      || coords.1 >= self.height() as i32
    {
      return None;
    }
    Some(coords.1 as usize * self.width() + coords.0 as usize)
  }

  pub fn to_rgba_image(&self) -> RgbaImage {
    RgbaImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
      let color = self.pixels[y as usize * self.width() + x as usize];
      Rgba(COLOR::to_rgba8(color))
    })
  }
}

/// A window-space position. Pixel `(x, y)` covers `[x, x+1) × [y, y+1)`, so
/// its center sits at `(x + 0.5, y + 0.5)`.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct ScreenPt {
  pub x: f32,
  pub y: f32,
}

impl ScreenPt {
  /// Maps a clip-space position through the perspective divide and the
  /// viewport. `None` for points at or behind the eye (`w <= 0`).
  pub fn from_clip(clip: Vec4, size: (usize, usize)) -> Option<Self> {
    if clip.w <= 0.0 {
      return None;
    }
    let ndc = clip / clip.w;
    Some(Self {
      x: (ndc.x + 1.0) / 2.0 * size.0 as f32,
      // flip: ndc y points up, image rows go down
      y: (1.0 - ndc.y) / 2.0 * size.1 as f32,
    })
  }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
  from + (to - from) * t
}

pub struct Rasterizer<'a> {
  image: &'a mut Image,
}

impl<'a> Rasterizer<'a> {
  pub fn new(image: &'a mut Image) -> Self {
    Self { image }
  }

  pub fn fill_triangle(&mut self, pts: [ScreenPt; 3], color: Color) {
    let [upper, lower] = Self::horizontally_split_triangle(pts);

    if let Some([top, left, right]) = upper {
      self.fill_rows((top, top), (left, right), color);
    }

    if let Some([left, right, bottom]) = lower {
      self.fill_rows((left, right), (bottom, bottom), color);
    }
  }

  // Splits into a flat-bottom upper half `[top, left, right]` and a flat-top
  // lower half `[left, right, bottom]`.
  fn horizontally_split_triangle(
    mut pts: [ScreenPt; 3],
  ) -> [Option<[ScreenPt; 3]>; 2] {
    pts.sort_unstable_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal));
    let [top, mid, bottom] = pts;

    if !(bottom.y - top.y).is_normal() {
      // degenerate: zero height or non-finite
      return [None, None];
    }

    let r = (mid.y - top.y) / (bottom.y - top.y);
    let split = ScreenPt {
      x: lerp(top.x, bottom.x, r),
      y: mid.y,
    };
    let (left, right) = if split.x <= mid.x {
      (split, mid)
    } else {
      (mid, split)
    };

    [Some([top, left, right]), Some([left, right, bottom])]
  }

  // Fills every pixel whose center lies in the trapezoid between the row
  // `upper` and the row `lower`: `upper.y <= cy < lower.y`, `left <= cx < right`.
  fn fill_rows(
    &mut self,
    upper: (ScreenPt, ScreenPt),
    lower: (ScreenPt, ScreenPt),
    color: Color,
  ) {
    let (y0, y1) = (upper.0.y, lower.0.y);
    if y1 <= y0 {
      return;
    }

    let first = ((y0 - 0.5).ceil() as i32).max(0);
    let end = ((y1 - 0.5).ceil() as i32).min(self.image.height() as i32);

    for y in first..end {
      let t = (y as f32 + 0.5 - y0) / (y1 - y0);
      let xl = lerp(upper.0.x, lower.0.x, t);
      let xr = lerp(upper.1.x, lower.1.x, t);
      self.draw_horizontal_line(y, xl, xr, color);
    }
  }

  fn draw_horizontal_line(&mut self, y: i32, xl: f32, xr: f32, color: Color) {
    let start = ((xl - 0.5).ceil() as i32).max(0);
    let end = ((xr - 0.5).ceil() as i32).min(self.image.width() as i32);
    for x in start..end {
      self.put_pixel((x, y), color);
    }
  }

  fn put_pixel(&mut self, coords: (i32, i32), color: Color) {
    if let Some(pixel) = self.image.pixel_mut(coords) {
      *pixel = color;
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::types::vec4;

  fn pt(x: f32, y: f32) -> ScreenPt {
    ScreenPt { x, y }
  }

  #[test]
  fn test_clip_to_screen() {
    let size = (640, 480);
    let top = ScreenPt::from_clip(vec4(0.0, 0.5, 0.0, 1.0), size).unwrap();
    assert_eq!(top, pt(320.0, 120.0));
    let corner = ScreenPt::from_clip(vec4(-1.0, -1.0, 0.0, 1.0), size).unwrap();
    assert_eq!(corner, pt(0.0, 480.0));
    assert!(ScreenPt::from_clip(vec4(0.0, 0.0, 0.0, 0.0), size).is_none());
  }

  #[test]
  fn test_fill_covers_pixel_centers_only() {
    let mut image = Image::new((4, 4), COLOR::BLACK);
    let red = COLOR::rgb(1.0, 0.0, 0.0);
    // the lower-left half of the square [0,4]x[0,4], diagonal excluded
    Rasterizer::new(&mut image).fill_triangle(
      [pt(0.0, 0.0), pt(0.0, 4.0), pt(4.0, 4.0)],
      red,
    );

    let filled = image.pixels().filter(|p| **p == red).count();
    assert_eq!(filled, 1 + 2 + 3);
    assert_eq!(image.pixel((0, 0)), Some(&COLOR::BLACK));
    assert_eq!(image.pixel((0, 1)), Some(&red));
    assert_eq!(image.pixel((0, 3)), Some(&red));
    assert_eq!(image.pixel((3, 3)), Some(&COLOR::BLACK));
  }

  #[test]
  fn test_adjacent_triangles_do_not_overlap() {
    let mut image = Image::new((4, 4), COLOR::BLACK);
    let a = COLOR::rgb(1.0, 0.0, 0.0);
    let b = COLOR::rgb(0.0, 1.0, 0.0);
    let mut raster = Rasterizer::new(&mut image);
    raster.fill_triangle([pt(0.0, 0.0), pt(0.0, 4.0), pt(4.0, 4.0)], a);
    raster.fill_triangle([pt(0.0, 0.0), pt(4.0, 0.0), pt(4.0, 4.0)], b);

    let count_a = image.pixels().filter(|p| **p == a).count();
    let count_b = image.pixels().filter(|p| **p == b).count();
    assert_eq!(count_a + count_b, 16);
  }

  #[test]
  fn test_degenerate_triangle_draws_nothing() {
    let mut image = Image::new((4, 4), COLOR::BLACK);
    Rasterizer::new(&mut image).fill_triangle(
      [pt(0.0, 2.0), pt(2.0, 2.0), pt(4.0, 2.0)],
      COLOR::rgb(1.0, 1.0, 1.0),
    );
    assert!(image.pixels().all(|p| *p == COLOR::BLACK));
  }

  #[test]
  fn test_offscreen_parts_are_clipped() {
    let mut image = Image::new((4, 4), COLOR::BLACK);
    let white = COLOR::rgb(1.0, 1.0, 1.0);
    Rasterizer::new(&mut image).fill_triangle(
      [pt(-10.0, -10.0), pt(-10.0, 20.0), pt(20.0, 20.0)],
      white,
    );
    assert_eq!(image.pixel((0, 3)), Some(&white));
    assert_eq!(image.to_rgba_image().get_pixel(0, 3).0, [255, 255, 255, 255]);
  }
}
