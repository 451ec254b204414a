use std::collections::HashMap;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use anyhow::{bail, Context, Result};
use bytemuck::{try_cast_slice, try_cast_slice_mut};
use rsvp_core::Frame;
use tiny_skia::{Color, FilterQuality, IntSize, Pixmap, PixmapPaint, Transform};
use tracing::{debug, warn};

use crate::text::{render_text_pixmap, text_width, wrap_words};

const DEFAULT_FONT_SIZE: f32 = 28.0;
const LINE_SPACING: f32 = 1.3;
/// Fraction of the canvas width available to wrapped text.
const TEXT_WIDTH_FRACTION: f32 = 0.8;

/// Software compositor turning [`Frame`]s into an opaque RGBA canvas.
///
/// Stimulus images are scaled to fit the canvas when they are added, so an
/// image frame costs one fill and one row copy per line.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    background: Color,
    text_color: Color,
    font: Option<FontVec>,
    font_size: f32,
    canvas: Pixmap,
    sources: Vec<Pixmap>,
    scaled: Vec<Pixmap>,
    text_cache: HashMap<String, Vec<Pixmap>>,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .with_context(|| format!("invalid canvas size {width}x{height}"))?;
        let mut renderer = Self {
            width,
            height,
            background: Color::from_rgba8(128, 128, 128, 255),
            text_color: Color::WHITE,
            font: None,
            font_size: DEFAULT_FONT_SIZE,
            canvas,
            sources: Vec::new(),
            scaled: Vec::new(),
            text_cache: HashMap::new(),
        };
        renderer.clear();
        Ok(renderer)
    }

    pub fn with_background(mut self, rgb: [u8; 3]) -> Self {
        self.background = Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255);
        self.clear();
        self
    }

    /// Loads a TrueType/OpenType font for message frames.
    pub fn with_font(mut self, bytes: Vec<u8>, size_px: f32) -> Result<Self> {
        self.font = Some(FontVec::try_from_vec(bytes).context("unreadable font")?);
        self.font_size = size_px;
        self.text_cache.clear();
        Ok(self)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn image_count(&self) -> usize {
        self.scaled.len()
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Adds a straight-alpha RGBA image and returns its frame index.
    pub fn add_image(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<usize> {
        if rgba.len() != width as usize * height as usize * 4 {
            bail!("image data does not match {width}x{height}");
        }
        let size = IntSize::from_wh(width, height).context("empty image")?;
        let mut data = Vec::with_capacity(rgba.len());
        for px in rgba.chunks_exact(4) {
            let a = px[3] as u16;
            data.extend(px[..3].iter().map(|&c| ((c as u16 * a + 127) / 255) as u8));
            data.push(px[3]);
        }
        let source = Pixmap::from_vec(data, size).context("image pixmap")?;
        let scaled = fit_to(&source, self.width, self.height)?;
        self.sources.push(source);
        self.scaled.push(scaled);
        Ok(self.scaled.len() - 1)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.canvas = Pixmap::new(width, height)
            .with_context(|| format!("invalid canvas size {width}x{height}"))?;
        self.width = width;
        self.height = height;
        self.scaled = self
            .sources
            .iter()
            .map(|src| fit_to(src, width, height))
            .collect::<Result<_>>()?;
        self.text_cache.clear();
        self.clear();
        debug!(width, height, "renderer resized");
        Ok(())
    }

    pub fn render(&mut self, frame: &Frame) -> Result<()> {
        match frame {
            Frame::Blank => self.clear(),
            Frame::Solid { rgb } => {
                self.canvas
                    .fill(Color::from_rgba8(rgb[0], rgb[1], rgb[2], 255));
            }
            Frame::Image { index } => {
                self.clear();
                let Some(image) = self.scaled.get(*index) else {
                    bail!("no image with index {index} ({} loaded)", self.scaled.len());
                };
                let center = (self.width as f32 * 0.5, self.height as f32 * 0.5);
                blit(&mut self.canvas, image, center);
            }
            Frame::Message { text } => {
                self.clear();
                self.draw_message(text)?;
            }
        }
        Ok(())
    }

    /// Copies the canvas into an RGBA frame buffer of the same size.
    pub fn copy_to(&self, frame_buffer: &mut [u8]) -> Result<()> {
        let src = self.canvas.data();
        if frame_buffer.len() != src.len() {
            bail!(
                "frame buffer holds {} bytes, canvas {}",
                frame_buffer.len(),
                src.len()
            );
        }
        frame_buffer.copy_from_slice(src);
        Ok(())
    }

    fn clear(&mut self) {
        self.canvas.fill(self.background);
    }

    fn draw_message(&mut self, text: &str) -> Result<()> {
        let Some(font) = self.font.as_ref() else {
            warn!("no font loaded, message not drawn");
            return Ok(());
        };
        if !self.text_cache.contains_key(text) {
            let scale = PxScale::from(self.font_size);
            let max_width = self.width as f32 * TEXT_WIDTH_FRACTION;
            let lines = wrap_words(text, max_width, |s| text_width(font, scale, s));
            let mut rendered = Vec::with_capacity(lines.len());
            for line in &lines {
                // Blank lines keep their height as an empty pixmap.
                let pm = match render_text_pixmap(line, self.font_size, font, self.text_color)? {
                    Some(pm) => pm,
                    None => Pixmap::new(1, 1).context("line pixmap")?,
                };
                rendered.push(pm);
            }
            self.text_cache.insert(text.to_string(), rendered);
        }

        let line_height = font.as_scaled(PxScale::from(self.font_size)).height() * LINE_SPACING;
        let Some(lines) = self.text_cache.get(text) else {
            return Ok(());
        };
        let block = line_height * lines.len() as f32;
        let top = (self.height as f32 - block) * 0.5;
        let cx = self.width as f32 * 0.5;
        for (i, line) in lines.iter().enumerate() {
            let cy = top + line_height * (i as f32 + 0.5);
            blit(&mut self.canvas, line, (cx, cy));
        }
        Ok(())
    }
}

/// Scales `src` to the largest size fitting `width`x`height`, aspect kept.
fn fit_to(src: &Pixmap, width: u32, height: u32) -> Result<Pixmap> {
    let sx = width as f32 / src.width() as f32;
    let sy = height as f32 / src.height() as f32;
    let scale = sx.min(sy);
    let tw = ((src.width() as f32 * scale).round() as u32).clamp(1, width);
    let th = ((src.height() as f32 * scale).round() as u32).clamp(1, height);
    if (tw, th) == (src.width(), src.height()) {
        return Ok(src.clone());
    }
    let mut out = Pixmap::new(tw, th).context("scaled image pixmap")?;
    let paint = PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    out.draw_pixmap(
        0,
        0,
        src.as_ref(),
        &paint,
        Transform::from_scale(
            tw as f32 / src.width() as f32,
            th as f32 / src.height() as f32,
        ),
        None,
    );
    Ok(out)
}

/// Draws `src` centered on `center`, clipped to the canvas. Opaque sources
/// are copied row by row, others blended source-over in premultiplied space.
fn blit(canvas: &mut Pixmap, src: &Pixmap, center: (f32, f32)) {
    let (w, h) = (src.width() as i32, src.height() as i32);
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let x = (center.0 - w as f32 * 0.5).floor() as i32;
    let y = (center.1 - h as f32 * 0.5).floor() as i32;
    if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
        return;
    }

    let dst_x = x.max(0) as usize;
    let dst_y = y.max(0) as usize;
    let src_x = (-x).max(0) as usize;
    let src_y = (-y).max(0) as usize;
    let copy_w = (w as usize - src_x).min(cw as usize - dst_x);
    let copy_h = (h as usize - src_y).min(ch as usize - dst_y);
    let (src_stride, dst_stride) = (w as usize, cw as usize);

    let src_data = src.data();
    let opaque = (0..copy_h).all(|row| {
        let start = ((src_y + row) * src_stride + src_x) * 4;
        src_data[start..start + copy_w * 4]
            .iter()
            .skip(3)
            .step_by(4)
            .all(|&a| a == 255)
    });

    let dst_data = canvas.data_mut();
    if opaque {
        if let (Ok(src_px), Ok(dst_px)) = (
            try_cast_slice::<u8, u32>(src_data),
            try_cast_slice_mut::<u8, u32>(dst_data),
        ) {
            for row in 0..copy_h {
                let s = (src_y + row) * src_stride + src_x;
                let d = (dst_y + row) * dst_stride + dst_x;
                dst_px[d..d + copy_w].copy_from_slice(&src_px[s..s + copy_w]);
            }
            return;
        }
        for row in 0..copy_h {
            let s = ((src_y + row) * src_stride + src_x) * 4;
            let d = ((dst_y + row) * dst_stride + dst_x) * 4;
            dst_data[d..d + copy_w * 4].copy_from_slice(&src_data[s..s + copy_w * 4]);
        }
        return;
    }

    for row in 0..copy_h {
        for col in 0..copy_w {
            let s = ((src_y + row) * src_stride + src_x + col) * 4;
            let d = ((dst_y + row) * dst_stride + dst_x + col) * 4;
            let inv = 255 - src_data[s + 3] as u32;
            for c in 0..4 {
                let blended = src_data[s + c] as u32 + (dst_data[d + c] as u32 * inv + 127) / 255;
                dst_data[d + c] = blended.min(255) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(r: &SkiaRenderer, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * r.width() + x) * 4) as usize;
        let d = r.canvas().data();
        [d[i], d[i + 1], d[i + 2], d[i + 3]]
    }

    fn solid_image(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        rgba.iter().copied().cycle().take((w * h * 4) as usize).collect()
    }

    #[test]
    fn blank_and_solid_fill_the_canvas() {
        let mut r = SkiaRenderer::new(64, 48).unwrap().with_background([10, 20, 30]);
        r.render(&Frame::Blank).unwrap();
        assert_eq!(pixel(&r, 0, 0), [10, 20, 30, 255]);
        r.render(&Frame::Solid { rgb: [255, 0, 0] }).unwrap();
        assert_eq!(pixel(&r, 63, 47), [255, 0, 0, 255]);
    }

    #[test]
    fn wide_image_is_letterboxed() {
        let mut r = SkiaRenderer::new(100, 100).unwrap().with_background([0, 0, 0]);
        let idx = r.add_image(40, 20, &solid_image(40, 20, [0, 255, 0, 255])).unwrap();
        assert_eq!(idx, 0);
        r.render(&Frame::Image { index: idx }).unwrap();
        assert_eq!(pixel(&r, 50, 50), [0, 255, 0, 255]);
        assert_eq!(pixel(&r, 50, 5), [0, 0, 0, 255]);
        assert_eq!(pixel(&r, 50, 95), [0, 0, 0, 255]);
    }

    #[test]
    fn translucent_image_blends_over_background() {
        let mut r = SkiaRenderer::new(10, 10).unwrap().with_background([0, 0, 200]);
        let idx = r.add_image(10, 10, &solid_image(10, 10, [200, 0, 0, 128])).unwrap();
        r.render(&Frame::Image { index: idx }).unwrap();
        let [red, _, blue, alpha] = pixel(&r, 5, 5);
        assert!((99..=102).contains(&red));
        assert!((98..=101).contains(&blue));
        assert_eq!(alpha, 255);
    }

    #[test]
    fn unknown_image_index_is_an_error() {
        let mut r = SkiaRenderer::new(10, 10).unwrap();
        assert!(r.render(&Frame::Image { index: 3 }).is_err());
    }

    #[test]
    fn message_without_font_shows_background() {
        let mut r = SkiaRenderer::new(20, 20).unwrap().with_background([5, 5, 5]);
        r.render(&Frame::message("Ready to begin?")).unwrap();
        assert_eq!(pixel(&r, 10, 10), [5, 5, 5, 255]);
    }

    #[test]
    fn resize_rescales_images() {
        let mut r = SkiaRenderer::new(50, 50).unwrap();
        let idx = r.add_image(10, 10, &solid_image(10, 10, [255, 255, 255, 255])).unwrap();
        r.resize(200, 100).unwrap();
        r.render(&Frame::Image { index: idx }).unwrap();
        assert_eq!(pixel(&r, 100, 50), [255, 255, 255, 255]);
        assert_eq!(pixel(&r, 10, 50), [128, 128, 128, 255]);

        let mut fb = vec![0u8; 200 * 100 * 4];
        r.copy_to(&mut fb).unwrap();
        assert_eq!(&fb[..4], &[128, 128, 128, 255]);
        assert!(r.copy_to(&mut [0u8; 4]).is_err());
    }

    #[test]
    fn mismatched_image_data_is_rejected() {
        let mut r = SkiaRenderer::new(10, 10).unwrap();
        assert!(r.add_image(4, 4, &[0u8; 10]).is_err());
    }
}
