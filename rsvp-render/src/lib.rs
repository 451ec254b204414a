pub mod render;
pub mod text;

pub use render::SkiaRenderer;
pub use text::{render_text_pixmap, wrap_words};
