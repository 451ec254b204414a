use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbaImage;
use tracing::{debug, info};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

pub struct StimulusImage {
    pub name: String,
    pub pixels: RgbaImage,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read pictures directory {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!(count = paths.len(), dir = %dir.display(), "images found");
    Ok(paths)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Decodes every path to RGBA8.
pub fn load_images(paths: &[PathBuf]) -> Result<Vec<StimulusImage>> {
    let images = paths
        .iter()
        .map(|path| {
            let pixels = image::open(path)
                .with_context(|| format!("cannot decode {}", path.display()))?
                .into_rgba8();
            Ok(StimulusImage {
                name: file_name(path),
                pixels,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    info!(count = images.len(), "images loaded");
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rsvp-images-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn lists_known_extensions_sorted() {
        let dir = scratch_dir("list");
        for name in ["b.PNG", "a.jpg", "c.Jpeg", "d.bmp", "notes.txt", "e.gif"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.join("nested.png")).unwrap();

        let names: Vec<String> = list_images(&dir).unwrap().iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.Jpeg", "d.bmp"]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = std::env::temp_dir().join("rsvp-images-does-not-exist");
        assert!(list_images(&dir).is_err());
    }

    #[test]
    fn decodes_to_rgba() {
        let dir = scratch_dir("decode");
        let path = dir.join("red.png");
        image::RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 0]))
            .save(&path)
            .unwrap();

        let images = load_images(&[path]).unwrap();
        assert_eq!(images[0].name, "red.png");
        assert_eq!(images[0].pixels.dimensions(), (4, 2));
        assert_eq!(images[0].pixels.get_pixel(3, 1).0, [255, 0, 0, 255]);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
