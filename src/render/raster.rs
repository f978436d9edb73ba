//! pdfium rasterisation and image composition.
//!
//! Everything here is blocking and runs inside `spawn_blocking`: pdfium
//! keeps thread-local state and a 1.5× render of a large page is CPU-bound.

use crate::error::DiffClientError;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use pdfium_render::prelude::*;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at a pdfium library file or the directory
/// containing it.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

const BACKGROUND: Rgba<u8> = Rgba([243, 244, 246, 255]);
const PLACEHOLDER: Rgba<u8> = Rgba([229, 231, 235, 255]);

/// Bind pdfium from `PDFIUM_LIB_PATH` or, failing that, the system
/// library search path.
pub fn bind_pdfium() -> Result<Pdfium, DiffClientError> {
    let bindings = match std::env::var_os(PDFIUM_LIB_PATH_ENV) {
        Some(raw) => {
            let path = PathBuf::from(raw);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib).map_err(|e| {
                DiffClientError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e))
            })?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| DiffClientError::PdfiumBindingFailed(format!("{:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

/// Open a downloaded document. `label` names it in errors.
pub fn load_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    label: &str,
) -> Result<PdfDocument<'a>, DiffClientError> {
    pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| DiffClientError::CorruptPdf {
            label: label.to_string(),
            detail: format!("{:?}", e),
        })
}

/// Size of a page in PDF points.
pub fn page_size_points(document: &PdfDocument<'_>, index: usize) -> Result<(f32, f32), String> {
    let page = document
        .pages()
        .get(page_index(index)?)
        .map_err(|e| format!("{:?}", e))?;
    Ok((page.width().value, page.height().value))
}

fn page_index(index: usize) -> Result<u16, String> {
    u16::try_from(index).map_err(|_| format!("page index {index} out of range"))
}

/// Rasterise one page at `scale` pixels per point.
pub fn rasterize(
    document: &PdfDocument<'_>,
    index: usize,
    scale: f32,
) -> Result<RgbaImage, String> {
    let page = document
        .pages()
        .get(page_index(index)?)
        .map_err(|e| format!("{:?}", e))?;
    let config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| format!("{:?}", e))?;
    Ok(bitmap.as_image().to_rgba8())
}

/// Resize to the displayed size. A factor of 1 returns the image as is.
pub fn to_displayed(image: RgbaImage, factor: f32) -> RgbaImage {
    if (factor - 1.0).abs() < f32::EPSILON {
        return image;
    }
    let w = ((image.width() as f32) * factor).round().max(1.0) as u32;
    let h = ((image.height() as f32) * factor).round().max(1.0) as u32;
    imageops::resize(&image, w, h, FilterType::Triangle)
}

/// Blank surface standing in for a page the document does not have.
pub fn placeholder(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width.max(1), height.max(1), PLACEHOLDER)
}

/// Place two columns side by side, top-aligned, `gutter` pixels apart.
pub fn compose_side_by_side(left: &RgbaImage, right: &RgbaImage, gutter: u32) -> RgbaImage {
    let width = left.width() + gutter + right.width();
    let height = left.height().max(right.height());
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    imageops::replace(&mut canvas, left, 0, 0);
    imageops::replace(&mut canvas, right, i64::from(left.width() + gutter), 0);
    canvas
}

/// Encode `image` as PNG at `path` via a temp file in the same directory
/// and a rename, so readers never see a partial image.
pub fn write_png_atomic(image: &RgbaImage, path: &Path) -> Result<(), String> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| e.to_string())?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        image
            .write_to(&mut writer, ImageFormat::Png)
            .map_err(|e| e.to_string())?;
        writer.flush().map_err(|e| e.to_string())?;
    }
    tmp.persist(path).map_err(|e| e.error.to_string())?;
    Ok(())
}
