//! Side-by-side page renderer with difference overlays.
//!
//! ## Pass structure
//!
//! ```text
//! file1.pdf ─┐
//!            ├─ 1. Load    both documents via pdfium (spawn_blocking)
//! file2.pdf ─┘
//!               2. Mount   one surface per column per selected page,
//!                          sized to the displayed page; readiness barrier
//!               3. Draw    rasterise at 1.5×, scale to zoom, overlay boxes
//!               4. Write   compose columns, PNG via temp file + rename
//! ```
//!
//! The page count is the larger of the two documents. Where the shorter one
//! has run out, its column is mounted as a blank placeholder and a warning is
//! logged; that is not an error. A page that fails to rasterise or write is
//! recorded in its [`RenderedPage`] and the pass moves on.

pub mod barrier;
pub mod overlay;
pub mod raster;

use crate::api::ComparisonBackend;
use crate::config::{RenderOptions, RENDER_SCALE};
use crate::error::{Column, DiffClientError, PageRenderError};
use crate::model::{DiffReport, FileSlot};
use crate::output::{RenderStats, RenderedComparison, RenderedPage};
use crate::progress::RenderProgress;
use barrier::ReadinessBarrier;
use image::RgbaImage;
use overlay::{columns_for, draw_overlay, overlay_box_scaled, OverlayStyle};
use pdfium_render::prelude::PdfDocument;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// File name for a composed page, e.g. `page-007.png`.
pub fn page_file_name(page_number: usize) -> String {
    format!("page-{page_number:03}.png")
}

/// Download both documents and the diff for `job_id`, then render.
pub async fn render_job(
    backend: Arc<dyn ComparisonBackend>,
    job_id: &str,
    options: &RenderOptions,
    output_dir: &Path,
    progress: RenderProgress,
) -> Result<RenderedComparison, DiffClientError> {
    info!("Fetching documents and diff for job {}", job_id);
    let (left, right, diff) = tokio::try_join!(
        backend.job_file(job_id, FileSlot::File1),
        backend.job_file(job_id, FileSlot::File2),
        backend.job_diff(job_id),
    )?;
    render_comparison(left, right, diff, options, output_dir, progress).await
}

/// Render both documents page by page into `output_dir`.
pub async fn render_comparison(
    left: Vec<u8>,
    right: Vec<u8>,
    diff: DiffReport,
    options: &RenderOptions,
    output_dir: &Path,
    progress: RenderProgress,
) -> Result<RenderedComparison, DiffClientError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| DiffClientError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let pass = RenderPass {
        left,
        right,
        diff,
        options: options.clone(),
        output_dir: output_dir.to_path_buf(),
        progress,
    };
    tokio::task::spawn_blocking(move || pass.run())
        .await
        .map_err(|e| DiffClientError::Internal(format!("Render task panicked: {}", e)))?
}

/// A mounted surface: where one column of one page will be drawn.
#[derive(Debug, Clone, Copy)]
enum Surface {
    Page {
        /// Displayed size in pixels.
        width: u32,
        height: u32,
    },
    /// The document has no page at this index.
    Missing,
    /// The page exists but its size could not be read.
    Broken,
}

struct RenderPass {
    left: Vec<u8>,
    right: Vec<u8>,
    diff: DiffReport,
    options: RenderOptions,
    output_dir: PathBuf,
    progress: RenderProgress,
}

impl RenderPass {
    fn run(self) -> Result<RenderedComparison, DiffClientError> {
        let started = Instant::now();
        let pdfium = raster::bind_pdfium()?;
        let docs = [
            raster::load_document(&pdfium, &self.left, FileSlot::File1.as_str())?,
            raster::load_document(&pdfium, &self.right, FileSlot::File2.as_str())?,
        ];
        let page_counts = [docs[0].pages().len() as usize, docs[1].pages().len() as usize];
        let total = page_counts[0].max(page_counts[1]);
        let indices = self.options.pages.to_indices(total);
        info!(
            "Rendering {} of {} pages (file1: {}, file2: {})",
            indices.len(),
            total,
            page_counts[0],
            page_counts[1]
        );
        self.progress.on_render_start(indices.len());

        let px_per_point = RENDER_SCALE * self.options.display_factor();

        // ── Mount ────────────────────────────────────────────────────────
        let barrier = ReadinessBarrier::new(indices.len() * 2);
        let mut surfaces = Vec::with_capacity(indices.len());
        for &idx in &indices {
            let mut pair = [Surface::Missing; 2];
            for (col, doc) in docs.iter().enumerate() {
                pair[col] = if idx >= page_counts[col] {
                    warn!(
                        "Page {} is past the end of {} ({} pages); leaving it blank",
                        idx + 1,
                        column_label(col),
                        page_counts[col]
                    );
                    Surface::Missing
                } else {
                    match raster::page_size_points(doc, idx) {
                        Ok((w, h)) => Surface::Page {
                            width: (w * px_per_point).round().max(1.0) as u32,
                            height: (h * px_per_point).round().max(1.0) as u32,
                        },
                        Err(e) => {
                            warn!("Page {} of {}: {}", idx + 1, column_label(col), e);
                            Surface::Broken
                        }
                    }
                };
                barrier.mark_ready();
            }
            surfaces.push((idx, pair));
        }
        // Mounting runs on this thread, so every surface is counted by now.
        debug_assert!(barrier.is_released());

        // ── Draw ─────────────────────────────────────────────────────────
        let mut pages = Vec::with_capacity(surfaces.len());
        for (idx, pair) in surfaces {
            let page = self.draw_page(&docs, idx, pair, px_per_point, indices.len());
            match &page.error {
                None => self.progress.on_page_rendered(
                    page.page_number,
                    indices.len(),
                    page.changes_drawn,
                ),
                Some(err) => {
                    warn!("{}", err);
                    self.progress
                        .on_page_error(page.page_number, indices.len(), &err.to_string());
                }
            }
            pages.push(page);
        }

        let stats = RenderStats::from_pages(&pages, started.elapsed().as_millis() as u64);
        self.progress
            .on_render_complete(stats.total_pages, stats.rendered_pages);
        info!(
            "Rendered {}/{} pages, {} boxes, in {}ms",
            stats.rendered_pages, stats.total_pages, stats.changes_drawn, stats.total_duration_ms
        );

        Ok(RenderedComparison {
            output_dir: self.output_dir,
            page_counts,
            pages,
            stats,
        })
    }

    fn draw_page(
        &self,
        docs: &[PdfDocument<'_>; 2],
        idx: usize,
        pair: [Surface; 2],
        px_per_point: f32,
        total: usize,
    ) -> RenderedPage {
        let page_started = Instant::now();
        let page_number = idx + 1;
        let mut result = RenderedPage {
            page_number,
            path: None,
            width: 0,
            height: 0,
            missing: Vec::new(),
            changes_drawn: 0,
            duration_ms: 0,
            error: None,
        };
        let failed = |result: &mut RenderedPage, err: PageRenderError| {
            result.error = Some(err);
            result.duration_ms = page_started.elapsed().as_millis() as u64;
        };

        // Rasterise the columns that have a page.
        let mut images: [Option<RgbaImage>; 2] = [None, None];
        for (col, surface) in pair.iter().enumerate() {
            match surface {
                Surface::Missing => result.missing.push(column(col)),
                Surface::Broken => {
                    failed(
                        &mut result,
                        PageRenderError::RenderFailed {
                            page: page_number,
                            column: column(col),
                            detail: "page size unreadable".into(),
                        },
                    );
                    return result;
                }
                Surface::Page { width, height } => {
                    let raw = match raster::rasterize(&docs[col], idx, RENDER_SCALE) {
                        Ok(img) => img,
                        Err(detail) => {
                            failed(
                                &mut result,
                                PageRenderError::RenderFailed {
                                    page: page_number,
                                    column: column(col),
                                    detail,
                                },
                            );
                            return result;
                        }
                    };
                    let mut img = raster::to_displayed(raw, self.options.display_factor());
                    if img.dimensions() != (*width, *height) {
                        debug!(
                            "Page {} {}: surface {}x{}, raster {}x{}",
                            page_number,
                            column_label(col),
                            width,
                            height,
                            img.width(),
                            img.height()
                        );
                        img = image::imageops::resize(
                            &img,
                            *width,
                            *height,
                            image::imageops::FilterType::Triangle,
                        );
                    }
                    images[col] = Some(img);
                }
            }
        }

        // Overlay, flipping Y against each column's displayed height.
        if self.options.show_differences {
            for change in self.diff.changes_for(page_number as u32) {
                let style = OverlayStyle::for_kind(change.kind);
                for &col in columns_for(change.kind) {
                    if let Some(img) = images[column_index(col)].as_mut() {
                        let displayed_height = img.height() as f32;
                        let b = overlay_box_scaled(change.bbox, displayed_height, px_per_point);
                        if draw_overlay(img, &b, &style) {
                            result.changes_drawn += 1;
                        }
                    }
                }
            }
        }

        // Blank placeholders take the other column's size.
        let [left, right] = images;
        let (left, right) = match (left, right) {
            (Some(l), Some(r)) => (l, r),
            (Some(l), None) => {
                let r = raster::placeholder(l.width(), l.height());
                (l, r)
            }
            (None, Some(r)) => (raster::placeholder(r.width(), r.height()), r),
            (None, None) => {
                failed(
                    &mut result,
                    PageRenderError::RenderFailed {
                        page: page_number,
                        column: Column::Left,
                        detail: "neither document has this page".into(),
                    },
                );
                return result;
            }
        };

        let composed = raster::compose_side_by_side(&left, &right, self.options.gutter_px);
        let path = self.output_dir.join(page_file_name(page_number));
        if let Err(detail) = raster::write_png_atomic(&composed, &path) {
            failed(
                &mut result,
                PageRenderError::WriteFailed {
                    page: page_number,
                    detail,
                },
            );
            return result;
        }

        debug!(
            "Page {}/{} → {} ({}x{}, {} boxes)",
            page_number,
            total,
            path.display(),
            composed.width(),
            composed.height(),
            result.changes_drawn
        );
        result.width = composed.width();
        result.height = composed.height();
        result.path = Some(path);
        result.duration_ms = page_started.elapsed().as_millis() as u64;
        result
    }
}

fn column(index: usize) -> Column {
    if index == 0 {
        Column::Left
    } else {
        Column::Right
    }
}

fn column_index(column: Column) -> usize {
    match column {
        Column::Left => 0,
        Column::Right => 1,
    }
}

fn column_label(index: usize) -> &'static str {
    if index == 0 {
        FileSlot::File1.as_str()
    } else {
        FileSlot::File2.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_file_names_are_zero_padded() {
        assert_eq!(page_file_name(1), "page-001.png");
        assert_eq!(page_file_name(42), "page-042.png");
        assert_eq!(page_file_name(1234), "page-1234.png");
    }

    #[test]
    fn column_mapping_round_trips() {
        for i in 0..2 {
            assert_eq!(column_index(column(i)), i);
        }
    }
}
