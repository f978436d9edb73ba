//! Result types produced by the page renderer.

use crate::error::{Column, PageRenderError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything produced by one render of a comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedComparison {
    /// Directory the page images were written to.
    pub output_dir: PathBuf,
    /// Page count of each document: `[file1, file2]`.
    pub page_counts: [usize; 2],
    /// One entry per selected page, in page order.
    pub pages: Vec<RenderedPage>,
    pub stats: RenderStats,
}

impl RenderedComparison {
    /// Pages that rendered and were written.
    pub fn written(&self) -> impl Iterator<Item = &RenderedPage> {
        self.pages.iter().filter(|p| p.error.is_none())
    }

    pub fn failed(&self) -> impl Iterator<Item = &RenderedPage> {
        self.pages.iter().filter(|p| p.error.is_some())
    }
}

/// Outcome for a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPage {
    /// 1-indexed.
    pub page_number: usize,
    /// Written image; `None` when the page failed.
    pub path: Option<PathBuf>,
    /// Size of the composed image in pixels.
    pub width: u32,
    pub height: u32,
    /// Columns with no page at this index (the shorter document ran out).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<Column>,
    /// Difference boxes drawn across both columns.
    pub changes_drawn: usize,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PageRenderError>,
}

/// Aggregate statistics for a render.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderStats {
    /// Pages selected for rendering.
    pub total_pages: usize,
    pub rendered_pages: usize,
    pub failed_pages: usize,
    /// Page slots skipped because one document is shorter.
    pub skipped_columns: usize,
    pub changes_drawn: usize,
    pub total_duration_ms: u64,
}

impl RenderStats {
    pub fn from_pages(pages: &[RenderedPage], total_duration_ms: u64) -> Self {
        Self {
            total_pages: pages.len(),
            rendered_pages: pages.iter().filter(|p| p.error.is_none()).count(),
            failed_pages: pages.iter().filter(|p| p.error.is_some()).count(),
            skipped_columns: pages.iter().map(|p| p.missing.len()).sum(),
            changes_drawn: pages.iter().map(|p| p.changes_drawn).sum(),
            total_duration_ms,
        }
    }
}
