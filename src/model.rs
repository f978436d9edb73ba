//! Wire and domain types.
//!
//! The backend speaks snake_case JSON (`job_id`, `differences_by_page`);
//! the rest of the crate works with the domain types below, which enforce
//! the job invariants on construction: a result exists only for a completed
//! job, and an error message only for a failed one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// ── Status ───────────────────────────────────────────────────────────────

/// Lifecycle of a comparison job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[serde(alias = "queued")]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` end polling and never revert.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Kind of a detected difference.
///
/// The backend has emitted both the noun form (`addition`) and the verb
/// form (`added`); both deserialize to the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    #[serde(alias = "added")]
    Addition,
    #[serde(alias = "removed")]
    Deletion,
    #[serde(alias = "changed")]
    Modification,
}

impl ChangeKind {
    /// Display colour for highlights of this kind.
    pub fn color(self) -> &'static str {
        match self {
            ChangeKind::Addition => "#22c55e",
            ChangeKind::Deletion => "#ef4444",
            ChangeKind::Modification => "#eab308",
        }
    }

    /// Stacking order: modifications draw over deletions over additions.
    pub fn z_index(self) -> u32 {
        match self {
            ChangeKind::Addition => 1,
            ChangeKind::Deletion => 2,
            ChangeKind::Modification => 3,
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

/// `POST /upload` → 201.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// `GET /jobs/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ComparisonResultData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Summary attached to a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResultData {
    pub total_differences: u32,
    pub pages_affected: u32,
    #[serde(default)]
    pub differences_by_page: BTreeMap<u32, PageDifferences>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageDifferences {
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub additions: Vec<Difference>,
    #[serde(default)]
    pub deletions: Vec<Difference>,
    #[serde(default)]
    pub modifications: Vec<Difference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Difference {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub location: DifferenceLocation,
    #[serde(default, alias = "text", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Rectangle in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifferenceLocation {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// `GET /jobs/{id}/diff`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffReport {
    #[serde(default)]
    pub pages: Vec<DiffPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffPage {
    pub page_number: u32,
    #[serde(default)]
    pub changes: Vec<Change>,
}

/// One change with its box as `[x1, y1, x2, y2]`, origin bottom-left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub bbox: [f32; 4],
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

impl DiffReport {
    /// Changes recorded for a 1-based page number.
    pub fn changes_for(&self, page_number: u32) -> &[Change] {
        self.pages
            .iter()
            .find(|p| p.page_number == page_number)
            .map(|p| p.changes.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_changes(&self) -> usize {
        self.pages.iter().map(|p| p.changes.len()).sum()
    }
}

/// Which uploaded document to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSlot {
    File1,
    File2,
}

impl FileSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            FileSlot::File1 => "file1",
            FileSlot::File2 => "file2",
        }
    }
}

/// Report formats offered by `GET /jobs/{id}/export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Html,
    Json,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Html => "html",
            ExportFormat::Json => "json",
        }
    }

    /// File extension for a saved report.
    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

// ── Domain types ─────────────────────────────────────────────────────────

/// A file chosen for upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    /// Local path; stays valid so a cancelled upload can be retried.
    pub path: PathBuf,
    /// 0–100.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A backend job as the client tracks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonJob {
    pub id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ComparisonResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&JobStatusResponse> for ComparisonJob {
    /// Keeps `result` only for a completed job and `error_message` only for
    /// a failed one, whatever else the response carried.
    fn from(r: &JobStatusResponse) -> Self {
        let result = match (r.status, &r.result) {
            (JobStatus::Completed, Some(data)) => {
                Some(ComparisonResult::from_wire(&r.job_id, data, r.updated_at))
            }
            (JobStatus::Completed, None) => Some(ComparisonResult::empty(&r.job_id, r.updated_at)),
            _ => None,
        };
        let error_message = match r.status {
            JobStatus::Failed => Some(
                r.error_message
                    .clone()
                    .unwrap_or_else(|| "Comparison failed. Please try again.".to_string()),
            ),
            _ => None,
        };
        Self {
            id: r.job_id.clone(),
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
            result,
            error_message,
        }
    }
}

/// Differences found for a completed job. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub job_id: String,
    pub total_differences: u32,
    pub pages_affected: u32,
    /// Sorted by page number.
    pub pages: Vec<Page>,
    pub generated_at: DateTime<Utc>,
}

impl ComparisonResult {
    fn from_wire(job_id: &str, data: &ComparisonResultData, fallback: DateTime<Utc>) -> Self {
        let pages = data
            .differences_by_page
            .iter()
            .map(|(number, diffs)| Page {
                number: diffs.page_number.unwrap_or(*number),
                additions: highlights(&diffs.additions),
                deletions: highlights(&diffs.deletions),
                modifications: highlights(&diffs.modifications),
            })
            .collect();
        Self {
            job_id: job_id.to_string(),
            total_differences: data.total_differences,
            pages_affected: data.pages_affected,
            pages,
            generated_at: data.generated_at.unwrap_or(fallback),
        }
    }

    fn empty(job_id: &str, generated_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.to_string(),
            total_differences: 0,
            pages_affected: 0,
            pages: Vec::new(),
            generated_at,
        }
    }

    pub fn page(&self, number: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.number == number)
    }
}

fn highlights(diffs: &[Difference]) -> Vec<DifferenceHighlight> {
    diffs
        .iter()
        .map(|d| DifferenceHighlight {
            id: d.id.clone(),
            kind: d.kind,
            location: d.location,
            color: d.kind.color().to_string(),
            z_index: d.kind.z_index(),
        })
        .collect()
}

/// Differences on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based.
    pub number: u32,
    pub additions: Vec<DifferenceHighlight>,
    pub deletions: Vec<DifferenceHighlight>,
    pub modifications: Vec<DifferenceHighlight>,
}

impl Page {
    pub fn total(&self) -> usize {
        self.additions.len() + self.deletions.len() + self.modifications.len()
    }
}

/// A difference ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferenceHighlight {
    pub id: String,
    pub kind: ChangeKind,
    pub location: DifferenceLocation,
    pub color: String,
    pub z_index: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETED: &str = r#"{
        "job_id": "j-1",
        "status": "completed",
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:02:00Z",
        "result": {
            "total_differences": 2,
            "pages_affected": 1,
            "differences_by_page": {
                "3": {
                    "additions": [{"id": "d1", "type": "added", "location": {"x": 1, "y": 2, "width": 3, "height": 4}, "text": "new"}],
                    "deletions": [{"id": "d2", "type": "deletion", "location": {"x": 5, "y": 6, "width": 7, "height": 8}}],
                    "modifications": []
                }
            },
            "generated_at": null
        },
        "error_message": "stale"
    }"#;

    #[test]
    fn completed_response_builds_result() {
        let resp: JobStatusResponse = serde_json::from_str(COMPLETED).unwrap();
        let job = ComparisonJob::from(&resp);
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error_message.is_none(), "error only allowed when failed");
        let result = job.result.expect("completed job carries a result");
        assert_eq!(result.pages.len(), 1);
        let page = result.page(3).unwrap();
        assert_eq!(page.additions[0].kind, ChangeKind::Addition);
        assert_eq!(page.additions[0].color, "#22c55e");
        assert_eq!(page.deletions[0].z_index, 2);
        assert_eq!(result.generated_at, resp.updated_at);
    }

    #[test]
    fn processing_response_drops_result() {
        let json = r#"{"job_id":"j","status":"processing","created_at":"2024-05-01T10:00:00Z",
            "updated_at":"2024-05-01T10:00:05Z","result":{"total_differences":0,"pages_affected":0}}"#;
        let resp: JobStatusResponse = serde_json::from_str(json).unwrap();
        let job = ComparisonJob::from(&resp);
        assert!(job.result.is_none());
        assert!(job.error_message.is_none());
    }

    #[test]
    fn failed_response_keeps_message() {
        let json = r#"{"job_id":"j","status":"failed","created_at":"2024-05-01T10:00:00Z",
            "updated_at":"2024-05-01T10:00:05Z","error_message":"encrypted input"}"#;
        let job = ComparisonJob::from(&serde_json::from_str::<JobStatusResponse>(json).unwrap());
        assert_eq!(job.error_message.as_deref(), Some("encrypted input"));
        assert!(job.result.is_none());
    }

    #[test]
    fn queued_is_pending() {
        let s: JobStatus = serde_json::from_str("\"queued\"").unwrap();
        assert_eq!(s, JobStatus::Pending);
        assert!(!s.is_terminal());
    }

    #[test]
    fn diff_report_parses_camel_case() {
        let json = r#"{"pages":[{"pageNumber":2,"changes":[
            {"type":"removed","bbox":[10,50,110,90],"text":"old"},
            {"type":"changed","bbox":[0,0,5,5],"text":"b","original":"a"}]}]}"#;
        let report: DiffReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.total_changes(), 2);
        assert_eq!(report.changes_for(2)[0].kind, ChangeKind::Deletion);
        assert_eq!(report.changes_for(2)[1].original.as_deref(), Some("a"));
        assert!(report.changes_for(1).is_empty());
    }
}
