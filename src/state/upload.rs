//! Upload state: the selection, progress and last error.

use crate::error::DiffClientError;
use crate::model::UploadedFile;
use crate::storage::{SessionStore, UploadDraft};
use crate::upload::UploadManager;
use crate::validation::{validate_files, FileCandidate};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

pub const CANCELLED_MESSAGE: &str = "Upload cancelled by user";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadState {
    pub selected_files: Vec<UploadedFile>,
    pub is_uploading: bool,
    /// 0–100.
    pub upload_progress: u8,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadAction {
    SelectFiles(Vec<UploadedFile>),
    /// A selection failed validation; the previous selection is kept.
    RejectSelection(String),
    RemoveFile(String),
    ClearAll,
    StartUpload,
    UpdateProgress(u8),
    UploadComplete,
    UploadError(String),
    CancelUpload,
}

/// Upload transition table.
pub fn reduce(state: &UploadState, action: UploadAction) -> UploadState {
    let mut next = state.clone();
    match action {
        UploadAction::SelectFiles(files) => {
            next.selected_files = files;
            next.upload_progress = 0;
            next.error = None;
        }
        UploadAction::RejectSelection(message) => {
            next.error = Some(message);
        }
        UploadAction::RemoveFile(id) => {
            next.selected_files.retain(|f| f.id != id);
            next.error = None;
        }
        UploadAction::ClearAll => {
            next.selected_files.clear();
            next.upload_progress = 0;
            next.error = None;
        }
        UploadAction::StartUpload => {
            next.is_uploading = true;
            next.upload_progress = 0;
            next.error = None;
            for f in &mut next.selected_files {
                f.progress = 0;
                f.error = None;
            }
        }
        UploadAction::UpdateProgress(pct) => {
            if next.is_uploading {
                let pct = pct.min(100);
                next.upload_progress = pct;
                for f in &mut next.selected_files {
                    f.progress = pct;
                }
            }
        }
        UploadAction::UploadComplete => {
            next.is_uploading = false;
            next.upload_progress = 100;
            next.selected_files.clear();
            next.error = None;
        }
        UploadAction::UploadError(message) => {
            next.is_uploading = false;
            for f in &mut next.selected_files {
                f.error = Some(message.clone());
            }
            next.error = Some(message);
        }
        UploadAction::CancelUpload => {
            next.is_uploading = false;
            next.upload_progress = 0;
            for f in &mut next.selected_files {
                f.progress = 0;
            }
            next.error = Some(CANCELLED_MESSAGE.to_string());
        }
    }
    next
}

/// Owns the upload state and drives the [`UploadManager`].
pub struct UploadStore {
    tx: Arc<watch::Sender<UploadState>>,
    manager: Arc<UploadManager>,
    session: Option<Arc<SessionStore>>,
}

impl UploadStore {
    pub fn new(manager: Arc<UploadManager>, session: Option<Arc<SessionStore>>) -> Self {
        let (tx, _rx) = watch::channel(UploadState::default());
        Self {
            tx: Arc::new(tx),
            manager,
            session,
        }
    }

    pub fn state(&self) -> UploadState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.tx.subscribe()
    }

    pub fn dispatch(&self, action: UploadAction) {
        dispatch(&self.tx, action);
    }

    /// The draft saved by an earlier session, if still fresh.
    pub fn restored_draft(&self) -> Option<UploadDraft> {
        self.session.as_ref()?.load_upload_draft()
    }

    /// Validate and select files. An invalid selection leaves the current
    /// one in place and records the error.
    pub fn select_files(&self, candidates: Vec<FileCandidate>) -> Result<(), DiffClientError> {
        if let Err(errors) = validate_files(&candidates) {
            let err = DiffClientError::Validation(errors);
            self.dispatch(UploadAction::RejectSelection(err.to_string()));
            return Err(err);
        }
        let files: Vec<UploadedFile> = candidates.into_iter().map(to_uploaded).collect();
        debug!("Selected {} files", files.len());
        self.dispatch(UploadAction::SelectFiles(files));
        self.save_draft();
        Ok(())
    }

    pub fn remove_file(&self, id: &str) {
        self.dispatch(UploadAction::RemoveFile(id.to_string()));
        self.save_draft();
    }

    pub fn clear_all(&self) {
        self.dispatch(UploadAction::ClearAll);
        if let Some(session) = &self.session {
            session.clear_upload_draft();
        }
    }

    /// Upload the current selection and return the new job id.
    pub async fn submit(&self) -> Result<String, DiffClientError> {
        let snapshot = self.state();
        if snapshot.is_uploading {
            return Err(DiffClientError::Internal(
                "an upload is already in progress".into(),
            ));
        }
        let candidates: Vec<FileCandidate> =
            snapshot.selected_files.iter().map(to_candidate).collect();
        if let Err(errors) = validate_files(&candidates) {
            let err = DiffClientError::Validation(errors);
            self.dispatch(UploadAction::RejectSelection(err.to_string()));
            return Err(err);
        }

        self.dispatch(UploadAction::StartUpload);
        let tx = self.tx.clone();
        let result = self
            .manager
            .upload(&candidates[0], &candidates[1], move |pct| {
                if pct < 100 {
                    dispatch(&tx, UploadAction::UpdateProgress(pct));
                }
            })
            .await;

        match result {
            Ok(job_id) => {
                self.dispatch(UploadAction::UploadComplete);
                if let Some(session) = &self.session {
                    session.clear_upload_draft();
                    session.save_last_job_id(&job_id);
                }
                info!("Upload complete: job {}", job_id);
                Ok(job_id)
            }
            Err(e) if e.is_cancellation() => {
                self.dispatch(UploadAction::CancelUpload);
                Err(e)
            }
            Err(e) => {
                self.dispatch(UploadAction::UploadError(e.user_message()));
                Err(e)
            }
        }
    }

    /// Cancel the in-flight upload. The selection is kept for a retry.
    pub fn cancel(&self) {
        if self.manager.cancel() {
            debug!("Cancel requested");
        }
    }

    fn save_draft(&self) {
        if let Some(session) = &self.session {
            let files = &self.tx.borrow().selected_files;
            if files.is_empty() {
                session.clear_upload_draft();
            } else {
                session.save_upload_draft(files);
            }
        }
    }
}

fn dispatch(tx: &watch::Sender<UploadState>, action: UploadAction) {
    tx.send_modify(|state| *state = reduce(state, action));
}

fn to_uploaded(c: FileCandidate) -> UploadedFile {
    UploadedFile {
        id: uuid::Uuid::new_v4().to_string(),
        name: c.name,
        size: c.size,
        mime_type: c.mime_type,
        path: c.path,
        progress: 0,
        error: None,
        uploaded_at: None,
    }
}

fn to_candidate(f: &UploadedFile) -> FileCandidate {
    FileCandidate::new(f.path.clone(), f.name.clone(), f.size, f.mime_type.clone())
}
