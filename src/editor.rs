//! The editing orchestrator.
//!
//! An [`Editor`] owns the current [`EditSession`] and the `Idle / Busy /
//! Error` state. Every operation takes `&self`, so one editor can be shared
//! between the caller and a spawned task; mutual exclusion is the busy flag,
//! and the state lock is never held across an await.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::{
    builder::RequestBuilder,
    cancel::CancelToken,
    config::EditorConfig,
    error::{EditError, Result},
    logger,
    models::{
        AdjustmentPreset, BoundingBox, FilterPreset, FocusPoint, ImageArtifact, OperationResult,
        TaskKind,
    },
    service::{self, ImageService},
    session::{DisplayHandle, DisplaySurface, EditSession},
    transform::{self, CropRect, ExportFormat, ResizeMode},
    validator,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    Busy(TaskKind),
    Error(String),
}

impl EditorState {
    pub fn is_busy(&self) -> bool {
        matches!(self, EditorState::Busy(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            EditorState::Error(message) => Some(message),
            _ => None,
        }
    }
}

struct Inner {
    state: EditorState,
    session: Option<EditSession>,
}

pub struct Editor {
    service: Arc<dyn ImageService>,
    builder: RequestBuilder,
    inner: Mutex<Inner>,
    request_timeout: Duration,
}

impl Editor {
    pub fn new(service: Arc<dyn ImageService>, config: &EditorConfig) -> Self {
        Self::with_timeout(service, config.request_timeout)
    }

    pub fn with_timeout(service: Arc<dyn ImageService>, request_timeout: Duration) -> Self {
        Self {
            service,
            builder: RequestBuilder::new(),
            inner: Mutex::new(Inner {
                state: EditorState::Idle,
                session: None,
            }),
            request_timeout,
        }
    }

    /// Validates `config`, builds its transport and wraps it in an editor.
    pub async fn connect(config: &EditorConfig) -> Result<Self> {
        let service = service::connect(config).await?;
        logger::log_config_info(config);
        Ok(Self::new(service, config))
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub fn state(&self) -> EditorState {
        self.lock().state.clone()
    }

    /// Starts a new session from an upload. Handles held by the previous
    /// session are released.
    pub fn load(&self, artifact: ImageArtifact) -> Result<()> {
        self.install(artifact, EditSession::new)
    }

    pub fn load_with_surface(
        &self,
        artifact: ImageArtifact,
        surface: Box<dyn DisplaySurface>,
    ) -> Result<()> {
        self.install(artifact, |artifact| EditSession::with_surface(artifact, surface))
    }

    fn install(
        &self,
        artifact: ImageArtifact,
        open: impl FnOnce(ImageArtifact) -> EditSession,
    ) -> Result<()> {
        let mut inner = self.lock();
        if let EditorState::Busy(active) = inner.state {
            log::warn!("Upload rejected: {} in progress", active);
            return Err(EditError::Busy);
        }
        if artifact.is_empty() {
            let err = EditError::InvalidInput("The uploaded file is empty.".into());
            inner.state = EditorState::Error(err.user_message());
            return Err(err);
        }

        log::info!("📥 Loaded {} ({} bytes)", artifact.mime_type(), artifact.len());
        inner.session = Some(open(artifact));
        inner.state = EditorState::Idle;
        Ok(())
    }

    /// Sets or clears the retouch focus on the current artifact.
    pub fn set_focus_point(&self, focus: Option<FocusPoint>) -> Result<()> {
        let mut inner = self.lock();
        let session = inner
            .session
            .as_mut()
            .ok_or_else(|| EditError::InvalidInput("Please upload an image first.".into()))?;
        session.set_focus(focus);
        Ok(())
    }

    /// Localized retouch at the pending focus point.
    pub async fn edit(&self, prompt: &str, cancel: &CancelToken) -> Result<ImageArtifact> {
        let focus = self.focus();
        self.run_remote(TaskKind::Retouch, Some(prompt), focus, cancel)
            .await
            .and_then(into_image)
    }

    pub async fn edit_at(
        &self,
        prompt: &str,
        focus: FocusPoint,
        cancel: &CancelToken,
    ) -> Result<ImageArtifact> {
        self.set_focus_point(Some(focus))?;
        self.edit(prompt, cancel).await
    }

    pub async fn apply_filter(&self, prompt: &str, cancel: &CancelToken) -> Result<ImageArtifact> {
        self.run_remote(TaskKind::Filter, Some(prompt), None, cancel)
            .await
            .and_then(into_image)
    }

    pub async fn apply_filter_preset(
        &self,
        preset: FilterPreset,
        cancel: &CancelToken,
    ) -> Result<ImageArtifact> {
        self.apply_filter(preset.instruction(), cancel).await
    }

    pub async fn apply_adjustment(&self, prompt: &str, cancel: &CancelToken) -> Result<ImageArtifact> {
        self.run_remote(TaskKind::Adjustment, Some(prompt), None, cancel)
            .await
            .and_then(into_image)
    }

    pub async fn apply_adjustment_preset(
        &self,
        preset: AdjustmentPreset,
        cancel: &CancelToken,
    ) -> Result<ImageArtifact> {
        self.apply_adjustment(preset.instruction(), cancel).await
    }

    pub async fn enhance(&self, cancel: &CancelToken) -> Result<ImageArtifact> {
        self.run_remote(TaskKind::Enhance, None, None, cancel)
            .await
            .and_then(into_image)
    }

    pub async fn remove_background(&self, cancel: &CancelToken) -> Result<ImageArtifact> {
        self.run_remote(TaskKind::BackgroundRemoval, None, None, cancel)
            .await
            .and_then(into_image)
    }

    /// OCR. The text is kept with the session until the artifact changes.
    pub async fn extract_text(&self, cancel: &CancelToken) -> Result<String> {
        match self.run_remote(TaskKind::Ocr, None, None, cancel).await? {
            OperationResult::Text(text) => Ok(text),
            other => Err(unexpected("text", &other)),
        }
    }

    /// Face boxes in normalized coordinates; out-of-range boxes are dropped.
    pub async fn detect_faces(&self, cancel: &CancelToken) -> Result<Vec<BoundingBox>> {
        match self.run_remote(TaskKind::FaceDetect, None, None, cancel).await? {
            OperationResult::Faces(faces) => Ok(faces),
            other => Err(unexpected("face boxes", &other)),
        }
    }

    pub fn crop(&self, rect: CropRect) -> Result<ImageArtifact> {
        self.run_local(TaskKind::Crop, |source| transform::crop(source, rect))
    }

    pub fn resize(&self, width: u32, height: u32, mode: ResizeMode) -> Result<ImageArtifact> {
        self.run_local(TaskKind::Resize, |source| {
            transform::resize(source, width, height, mode)
        })
    }

    pub fn undo(&self) -> Result<bool> {
        self.navigate("undo", EditSession::undo)
    }

    pub fn redo(&self) -> Result<bool> {
        self.navigate("redo", EditSession::redo)
    }

    /// Returns to the uploaded original, keeping later entries for redo.
    pub fn start_over(&self) -> Result<bool> {
        self.navigate("start over", EditSession::revert_to_original)
    }

    /// Encodes the current artifact for download. History is not touched.
    pub fn export(&self, format: ExportFormat) -> Result<ImageArtifact> {
        let current = self
            .current()
            .ok_or_else(|| EditError::InvalidInput("There is no image to export.".into()))?;
        let exported = transform::export(&current, format)?;
        log::info!("💾 Exported {} ({} bytes)", exported.mime_type(), exported.len());
        Ok(exported)
    }

    /// Original and current artifact, for a before/after view.
    pub fn compare(&self) -> Option<(ImageArtifact, ImageArtifact)> {
        self.with_session(|session| {
            session
                .compare()
                .map(|(original, current)| (original.clone(), current.clone()))
        })
        .flatten()
    }

    pub fn current(&self) -> Option<ImageArtifact> {
        self.with_session(|session| session.current().cloned()).flatten()
    }

    pub fn original(&self) -> Option<ImageArtifact> {
        self.with_session(|session| session.original().cloned()).flatten()
    }

    pub fn focus(&self) -> Option<FocusPoint> {
        self.with_session(EditSession::focus).flatten()
    }

    pub fn extracted_text(&self) -> Option<String> {
        self.with_session(|session| session.transient().extracted_text.clone())
            .flatten()
    }

    pub fn faces(&self) -> Option<Vec<BoundingBox>> {
        self.with_session(|session| session.transient().faces.clone())
            .flatten()
    }

    pub fn can_undo(&self) -> bool {
        self.with_session(|session| session.history().can_undo())
            .unwrap_or(false)
    }

    pub fn can_redo(&self) -> bool {
        self.with_session(|session| session.history().can_redo())
            .unwrap_or(false)
    }

    pub fn current_display(&self) -> Option<DisplayHandle> {
        self.with_session(|session| session.current_display().cloned())
            .flatten()
    }

    /// Runs `f` against the session, if one is loaded.
    pub fn with_session<R>(&self, f: impl FnOnce(&EditSession) -> R) -> Option<R> {
        self.lock().session.as_ref().map(f)
    }

    async fn run_remote(
        &self,
        kind: TaskKind,
        text: Option<&str>,
        focus: Option<FocusPoint>,
        cancel: &CancelToken,
    ) -> Result<OperationResult> {
        let (guard, source) = self.begin(kind)?;
        let _timer = logger::timer(&format!("{} via {}", kind, self.service.name()));

        match self.call_service(kind, &source, text, focus, cancel).await {
            Ok(result) => {
                self.apply(&result);
                guard.succeed();
                Ok(result)
            }
            Err(err) => {
                guard.fail(&err);
                Err(err)
            }
        }
    }

    async fn call_service(
        &self,
        kind: TaskKind,
        source: &ImageArtifact,
        text: Option<&str>,
        focus: Option<FocusPoint>,
        cancel: &CancelToken,
    ) -> Result<OperationResult> {
        let request = self.builder.build(source, kind, text, focus)?;
        log::info!("🎨 Starting {} ({} byte source)", kind, source.len());

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EditError::Cancelled),
            invoked = tokio::time::timeout(self.request_timeout, self.service.invoke(&request)) => {
                match invoked {
                    Ok(response) => response,
                    Err(_) => Err(EditError::TimedOut(self.request_timeout)),
                }
            }
        };
        let response = outcome?;

        validator::interpret(&response, request.expected_output(), kind.as_str())
    }

    fn apply(&self, result: &OperationResult) {
        let mut inner = self.lock();
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        match result {
            OperationResult::Image(artifact) => session.commit(artifact.clone()),
            OperationResult::Text(text) => session.record_text(text.clone()),
            OperationResult::Faces(faces) => session.record_faces(faces.clone()),
        }
    }

    fn run_local(
        &self,
        kind: TaskKind,
        op: impl FnOnce(&ImageArtifact) -> Result<ImageArtifact>,
    ) -> Result<ImageArtifact> {
        let (guard, source) = self.begin(kind)?;
        let _timer = logger::timer(kind.as_str());

        match op(&source) {
            Ok(artifact) => {
                self.apply(&OperationResult::Image(artifact.clone()));
                guard.succeed();
                Ok(artifact)
            }
            Err(err) => {
                guard.fail(&err);
                Err(err)
            }
        }
    }

    /// Marks the editor busy with `kind` and snapshots the current artifact.
    fn begin(&self, kind: TaskKind) -> Result<(BusyGuard<'_>, ImageArtifact)> {
        let mut inner = self.lock();
        if let EditorState::Busy(active) = inner.state {
            log::warn!("{} rejected: {} in progress", kind, active);
            return Err(EditError::Busy);
        }

        let Some(source) = inner.session.as_ref().and_then(|s| s.current()).cloned() else {
            let err = EditError::InvalidInput("Please upload an image first.".into());
            inner.state = EditorState::Error(err.user_message());
            return Err(err);
        };

        inner.state = EditorState::Busy(kind);
        Ok((
            BusyGuard {
                inner: &self.inner,
                settled: false,
            },
            source,
        ))
    }

    fn navigate(&self, action: &str, step: fn(&mut EditSession) -> bool) -> Result<bool> {
        let mut inner = self.lock();
        if let EditorState::Busy(active) = inner.state {
            log::warn!("{} rejected: {} in progress", action, active);
            return Err(EditError::Busy);
        }
        inner.state = EditorState::Idle;

        let moved = inner.session.as_mut().map(step).unwrap_or(false);
        if moved {
            log::debug!("↩️  {}", action);
        }
        Ok(moved)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the busy flag for one operation. Dropping it unsettled, e.g. when
/// the operation future is dropped mid-call, leaves the editor in `Error`.
struct BusyGuard<'a> {
    inner: &'a Mutex<Inner>,
    settled: bool,
}

impl BusyGuard<'_> {
    fn succeed(mut self) {
        self.settle(EditorState::Idle);
    }

    fn fail(mut self, err: &EditError) {
        log::warn!("Operation failed: {}", err);
        self.settle(EditorState::Error(err.user_message()));
    }

    fn settle(&mut self, state: EditorState) {
        lock_inner(self.inner).state = state;
        self.settled = true;
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            log::warn!("Operation dropped before completion");
            self.settle(EditorState::Error(EditError::Cancelled.user_message()));
        }
    }
}

fn into_image(result: OperationResult) -> Result<ImageArtifact> {
    match result {
        OperationResult::Image(artifact) => Ok(artifact),
        other => Err(unexpected("an image", &other)),
    }
}

fn unexpected(wanted: &str, result: &OperationResult) -> EditError {
    let got = match result {
        OperationResult::Image(_) => "an image",
        OperationResult::Text(_) => "text",
        OperationResult::Faces(_) => "face boxes",
    };
    EditError::InvalidFormat(format!("expected {}, got {}", wanted, got))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EditRequest, ServiceResponse};
    use async_trait::async_trait;

    struct Fixed(ServiceResponse);

    #[async_trait]
    impl ImageService for Fixed {
        async fn invoke(&self, _request: &EditRequest) -> Result<ServiceResponse> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn editor(response: ServiceResponse) -> Editor {
        Editor::with_timeout(Arc::new(Fixed(response)), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn operations_without_upload_are_rejected() {
        let editor = editor(ServiceResponse::new().with_image("image/png", "AQID"));
        let err = editor.enhance(&CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, EditError::InvalidInput(_)));
        assert_eq!(
            editor.state(),
            EditorState::Error("Please upload an image first.".into())
        );
        assert!(editor.export(ExportFormat::Png).is_err());
    }

    #[tokio::test]
    async fn successful_image_commits_and_returns_to_idle() {
        let editor = editor(ServiceResponse::new().with_image("image/png", "AQID"));
        editor.load(ImageArtifact::new(vec![9], "image/png")).unwrap();

        let result = editor.enhance(&CancelToken::new()).await.unwrap();
        assert_eq!(result.data(), &[1, 2, 3]);
        assert_eq!(editor.state(), EditorState::Idle);
        assert!(editor.can_undo());
        assert_eq!(editor.current().unwrap(), result);
    }

    #[tokio::test]
    async fn navigation_clears_a_previous_error() {
        let editor = editor(ServiceResponse::new().with_block("SAFETY", None));
        editor.load(ImageArtifact::new(vec![9], "image/png")).unwrap();
        assert!(editor.enhance(&CancelToken::new()).await.is_err());
        assert!(editor.state().error().is_some());

        assert!(!editor.undo().unwrap());
        assert_eq!(editor.state(), EditorState::Idle);
    }

    #[test]
    fn empty_upload_is_invalid() {
        let editor = editor(ServiceResponse::new());
        assert!(matches!(
            editor.load(ImageArtifact::new(Vec::new(), "image/png")),
            Err(EditError::InvalidInput(_))
        ));
        assert!(editor.current().is_none());
    }
}
