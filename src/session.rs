//! Per-upload editing context: the history, transient per-artifact state,
//! and the display handles for what is currently on screen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    history::History,
    models::{BoundingBox, FocusPoint, ImageArtifact},
};

/// Something a renderer can draw an artifact from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayHandle {
    pub artifact_id: Uuid,
    pub url: String,
}

/// Creates and frees display handles.
///
/// Every handle returned by `acquire` is passed back to `release` exactly
/// once, when its artifact leaves the screen or the session ends.
pub trait DisplaySurface: Send {
    fn acquire(&mut self, artifact: &ImageArtifact) -> DisplayHandle;
    fn release(&mut self, handle: DisplayHandle);
}

/// Default surface: handles are `data:` URLs. Clones share the live-handle
/// counter.
#[derive(Debug, Clone, Default)]
pub struct DataUrlSurface {
    live: Arc<AtomicUsize>,
}

impl DataUrlSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl DisplaySurface for DataUrlSurface {
    fn acquire(&mut self, artifact: &ImageArtifact) -> DisplayHandle {
        self.live.fetch_add(1, Ordering::SeqCst);
        DisplayHandle {
            artifact_id: artifact.id(),
            url: artifact.to_data_url(),
        }
    }

    fn release(&mut self, _handle: DisplayHandle) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// State that belongs to the artifact currently shown and is meaningless
/// once a different one is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransientState {
    pub focus: Option<FocusPoint>,
    pub extracted_text: Option<String>,
    pub faces: Option<Vec<BoundingBox>>,
}

impl TransientState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

struct DisplaySlots {
    surface: Box<dyn DisplaySurface>,
    current: Option<DisplayHandle>,
    original: Option<DisplayHandle>,
}

impl DisplaySlots {
    fn sync(&mut self, current: Option<&ImageArtifact>, original: Option<&ImageArtifact>) {
        Self::sync_slot(self.surface.as_mut(), &mut self.current, current);
        Self::sync_slot(self.surface.as_mut(), &mut self.original, original);
    }

    fn sync_slot(
        surface: &mut dyn DisplaySurface,
        slot: &mut Option<DisplayHandle>,
        target: Option<&ImageArtifact>,
    ) {
        let up_to_date = match (slot.as_ref(), target) {
            (Some(handle), Some(artifact)) => handle.artifact_id == artifact.id(),
            (None, None) => true,
            _ => false,
        };
        if up_to_date {
            return;
        }
        if let Some(stale) = slot.take() {
            surface.release(stale);
        }
        *slot = target.map(|artifact| surface.acquire(artifact));
    }

    fn release_all(&mut self) {
        for handle in [self.current.take(), self.original.take()].into_iter().flatten() {
            self.surface.release(handle);
        }
    }
}

impl Drop for DisplaySlots {
    fn drop(&mut self) {
        self.release_all();
    }
}

pub struct EditSession {
    history: History,
    transient: TransientState,
    display: DisplaySlots,
}

impl EditSession {
    pub fn new(original: ImageArtifact) -> Self {
        Self::with_surface(original, Box::new(DataUrlSurface::new()))
    }

    pub fn with_surface(original: ImageArtifact, surface: Box<dyn DisplaySurface>) -> Self {
        let mut session = Self {
            history: History::with_original(original),
            transient: TransientState::default(),
            display: DisplaySlots {
                surface,
                current: None,
                original: None,
            },
        };
        session.refresh_display();
        session
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn current(&self) -> Option<&ImageArtifact> {
        self.history.current()
    }

    pub fn original(&self) -> Option<&ImageArtifact> {
        self.history.original()
    }

    /// Original and current, for a before/after comparison.
    pub fn compare(&self) -> Option<(&ImageArtifact, &ImageArtifact)> {
        Some((self.history.original()?, self.history.current()?))
    }

    /// Appends a new artifact. Transient state tied to the superseded
    /// artifact is dropped.
    pub fn commit(&mut self, artifact: ImageArtifact) {
        self.history.append(artifact);
        self.transient.clear();
        self.refresh_display();
    }

    pub fn undo(&mut self) -> bool {
        self.navigate(History::undo)
    }

    pub fn redo(&mut self) -> bool {
        self.navigate(History::redo)
    }

    pub fn revert_to_original(&mut self) -> bool {
        self.navigate(History::revert_to_original)
    }

    fn navigate(&mut self, step: fn(&mut History) -> bool) -> bool {
        let moved = step(&mut self.history);
        if moved {
            self.transient.clear();
            self.refresh_display();
        }
        moved
    }

    pub fn transient(&self) -> &TransientState {
        &self.transient
    }

    pub fn focus(&self) -> Option<FocusPoint> {
        self.transient.focus
    }

    pub fn set_focus(&mut self, focus: Option<FocusPoint>) {
        self.transient.focus = focus;
    }

    pub fn record_text(&mut self, text: String) {
        self.transient.extracted_text = Some(text);
    }

    pub fn record_faces(&mut self, faces: Vec<BoundingBox>) {
        self.transient.faces = Some(faces);
    }

    pub fn current_display(&self) -> Option<&DisplayHandle> {
        self.display.current.as_ref()
    }

    pub fn original_display(&self) -> Option<&DisplayHandle> {
        self.display.original.as_ref()
    }

    fn refresh_display(&mut self) {
        self.display
            .sync(self.history.current(), self.history.original());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(tag: u8) -> ImageArtifact {
        ImageArtifact::new(vec![tag], "image/png")
    }

    #[test]
    fn commit_clears_transient_state() {
        let mut session = EditSession::new(artifact(1));
        session.set_focus(Some(FocusPoint::new(3, 4)));
        session.record_text("hello".into());
        session.record_faces(vec![BoundingBox::new(0.1, 0.1, 0.2, 0.2)]);

        session.commit(artifact(2));
        assert_eq!(session.transient(), &TransientState::default());
        assert_eq!(session.current().unwrap().data(), &[2]);
    }

    #[test]
    fn display_handles_follow_the_current_artifact() {
        let surface = DataUrlSurface::new();
        let mut session = EditSession::with_surface(artifact(1), Box::new(surface.clone()));
        let original_id = session.original().unwrap().id();
        assert_eq!(surface.live_handles(), 2);

        for tag in 2..20 {
            session.commit(artifact(tag));
        }
        // One for the current artifact, one for the original.
        assert_eq!(surface.live_handles(), 2);
        assert_eq!(
            session.current_display().unwrap().artifact_id,
            session.current().unwrap().id()
        );
        assert_eq!(session.original_display().unwrap().artifact_id, original_id);

        session.undo();
        assert_eq!(surface.live_handles(), 2);

        drop(session);
        assert_eq!(surface.live_handles(), 0);
    }

    #[test]
    fn undo_and_redo_drop_stale_focus() {
        let mut session = EditSession::new(artifact(1));
        session.commit(artifact(2));
        session.set_focus(Some(FocusPoint::new(1, 1)));
        assert!(session.undo());
        assert_eq!(session.focus(), None);

        session.set_focus(Some(FocusPoint::new(1, 1)));
        assert!(!session.undo());
        assert_eq!(session.focus(), Some(FocusPoint::new(1, 1)));
    }

    #[test]
    fn compare_pairs_original_with_current() {
        let mut session = EditSession::new(artifact(1));
        session.commit(artifact(2));
        let (before, after) = session.compare().unwrap();
        assert_eq!(before.data(), &[1]);
        assert_eq!(after.data(), &[2]);
    }
}
