use crate::models::ImageArtifact;

/// Linear undo/redo list of artifacts.
///
/// Index 0 is the uploaded original. Appending after an undo discards every
/// entry past the current position before the new artifact is pushed.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<ImageArtifact>,
    position: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_original(artifact: ImageArtifact) -> Self {
        let mut history = Self::new();
        history.reset(artifact);
        history
    }

    pub fn reset(&mut self, artifact: ImageArtifact) {
        self.entries.clear();
        self.entries.push(artifact);
        self.position = 0;
    }

    /// Drops every entry, including the original.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.position = 0;
    }

    pub fn append(&mut self, artifact: ImageArtifact) {
        if self.entries.is_empty() {
            self.reset(artifact);
            return;
        }

        let discarded = self.entries.len() - (self.position + 1);
        if discarded > 0 {
            log::debug!("Discarding {} redo entries", discarded);
        }
        self.entries.truncate(self.position + 1);
        self.entries.push(artifact);
        self.position = self.entries.len() - 1;
    }

    /// Returns `false` without moving when already at the original.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.position -= 1;
        true
    }

    /// Returns `false` without moving when already at the newest entry.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.position += 1;
        true
    }

    /// Moves to the original. Later entries stay reachable through redo.
    pub fn revert_to_original(&mut self) -> bool {
        let moved = self.position != 0;
        self.position = 0;
        moved
    }

    pub fn current(&self) -> Option<&ImageArtifact> {
        self.entries.get(self.position)
    }

    pub fn original(&self) -> Option<&ImageArtifact> {
        self.entries.first()
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.position < self.entries.len() - 1
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ImageArtifact] {
        &self.entries
    }
}
