use crate::models::Track;

pub mod library;

pub use library::{expand_folders, is_supported_format, resolve_paths, scan_folder, SUPPORTED_EXTENSIONS};

/// Ordered track list with a wrap-around cursor.
///
/// The cursor is `None` exactly when the playlist is empty.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
    current_index: Option<usize>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents and reset the cursor to the first track
    pub fn load(&mut self, tracks: Vec<Track>) {
        self.current_index = if tracks.is_empty() { None } else { Some(0) };
        self.tracks = tracks;
    }

    /// Move forward, wrapping to the first track past the end
    pub fn advance(&mut self) -> Option<&Track> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        let next = self.current_index.map_or(0, |index| (index + 1) % len);
        self.current_index = Some(next);
        self.tracks.get(next)
    }

    /// Move backward, wrapping to the last track before the start
    pub fn retreat(&mut self) -> Option<&Track> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        let previous = self.current_index.map_or(0, |index| (index + len - 1) % len);
        self.current_index = Some(previous);
        self.tracks.get(previous)
    }

    pub fn current(&self) -> Option<&Track> {
        self.current_index.and_then(|index| self.tracks.get(index))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// True when the cursor sits on the final track
    pub fn is_at_last(&self) -> bool {
        matches!(self.current_index, Some(index) if index + 1 == self.tracks.len())
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
