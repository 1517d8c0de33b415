use std::path::Path;
use walkdir::WalkDir;
use crate::error::PlaylistError;
use crate::models::Track;

/// Extensions offered to the decoder backend
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac"];

/// Check if a file has a supported audio extension (case-insensitive)
pub fn is_supported_format(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Collect supported audio files in `dir`, sorted by path
pub fn scan_folder(dir: &Path, recursive: bool) -> Result<Vec<Track>, PlaylistError> {
    if !dir.is_dir() {
        return Err(PlaylistError::NotADirectory {
            path: dir.to_string_lossy().to_string(),
        });
    }

    // Symlinked folders are not entered, so a link back up the tree cannot loop
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 });

    let mut audio_files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if path.is_file() && is_supported_format(path) {
            audio_files.push(entry.into_path());
        }
    }
    audio_files.sort();

    if audio_files.is_empty() {
        return Err(PlaylistError::NoAudioFiles {
            path: dir.to_string_lossy().to_string(),
        });
    }

    Ok(audio_files.into_iter().map(Track::new).collect())
}

/// Resolve relative paths against the media root; absolute paths pass through
pub fn resolve_paths<I, P>(media_root: Option<&Path>, paths: I) -> Vec<Track>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    paths
        .into_iter()
        .map(|path| {
            let path = path.as_ref();
            match media_root {
                Some(root) if path.is_relative() => Track::new(root.join(path)),
                _ => Track::new(path),
            }
        })
        .collect()
}

/// Replace folder entries with the audio files they contain; files pass through unchanged
pub fn expand_folders(tracks: Vec<Track>, recursive: bool) -> Result<Vec<Track>, PlaylistError> {
    let mut expanded = Vec::with_capacity(tracks.len());
    for track in tracks {
        if track.path().is_dir() {
            expanded.extend(scan_folder(track.path(), recursive)?);
        } else {
            expanded.push(track);
        }
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"not really audio").unwrap();
        path
    }

    #[test]
    fn test_supported_formats() {
        assert!(is_supported_format(Path::new("story.MP3")));
        assert!(is_supported_format(Path::new("song.flac")));
        assert!(is_supported_format(Path::new("clip.aac")));
        assert!(!is_supported_format(Path::new("cover.jpg")));
        assert!(!is_supported_format(Path::new("README")));
    }

    #[test]
    fn test_scan_folder_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "b.wav");
        touch(temp_dir.path(), "a.mp3");
        touch(temp_dir.path(), "notes.txt");
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        touch(&sub, "c.ogg");

        let tracks = scan_folder(temp_dir.path(), false).unwrap();
        let names: Vec<String> = tracks.iter().map(|t| t.display_name()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let tracks = scan_folder(temp_dir.path(), true).unwrap();
        assert_eq!(tracks.len(), 3);
        assert!(tracks.iter().any(|t| t.path().ends_with("sub/c.ogg")));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_folder_skips_symlink_loops() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.wav");
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        touch(&sub, "b.wav");
        std::os::unix::fs::symlink(temp_dir.path(), sub.join("loop")).unwrap();
        std::os::unix::fs::symlink(temp_dir.path(), temp_dir.path().join("self")).unwrap();

        let tracks = scan_folder(temp_dir.path(), true).unwrap();
        let names: Vec<String> = tracks.iter().map(|t| t.display_name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_scan_folder_errors() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "readme.txt");

        match scan_folder(temp_dir.path(), true) {
            Err(PlaylistError::NoAudioFiles { .. }) => {}
            other => panic!("Expected NoAudioFiles, got {:?}", other),
        }

        let file = touch(temp_dir.path(), "a.wav");
        match scan_folder(&file, false) {
            Err(PlaylistError::NotADirectory { .. }) => {}
            other => panic!("Expected NotADirectory, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_paths_against_media_root() {
        let root = Path::new("/srv/audio");
        let tracks = resolve_paths(Some(root), ["story.mp3", "/tmp/abs.wav"]);

        assert_eq!(tracks[0].path(), Path::new("/srv/audio/story.mp3"));
        assert_eq!(tracks[1].path(), Path::new("/tmp/abs.wav"));

        let tracks = resolve_paths(None, ["story.mp3"]);
        assert_eq!(tracks[0].path(), Path::new("story.mp3"));
    }

    #[test]
    fn test_expand_folders_keeps_order() {
        let temp_dir = TempDir::new().unwrap();
        let album = temp_dir.path().join("album");
        fs::create_dir(&album).unwrap();
        touch(&album, "02.mp3");
        touch(&album, "01.mp3");

        let tracks = vec![
            Track::new("/media/intro.wav"),
            Track::new(album.clone()),
            Track::new("/media/outro.wav"),
        ];
        let expanded = expand_folders(tracks, false).unwrap();
        let names: Vec<String> = expanded.iter().map(|t| t.display_name()).collect();

        assert_eq!(names, vec!["intro", "01", "02", "outro"]);
    }
}
