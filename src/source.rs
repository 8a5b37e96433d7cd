//! Classification of a dataset root into sequences.
//!
//! The filesystem shape of the root is inspected once, when the dataset is
//! opened, and recorded as a [`SequenceSource`]. Sample loading dispatches
//! on that variant instead of re-inspecting the filesystem.

use std::path::{Path, PathBuf};

use crate::{config::DatasetOptions, error::FrameBatchError};

/// The kind of input a dataset root holds, with its sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSource {
    /// A single video file; one sequence.
    Video(PathBuf),
    /// A directory of video files; one sequence per video, sorted by path.
    VideoFolder(Vec<PathBuf>),
    /// A directory of `.npy` frames; the whole directory is one sequence.
    FrameFolder(PathBuf),
}

/// How a single sequence is turned into a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    /// Decode a video file.
    Video,
    /// Convert a directory of array frames.
    FrameFolder,
}

impl SequenceSource {
    /// Inspect `root` and decide what kind of input it is.
    ///
    /// - A file with a video extension is a single video.
    /// - A directory holding any `.npy` file is one frame folder, even if it
    ///   also holds videos.
    /// - Otherwise a directory holding video files is a video folder.
    ///
    /// Directory listings are not recursive.
    ///
    /// # Errors
    ///
    /// Returns [`FrameBatchError::InvalidInput`] if none of the above apply,
    /// or [`FrameBatchError::IoError`] if a directory cannot be listed.
    pub fn classify(root: &Path, options: &DatasetOptions) -> Result<Self, FrameBatchError> {
        if options.is_video(root) && root.is_file() {
            return Ok(SequenceSource::Video(root.to_path_buf()));
        }

        if root.is_dir() {
            let array_files = list_files(root, |path| options.is_array(path))?;
            if !array_files.is_empty() {
                return Ok(SequenceSource::FrameFolder(root.to_path_buf()));
            }

            let mut videos = list_files(root, |path| options.is_video(path))?;
            if !videos.is_empty() {
                videos.sort();
                return Ok(SequenceSource::VideoFolder(videos));
            }
        }

        Err(FrameBatchError::InvalidInput {
            path: root.to_path_buf(),
        })
    }

    /// Paths of every sequence, in sample order.
    pub fn sequences(&self) -> &[PathBuf] {
        match self {
            SequenceSource::Video(path) | SequenceSource::FrameFolder(path) => {
                std::slice::from_ref(path)
            }
            SequenceSource::VideoFolder(paths) => paths.as_slice(),
        }
    }

    /// How each sequence of this source is loaded.
    pub fn sequence_kind(&self) -> SequenceKind {
        match self {
            SequenceSource::Video(_) | SequenceSource::VideoFolder(_) => SequenceKind::Video,
            SequenceSource::FrameFolder(_) => SequenceKind::FrameFolder,
        }
    }
}

/// List regular files directly inside `directory` that satisfy `keep`.
///
/// The order is whatever the filesystem returns.
pub(crate) fn list_files<F>(directory: &Path, keep: F) -> Result<Vec<PathBuf>, FrameBatchError>
where
    F: Fn(&Path) -> bool,
{
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && keep(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(directory: &Path, name: &str) -> PathBuf {
        let path = directory.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn single_video_file() {
        let directory = tempfile::tempdir().unwrap();
        let video = touch(directory.path(), "clip.mp4");

        let source = SequenceSource::classify(&video, &DatasetOptions::new()).unwrap();
        assert_eq!(source, SequenceSource::Video(video.clone()));
        assert_eq!(source.sequences(), &[video]);
        assert_eq!(source.sequence_kind(), SequenceKind::Video);
    }

    #[test]
    fn array_files_make_one_frame_folder() {
        let directory = tempfile::tempdir().unwrap();
        touch(directory.path(), "frame_1.npy");
        touch(directory.path(), "frame_2.npy");

        let source = SequenceSource::classify(directory.path(), &DatasetOptions::new()).unwrap();
        assert_eq!(source.sequences().len(), 1);
        assert_eq!(source.sequence_kind(), SequenceKind::FrameFolder);
    }

    #[test]
    fn arrays_win_over_videos() {
        let directory = tempfile::tempdir().unwrap();
        touch(directory.path(), "frame_1.npy");
        touch(directory.path(), "clip.mp4");

        let source = SequenceSource::classify(directory.path(), &DatasetOptions::new()).unwrap();
        assert!(matches!(source, SequenceSource::FrameFolder(_)));
    }

    #[test]
    fn videos_are_sorted_by_path() {
        let directory = tempfile::tempdir().unwrap();
        let b = touch(directory.path(), "b.mp4");
        let a = touch(directory.path(), "a.mp4");
        let c = touch(directory.path(), "c.mp4");
        touch(directory.path(), "notes.txt");

        let source = SequenceSource::classify(directory.path(), &DatasetOptions::new()).unwrap();
        assert_eq!(source, SequenceSource::VideoFolder(vec![a, b, c]));
    }

    #[test]
    fn nested_files_are_ignored() {
        let directory = tempfile::tempdir().unwrap();
        let nested = directory.path().join("nested");
        fs::create_dir(&nested).unwrap();
        touch(&nested, "frame_1.npy");

        let result = SequenceSource::classify(directory.path(), &DatasetOptions::new());
        assert!(matches!(result, Err(FrameBatchError::InvalidInput { .. })));
    }

    #[test]
    fn unrelated_file_is_invalid() {
        let directory = tempfile::tempdir().unwrap();
        let text = touch(directory.path(), "readme.txt");

        let error = SequenceSource::classify(&text, &DatasetOptions::new()).unwrap_err();
        assert!(matches!(error, FrameBatchError::InvalidInput { ref path } if path == &text));
    }

    #[test]
    fn missing_video_is_invalid() {
        let result =
            SequenceSource::classify(Path::new("does/not/exist.mp4"), &DatasetOptions::new());
        assert!(matches!(result, Err(FrameBatchError::InvalidInput { .. })));
    }
}
