//! The dataset: sequences in, batched tensors out.
//!
//! [`SequenceDataset`] classifies its root once at construction and then
//! turns each sequence into a [`Sample`] on demand. Every sample is built
//! the same way regardless of its source: frames are written to a private
//! [`ScratchDir`] as image files, ordered by the number in their file name,
//! resized to a common resolution by the [`ImageProcessor`], and stacked
//! into a `(frames, channels, height, width)` batch.

use std::{
    iter::FusedIterator,
    path::{Path, PathBuf},
};

use ndarray::{Array3, Array4, ArrayView3, Axis};

use crate::{
    config::DatasetOptions,
    error::FrameBatchError,
    normalize::load_frame_image,
    ordering::sort_numerically,
    processor::{ImageProcessor, ResizeProcessor},
    progress::{OperationType, ProgressTracker},
    resolution::Resolution,
    scratch::ScratchDir,
    source::{SequenceKind, SequenceSource, list_files},
    video::{ExtractionReport, VideoReader},
};

/// One processed sequence.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Frame tensors stacked along the first axis:
    /// `(frames, channels, height, width)`.
    pub batch: Array4<f32>,
    /// Video file stem, or frame directory name.
    pub scene_name: String,
    /// How extraction went, for samples decoded from a video.
    pub extraction: Option<ExtractionReport>,
}

impl Sample {
    /// Number of frames in the batch.
    pub fn frame_count(&self) -> usize {
        self.batch.len_of(Axis(0))
    }

    /// Shape of the batch as `(frames, channels, height, width)`.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        self.batch.dim()
    }
}

/// A dataset of frame sequences rooted at a video file or a directory.
///
/// # Example
///
/// ```no_run
/// use framebatch::{FrameBatchError, SequenceDataset};
///
/// let dataset = SequenceDataset::open("scenes/")?;
/// for index in 0..dataset.len() {
///     let sample = dataset.get(index)?;
///     println!("{}: {:?}", sample.scene_name, sample.shape());
/// }
/// # Ok::<(), FrameBatchError>(())
/// ```
#[derive(Debug)]
pub struct SequenceDataset<P = ResizeProcessor> {
    root: PathBuf,
    source: SequenceSource,
    options: DatasetOptions,
    processor: P,
}

impl SequenceDataset<ResizeProcessor> {
    /// Open a dataset with default options and the built-in
    /// [`ResizeProcessor`].
    ///
    /// # Errors
    ///
    /// Returns [`FrameBatchError::InvalidInput`] if `root` is neither a video
    /// file nor a directory holding videos or `.npy` frames.
    pub fn open<Q: AsRef<Path>>(root: Q) -> Result<Self, FrameBatchError> {
        Self::open_with_options(root, DatasetOptions::new())
    }

    /// Open a dataset with custom options.
    ///
    /// # Errors
    ///
    /// See [`open`](SequenceDataset::open).
    pub fn open_with_options<Q: AsRef<Path>>(
        root: Q,
        options: DatasetOptions,
    ) -> Result<Self, FrameBatchError> {
        let root = root.as_ref().to_path_buf();
        let source = SequenceSource::classify(&root, &options)?;

        log::debug!(
            "Opened dataset {} as {:?} with {} sequence(s)",
            root.display(),
            source.sequence_kind(),
            source.sequences().len(),
        );

        Ok(Self {
            root,
            source,
            options,
            processor: ResizeProcessor::new(),
        })
    }
}

impl<P: ImageProcessor> SequenceDataset<P> {
    /// Replace the image processor.
    #[must_use]
    pub fn with_processor<Q: ImageProcessor>(self, processor: Q) -> SequenceDataset<Q> {
        SequenceDataset {
            root: self.root,
            source: self.source,
            options: self.options,
            processor,
        }
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.source.sequences().len()
    }

    /// `true` if there are no sequences. Never the case for a dataset that
    /// opened successfully.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The root path the dataset was opened from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The classified source.
    pub fn source(&self) -> &SequenceSource {
        &self.source
    }

    /// Path of every sequence, in index order.
    pub fn sequence_paths(&self) -> &[PathBuf] {
        self.source.sequences()
    }

    /// The options the dataset was opened with.
    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }

    /// Scene name of the sequence at `index`, without loading it.
    ///
    /// # Errors
    ///
    /// Returns [`FrameBatchError::IndexOutOfRange`] if `index >= len()`.
    pub fn scene_name(&self, index: usize) -> Result<String, FrameBatchError> {
        let path = self.sequence_path(index)?;
        Ok(scene_name_of(path, self.source.sequence_kind()))
    }

    /// Load and process the sequence at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameBatchError::IndexOutOfRange`] if `index >= len()`, and
    /// otherwise whatever [`process_video`](SequenceDataset::process_video)
    /// or [`process_frame_folder`](SequenceDataset::process_frame_folder)
    /// returns.
    pub fn get(&self, index: usize) -> Result<Sample, FrameBatchError> {
        let path = self.sequence_path(index)?;
        match self.source.sequence_kind() {
            SequenceKind::Video => self.process_video(path),
            SequenceKind::FrameFolder => self.process_frame_folder(path),
        }
    }

    /// Iterate over every sample, loading each one lazily.
    pub fn iter(&self) -> SampleIter<'_, P> {
        SampleIter {
            dataset: self,
            next: 0,
        }
    }

    /// Load every sample on the rayon thread pool.
    ///
    /// Each sample uses its own scratch directory and decoder. Results are
    /// returned in index order; the first failure is returned as the error.
    ///
    /// # Errors
    ///
    /// Any error [`get`](SequenceDataset::get) can return.
    #[cfg(feature = "rayon")]
    pub fn samples_parallel(&self) -> Result<Vec<Sample>, FrameBatchError> {
        crate::rayon::load_samples(self)
    }

    /// Decode a video into a sample.
    ///
    /// Frames are extracted in full to scratch storage, sized to the first
    /// frame's resolution clamped to the configured long side, and run
    /// through the processor. The scratch directory is removed before this
    /// returns, whether it succeeds or not.
    ///
    /// # Errors
    ///
    /// - [`FrameBatchError::DecodeError`] if the video cannot be opened.
    /// - [`FrameBatchError::NoFramesFound`] if no frame could be decoded.
    /// - [`FrameBatchError::Cancelled`] if the cancellation token fires.
    /// - Processor and I/O errors.
    pub fn process_video(&self, path: &Path) -> Result<Sample, FrameBatchError> {
        let mut reader = VideoReader::open(path)?;
        let scratch = self.scratch()?;

        let (frames, report) = reader.extract_frames(&scratch, &self.options)?;
        let frames = sort_numerically(frames)?;
        let batch = self.process_frames(path, &frames)?;
        scratch.close()?;

        let sample = Sample {
            batch,
            scene_name: scene_name_of(path, SequenceKind::Video),
            extraction: Some(report),
        };
        log::info!(
            "Loaded {} frames from video {} as {:?}",
            sample.frame_count(),
            path.display(),
            sample.shape(),
        );
        Ok(sample)
    }

    /// Convert a directory of `.npy` frames into a sample.
    ///
    /// Arrays are ordered by the number in their file name, normalized to
    /// 8-bit images and written to scratch storage as `frame_000000`,
    /// `frame_000001`, and so on, then processed like video frames.
    ///
    /// # Errors
    ///
    /// - [`FrameBatchError::NoFramesFound`] if the directory holds no
    ///   `.npy` files.
    /// - [`FrameBatchError::MissingDigits`] if an array file name has no
    ///   digits.
    /// - [`FrameBatchError::NpyFormat`] or
    ///   [`FrameBatchError::UnsupportedArray`] for unusable arrays.
    /// - [`FrameBatchError::Cancelled`] if the cancellation token fires.
    pub fn process_frame_folder(&self, directory: &Path) -> Result<Sample, FrameBatchError> {
        let arrays = list_files(directory, |path| self.options.is_array(path))?;
        if arrays.is_empty() {
            return Err(FrameBatchError::NoFramesFound {
                path: directory.to_path_buf(),
            });
        }
        let arrays = sort_numerically(arrays)?;
        log::debug!(
            "Converting {} arrays from {}",
            arrays.len(),
            directory.display(),
        );

        let scratch = self.scratch()?;
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::ArrayConversion,
            Some(arrays.len() as u64),
            self.options.batch_size,
        );
        let mut frames = Vec::with_capacity(arrays.len());
        for (index, array_path) in arrays.iter().enumerate() {
            if self.options.is_cancelled() {
                return Err(FrameBatchError::Cancelled);
            }
            let image = load_frame_image(array_path)?;
            frames.push(scratch.write_frame(&format!("frame_{index:06}"), &image)?);
            tracker.advance(Some(index as u64));
        }
        tracker.finish();

        let batch = self.process_frames(directory, &frames)?;
        scratch.close()?;

        let sample = Sample {
            batch,
            scene_name: scene_name_of(directory, SequenceKind::FrameFolder),
            extraction: None,
        };
        log::info!(
            "Loaded {} frames from {} as {:?}",
            sample.frame_count(),
            directory.display(),
            sample.shape(),
        );
        Ok(sample)
    }

    fn sequence_path(&self, index: usize) -> Result<&Path, FrameBatchError> {
        self.source
            .sequences()
            .get(index)
            .map(PathBuf::as_path)
            .ok_or(FrameBatchError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    fn scratch(&self) -> Result<ScratchDir, FrameBatchError> {
        ScratchDir::create(
            self.options.scratch_root.as_deref(),
            self.options.scratch_format,
        )
    }

    /// Run ordered frame images through the processor and stack them.
    fn process_frames(
        &self,
        sequence: &Path,
        frames: &[PathBuf],
    ) -> Result<Array4<f32>, FrameBatchError> {
        let Some(first) = frames.first() else {
            return Err(FrameBatchError::NoFramesFound {
                path: sequence.to_path_buf(),
            });
        };
        let resolution = Resolution::of_first_frame(first, self.options.max_long_side)?;

        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::FrameProcessing,
            Some(frames.len() as u64),
            self.options.batch_size,
        );
        let mut tensors: Vec<Array3<f32>> = Vec::with_capacity(frames.len());
        for (index, frame) in frames.iter().enumerate() {
            if self.options.is_cancelled() {
                return Err(FrameBatchError::Cancelled);
            }
            let (tensor, _) = self
                .processor
                .process(frame, resolution, self.options.crop_mode)?;
            if let Some(expected) = tensors.first().map(Array3::dim) {
                if tensor.dim() != expected {
                    return Err(FrameBatchError::ShapeMismatch(format!(
                        "frame {} of {} has shape {:?}, expected {expected:?}",
                        index,
                        sequence.display(),
                        tensor.dim(),
                    )));
                }
            }
            tensors.push(tensor);
            tracker.advance(Some(index as u64));
        }
        tracker.finish();

        let views: Vec<ArrayView3<'_, f32>> = tensors.iter().map(Array3::view).collect();
        Ok(ndarray::stack(Axis(0), &views)?)
    }
}

impl<'a, P: ImageProcessor> IntoIterator for &'a SequenceDataset<P> {
    type Item = Result<Sample, FrameBatchError>;
    type IntoIter = SampleIter<'a, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over the samples of a dataset.
///
/// Created by [`SequenceDataset::iter`]. Each call to `next` loads one
/// sample; an error for one sequence does not end the iteration.
#[derive(Debug)]
pub struct SampleIter<'a, P> {
    dataset: &'a SequenceDataset<P>,
    next: usize,
}

impl<P: ImageProcessor> Iterator for SampleIter<'_, P> {
    type Item = Result<Sample, FrameBatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.dataset.len() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.dataset.get(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl<P: ImageProcessor> ExactSizeIterator for SampleIter<'_, P> {}

impl<P: ImageProcessor> FusedIterator for SampleIter<'_, P> {}

/// Scene name of a sequence: the file stem of a video, or the base name of
/// a frame directory.
fn scene_name_of(path: &Path, kind: SequenceKind) -> String {
    let name = match kind {
        SequenceKind::Video => path.file_stem(),
        SequenceKind::FrameFolder => path.file_name(),
    };
    match name {
        Some(name) => name.to_string_lossy().into_owned(),
        // `.` or `..`: fall back to the resolved directory name.
        None => std::fs::canonicalize(path)
            .ok()
            .and_then(|resolved| resolved.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| path.display().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Mutex};

    use ndarray::Array2;

    use super::*;
    use crate::{
        CancellationToken, CropMode, ImageMetadata,
        npy::tests::npy_bytes,
    };

    fn write_u8_frame(directory: &Path, name: &str, height: usize, width: usize, value: u8) {
        let payload = vec![value; height * width * 3];
        fs::write(
            directory.join(name),
            npy_bytes("|u1", false, &[height, width, 3], &payload),
        )
        .unwrap();
    }

    fn frame_folder(frames: &[(&str, u8)]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        for &(name, value) in frames {
            write_u8_frame(root.path(), name, 6, 8, value);
        }
        root
    }

    #[test]
    fn frame_folder_is_one_sample() {
        let root = frame_folder(&[("frame_1.npy", 10), ("frame_0.npy", 0), ("frame_2.npy", 20)]);
        let dataset = SequenceDataset::open(root.path()).unwrap();

        assert_eq!(dataset.len(), 1);
        assert!(!dataset.is_empty());

        let sample = dataset.get(0).unwrap();
        assert_eq!(sample.shape(), (3, 3, 6, 8));
        assert!(sample.extraction.is_none());

        let expected = root.path().file_name().unwrap().to_string_lossy();
        assert_eq!(sample.scene_name, expected);
        assert_eq!(dataset.scene_name(0).unwrap(), expected);
    }

    #[test]
    fn frames_follow_numeric_order() {
        let root = frame_folder(&[("frame_10.npy", 250), ("frame_2.npy", 100), ("frame_1.npy", 0)]);
        let sample = SequenceDataset::open(root.path()).unwrap().get(0).unwrap();

        let first_pixels: Vec<f32> = (0..3).map(|f| sample.batch[[f, 0, 0, 0]]).collect();
        assert_eq!(first_pixels, vec![0.0, 100.0 / 255.0, 250.0 / 255.0]);
    }

    #[test]
    fn index_out_of_range() {
        let root = frame_folder(&[("frame_0.npy", 0)]);
        let dataset = SequenceDataset::open(root.path()).unwrap();

        let error = dataset.get(1).unwrap_err();
        assert!(matches!(
            error,
            FrameBatchError::IndexOutOfRange { index: 1, len: 1 }
        ));
        assert!(dataset.scene_name(3).is_err());
    }

    #[test]
    fn iter_yields_every_sample() {
        let root = frame_folder(&[("frame_0.npy", 0), ("frame_1.npy", 1)]);
        let dataset = SequenceDataset::open(root.path()).unwrap();

        let iter = dataset.iter();
        assert_eq!(iter.len(), 1);
        let samples: Vec<Sample> = iter.collect::<Result<_, _>>().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].frame_count(), 2);
    }

    #[test]
    fn long_side_is_clamped() {
        let root = tempfile::tempdir().unwrap();
        write_u8_frame(root.path(), "frame_0.npy", 20, 40, 5);
        let options = DatasetOptions::new().with_max_long_side(10);

        let sample = SequenceDataset::open_with_options(root.path(), options)
            .unwrap()
            .get(0)
            .unwrap();
        assert_eq!(sample.shape(), (1, 3, 5, 10));
    }

    #[test]
    fn grayscale_frames_become_rgb() {
        let root = tempfile::tempdir().unwrap();
        let payload: Vec<u8> = Array2::from_elem((4, 4), 0.5f64)
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        fs::write(
            root.path().join("0.npy"),
            npy_bytes("<f8", false, &[4, 4], &payload),
        )
        .unwrap();

        let sample = SequenceDataset::open(root.path()).unwrap().get(0).unwrap();
        assert_eq!(sample.shape(), (1, 3, 4, 4));
        assert!((sample.batch[[0, 1, 2, 2]] - 127.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn scratch_is_removed_after_success_and_failure() {
        let scratch_root = tempfile::tempdir().unwrap();
        let root = frame_folder(&[("frame_0.npy", 0), ("frame_1.npy", 1)]);
        let options = DatasetOptions::new().with_scratch_root(scratch_root.path());
        let dataset = SequenceDataset::open_with_options(root.path(), options).unwrap();

        dataset.get(0).unwrap();
        assert_eq!(fs::read_dir(scratch_root.path()).unwrap().count(), 0);

        fs::write(root.path().join("frame_2.npy"), b"garbage").unwrap();
        assert!(matches!(
            dataset.get(0),
            Err(FrameBatchError::NpyFormat { .. })
        ));
        assert_eq!(fs::read_dir(scratch_root.path()).unwrap().count(), 0);
    }

    #[test]
    fn cancelled_before_start() {
        let root = frame_folder(&[("frame_0.npy", 0)]);
        let token = CancellationToken::new();
        token.cancel();
        let options = DatasetOptions::new().with_cancellation(token);

        let result = SequenceDataset::open_with_options(root.path(), options)
            .unwrap()
            .get(0);
        assert!(matches!(result, Err(FrameBatchError::Cancelled)));
    }

    #[test]
    fn missing_digits_in_array_name() {
        let root = frame_folder(&[("frame_0.npy", 0), ("cover.npy", 0)]);
        let result = SequenceDataset::open(root.path()).unwrap().get(0);
        assert!(matches!(result, Err(FrameBatchError::MissingDigits { ref name }) if name == "cover.npy"));
    }

    /// Records the arguments of every call and returns tensors whose width
    /// grows with each frame.
    #[derive(Default)]
    struct Growing {
        calls: Mutex<Vec<(Resolution, CropMode)>>,
    }

    impl ImageProcessor for Growing {
        fn process(
            &self,
            _path: &Path,
            resolution: Resolution,
            crop: CropMode,
        ) -> Result<(Array3<f32>, ImageMetadata), FrameBatchError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((resolution, crop));
            let width = calls.len();
            let metadata = ImageMetadata {
                original: resolution,
                processed: Resolution::new(width as u32, 1),
                crop,
            };
            Ok((Array3::zeros((3, 1, width)), metadata))
        }
    }

    #[test]
    fn custom_processor_receives_crop_mode() {
        let root = frame_folder(&[("frame_0.npy", 0)]);
        let options = DatasetOptions::new().with_crop_mode(CropMode::Center);
        let dataset = SequenceDataset::open_with_options(root.path(), options)
            .unwrap()
            .with_processor(Growing::default());

        dataset.get(0).unwrap();
        let calls = dataset.processor.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[(Resolution::new(8, 6), CropMode::Center)]);
    }

    #[test]
    fn inconsistent_tensors_are_rejected() {
        let root = frame_folder(&[("frame_0.npy", 0), ("frame_1.npy", 0)]);
        let dataset = SequenceDataset::open(root.path())
            .unwrap()
            .with_processor(Growing::default());

        assert!(matches!(
            dataset.get(0),
            Err(FrameBatchError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn scene_names() {
        assert_eq!(
            scene_name_of(Path::new("/data/clips/beach.mp4"), SequenceKind::Video),
            "beach"
        );
        assert_eq!(
            scene_name_of(Path::new("/data/scenes/kitchen/"), SequenceKind::FrameFolder),
            "kitchen"
        );
    }
}
